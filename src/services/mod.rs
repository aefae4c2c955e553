pub mod assist;
pub mod billing;
pub mod invoices;
pub mod ledger;
pub mod openai;
pub mod push;
