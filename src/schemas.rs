use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use crate::{
    error::AppError,
    services::{billing::PaymentStatus, invoices::PaymentMethod},
};

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

pub fn clamp_limit_in_range(limit: i64, minimum: i64, maximum: i64) -> i64 {
    limit.clamp(minimum, maximum)
}

/// Upper bound for any amount accepted over the API (10 million in major
/// units).
pub const MAX_AMOUNT_MINOR: i64 = 1_000_000_000;

fn default_limit_500() -> i64 {
    500
}

fn default_limit_2000() -> i64 {
    2000
}

fn default_false() -> bool {
    false
}

// ===== Customers =====

#[derive(Debug, Clone, Deserialize)]
pub struct CustomersQuery {
    pub search: Option<String>,
    pub linked: Option<bool>,
    #[serde(default = "default_limit_500")]
    pub limit: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerPath {
    pub customer_id: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCustomerInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 7, max = 20))]
    pub phone: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(range(min = 0, max = MAX_AMOUNT_MINOR))]
    pub bottle_price_minor: Option<i64>,
    #[validate(range(min = 0))]
    pub deposit_bottles: Option<i64>,
    #[validate(range(min = 0, max = MAX_AMOUNT_MINOR))]
    pub deposit_amount_minor: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateCustomerInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 7, max = 20))]
    pub phone: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
}

/// Rate and deposit settings. A bottle price of 0 falls back to the default
/// price during billing.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateCustomerRatesInput {
    #[validate(range(min = 0, max = MAX_AMOUNT_MINOR))]
    pub bottle_price_minor: Option<i64>,
    #[validate(range(min = 0))]
    pub deposit_bottles: Option<i64>,
    #[validate(range(min = 0, max = MAX_AMOUNT_MINOR))]
    pub deposit_amount_minor: Option<i64>,
}

/// `user_id: null` unlinks the login account.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkCustomerAccountInput {
    pub user_id: Option<String>,
}

// ===== Deliveries =====

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DeliveriesQuery {
    pub customer_id: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    #[validate(range(max = 11))]
    pub month: Option<u32>,
    pub year: Option<i32>,
    #[serde(default = "default_limit_2000")]
    pub limit: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryPath {
    pub delivery_id: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateDeliveryInput {
    pub customer_id: String,
    pub date: NaiveDate,
    #[validate(range(min = 1, max = 10000))]
    pub bottles: i64,
    #[serde(default = "default_true")]
    pub notify_customer: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateDeliveryInput {
    pub date: Option<NaiveDate>,
    #[validate(range(min = 1, max = 10000))]
    pub bottles: Option<i64>,
}

// ===== Monthly statuses =====

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MonthlyStatusesQuery {
    pub customer_id: Option<String>,
    #[validate(range(max = 11))]
    pub month: Option<u32>,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonthlyStatusPath {
    pub status_id: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SetMonthlyStatusInput {
    pub customer_id: String,
    #[validate(range(max = 11))]
    pub month: u32,
    #[validate(range(min = 2000, max = 2200))]
    pub year: i32,
    pub status: PaymentStatus,
}

// ===== Billing =====

/// Month selector; both omitted means the current month in the business
/// timezone.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PeriodQuery {
    #[validate(range(max = 11))]
    pub month: Option<u32>,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BillingRecordsQuery {
    pub customer_id: Option<String>,
    #[validate(range(max = 11))]
    pub month: Option<u32>,
    pub year: Option<i32>,
    #[serde(default = "default_limit_500")]
    pub limit: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingRecordPath {
    pub record_id: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBillingRecordInput {
    pub customer_id: String,
    #[validate(range(max = 11))]
    pub month: u32,
    #[validate(range(min = 2000, max = 2200))]
    pub year: i32,
    #[validate(range(min = 0, max = MAX_AMOUNT_MINOR))]
    pub amount_paid_minor: i64,
    #[validate(range(min = 0, max = MAX_AMOUNT_MINOR))]
    pub total_bill_minor: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateBillingRecordInput {
    #[validate(range(max = 11))]
    pub month: Option<u32>,
    #[validate(range(min = 2000, max = 2200))]
    pub year: Option<i32>,
    #[validate(range(min = 0, max = MAX_AMOUNT_MINOR))]
    pub amount_paid_minor: Option<i64>,
    #[validate(range(min = 0, max = MAX_AMOUNT_MINOR))]
    pub total_bill_minor: Option<i64>,
}

// ===== Invoices =====

#[derive(Debug, Clone, Deserialize)]
pub struct InvoicesQuery {
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    #[serde(default = "default_limit_500")]
    pub limit: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoicePath {
    pub invoice_id: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateInvoiceInput {
    pub customer_id: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub customer_name: Option<String>,
    #[validate(range(min = 1, max = MAX_AMOUNT_MINOR))]
    pub amount_minor: i64,
    pub payment_method: PaymentMethod,
    #[validate(length(min = 7, max = 20))]
    pub recipient_phone: String,
    #[validate(range(max = 11))]
    pub month: Option<u32>,
    pub year: Option<i32>,
    /// Copy the customer's deliveries for the invoice month into the invoice.
    #[serde(default = "default_false")]
    pub include_deliveries: bool,
}

// ===== Assist =====

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ParseDeliveryTextInput {
    #[validate(length(min = 1, max = 2000))]
    pub text: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SuggestInvoiceInput {
    #[validate(length(max = 255))]
    pub customer_name: Option<String>,
    pub payment_method: Option<String>,
    #[validate(range(max = MAX_AMOUNT_MINOR))]
    pub amount_minor: Option<i64>,
}

// ===== Push =====

/// Browser push subscription as produced by `PushSubscription.toJSON()`.
#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct PushSubscriptionInput {
    #[validate(url)]
    pub endpoint: String,
    #[serde(default, rename = "expirationTime")]
    pub expiration_time: Option<i64>,
    #[serde(default)]
    pub keys: Value,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RemovePushSubscriptionInput {
    #[validate(url)]
    pub endpoint: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendNotificationInput {
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    #[validate(length(min = 1, max = 500))]
    pub body: String,
    #[validate(url)]
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        validate_input, CreateBillingRecordInput, CreateDeliveryInput, CreateInvoiceInput,
        PushSubscriptionInput, SetMonthlyStatusInput, UpdateCustomerRatesInput, MAX_AMOUNT_MINOR,
    };

    #[test]
    fn delivery_needs_at_least_one_bottle() {
        let zero: Result<CreateDeliveryInput, _> = serde_json::from_value(json!({
            "customer_id": "c1", "date": "2024-01-05", "bottles": 0
        }));
        let Ok(zero) = zero else {
            panic!("payload should deserialize");
        };
        assert!(validate_input(&zero).is_err());
        assert!(zero.notify_customer);
    }

    #[test]
    fn delivery_rejects_non_calendar_dates() {
        let parsed: Result<CreateDeliveryInput, _> = serde_json::from_value(json!({
            "customer_id": "c1", "date": "2024-02-30", "bottles": 1
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn monthly_status_month_is_zero_based() {
        let december: Result<SetMonthlyStatusInput, _> = serde_json::from_value(json!({
            "customer_id": "c1", "month": 11, "year": 2024, "status": "not_paid_yet"
        }));
        let overflow: Result<SetMonthlyStatusInput, _> = serde_json::from_value(json!({
            "customer_id": "c1", "month": 12, "year": 2024, "status": "paid"
        }));
        assert!(december.is_ok_and(|input| validate_input(&input).is_ok()));
        assert!(overflow.is_ok_and(|input| validate_input(&input).is_err()));
    }

    #[test]
    fn invoice_payment_method_uses_display_names() {
        let parsed: Result<CreateInvoiceInput, _> = serde_json::from_value(json!({
            "customer_name": "Ali",
            "amount_minor": 50000,
            "payment_method": "Bank Transfer",
            "recipient_phone": "03001234567"
        }));
        assert!(parsed.is_ok_and(|input| validate_input(&input).is_ok() && !input.include_deliveries));

        let unknown: Result<CreateInvoiceInput, _> = serde_json::from_value(json!({
            "customer_name": "Ali",
            "amount_minor": 50000,
            "payment_method": "Cash",
            "recipient_phone": "03001234567"
        }));
        assert!(unknown.is_err());
    }

    #[test]
    fn amounts_are_capped() {
        let huge_price: Result<UpdateCustomerRatesInput, _> = serde_json::from_value(json!({
            "bottle_price_minor": 1_000_000_000_000_000_000_i64
        }));
        assert!(huge_price.is_ok_and(|input| validate_input(&input).is_err()));

        let at_cap: Result<UpdateCustomerRatesInput, _> = serde_json::from_value(json!({
            "bottle_price_minor": MAX_AMOUNT_MINOR,
            "deposit_amount_minor": MAX_AMOUNT_MINOR
        }));
        assert!(at_cap.is_ok_and(|input| validate_input(&input).is_ok()));

        let huge_record: Result<CreateBillingRecordInput, _> = serde_json::from_value(json!({
            "customer_id": "c1", "month": 0, "year": 2024,
            "amount_paid_minor": 0, "total_bill_minor": MAX_AMOUNT_MINOR + 1
        }));
        assert!(huge_record.is_ok_and(|input| validate_input(&input).is_err()));

        let huge_invoice: Result<CreateInvoiceInput, _> = serde_json::from_value(json!({
            "customer_name": "Ali",
            "amount_minor": MAX_AMOUNT_MINOR + 1,
            "payment_method": "EasyPaisa",
            "recipient_phone": "03001234567"
        }));
        assert!(huge_invoice.is_ok_and(|input| validate_input(&input).is_err()));
    }

    #[test]
    fn push_subscription_requires_url_endpoint() {
        let parsed: Result<PushSubscriptionInput, _> = serde_json::from_value(json!({
            "endpoint": "not a url",
            "keys": { "p256dh": "k", "auth": "a" }
        }));
        assert!(parsed.is_ok_and(|input| validate_input(&input).is_err()));
    }
}
