//! Model-assisted data entry: spoken delivery notes and invoice drafts.
//!
//! The model only proposes values. Everything it returns is validated here
//! before the caller sees it.

use serde::Serialize;
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    money::Money,
    services::{invoices::PaymentMethod, openai::complete_json},
    state::AppState,
};

const PARSE_DELIVERY_PROMPT: &str = "You extract water bottle deliveries from short spoken notes, \
which may mix English and Urdu. Return the customer name exactly as spoken and the number of \
bottles as an integer. Convert number words to digits. If either is missing, return an empty \
name or 0 bottles.";

const SUGGEST_INVOICE_PROMPT: &str = "You help fill in invoices for a water delivery business. \
Given a draft and previous invoices, correct the customer name spelling to match a previous \
customer when it clearly refers to one, and fill in the payment method and amount the customer \
usually uses. Payment method must be one of: EasyPaisa, JazzCash, Bank Transfer. Amounts are in \
minor units (paisa). Return empty strings or 0 for anything you cannot infer.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerCandidate {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedDelivery {
    pub name: String,
    pub bottles: i64,
    pub customer: Option<CustomerCandidate>,
}

pub async fn parse_delivery_text(
    state: &AppState,
    text: &str,
    customers: &[CustomerCandidate],
) -> AppResult<ParsedDelivery> {
    let schema = json!({
        "type": "object",
        "properties": {
            "name": { "type": "string" },
            "bottles": { "type": "integer" }
        },
        "required": ["name", "bottles"],
        "additionalProperties": false
    });
    let output = complete_json(state, PARSE_DELIVERY_PROMPT, text.trim(), "delivery_note", schema)
        .await?;
    let (name, bottles) = validate_parsed_delivery(&output)?;
    let customer = match_customer_by_name(&name, customers).cloned();
    Ok(ParsedDelivery {
        name,
        bottles,
        customer,
    })
}

pub fn validate_parsed_delivery(output: &Value) -> AppResult<(String, i64)> {
    let could_not_parse =
        || AppError::UnprocessableEntity("Could not parse a name and bottle count.".to_string());

    let name = output
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(could_not_parse)?;
    let bottles = match output.get("bottles") {
        Some(Value::Number(number)) => number.as_i64(),
        Some(Value::String(text)) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
    .filter(|count| *count > 0)
    .ok_or_else(could_not_parse)?;

    Ok((name.to_string(), bottles))
}

/// Exact match on the folded name first, then a single customer whose name
/// starts with or contains the spoken one. Ambiguous matches return `None`.
pub fn match_customer_by_name<'a>(
    spoken: &str,
    customers: &'a [CustomerCandidate],
) -> Option<&'a CustomerCandidate> {
    let wanted = fold_name(spoken);
    if wanted.is_empty() {
        return None;
    }

    if let Some(exact) = customers
        .iter()
        .find(|candidate| fold_name(&candidate.name) == wanted)
    {
        return Some(exact);
    }

    let prefix_hits = customers
        .iter()
        .filter(|candidate| fold_name(&candidate.name).starts_with(&wanted))
        .collect::<Vec<_>>();
    if let [only] = prefix_hits.as_slice() {
        return Some(only);
    }
    if !prefix_hits.is_empty() {
        return None;
    }

    let contains_hits = customers
        .iter()
        .filter(|candidate| fold_name(&candidate.name).contains(&wanted))
        .collect::<Vec<_>>();
    match contains_hits.as_slice() {
        [only] => Some(only),
        _ => None,
    }
}

fn fold_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceDraft {
    pub customer_name: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub amount: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceSuggestion {
    pub customer_name: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub amount_minor: Option<Money>,
    /// Field names the model changed or filled in.
    pub changed: Vec<&'static str>,
}

pub async fn suggest_invoice(
    state: &AppState,
    draft: &InvoiceDraft,
    recent_invoices: &[Value],
) -> AppResult<InvoiceSuggestion> {
    let history = recent_invoices
        .iter()
        .map(|invoice| {
            json!({
                "customer_name": invoice.get("customer_name").cloned().unwrap_or(Value::Null),
                "payment_method": invoice.get("payment_method").cloned().unwrap_or(Value::Null),
                "amount_minor": invoice.get("amount").and_then(Money::from_db),
            })
        })
        .collect::<Vec<_>>();
    let user_content = json!({
        "draft": {
            "customer_name": draft.customer_name,
            "payment_method": draft.payment_method,
            "amount_minor": draft.amount,
        },
        "previous_invoices": history,
    })
    .to_string();

    let schema = json!({
        "type": "object",
        "properties": {
            "customer_name": { "type": "string" },
            "payment_method": { "type": "string" },
            "amount_minor": { "type": "integer" }
        },
        "required": ["customer_name", "payment_method", "amount_minor"],
        "additionalProperties": false
    });
    let output = complete_json(
        state,
        SUGGEST_INVOICE_PROMPT,
        &user_content,
        "invoice_suggestion",
        schema,
    )
    .await?;
    Ok(apply_suggestion(draft, &output))
}

/// Merges model output into the draft, keeping the draft value wherever the
/// model's value is blank or invalid.
pub fn apply_suggestion(draft: &InvoiceDraft, output: &Value) -> InvoiceSuggestion {
    let mut changed = Vec::new();

    let suggested_name = output
        .get("customer_name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned);
    let customer_name = match suggested_name {
        Some(name) if draft.customer_name.as_deref().map(str::trim) != Some(name.as_str()) => {
            changed.push("customer_name");
            Some(name)
        }
        Some(name) => Some(name),
        None => draft.customer_name.clone(),
    };

    let suggested_method = output
        .get("payment_method")
        .and_then(Value::as_str)
        .and_then(PaymentMethod::parse_loose);
    let payment_method = match suggested_method {
        Some(method) if draft.payment_method != Some(method) => {
            changed.push("payment_method");
            Some(method)
        }
        Some(method) => Some(method),
        None => draft.payment_method,
    };

    let suggested_amount = output
        .get("amount_minor")
        .and_then(Value::as_i64)
        .map(Money::from_minor)
        .filter(|amount| amount.is_positive());
    let amount_minor = match suggested_amount {
        Some(amount) if draft.amount != Some(amount) => {
            changed.push("amount_minor");
            Some(amount)
        }
        Some(amount) => Some(amount),
        None => draft.amount,
    };

    InvoiceSuggestion {
        customer_name,
        payment_method,
        amount_minor,
        changed,
    }
}
