use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    money::Money,
    services::billing::{DeliveryEntry, Period},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    EasyPaisa,
    JazzCash,
    #[serde(rename = "Bank Transfer")]
    BankTransfer,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [Self::EasyPaisa, Self::JazzCash, Self::BankTransfer];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::EasyPaisa => "EasyPaisa",
            Self::JazzCash => "JazzCash",
            Self::BankTransfer => "Bank Transfer",
        }
    }

    /// Lenient match used for model output: ignores case, spaces and dashes.
    pub fn parse_loose(raw: &str) -> Option<Self> {
        let folded = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        Self::ALL.into_iter().find(|method| {
            method
                .as_str()
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
                .to_ascii_lowercase()
                == folded
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotLine {
    pub date: chrono::NaiveDate,
    pub bottles: i64,
}

/// Deliveries frozen into an invoice together with the price in force when
/// the invoice was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveriesSnapshot {
    pub month_label: String,
    pub bottle_price_minor: Money,
    pub total_bottles: i64,
    pub total_bill_minor: Money,
    pub deliveries: Vec<SnapshotLine>,
}

pub fn build_snapshot(
    deliveries: &[DeliveryEntry],
    customer_id: &str,
    period: Period,
    bottle_price: Money,
) -> DeliveriesSnapshot {
    let mut lines = deliveries
        .iter()
        .filter(|delivery| delivery.customer_id == customer_id && Period::of(delivery.date) == period)
        .map(|delivery| SnapshotLine {
            date: delivery.date,
            bottles: delivery.bottles,
        })
        .collect::<Vec<_>>();
    lines.sort_by_key(|line| line.date);

    let total_bottles = lines
        .iter()
        .fold(0_i64, |total, line| total.saturating_add(line.bottles));
    DeliveriesSnapshot {
        month_label: period.label(),
        bottle_price_minor: bottle_price,
        total_bottles,
        total_bill_minor: bottle_price * total_bottles,
        deliveries: lines,
    }
}

pub struct NewInvoice<'a> {
    pub customer_id: Option<&'a str>,
    pub customer_name: &'a str,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub recipient_phone: &'a str,
    pub month_label: String,
    pub snapshot: Option<DeliveriesSnapshot>,
}

impl NewInvoice<'_> {
    pub fn into_row(self) -> Map<String, Value> {
        let mut row = Map::new();
        if let Some(customer_id) = self.customer_id {
            row.insert(
                "customer_id".to_string(),
                Value::String(customer_id.to_string()),
            );
        }
        row.insert(
            "customer_name".to_string(),
            Value::String(self.customer_name.trim().to_string()),
        );
        row.insert("amount".to_string(), self.amount.to_db());
        row.insert(
            "payment_method".to_string(),
            Value::String(self.payment_method.as_str().to_string()),
        );
        row.insert(
            "recipient_phone".to_string(),
            Value::String(normalize_phone(self.recipient_phone)),
        );
        row.insert("month_label".to_string(), Value::String(self.month_label));
        if let Some(snapshot) = self.snapshot {
            if let Ok(value) = serde_json::to_value(snapshot) {
                row.insert("deliveries_snapshot".to_string(), value);
            }
        }
        row
    }
}

/// Keeps a leading `+` and digits only.
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let digits = trimmed
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>();
    if trimmed.starts_with('+') {
        format!("+{digits}")
    } else {
        digits
    }
}

/// Plain-text invoice for pasting into a messaging app.
pub fn render_share_text(invoice: &Value, currency_code: &str, business_name: &str) -> String {
    let field = |key: &str| {
        invoice
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    };
    let amount = invoice
        .get("amount")
        .and_then(Money::from_db)
        .unwrap_or_default();

    let mut lines = vec![
        format!("{business_name} invoice"),
        format!("Customer: {}", field("customer_name")),
        format!("Month: {}", field("month_label")),
    ];

    let snapshot = invoice
        .get("deliveries_snapshot")
        .filter(|value| !value.is_null())
        .and_then(|value| serde_json::from_value::<DeliveriesSnapshot>(value.clone()).ok());
    if let Some(snapshot) = snapshot {
        lines.push(format!(
            "Bottles: {} x {}",
            snapshot.total_bottles,
            snapshot.bottle_price_minor.display_with(currency_code)
        ));
        for line in &snapshot.deliveries {
            lines.push(format!("  {}: {}", line.date.format("%d %b"), line.bottles));
        }
    }

    lines.push(format!("Amount due: {}", amount.display_with(currency_code)));
    lines.push(format!(
        "Pay via {} to {}",
        field("payment_method"),
        field("recipient_phone")
    ));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::{build_snapshot, normalize_phone, render_share_text, NewInvoice, PaymentMethod};
    use crate::{
        money::Money,
        services::billing::{DeliveryEntry, Period},
    };

    fn delivery(customer_id: &str, year: i32, month: u32, day: u32, bottles: i64) -> DeliveryEntry {
        DeliveryEntry {
            id: format!("{customer_id}-{month}-{day}"),
            customer_id: customer_id.to_string(),
            date: NaiveDate::from_ymd_opt(year, month, day).expect("valid test date"),
            bottles,
        }
    }

    #[test]
    fn loose_payment_method_matching() {
        assert_eq!(PaymentMethod::parse_loose("easypaisa"), Some(PaymentMethod::EasyPaisa));
        assert_eq!(PaymentMethod::parse_loose("Jazz Cash"), Some(PaymentMethod::JazzCash));
        assert_eq!(
            PaymentMethod::parse_loose("bank-transfer"),
            Some(PaymentMethod::BankTransfer)
        );
        assert_eq!(PaymentMethod::parse_loose("cash"), None);
    }

    #[test]
    fn snapshot_freezes_month_deliveries_and_price() {
        let deliveries = vec![
            delivery("ali", 2024, 1, 20, 2),
            delivery("ali", 2024, 1, 5, 3),
            delivery("ali", 2024, 2, 1, 9),
            delivery("sara", 2024, 1, 6, 4),
        ];
        let snapshot = build_snapshot(
            &deliveries,
            "ali",
            Period { month: 0, year: 2024 },
            Money::from_units(100),
        );
        assert_eq!(snapshot.total_bottles, 5);
        assert_eq!(snapshot.total_bill_minor, Money::from_units(500));
        assert_eq!(snapshot.deliveries.len(), 2);
        assert!(snapshot.deliveries[0].date < snapshot.deliveries[1].date);
        assert_eq!(snapshot.month_label, "January 2024");
    }

    #[test]
    fn invoice_row_stores_major_units_and_clean_phone() {
        let row = NewInvoice {
            customer_id: None,
            customer_name: " Ali ",
            amount: Money::from_minor(50_000),
            payment_method: PaymentMethod::JazzCash,
            recipient_phone: "+92 300-1234567",
            month_label: "January 2024".to_string(),
            snapshot: None,
        }
        .into_row();
        assert_eq!(row.get("amount"), Some(&json!("500.00")));
        assert_eq!(row.get("customer_name"), Some(&json!("Ali")));
        assert_eq!(row.get("recipient_phone"), Some(&json!("+923001234567")));
        assert_eq!(row.get("payment_method"), Some(&json!("JazzCash")));
        assert!(!row.contains_key("customer_id"));
        assert!(!row.contains_key("deliveries_snapshot"));
    }

    #[test]
    fn share_text_lists_snapshot_lines() {
        let snapshot = build_snapshot(
            &[delivery("ali", 2024, 1, 5, 3)],
            "ali",
            Period { month: 0, year: 2024 },
            Money::from_units(100),
        );
        let invoice = json!({
            "customer_name": "Ali",
            "month_label": "January 2024",
            "amount": 300,
            "payment_method": "EasyPaisa",
            "recipient_phone": "03001234567",
            "deliveries_snapshot": serde_json::to_value(snapshot).unwrap_or_default()
        });

        let text = render_share_text(&invoice, "PKR", "AquaRoute");
        assert!(text.contains("Customer: Ali"));
        assert!(text.contains("Bottles: 3 x PKR 100.00"));
        assert!(text.contains("  05 Jan: 3"));
        assert!(text.contains("Amount due: PKR 300.00"));
        assert!(text.ends_with("Pay via EasyPaisa to 03001234567"));
    }

    #[test]
    fn phone_normalization() {
        assert_eq!(normalize_phone("0300 123 4567"), "03001234567");
        assert_eq!(normalize_phone(" +92(300)1234567"), "+923001234567");
    }
}
