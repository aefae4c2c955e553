//! Fixed-point money in minor currency units (1/100 of the major unit).
//!
//! The hosted tables keep `numeric` columns in major units, so conversion
//! to and from [`serde_json::Value`] only happens where rows are read or
//! written. Everything in between works on whole minor units.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};
use serde_json::Value;

const MINOR_PER_UNIT: i64 = 100;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub const fn from_units(units: i64) -> Self {
        Self(units.saturating_mul(MINOR_PER_UNIT))
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Reads a stored amount. Accepts JSON numbers and decimal strings in
    /// major units; anything else is `None`.
    pub fn from_db(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => {
                if let Some(units) = number.as_i64() {
                    return units.checked_mul(MINOR_PER_UNIT).map(Self);
                }
                number
                    .as_f64()
                    .filter(|parsed| parsed.is_finite())
                    .map(|parsed| Self((parsed * MINOR_PER_UNIT as f64).round() as i64))
            }
            Value::String(text) => parse_decimal(text),
            _ => None,
        }
    }

    /// Major-unit decimal string for `numeric` columns.
    pub fn to_db(self) -> Value {
        Value::String(self.to_string())
    }

    pub fn display_with(self, currency_code: &str) -> String {
        format!("{currency_code} {self}")
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(
            f,
            "{sign}{}.{:02}",
            abs / MINOR_PER_UNIT as u64,
            abs % MINOR_PER_UNIT as u64
        )
    }
}

// Stored rows are not bounded by request validation, so arithmetic clamps at
// the i64 range instead of overflowing.
impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl Mul<i64> for Money {
    type Output = Money;

    fn mul(self, rhs: i64) -> Money {
        Money(self.0.saturating_mul(rhs))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

/// Parses `"100"`, `"100.5"`, `"-12.25"`. Extra fractional digits are
/// rounded half away from zero.
pub fn parse_decimal(raw: &str) -> Option<Money> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let whole_value = if whole.is_empty() {
        0
    } else {
        whole.parse::<i64>().ok()?
    };

    let mut fraction_digits = fraction.chars().map(|c| i64::from(c as u8 - b'0'));
    let tenths = fraction_digits.next().unwrap_or(0);
    let hundredths = fraction_digits.next().unwrap_or(0);
    let round_up = fraction_digits.next().is_some_and(|digit| digit >= 5);

    let mut minor = whole_value
        .checked_mul(MINOR_PER_UNIT)?
        .checked_add(tenths * 10 + hundredths)?;
    if round_up {
        minor = minor.checked_add(1)?;
    }

    Some(Money(if negative { -minor } else { minor }))
}

/// Replaces each stored major-unit `column` of a row with `column_minor`.
/// Unreadable or missing amounts become `null`.
pub fn expose_minor(mut row: Value, columns: &[&str]) -> Value {
    if let Some(obj) = row.as_object_mut() {
        for column in columns {
            let amount = obj.remove(*column).as_ref().and_then(Money::from_db);
            obj.insert(
                format!("{column}_minor"),
                amount.map_or(Value::Null, |money| Value::from(money.minor())),
            );
        }
    }
    row
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{expose_minor, parse_decimal, Money};

    #[test]
    fn reads_stored_numbers_and_strings() {
        assert_eq!(Money::from_db(&json!(100)), Some(Money::from_minor(10_000)));
        assert_eq!(Money::from_db(&json!(100.5)), Some(Money::from_minor(10_050)));
        assert_eq!(Money::from_db(&json!("99.99")), Some(Money::from_minor(9_999)));
        assert_eq!(Money::from_db(&json!(null)), None);
        assert_eq!(Money::from_db(&json!("abc")), None);
    }

    #[test]
    fn decimal_parsing_rounds_third_digit() {
        assert_eq!(parse_decimal("1.005"), Some(Money::from_minor(101)));
        assert_eq!(parse_decimal("1.004"), Some(Money::from_minor(100)));
        assert_eq!(parse_decimal("-2.5"), Some(Money::from_minor(-250)));
        assert_eq!(parse_decimal(".75"), Some(Money::from_minor(75)));
        assert_eq!(parse_decimal("."), None);
        assert_eq!(parse_decimal("1,000"), None);
    }

    #[test]
    fn displays_two_decimals_with_sign() {
        assert_eq!(Money::from_minor(50_000).to_string(), "500.00");
        assert_eq!(Money::from_minor(-1_250).to_string(), "-12.50");
        assert_eq!(Money::from_minor(5).display_with("PKR"), "PKR 0.05");
        assert_eq!(Money::from_minor(1_999).to_db(), json!("19.99"));
    }

    #[test]
    fn arithmetic_stays_in_minor_units() {
        let price = Money::from_units(100);
        assert_eq!(price * 5, Money::from_units(500));
        assert_eq!(
            [price, price].into_iter().sum::<Money>() - Money::from_units(250),
            Money::from_units(-50)
        );
    }

    #[test]
    fn oversized_amounts_clamp_instead_of_overflowing() {
        let stored = Money::from_db(&Money::from_minor(1_000_000_000_000_000_000).to_db());
        assert_eq!(stored, Some(Money::from_minor(1_000_000_000_000_000_000)));

        let price = stored.unwrap_or_default();
        assert_eq!(price * 10, Money::from_minor(i64::MAX));
        assert_eq!(price * -10, Money::from_minor(i64::MIN));
        assert_eq!(Money::from_minor(i64::MAX) + price, Money::from_minor(i64::MAX));
        assert_eq!(Money::from_minor(i64::MIN) - price, Money::from_minor(i64::MIN));
        assert_eq!(Money::from_units(i64::MAX / 10), Money::from_minor(i64::MAX));
    }

    #[test]
    fn serializes_as_plain_integer() {
        assert_eq!(
            serde_json::to_value(Money::from_minor(1234)).ok(),
            Some(json!(1234))
        );
    }

    #[test]
    fn exposes_stored_amounts_as_minor_fields() {
        let row = expose_minor(
            json!({ "id": "r1", "amount_paid": "450.50", "total_bill": null }),
            &["amount_paid", "total_bill"],
        );
        assert_eq!(
            row,
            json!({ "id": "r1", "amount_paid_minor": 45050, "total_bill_minor": null })
        );
    }
}
