use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::record::Record;

/// Parse a free-form amount cell: everything except digits, `.` and `-` is
/// discarded before parsing. Returns `None` for text with no usable number.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let clean: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if clean.is_empty() {
        return None;
    }
    Decimal::from_str(&clean).ok()
}

pub fn amount_to_cents(s: &str) -> Option<i64> {
    (parse_amount(s)? * Decimal::from(100)).round().to_i64()
}

/// Aggregate view over the table: how many documents and how much they add up to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_receipts: usize,
    pub total_expenses: Decimal,
}

impl Summary {
    pub fn from_records(records: &[Record]) -> Self {
        let total_expenses = records
            .iter()
            .filter_map(|r| parse_amount(&r.amount))
            .fold(Decimal::ZERO, |a, b| a + b);
        Self {
            total_receipts: records.len(),
            total_expenses,
        }
    }
}
