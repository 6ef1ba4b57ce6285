use std::sync::OnceLock;

use regex::Regex;
use scrip_core::{Category, NOT_FOUND};
use serde::{Deserialize, Serialize};

// ── Compiled rule tables ─────────────────────────────────────────────────────

macro_rules! rules {
    ($name:ident, [$($pat:expr),+ $(,)?]) => {
        fn $name() -> &'static [Regex] {
            static R: OnceLock<Vec<Regex>> = OnceLock::new();
            R.get_or_init(|| {
                vec![$(Regex::new($pat).expect("invalid regex")),+]
            })
        }
    };
}

// Tried in order against the original text; the whole match is kept verbatim.
rules!(date_rules, [
    // 15/03/2024, 03-15-24, 15.03.2024
    r"\b\d{2}[/\-.]\d{2}[/\-.]\d{2,4}\b",
    // 2024/03/15, 2024-03-15
    r"\b\d{4}[/\-.]\d{2}[/\-.]\d{2}\b",
    // 15 March 2024
    r"\b\d{2} [A-Za-z]{3,9} \d{2,4}\b",
    // March 15, 2024
    r"\b[A-Za-z]{3,9} \d{1,2},? \d{4}\b",
]);

// Tried in order against the lowercased text; capture group 1 is kept.
// The grouping class `[,\d{3}]` is a character class (comma, digit, brace, '3'),
// not a repeated thousands group. Amounts are persisted exactly as matched.
rules!(amount_rules, [
    r"(?i)\b(?:total|amount|amt|grand total|balance)\s*[:\\-]?\s*₹?\$?\s*(\d{1,3}(?:[,\d\{3\}]*)(?:\.\d{2})?)",
    r"(?i)₹\s?(\d{1,3}(?:[,\d\{3\}]*)(?:\.\d{2})?)",
    r"(?i)\$\s?(\d+(?:\.\d{2})?)",
]);

/// Keyword sets, highest priority first.
const CATEGORY_RULES: &[(&[&str], Category)] = &[
    (&["restaurant", "food", "dining", "cafe", "meal"], Category::Food),
    (&["flight", "uber", "taxi", "bus", "travel", "trip", "train"], Category::Travel),
    (
        &["movie", "theater", "concert", "netflix", "event", "entertainment"],
        Category::Entertainment,
    ),
];

// ── Public extraction API ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fields {
    pub date: String,
    pub amount: String,
    pub category: Category,
}

/// Extract date, amount and category from raw OCR text. Each field is
/// independent; missing date/amount come back as [`NOT_FOUND`].
pub fn extract_fields(text: &str) -> Fields {
    Fields {
        date: extract_date(text).unwrap_or_else(|| NOT_FOUND.to_string()),
        amount: extract_amount(text).unwrap_or_else(|| NOT_FOUND.to_string()),
        category: extract_category(text),
    }
}

pub fn extract_date(text: &str) -> Option<String> {
    date_rules()
        .iter()
        .find_map(|re| re.find(text))
        .map(|m| m.as_str().to_string())
}

pub fn extract_amount(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    amount_rules()
        .iter()
        .find_map(|re| re.captures(&lower))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn extract_category(text: &str) -> Category {
    let lower = text.to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, category)| *category)
        .unwrap_or(Category::Other)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Date ─────────────────────────────────────────────────────────────────

    #[test]
    fn date_day_first_with_each_separator() {
        assert_eq!(extract_date("Date: 15/03/2024").unwrap(), "15/03/2024");
        assert_eq!(extract_date("on 03-15-24 at noon").unwrap(), "03-15-24");
        assert_eq!(extract_date("15.03.2024").unwrap(), "15.03.2024");
    }

    #[test]
    fn date_year_first() {
        assert_eq!(extract_date("AMAZON\nOrder 2024-03-15\n").unwrap(), "2024-03-15");
        assert_eq!(extract_date("2024/03/15").unwrap(), "2024/03/15");
    }

    #[test]
    fn date_day_month_name_year() {
        assert_eq!(extract_date("WALMART\n15 January 2024\n").unwrap(), "15 January 2024");
        assert_eq!(extract_date("05 Mar 24").unwrap(), "05 Mar 24");
    }

    #[test]
    fn date_month_name_day_year() {
        assert_eq!(extract_date("Date: March 15, 2024").unwrap(), "March 15, 2024");
        assert_eq!(extract_date("Sept 5 2024").unwrap(), "Sept 5 2024");
    }

    #[test]
    fn date_first_family_wins_over_earlier_text() {
        // A month-name date appears first in the text, but the numeric family is tried first.
        let text = "March 15, 2024\nprinted 16/03/2024";
        assert_eq!(extract_date(text).unwrap(), "16/03/2024");
    }

    #[test]
    fn date_single_digit_day_month_is_not_numeric_date() {
        assert_eq!(extract_date("1/5/2024"), None);
    }

    #[test]
    fn date_not_found() {
        let f = extract_fields("Grocery Store Invoice\nBill No: 1234\nAmount: 12.50");
        assert_eq!(f.date, NOT_FOUND);
    }

    // ── Amount ───────────────────────────────────────────────────────────────

    #[test]
    fn amount_labeled_with_dollar() {
        assert_eq!(extract_amount("Total: $45.67").unwrap(), "45.67");
    }

    #[test]
    fn amount_labeled_keywords_are_case_insensitive() {
        assert_eq!(extract_amount("GRAND TOTAL - 99.00").unwrap(), "99.00");
        assert_eq!(extract_amount("Amt: 7").unwrap(), "7");
        assert_eq!(extract_amount("Balance 120.10").unwrap(), "120.10");
    }

    #[test]
    fn amount_labeled_with_rupee() {
        assert_eq!(extract_amount("Total ₹ 350.00").unwrap(), "350.00");
    }

    #[test]
    fn amount_grouping_class_accepts_commas() {
        assert_eq!(extract_amount("Total: 1,234.56").unwrap(), "1,234.56");
        assert_eq!(extract_amount("Grand Total: 1,00,000.00").unwrap(), "1,00,000.00");
    }

    #[test]
    fn amount_grouping_class_is_not_a_thousands_group() {
        // Malformed groupings still match because the class takes any run of digits and commas.
        assert_eq!(extract_amount("total 12,3,4").unwrap(), "12,3,4");
        assert_eq!(extract_amount("total 1234567.89").unwrap(), "1234567.89");
    }

    #[test]
    fn amount_subtotal_is_not_a_total_label() {
        assert_eq!(extract_amount("Subtotal 10.00\n$12.00").unwrap(), "12.00");
    }

    #[test]
    fn amount_rupee_symbol_fallback() {
        assert_eq!(extract_amount("Paid ₹250.50 cash").unwrap(), "250.50");
    }

    #[test]
    fn amount_dollar_fallback() {
        assert_eq!(extract_amount("Coffee $ 4.25").unwrap(), "4.25");
        assert_eq!(extract_amount("$1200").unwrap(), "1200");
    }

    #[test]
    fn amount_rupee_family_beats_dollar_family() {
        assert_eq!(extract_amount("$5.00 or ₹410.00").unwrap(), "410.00");
    }

    #[test]
    fn amount_not_found() {
        assert_eq!(extract_amount("no numbers here"), None);
        assert_eq!(extract_fields("").amount, NOT_FOUND);
    }

    // ── Category ─────────────────────────────────────────────────────────────

    #[test]
    fn category_food_beats_travel() {
        assert_eq!(extract_category("Airport cafe before flight"), Category::Food);
    }

    #[test]
    fn category_travel() {
        assert_eq!(extract_category("Uber ride downtown"), Category::Travel);
    }

    #[test]
    fn category_entertainment() {
        assert_eq!(extract_category("NETFLIX monthly"), Category::Entertainment);
    }

    #[test]
    fn category_matches_substrings() {
        // "bus" inside "business" counts.
        assert_eq!(extract_category("business lunch"), Category::Travel);
    }

    #[test]
    fn category_other() {
        assert_eq!(extract_category("Hardware store"), Category::Other);
    }

    #[test]
    fn no_panic_on_garbage_input() {
        let _ = extract_fields("!@#$%^&*()\n\0\x01\x02");
    }
}
