use scrip_core::DocumentType;

/// Keyword rules, highest priority first. Any keyword of a rule selects it.
const TYPE_RULES: &[(&[&str], DocumentType)] = &[
    (&["invoice"], DocumentType::Invoice),
    (&["bill to", "bill no"], DocumentType::Bill),
    (&["receipt"], DocumentType::Receipt),
];

/// Label raw OCR text by case-insensitive keyword search; the first rule that
/// matches wins.
pub fn classify(text: &str) -> DocumentType {
    let lower = text.to_lowercase();
    TYPE_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, doc_type)| *doc_type)
        .unwrap_or(DocumentType::Unknown)
}
