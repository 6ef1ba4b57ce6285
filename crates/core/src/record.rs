use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder stored when a date or amount could not be extracted.
pub const NOT_FOUND: &str = "Not found";

/// Column order of the persisted table.
pub const TABLE_HEADER: [&str; 5] = ["type", "date", "amount", "category", "file"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    Invoice,
    Bill,
    Receipt,
    Unknown,
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentType::Invoice => write!(f, "Invoice"),
            DocumentType::Bill => write!(f, "Bill"),
            DocumentType::Receipt => write!(f, "Receipt"),
            DocumentType::Unknown => write!(f, "Unknown"),
        }
    }
}

impl std::str::FromStr for DocumentType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Invoice" => Ok(DocumentType::Invoice),
            "Bill" => Ok(DocumentType::Bill),
            "Receipt" => Ok(DocumentType::Receipt),
            "Unknown" => Ok(DocumentType::Unknown),
            other => Err(format!("Unknown document type: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Food,
    Travel,
    Entertainment,
    Other,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Food => write!(f, "Food"),
            Category::Travel => write!(f, "Travel"),
            Category::Entertainment => write!(f, "Entertainment"),
            Category::Other => write!(f, "Other"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Food" => Ok(Category::Food),
            "Travel" => Ok(Category::Travel),
            "Entertainment" => Ok(Category::Entertainment),
            "Other" => Ok(Category::Other),
            other => Err(format!("Unknown category: '{other}'")),
        }
    }
}

/// Everything the analyzer learns about a document, before it is bound to a
/// stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    /// Matched date text, verbatim, or [`NOT_FOUND`].
    pub date: String,
    /// Matched numeric text, verbatim, or [`NOT_FOUND`].
    pub amount: String,
    pub category: Category,
}

impl Analysis {
    pub fn into_record(self, file: impl Into<String>) -> Record {
        Record {
            doc_type: self.doc_type,
            date: self.date,
            amount: self.amount,
            category: self.category,
            file: file.into(),
        }
    }
}

/// One row of the table. `file` names the stored image and is the key.
///
/// Field order matches [`TABLE_HEADER`]; rows are (de)serialized by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub date: String,
    pub amount: String,
    pub category: Category,
    pub file: String,
}

impl Record {
    /// Overwrite the extracted fields, keeping `file`.
    pub fn apply(&mut self, analysis: Analysis) {
        self.doc_type = analysis.doc_type;
        self.date = non_empty_or_sentinel(analysis.date);
        self.amount = non_empty_or_sentinel(analysis.amount);
        self.category = analysis.category;
    }

    pub fn analysis(&self) -> Analysis {
        Analysis {
            doc_type: self.doc_type,
            date: self.date.clone(),
            amount: self.amount.clone(),
            category: self.category,
        }
    }
}

fn non_empty_or_sentinel(value: String) -> String {
    if value.trim().is_empty() {
        NOT_FOUND.to_string()
    } else {
        value
    }
}
