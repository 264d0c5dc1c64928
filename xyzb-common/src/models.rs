//! Catalog data model shared by XYZ Books tooling
//!
//! [`BookRecord`] mirrors the JSON served by the catalog API. Only the
//! identifier fields are interpreted; everything else is carried through
//! unmodified so a record can be sent back exactly as it was received, with a
//! single field corrected.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Book entity as exposed by the catalog API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookRecord {
    /// Catalog record ID
    pub id: String,
    pub title: String,
    /// Canonical 13-digit identifier
    pub isbn13: String,
    /// Legacy 10-character identifier; `None`, `null` or `""` when absent
    pub isbn10: Option<String>,
    pub publication_year: i32,
    pub edition: String,
    pub price: f64,
    pub image_url: String,
    pub publisher: Publisher,
    pub authors: Vec<Author>,
    /// Fields the catalog sends that this model does not name
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BookRecord {
    /// Legacy identifier, if the record carries a non-blank one
    pub fn isbn10(&self) -> Option<&str> {
        self.isbn10
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// True when the record lacks an ISBN-10 and needs enrichment
    pub fn needs_isbn10(&self) -> bool {
        self.isbn10().is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Publisher {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Author {
    pub id: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
}

/// One processed identifier pair as stored in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerEntry {
    pub isbn13: String,
    pub isbn10: Option<String>,
}

impl LedgerEntry {
    pub fn new(isbn13: impl Into<String>, isbn10: Option<String>) -> Self {
        Self {
            isbn13: isbn13.into(),
            isbn10,
        }
    }

    /// Render as a ledger line (without the newline)
    pub fn to_line(&self) -> String {
        format!("{},{}", self.isbn13, self.isbn10.as_deref().unwrap_or(""))
    }
}

impl From<&BookRecord> for LedgerEntry {
    fn from(book: &BookRecord) -> Self {
        Self {
            isbn13: book.isbn13.clone(),
            isbn10: book.isbn10().map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_full_record() {
        let value = json!({
            "id": "b-1",
            "title": "American Elf",
            "isbn13": "9781891830853",
            "isbn10": "1891830856",
            "publication_year": 2004,
            "edition": "Book 2",
            "price": 1000.0,
            "image_url": "",
            "publisher": { "id": "p-1", "name": "Top Shelf Productions" },
            "authors": [
                { "id": "a-1", "first_name": "Joel", "middle_name": "", "last_name": "Hartse" }
            ]
        });

        let book: BookRecord = serde_json::from_value(value).unwrap();
        assert_eq!(book.isbn10(), Some("1891830856"));
        assert_eq!(book.publisher.name, "Top Shelf Productions");
        assert_eq!(book.authors.len(), 1);
        assert!(book.extra.is_empty());
        assert!(!book.needs_isbn10());
    }

    #[test]
    fn test_absent_isbn10_variants() {
        for value in [
            json!({ "id": "1", "isbn13": "9781891830853" }),
            json!({ "id": "1", "isbn13": "9781891830853", "isbn10": null }),
            json!({ "id": "1", "isbn13": "9781891830853", "isbn10": "" }),
            json!({ "id": "1", "isbn13": "9781891830853", "isbn10": "   " }),
        ] {
            let book: BookRecord = serde_json::from_value(value).unwrap();
            assert!(book.needs_isbn10());
        }
    }

    #[test]
    fn test_unknown_fields_pass_through() {
        let value = json!({
            "id": "1",
            "isbn13": "9781891830853",
            "created_at": "2023-01-01T00:00:00Z",
            "tags": ["comics"]
        });

        let book: BookRecord = serde_json::from_value(value).unwrap();
        let round: Value = serde_json::to_value(&book).unwrap();
        assert_eq!(round["created_at"], "2023-01-01T00:00:00Z");
        assert_eq!(round["tags"], json!(["comics"]));
    }

    #[test]
    fn test_ledger_entry_line() {
        let entry = LedgerEntry::new("9781891830853", Some("1891830856".to_string()));
        assert_eq!(entry.to_line(), "9781891830853,1891830856");

        let bare = LedgerEntry::new("9781891830853", None);
        assert_eq!(bare.to_line(), "9781891830853,");
    }
}
