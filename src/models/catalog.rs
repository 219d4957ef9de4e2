use serde::{Deserialize, Serialize};

/// Foreign type tag of auto-increment (counter) columns
pub const COUNTER_TYPE: &str = "COUNTER";
/// Foreign type tag of currency columns
pub const CURRENCY_TYPE: &str = "MONEY";

/// Kind of a registered schema object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ObjectKind {
    Table,
    View,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Table => "TABLE",
            ObjectKind::View => "VIEW",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "TABLE" => Some(ObjectKind::Table),
            "VIEW" => Some(ObjectKind::View),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntry {
    pub id: i64,
    pub original_name: String,
    pub escaped_name: String,
    pub kind: ObjectKind,
}

/// Row of the derived columns view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnView {
    pub table_name: String,
    pub column_name: String,
    pub escaped_table_name: String,
    pub escaped_column_name: String,
    pub original_type: Option<String>,
    pub column_default: Option<String>,
    pub is_autoincrement: bool,
    pub is_currency: bool,
}

/// Outcome of an insert-or-get registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Inserted(i64),
    AlreadyExists(i64),
}

impl Registration {
    pub fn id(&self) -> i64 {
        match self {
            Registration::Inserted(id) | Registration::AlreadyExists(id) => *id,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Registration::Inserted(_))
    }
}

/// Map foreign type synonyms onto the tags the catalog classifies by
pub fn canonical_type(type_name: &str) -> String {
    let upper = type_name.trim().to_uppercase();
    match upper.as_str() {
        "AUTOINCREMENT" | "IDENTITY" => COUNTER_TYPE.to_string(),
        "CURRENCY" => CURRENCY_TYPE.to_string(),
        _ => upper,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_kind_round_trip() {
        assert_eq!(ObjectKind::parse("table"), Some(ObjectKind::Table));
        assert_eq!(ObjectKind::parse(ObjectKind::View.as_str()), Some(ObjectKind::View));
        assert_eq!(ObjectKind::parse("index"), None);
    }

    #[test]
    fn test_registration_id() {
        assert_eq!(Registration::Inserted(3).id(), 3);
        assert_eq!(Registration::AlreadyExists(7).id(), 7);
        assert!(!Registration::AlreadyExists(7).is_new());
    }

    #[test]
    fn test_canonical_type_synonyms() {
        assert_eq!(canonical_type("autoincrement"), "COUNTER");
        assert_eq!(canonical_type("Currency"), "MONEY");
        assert_eq!(canonical_type("text"), "TEXT");
    }
}
