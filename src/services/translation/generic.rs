use anyhow::Result;

use super::inspect;
use super::{DialectTranslator, SchemaChange};
use crate::models::DdlType;

/// Generic dialect translator (pass-through)
///
/// Used when callers already speak the engine dialect. Classification and
/// catalog synchronization still apply.
pub struct GenericDialectTranslator;

impl GenericDialectTranslator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GenericDialectTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl DialectTranslator for GenericDialectTranslator {
    fn dialect_name(&self) -> &str {
        "Generic"
    }

    fn is_ddl(&self, sql: &str) -> bool {
        inspect::is_ddl(sql)
    }

    fn classify_ddl(&self, sql: &str) -> Option<DdlType> {
        inspect::classify(sql)
    }

    fn rewrite(&self, sql: &str) -> Result<String> {
        Ok(sql.to_string())
    }

    fn rewrite_create_table(&self, sql: &str) -> Result<String> {
        Ok(sql.to_string())
    }

    fn describe_schema_change(&self, sql: &str, ddl_type: DdlType) -> Result<SchemaChange> {
        inspect::describe_engine(sql, ddl_type)
    }

    /// Engine names are already valid as written
    fn escape_identifier(&self, name: &str) -> String {
        name.to_string()
    }
}
