// Dialect Translation
//
// Defines the translator trait the coordinator drives, the schema change
// description it hands to catalog synchronization, and the translators for
// the Access dialect and for engine-native SQL.

pub mod access;
pub mod create_table;
pub mod generic;
pub mod inspect;
pub mod lexer;

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Result};

pub use access::AccessDialectTranslator;
pub use generic::GenericDialectTranslator;
pub use lexer::split_statements;

use crate::models::DdlType;

/// Trait for translating foreign-dialect statements into engine statements
///
/// The coordinator calls these in a fixed order: workaround substitution
/// first, then classification, rewriting, and the table-creation rewrite.
/// Whatever is journaled goes through [`restore_original_text`] so the
/// journal only ever holds the caller's dialect.
///
/// [`restore_original_text`]: DialectTranslator::restore_original_text
pub trait DialectTranslator: Send + Sync {
    /// Name of the foreign dialect (e.g., "Access")
    fn dialect_name(&self) -> &str;

    /// Whether the statement mutates the schema
    fn is_ddl(&self, sql: &str) -> bool;

    /// DDL subtype of the statement, `None` when the form is not recognised
    fn classify_ddl(&self, sql: &str) -> Option<DdlType>;

    /// Translate foreign SQL to the engine dialect
    ///
    /// # Errors
    /// Returns error if the statement cannot be lexed (e.g., an unterminated literal)
    fn rewrite(&self, sql: &str) -> Result<String>;

    /// Map column types of an engine-dialect CREATE TABLE
    fn rewrite_create_table(&self, sql: &str) -> Result<String>;

    /// Replace functions the engine cannot take verbatim with placeholders
    fn substitute_workarounds(&self, sql: &str) -> String {
        sql.to_string()
    }

    /// Undo [`DialectTranslator::substitute_workarounds`]
    fn restore_original_text(&self, sql: &str) -> String {
        sql.to_string()
    }

    /// Describe the effect of a classified DDL statement on the schema
    ///
    /// # Arguments
    /// * `sql` - The statement after workaround substitution, before rewriting
    /// * `ddl_type` - The subtype returned by [`DialectTranslator::classify_ddl`]
    fn describe_schema_change(&self, sql: &str, ddl_type: DdlType) -> Result<SchemaChange>;

    /// Engine name for a foreign identifier
    fn escape_identifier(&self, name: &str) -> String {
        inspect::escape_identifier(name)
    }
}

/// Column of a table being created or altered, with foreign names and types
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    /// Canonical foreign type tag, empty when the column has no declared type
    pub type_name: String,
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

/// What a DDL statement does to the set of tracked objects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    CreateTable(TableDefinition),
    /// Columns are only known after the engine has created the table
    CreateTableAsSelect { table: String },
    CreateView { view: String },
    DropTable { table: String },
    DropView { view: String },
    RenameTable { from: String, to: String },
    AddColumn { table: String, column: ColumnDefinition },
    /// Indexes are not tracked
    Untracked,
}

impl SchemaChange {
    /// Apply `f` to every column default
    pub fn map_defaults(self, f: impl Fn(&str) -> String) -> Self {
        let map_column = |mut column: ColumnDefinition| {
            column.default = column.default.as_deref().map(&f);
            column
        };
        match self {
            SchemaChange::CreateTable(table) => SchemaChange::CreateTable(TableDefinition {
                name: table.name,
                columns: table.columns.into_iter().map(map_column).collect(),
            }),
            SchemaChange::AddColumn { table, column } => SchemaChange::AddColumn {
                table,
                column: map_column(column),
            },
            other => other,
        }
    }
}

/// Supported foreign dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectKind {
    Access,
    /// Statements already in the engine dialect
    Generic,
}

impl FromStr for DialectKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "access" | "msaccess" | "jet" => Ok(DialectKind::Access),
            "generic" | "sqlite" => Ok(DialectKind::Generic),
            _ => Err(anyhow!("Unsupported SQL dialect: {}", s)),
        }
    }
}

pub fn create_translator(kind: DialectKind) -> Arc<dyn DialectTranslator> {
    match kind {
        DialectKind::Access => Arc::new(AccessDialectTranslator::new()),
        DialectKind::Generic => Arc::new(GenericDialectTranslator::new()),
    }
}
