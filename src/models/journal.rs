use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ExecutionContext;

/// Recognised schema-mutating statement forms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DdlType {
    CreateTable,
    CreateTableAsSelect,
    CreateView,
    CreateIndex,
    DropTable,
    DropView,
    DropIndex,
    AlterRename,
    AddColumn,
}

impl DdlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DdlType::CreateTable => "CREATE_TABLE",
            DdlType::CreateTableAsSelect => "CREATE_TABLE_AS_SELECT",
            DdlType::CreateView => "CREATE_VIEW",
            DdlType::CreateIndex => "CREATE_INDEX",
            DdlType::DropTable => "DROP_TABLE",
            DdlType::DropView => "DROP_VIEW",
            DdlType::DropIndex => "DROP_INDEX",
            DdlType::AlterRename => "ALTER_RENAME",
            DdlType::AddColumn => "ADD_COLUMN",
        }
    }

    /// Whether the statement declares a column list for the type rewrite
    pub fn has_column_list(&self) -> bool {
        matches!(self, DdlType::CreateTable)
    }
}

impl std::fmt::Display for DdlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One journaled schema mutation, in the foreign dialect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub exec_id: String,
    pub session_id: Uuid,
    pub ddl_type: DdlType,
    pub sql: String,
    pub enlisted_at: DateTime<Utc>,
}

impl JournalEntry {
    pub fn new(exec_id: String, session_id: Uuid, ddl_type: DdlType, sql: String) -> Self {
        Self {
            exec_id,
            session_id,
            ddl_type,
            sql,
            enlisted_at: Utc::now(),
        }
    }

    /// Entry for a statement applied under `ctx`
    pub fn from_context(ctx: &ExecutionContext<'_>, ddl_type: DdlType, sql: String) -> Self {
        Self::new(ctx.exec_id.to_string(), ctx.session.id(), ddl_type, sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ddl_type_serializes_as_tag() {
        let json = serde_json::to_string(&DdlType::CreateTableAsSelect).unwrap();
        assert_eq!(json, "\"CREATE_TABLE_AS_SELECT\"");
        assert_eq!(DdlType::CreateTable.to_string(), "CREATE_TABLE");
    }

    #[test]
    fn test_has_column_list() {
        assert!(DdlType::CreateTable.has_column_list());
        assert!(!DdlType::CreateTableAsSelect.has_column_list());
        assert!(!DdlType::CreateView.has_column_list());
    }
}
