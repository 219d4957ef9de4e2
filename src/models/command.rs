use rusqlite::types::Value;
use serde::Serialize;
use uuid::Uuid;

use crate::storage::Session;

/// Execution surface tag, fixed when the command is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    Batch,
    NoArguments,
    Parameterized,
    UpdatableCursor,
    WithAutoGeneratedKeys,
    WithColumnNames,
    WithIndexes,
}

/// A statement submitted through one of the execution surfaces
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Batch(Vec<String>),
    NoArguments(String),
    Parameterized { sql: String, params: Vec<Value> },
    UpdatableCursor { sql: String, params: Vec<Value> },
    WithAutoGeneratedKeys { sql: String, return_keys: bool },
    WithColumnNames { sql: String, columns: Vec<String> },
    /// Column indexes are 1-based
    WithIndexes { sql: String, indexes: Vec<usize> },
}

impl Command {
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Batch(_) => CommandType::Batch,
            Command::NoArguments(_) => CommandType::NoArguments,
            Command::Parameterized { .. } => CommandType::Parameterized,
            Command::UpdatableCursor { .. } => CommandType::UpdatableCursor,
            Command::WithAutoGeneratedKeys { .. } => CommandType::WithAutoGeneratedKeys,
            Command::WithColumnNames { .. } => CommandType::WithColumnNames,
            Command::WithIndexes { .. } => CommandType::WithIndexes,
        }
    }

    /// Statement text; `None` for batches
    pub fn sql(&self) -> Option<&str> {
        match self {
            Command::Batch(_) => None,
            Command::NoArguments(sql)
            | Command::Parameterized { sql, .. }
            | Command::UpdatableCursor { sql, .. }
            | Command::WithAutoGeneratedKeys { sql, .. }
            | Command::WithColumnNames { sql, .. }
            | Command::WithIndexes { sql, .. } => Some(sql),
        }
    }

    pub fn params(&self) -> &[Value] {
        match self {
            Command::Parameterized { params, .. } | Command::UpdatableCursor { params, .. } => params,
            _ => &[],
        }
    }

    /// Build the row update an updatable cursor issues for its current row.
    ///
    /// Identifiers are written in the foreign dialect so they go through the
    /// same escaping as any other statement.
    pub fn cursor_update(table: &str, assignments: Vec<(String, Value)>, key: (String, Value)) -> Self {
        let set_clause = assignments
            .iter()
            .map(|(column, _)| format!("[{}] = ?", column))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE [{}] SET {} WHERE [{}] = ?", table, set_clause, key.0);

        let mut params: Vec<Value> = assignments.into_iter().map(|(_, value)| value).collect();
        params.push(key.1);

        Command::UpdatableCursor { sql, params }
    }
}

/// Which result shape the caller asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteMode {
    /// Generic execute: a result set or an update count
    Execute,
    /// Execute for update count only
    Update,
    /// Execute for a result set only
    Query,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Value>,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionResult {
    UpdateCount { count: usize },
    Rows(QueryResult),
    GeneratedKeys { count: usize, keys: QueryResult },
    Batch { counts: Vec<usize> },
}

impl ExecutionResult {
    pub fn update_count(&self) -> Option<usize> {
        match self {
            ExecutionResult::UpdateCount { count } | ExecutionResult::GeneratedKeys { count, .. } => {
                Some(*count)
            }
            _ => None,
        }
    }
}

/// Groups the side effects of one execution call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecId {
    Batch,
    Single(Uuid),
}

impl ExecId {
    pub const BATCH: &'static str = "BATCH";

    pub fn for_command(command_type: CommandType) -> Self {
        match command_type {
            CommandType::Batch => ExecId::Batch,
            _ => ExecId::Single(Uuid::new_v4()),
        }
    }
}

impl std::fmt::Display for ExecId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecId::Batch => f.write_str(Self::BATCH),
            ExecId::Single(id) => write!(f, "{}", id),
        }
    }
}

/// Session and execution id visible to everything one call does
#[derive(Debug, Clone, Copy)]
pub struct ExecutionContext<'s> {
    pub session: &'s Session,
    pub exec_id: ExecId,
    pub command_type: CommandType,
}

impl<'s> ExecutionContext<'s> {
    pub fn new(session: &'s Session, command_type: CommandType) -> Self {
        Self {
            session,
            exec_id: ExecId::for_command(command_type),
            command_type,
        }
    }
}
