// Statement Execution Surface
//
// Runs non-DDL statements on the engine and shapes their results: result
// sets become JSON rows, updates become counts, and inserts can hand back
// the keys of the row they created.

use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Statement};
use serde_json::json;

use super::translation::inspect::insert_target;
use super::translation::lexer::quote_identifier;
use super::translation::DialectTranslator;
use crate::error::BridgeError;
use crate::models::{Command, ExecuteMode, ExecutionResult, QueryResult};
use crate::storage::{Session, ShadowCatalog};

/// Execute one prepared (workaround-substituted) DML statement
pub fn execute_wrapped(
    session: &Session,
    translator: &dyn DialectTranslator,
    command: &Command,
    sql: &str,
    mode: ExecuteMode,
) -> Result<ExecutionResult, BridgeError> {
    let engine_sql = translator.rewrite(sql).map_err(BridgeError::execution)?;
    tracing::debug!("Executing: {}", engine_sql);

    let conn = session.connection();
    let mut stmt = conn.prepare(&engine_sql).map_err(BridgeError::execution)?;

    if stmt.column_count() > 0 {
        if mode == ExecuteMode::Update {
            return Err(BridgeError::execution("Statement produced a result set where an update count was expected"));
        }
        let rows = collect_rows(&mut stmt, command.params()).map_err(BridgeError::execution)?;
        return Ok(ExecutionResult::Rows(rows));
    }

    if mode == ExecuteMode::Query {
        return Err(BridgeError::execution("Statement did not produce a result set"));
    }

    let count = stmt
        .execute(params_from_iter(command.params()))
        .map_err(BridgeError::execution)?;
    drop(stmt);

    match generated_keys(session, translator, command, &engine_sql, count)? {
        Some(keys) => Ok(ExecutionResult::GeneratedKeys { count, keys }),
        None => Ok(ExecutionResult::UpdateCount { count }),
    }
}

/// Execute one prepared statement of a batch for its update count
pub fn execute_update(
    session: &Session,
    translator: &dyn DialectTranslator,
    sql: &str,
) -> Result<usize, BridgeError> {
    let engine_sql = translator.rewrite(sql).map_err(BridgeError::execution)?;
    tracing::debug!("Executing batch statement: {}", engine_sql);
    session
        .connection()
        .execute(&engine_sql, [])
        .map_err(BridgeError::execution)
}

/// Keys of the row an INSERT created, when the command asked for them
fn generated_keys(
    session: &Session,
    translator: &dyn DialectTranslator,
    command: &Command,
    engine_sql: &str,
    count: usize,
) -> Result<Option<QueryResult>, BridgeError> {
    let wants_keys = matches!(
        command,
        Command::WithAutoGeneratedKeys { return_keys: true, .. }
            | Command::WithColumnNames { .. }
            | Command::WithIndexes { .. }
    );
    if !wants_keys || count == 0 {
        return Ok(None);
    }
    let Some(table) = insert_target(engine_sql) else {
        return Ok(None);
    };

    let conn = session.connection();
    let rowid = conn.last_insert_rowid();

    let columns = match command {
        Command::WithColumnNames { columns, .. } => columns
            .iter()
            .map(|column| translator.escape_identifier(column))
            .collect(),
        Command::WithIndexes { indexes, .. } => {
            let table_columns = session.table_columns(&table).map_err(BridgeError::execution)?;
            indexes
                .iter()
                .map(|&index| {
                    index
                        .checked_sub(1)
                        .and_then(|i| table_columns.get(i))
                        .map(|(name, _)| name.clone())
                        .ok_or_else(|| {
                            BridgeError::execution(format!("Invalid column index {} for table {}", index, table))
                        })
                })
                .collect::<Result<Vec<_>, _>>()?
        }
        _ => ShadowCatalog::new(conn)
            .auto_increment_columns(&table)
            .map_err(BridgeError::execution)?,
    };

    let select_list = if columns.is_empty() {
        "rowid AS GENERATED_KEY".to_string()
    } else {
        columns
            .iter()
            .map(|column| quote_identifier(column))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let sql = format!(
        "SELECT {} FROM {} WHERE rowid = ?1",
        select_list,
        quote_identifier(&table)
    );

    let mut stmt = conn.prepare(&sql).map_err(BridgeError::execution)?;
    let keys = collect_rows(&mut stmt, &[Value::Integer(rowid)]).map_err(BridgeError::execution)?;
    Ok(Some(keys))
}

/// Read every row of a prepared query as JSON objects keyed by column name
fn collect_rows(stmt: &mut Statement<'_>, params: &[Value]) -> rusqlite::Result<QueryResult> {
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query(params_from_iter(params))?;

    let mut results = Vec::new();
    while let Some(row) = rows.next()? {
        let mut row_obj = serde_json::Map::new();
        for (idx, name) in columns.iter().enumerate() {
            row_obj.insert(name.clone(), value_to_json(row.get_ref(idx)?));
        }
        results.push(serde_json::Value::Object(row_obj));
    }

    Ok(QueryResult {
        columns,
        rows: results,
    })
}

fn value_to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => json!(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(bytes) => json!(String::from_utf8_lossy(bytes)),
        ValueRef::Blob(bytes) => json!(format!("<{} bytes>", bytes.len())),
    }
}
