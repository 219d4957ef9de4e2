use rusqlite::{Connection, Result as SqliteResult};

use crate::error::BridgeError;
use crate::models::{ColumnView, ObjectKind, Registration, TableEntry};

/// Provisioning statements, each guarded so re-running is a no-op
const PROVISION: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS uca_metadata_tables (
        table_id INTEGER PRIMARY KEY AUTOINCREMENT,
        table_name TEXT NOT NULL COLLATE NOCASE,
        escaped_table_name TEXT NOT NULL COLLATE NOCASE UNIQUE,
        type TEXT NOT NULL CHECK (type IN ('TABLE', 'VIEW'))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS uca_metadata_columns (
        column_id INTEGER PRIMARY KEY AUTOINCREMENT,
        column_name TEXT NOT NULL COLLATE NOCASE,
        escaped_column_name TEXT NOT NULL COLLATE NOCASE,
        original_type TEXT,
        column_def TEXT,
        table_id INTEGER NOT NULL,
        UNIQUE (table_id, column_name),
        FOREIGN KEY (table_id) REFERENCES uca_metadata_tables(table_id) ON DELETE CASCADE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_uca_metadata_tables_name ON uca_metadata_tables(table_name)",
    "CREATE INDEX IF NOT EXISTS idx_uca_metadata_columns_escaped ON uca_metadata_columns(table_id, escaped_column_name)",
    r#"
    CREATE VIEW IF NOT EXISTS uca_metadata_columns_view AS
    SELECT t.table_name, c.column_name, t.escaped_table_name, c.escaped_column_name,
           c.original_type, c.column_def,
           CASE WHEN c.original_type = 'COUNTER' THEN 'YES' ELSE 'NO' END AS is_autoincrement,
           CASE WHEN c.original_type = 'MONEY' THEN 'YES' ELSE 'NO' END AS is_currency,
           c.column_id
    FROM uca_metadata_columns c
    INNER JOIN uca_metadata_tables t ON t.table_id = c.table_id
    "#,
];

const SELECT_COLUMN: &str = r#"
    SELECT c.column_name, c.original_type = 'COUNTER', c.original_type = 'MONEY'
    FROM uca_metadata_columns c
    INNER JOIN uca_metadata_tables t ON t.table_id = c.table_id
    WHERE t.escaped_table_name = ?1 AND c.escaped_column_name = ?2
"#;

/// Shadow catalog of the foreign schema, stored inside the engine.
///
/// Works on whatever connection it is given, so its writes join the
/// caller's transaction.
pub struct ShadowCatalog<'c> {
    conn: &'c Connection,
}

struct ColumnFacts {
    name: String,
    is_autoincrement: bool,
    is_currency: bool,
}

impl<'c> ShadowCatalog<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Provision the catalog relations, constraint and view
    pub fn initialize(&self) -> Result<(), BridgeError> {
        for statement in PROVISION {
            self.conn
                .execute_batch(statement)
                .map_err(|e| BridgeError::SchemaProvision(e.to_string()))?;
        }
        tracing::debug!("Shadow catalog provisioned");
        Ok(())
    }

    /// Register a table or view; an existing entry with the same escaped name is returned instead
    pub fn register_table(
        &self,
        original_name: &str,
        escaped_name: &str,
        kind: ObjectKind,
    ) -> SqliteResult<Registration> {
        let inserted = self.conn.execute(
            r#"
            INSERT INTO uca_metadata_tables (table_name, escaped_table_name, type)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(escaped_table_name) DO NOTHING
            "#,
            rusqlite::params![original_name, escaped_name, kind.as_str()],
        )?;

        if inserted > 0 {
            return Ok(Registration::Inserted(self.conn.last_insert_rowid()));
        }

        match self.lookup_table_id(escaped_name)? {
            Some(id) => Ok(Registration::AlreadyExists(id)),
            None => Err(rusqlite::Error::QueryReturnedNoRows),
        }
    }

    /// Register a column; returns false when the table already has it
    pub fn register_column(
        &self,
        original_name: &str,
        escaped_name: &str,
        original_type: &str,
        table_id: i64,
    ) -> SqliteResult<bool> {
        let inserted = self.conn.execute(
            r#"
            INSERT INTO uca_metadata_columns (column_name, escaped_column_name, original_type, table_id)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(table_id, column_name) DO NOTHING
            "#,
            rusqlite::params![original_name, escaped_name, original_type, table_id],
        )?;
        Ok(inserted > 0)
    }

    fn column_facts(&self, escaped_table: &str, escaped_column: &str) -> SqliteResult<Option<ColumnFacts>> {
        let mut stmt = self.conn.prepare(SELECT_COLUMN)?;
        let result = stmt.query_row(rusqlite::params![escaped_table, escaped_column], |row| {
            Ok(ColumnFacts {
                name: row.get(0)?,
                is_autoincrement: row.get::<_, Option<bool>>(1)?.unwrap_or(false),
                is_currency: row.get::<_, Option<bool>>(2)?.unwrap_or(false),
            })
        });

        match result {
            Ok(facts) => Ok(Some(facts)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Original name of a column, by escaped identifiers
    pub fn lookup_column_name(&self, escaped_table: &str, escaped_column: &str) -> SqliteResult<Option<String>> {
        Ok(self
            .column_facts(escaped_table, escaped_column)?
            .map(|facts| facts.name))
    }

    pub fn is_auto_increment(&self, escaped_table: &str, escaped_column: &str) -> SqliteResult<bool> {
        Ok(self
            .column_facts(escaped_table, escaped_column)?
            .is_some_and(|facts| facts.is_autoincrement))
    }

    pub fn is_currency(&self, escaped_table: &str, escaped_column: &str) -> SqliteResult<bool> {
        Ok(self
            .column_facts(escaped_table, escaped_column)?
            .is_some_and(|facts| facts.is_currency))
    }

    /// Table entry by escaped name
    pub fn lookup_table(&self, escaped_name: &str) -> SqliteResult<Option<TableEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT table_id, table_name, escaped_table_name, type FROM uca_metadata_tables WHERE escaped_table_name = ?1",
        )?;

        let result = stmt.query_row(rusqlite::params![escaped_name], |row| {
            Ok(TableEntry {
                id: row.get(0)?,
                original_name: row.get(1)?,
                escaped_name: row.get(2)?,
                kind: ObjectKind::parse(&row.get::<_, String>(3)?).unwrap_or(ObjectKind::Table),
            })
        });

        match result {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn lookup_table_id(&self, escaped_name: &str) -> SqliteResult<Option<i64>> {
        Ok(self.lookup_table(escaped_name)?.map(|entry| entry.id))
    }

    pub fn lookup_table_name(&self, escaped_name: &str) -> SqliteResult<Option<String>> {
        Ok(self.lookup_table(escaped_name)?.map(|entry| entry.original_name))
    }

    /// Delete a table entry by original name; its columns go with it
    pub fn drop_table(&self, original_name: &str) -> SqliteResult<usize> {
        self.conn.execute(
            "DELETE FROM uca_metadata_tables WHERE table_name = ?1",
            rusqlite::params![original_name],
        )
    }

    pub fn rename_table(&self, from_original: &str, to_original: &str, to_escaped: &str) -> SqliteResult<usize> {
        self.conn.execute(
            "UPDATE uca_metadata_tables SET table_name = ?2, escaped_table_name = ?3 WHERE table_name = ?1",
            rusqlite::params![from_original, to_original, to_escaped],
        )
    }

    /// Set the default expression of a column, by original names.
    /// Affects zero rows when the column was never registered.
    pub fn set_column_default(&self, table_name: &str, column_name: &str, default_expr: &str) -> SqliteResult<usize> {
        self.conn.execute(
            r#"
            UPDATE uca_metadata_columns SET column_def = ?1
            WHERE column_name = ?2
              AND table_id IN (SELECT table_id FROM uca_metadata_tables WHERE table_name = ?3)
            "#,
            rusqlite::params![default_expr, column_name, table_name],
        )
    }

    /// Rows of the derived view for one table, in registration order
    pub fn list_columns(&self, escaped_table: &str) -> SqliteResult<Vec<ColumnView>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT table_name, column_name, escaped_table_name, escaped_column_name,
                   original_type, column_def, is_autoincrement, is_currency
            FROM uca_metadata_columns_view
            WHERE escaped_table_name = ?1
            ORDER BY column_id
            "#,
        )?;

        let rows = stmt.query_map(rusqlite::params![escaped_table], |row| {
            Ok(ColumnView {
                table_name: row.get(0)?,
                column_name: row.get(1)?,
                escaped_table_name: row.get(2)?,
                escaped_column_name: row.get(3)?,
                original_type: row.get(4)?,
                column_default: row.get(5)?,
                is_autoincrement: row.get::<_, String>(6)? == "YES",
                is_currency: row.get::<_, String>(7)? == "YES",
            })
        })?;

        let mut columns = Vec::new();
        for row in rows {
            columns.push(row?);
        }
        Ok(columns)
    }

    /// Escaped names of the counter columns of a table
    pub fn auto_increment_columns(&self, escaped_table: &str) -> SqliteResult<Vec<String>> {
        Ok(self
            .list_columns(escaped_table)?
            .into_iter()
            .filter(|column| column.is_autoincrement)
            .map(|column| column.escaped_column_name)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Session;

    fn catalog_session() -> Session {
        let session = Session::open_in_memory().unwrap();
        ShadowCatalog::new(session.connection()).initialize().unwrap();
        session
    }

    fn count(session: &Session, sql: &str) -> i64 {
        session.connection().query_row(sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let session = catalog_session();
        let catalog = ShadowCatalog::new(session.connection());
        assert!(catalog.initialize().is_ok());
        assert!(catalog.initialize().is_ok());
    }

    #[test]
    fn test_initialize_reports_provision_error() {
        let session = Session::open_in_memory().unwrap();
        // A clashing object under the catalog's name cannot be provisioned over
        session
            .connection()
            .execute_batch("CREATE VIEW uca_metadata_tables AS SELECT 1 AS x")
            .unwrap();

        let result = ShadowCatalog::new(session.connection()).initialize();
        assert!(matches!(result, Err(BridgeError::SchemaProvision(_))));
    }

    #[test]
    fn test_register_table_twice_returns_same_id() {
        let session = catalog_session();
        let catalog = ShadowCatalog::new(session.connection());

        let first = catalog.register_table("Orders", "ORDERS", ObjectKind::Table).unwrap();
        let second = catalog.register_table("Orders", "ORDERS", ObjectKind::Table).unwrap();

        assert!(first.is_new());
        assert_eq!(second, Registration::AlreadyExists(first.id()));
        assert_eq!(count(&session, "SELECT COUNT(*) FROM uca_metadata_tables"), 1);
    }

    #[test]
    fn test_register_column_absorbs_duplicates() {
        let session = catalog_session();
        let catalog = ShadowCatalog::new(session.connection());
        let id = catalog.register_table("T", "T", ObjectKind::Table).unwrap().id();

        assert!(catalog.register_column("C", "C", "TEXT", id).unwrap());
        assert!(!catalog.register_column("C", "C", "TEXT", id).unwrap());
        assert_eq!(count(&session, "SELECT COUNT(*) FROM uca_metadata_columns"), 1);
    }

    #[test]
    fn test_register_column_surfaces_unknown_table() {
        let session = catalog_session();
        let catalog = ShadowCatalog::new(session.connection());

        // Not a uniqueness conflict, so it is not absorbed
        assert!(catalog.register_column("C", "C", "TEXT", 999).is_err());
    }

    #[test]
    fn test_drop_table_cascades_to_columns() {
        let session = catalog_session();
        let catalog = ShadowCatalog::new(session.connection());
        let id = catalog.register_table("T", "T", ObjectKind::Table).unwrap().id();
        catalog.register_column("C", "C", "TEXT", id).unwrap();

        assert_eq!(catalog.drop_table("T").unwrap(), 1);

        let remaining: i64 = session
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM uca_metadata_columns WHERE table_id = ?1",
                rusqlite::params![id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn test_absent_column_is_not_auto_increment() {
        let session = catalog_session();
        let catalog = ShadowCatalog::new(session.connection());

        assert!(!catalog.is_auto_increment("NOPE", "NOPE").unwrap());
        assert!(!catalog.is_currency("NOPE", "NOPE").unwrap());
        assert_eq!(catalog.lookup_column_name("NOPE", "NOPE").unwrap(), None);
        assert_eq!(catalog.lookup_table_id("NOPE").unwrap(), None);
        assert_eq!(catalog.lookup_table_name("NOPE").unwrap(), None);
    }

    #[test]
    fn test_counter_and_money_classification() {
        let session = catalog_session();
        let catalog = ShadowCatalog::new(session.connection());
        let id = catalog
            .register_table("Order Details", "ORDER_DETAILS", ObjectKind::Table)
            .unwrap()
            .id();
        catalog.register_column("ID", "ID", "COUNTER", id).unwrap();
        catalog.register_column("Unit Price", "UNIT_PRICE", "MONEY", id).unwrap();
        catalog.register_column("Notes", "NOTES", "MEMO", id).unwrap();

        assert!(catalog.is_auto_increment("ORDER_DETAILS", "ID").unwrap());
        assert!(!catalog.is_currency("ORDER_DETAILS", "ID").unwrap());
        assert!(catalog.is_currency("ORDER_DETAILS", "UNIT_PRICE").unwrap());
        assert!(!catalog.is_auto_increment("ORDER_DETAILS", "UNIT_PRICE").unwrap());
        assert!(!catalog.is_auto_increment("ORDER_DETAILS", "NOTES").unwrap());
        assert!(!catalog.is_currency("ORDER_DETAILS", "NOTES").unwrap());

        assert_eq!(
            catalog.lookup_column_name("order_details", "unit_price").unwrap(),
            Some("Unit Price".to_string())
        );
        assert_eq!(
            catalog.lookup_table_name("ORDER_DETAILS").unwrap(),
            Some("Order Details".to_string())
        );
        assert_eq!(catalog.auto_increment_columns("ORDER_DETAILS").unwrap(), vec!["ID"]);
    }

    #[test]
    fn test_set_column_default() {
        let session = catalog_session();
        let catalog = ShadowCatalog::new(session.connection());
        let id = catalog.register_table("T", "T", ObjectKind::Table).unwrap().id();
        catalog.register_column("Created", "CREATED", "DATETIME", id).unwrap();

        assert_eq!(catalog.set_column_default("T", "Created", "Now()").unwrap(), 1);
        assert_eq!(catalog.set_column_default("T", "Missing", "0").unwrap(), 0);
        assert_eq!(catalog.set_column_default("Other", "Created", "0").unwrap(), 0);

        let columns = catalog.list_columns("T").unwrap();
        assert_eq!(columns[0].column_default.as_deref(), Some("Now()"));
    }

    #[test]
    fn test_rename_table_keeps_columns() {
        let session = catalog_session();
        let catalog = ShadowCatalog::new(session.connection());
        let id = catalog.register_table("Old Name", "OLD_NAME", ObjectKind::Table).unwrap().id();
        catalog.register_column("C", "C", "TEXT", id).unwrap();

        assert_eq!(catalog.rename_table("Old Name", "New Name", "NEW_NAME").unwrap(), 1);
        assert_eq!(catalog.lookup_table_id("NEW_NAME").unwrap(), Some(id));
        assert_eq!(catalog.lookup_table_id("OLD_NAME").unwrap(), None);
        assert_eq!(catalog.list_columns("NEW_NAME").unwrap().len(), 1);
    }

    #[test]
    fn test_view_entries() {
        let session = catalog_session();
        let catalog = ShadowCatalog::new(session.connection());
        catalog.register_table("Active Orders", "ACTIVE_ORDERS", ObjectKind::View).unwrap();

        let entry = catalog.lookup_table("ACTIVE_ORDERS").unwrap().unwrap();
        assert_eq!(entry.kind, ObjectKind::View);
        assert_eq!(entry.original_name, "Active Orders");
    }
}
