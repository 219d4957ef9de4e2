use rusqlite::{Connection, Result as SqliteResult};
use std::cell::RefCell;
use std::time::Duration;
use uuid::Uuid;

use super::ShadowCatalog;
use crate::error::BridgeError;
use crate::models::JournalEntry;

/// Handle on the relational engine's database file.
///
/// Every caller opens its own [`Session`]; the catalog is provisioned on
/// each new session, which is idempotent.
#[derive(Debug, Clone)]
pub struct Database {
    path: String,
    busy_timeout: Duration,
}

impl Database {
    /// Open the database and make sure the shadow catalog exists
    pub fn open(url: &str, busy_timeout: Duration) -> Result<Self, BridgeError> {
        let database = Self {
            path: clean_url(url).to_string(),
            busy_timeout,
        };
        // Provisioning on a throwaway session surfaces a bad path early
        database.session()?;
        tracing::info!("Opened database at {}", database.path);
        Ok(database)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Open a new engine session with the catalog provisioned
    pub fn session(&self) -> Result<Session, BridgeError> {
        let session = Session::open(&self.path, self.busy_timeout)?;
        ShadowCatalog::new(session.connection()).initialize()?;
        Ok(session)
    }
}

/// Handle SQLite URL format (sqlite:./path or sqlite://path)
fn clean_url(url: &str) -> &str {
    if url.starts_with("sqlite:") {
        url.trim_start_matches("sqlite:").trim_start_matches("//")
    } else {
        url
    }
}

/// One engine connection plus its transaction settings.
///
/// DDL applied inside the open transaction waits in `pending_journal` until
/// the transaction settles. A rollback discards it.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    conn: Connection,
    auto_commit: bool,
    pending_journal: RefCell<Vec<JournalEntry>>,
}

impl Session {
    pub fn open(path: &str, busy_timeout: Duration) -> SqliteResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> SqliteResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> SqliteResult<Self> {
        // Enable foreign key constraints
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            id: Uuid::new_v4(),
            conn,
            auto_commit: true,
            pending_journal: RefCell::new(Vec::new()),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    /// Switching auto-commit on commits the open transaction
    pub fn set_auto_commit(&mut self, auto_commit: bool) -> SqliteResult<()> {
        if auto_commit && !self.auto_commit {
            self.commit()?;
        }
        self.auto_commit = auto_commit;
        Ok(())
    }

    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Open a transaction unless one is already active
    pub fn begin(&self) -> SqliteResult<()> {
        if !self.in_transaction() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    pub fn commit(&self) -> SqliteResult<()> {
        if self.in_transaction() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    pub fn rollback(&self) -> SqliteResult<()> {
        let discarded = self.pending_journal.borrow_mut().drain(..).count();
        if discarded > 0 {
            tracing::debug!("Discarded {} uncommitted journal entries", discarded);
        }
        if self.in_transaction() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    /// Hold an applied statement until the transaction commits
    pub fn defer_journal(&self, entry: JournalEntry) {
        self.pending_journal.borrow_mut().push(entry);
    }

    /// Take the held statements in the order they were applied
    pub fn take_pending_journal(&self) -> Vec<JournalEntry> {
        std::mem::take(&mut *self.pending_journal.borrow_mut())
    }

    /// Columns of an engine table or view as (name, declared type), in declaration order
    pub fn table_columns(&self, table: &str) -> SqliteResult<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")?;
        let rows = stmt.query_map(rusqlite::params![table], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut columns = Vec::new();
        for row in rows {
            columns.push(row?);
        }
        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DdlType;
    use tempfile::tempdir;

    #[test]
    fn test_clean_url() {
        assert_eq!(clean_url("sqlite:./bridge.db"), "./bridge.db");
        assert_eq!(clean_url("sqlite://data/bridge.db"), "data/bridge.db");
        assert_eq!(clean_url(":memory:"), ":memory:");
    }

    #[test]
    fn test_database_sessions_share_file() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let database = Database::open(db_path.to_str().unwrap(), Duration::from_millis(500)).unwrap();

        let first = database.session().unwrap();
        first
            .connection()
            .execute_batch("CREATE TABLE shared (id INTEGER)")
            .unwrap();

        let second = database.session().unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(second.table_columns("shared").unwrap().len(), 1);
    }

    #[test]
    fn test_manual_transaction_rollback() {
        let mut session = Session::open_in_memory().unwrap();
        session
            .connection()
            .execute_batch("CREATE TABLE t (id INTEGER)")
            .unwrap();
        session.set_auto_commit(false).unwrap();

        session.begin().unwrap();
        assert!(session.in_transaction());
        session
            .connection()
            .execute("INSERT INTO t VALUES (1)", [])
            .unwrap();
        session.rollback().unwrap();
        assert!(!session.in_transaction());

        let count: i64 = session
            .connection()
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_enabling_auto_commit_commits_open_transaction() {
        let mut session = Session::open_in_memory().unwrap();
        session.set_auto_commit(false).unwrap();
        session.begin().unwrap();
        session
            .connection()
            .execute_batch("CREATE TABLE t (id INTEGER)")
            .unwrap();

        session.set_auto_commit(true).unwrap();
        assert!(!session.in_transaction());
        assert!(session.auto_commit());
    }

    #[test]
    fn test_rollback_discards_pending_journal() {
        let session = Session::open_in_memory().unwrap();
        let entry = |sql: &str| JournalEntry::new("1".to_string(), session.id(), DdlType::DropTable, sql.to_string());

        session.defer_journal(entry("DROP TABLE a"));
        session.rollback().unwrap();
        assert!(session.take_pending_journal().is_empty());

        session.defer_journal(entry("DROP TABLE b"));
        session.defer_journal(entry("DROP TABLE c"));
        let pending = session.take_pending_journal();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].sql, "DROP TABLE b");
        assert!(session.take_pending_journal().is_empty());
    }

    #[test]
    fn test_table_columns_in_declaration_order() {
        let session = Session::open_in_memory().unwrap();
        session
            .connection()
            .execute_batch("CREATE TABLE t (b TEXT, a NUMERIC)")
            .unwrap();

        let columns = session.table_columns("T").unwrap();
        assert_eq!(
            columns,
            vec![
                ("b".to_string(), "TEXT".to_string()),
                ("a".to_string(), "NUMERIC".to_string())
            ]
        );
    }
}
