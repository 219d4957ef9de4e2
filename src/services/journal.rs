// DDL Journal
//
// Receives every successfully applied schema mutation, in the caller's
// dialect, tagged with the execution that produced it.

use anyhow::{anyhow, Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::models::JournalEntry;

/// Sink for applied DDL statements
pub trait DdlJournal: Send + Sync {
    /// Record one committed statement; a failure fails the commit
    fn enlist(&self, entry: &JournalEntry) -> Result<()>;
}

/// In-process journal
#[derive(Debug, Default)]
pub struct MemoryJournal {
    entries: Mutex<Vec<JournalEntry>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Entries recorded under one execution id
    pub fn entries_for(&self, exec_id: &str) -> Vec<JournalEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.exec_id == exec_id)
            .collect()
    }

    /// Take every recorded entry, leaving the journal empty
    pub fn drain(&self) -> Vec<JournalEntry> {
        self.entries
            .lock()
            .map(|mut entries| std::mem::take(&mut *entries))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DdlJournal for MemoryJournal {
    fn enlist(&self, entry: &JournalEntry) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("DDL journal lock poisoned"))?
            .push(entry.clone());
        Ok(())
    }
}

/// Journal appended to a file, one JSON object per line
#[derive(Debug)]
pub struct FileJournal {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileJournal {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Read back every entry; a missing file is an empty journal
    pub fn entries(&self) -> Result<Vec<JournalEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open DDL journal {}", self.path.display()))?;

        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line).context("Malformed DDL journal entry")?);
        }
        Ok(entries)
    }
}

impl DdlJournal for FileJournal {
    fn enlist(&self, entry: &JournalEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow!("DDL journal lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open DDL journal {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("Failed to append to DDL journal {}", self.path.display()))?;

        tracing::debug!("Journaled {} for execution {}", entry.ddl_type, entry.exec_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommandType, DdlType, ExecutionContext};
    use crate::storage::Session;
    use tempfile::tempdir;

    fn entry(ctx: &ExecutionContext<'_>, sql: &str, ddl_type: DdlType) -> JournalEntry {
        JournalEntry::from_context(ctx, ddl_type, sql.to_string())
    }

    #[test]
    fn test_memory_journal_groups_by_exec_id() {
        let session = Session::open_in_memory().unwrap();
        let journal = MemoryJournal::new();

        let first = ExecutionContext::new(&session, CommandType::NoArguments);
        let batch = ExecutionContext::new(&session, CommandType::Batch);
        journal.enlist(&entry(&first, "CREATE TABLE a (x TEXT)", DdlType::CreateTable)).unwrap();
        journal.enlist(&entry(&batch, "DROP TABLE a", DdlType::DropTable)).unwrap();
        journal.enlist(&entry(&batch, "DROP VIEW v", DdlType::DropView)).unwrap();

        assert_eq!(journal.len(), 3);
        assert_eq!(journal.entries_for("BATCH").len(), 2);
        assert_eq!(journal.entries_for(&first.exec_id.to_string()).len(), 1);
        assert_eq!(journal.entries()[0].session_id, session.id());

        assert_eq!(journal.drain().len(), 3);
        assert!(journal.is_empty());
    }

    #[test]
    fn test_file_journal_appends_lines() {
        let dir = tempdir().unwrap();
        let journal = FileJournal::new(dir.path().join("ddl.jsonl"));
        assert!(journal.entries().unwrap().is_empty());

        let session = Session::open_in_memory().unwrap();
        let ctx = ExecutionContext::new(&session, CommandType::Parameterized);
        journal
            .enlist(&entry(&ctx, "CREATE TABLE [Order Details] (d DATETIME DEFAULT Now())", DdlType::CreateTable))
            .unwrap();
        journal.enlist(&entry(&ctx, "DROP TABLE [Order Details]", DdlType::DropTable)).unwrap();

        let entries = journal.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sql, "CREATE TABLE [Order Details] (d DATETIME DEFAULT Now())");
        assert_eq!(entries[1].ddl_type, DdlType::DropTable);
        assert_eq!(entries[0].exec_id, entries[1].exec_id);
    }

    #[test]
    fn test_file_journal_unwritable_path_fails() {
        let dir = tempdir().unwrap();
        let journal = FileJournal::new(dir.path().join("missing").join("ddl.jsonl"));
        let session = Session::open_in_memory().unwrap();
        let ctx = ExecutionContext::new(&session, CommandType::NoArguments);

        assert!(journal.enlist(&entry(&ctx, "DROP TABLE t", DdlType::DropTable)).is_err());
    }
}
