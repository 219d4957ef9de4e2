// Command Execution Coordinator
//
// Every statement submitted through an execution surface passes through
// `execute_base`. DML goes straight to the engine after rewriting; DDL is
// classified, rewritten, executed and reflected in the shadow catalog. It is
// journaled once the transaction it ran in commits. Under auto-commit each
// call is one transaction.

use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::journal::DdlJournal;
use super::surface::{execute_update, execute_wrapped};
use super::translation::lexer::{has_trailing_statement, LexMode};
use super::translation::{ColumnDefinition, DialectTranslator, SchemaChange};
use crate::error::BridgeError;
use crate::models::{Command, DdlType, ExecuteMode, ExecutionContext, ExecutionResult, JournalEntry, ObjectKind};
use crate::storage::{Session, ShadowCatalog};

pub struct CommandCoordinator {
    translator: Arc<dyn DialectTranslator>,
    journal: Arc<dyn DdlJournal>,
}

impl CommandCoordinator {
    pub fn new(translator: Arc<dyn DialectTranslator>, journal: Arc<dyn DdlJournal>) -> Self {
        Self { translator, journal }
    }

    pub fn translator(&self) -> &dyn DialectTranslator {
        self.translator.as_ref()
    }

    /// Execute one command on `session`.
    ///
    /// Under auto-commit the session is committed on success and rolled back
    /// on any failure, so a failed call leaves no partial effect and no
    /// journal entry. With auto-commit off the transaction stays open for the
    /// caller, and applied DDL is journaled by [`CommandCoordinator::commit`].
    pub fn execute_base(
        &self,
        session: &Session,
        command: &Command,
        mode: ExecuteMode,
    ) -> Result<ExecutionResult, BridgeError> {
        let ctx = ExecutionContext::new(session, command.command_type());
        debug!("Executing {:?} command as {}", ctx.command_type, ctx.exec_id);

        session.begin().map_err(BridgeError::execution)?;

        let result = match command {
            Command::Batch(statements) => self.execute_batch(&ctx, statements),
            _ => self.execute_single(&ctx, command, mode),
        };

        if !session.auto_commit() {
            return result;
        }

        match result {
            Ok(value) => {
                self.commit(session)?;
                Ok(value)
            }
            Err(e) => {
                rollback(session);
                Err(e)
            }
        }
    }

    /// Commit the session's transaction and journal the DDL it applied
    pub fn commit(&self, session: &Session) -> Result<(), BridgeError> {
        if let Err(e) = session.commit() {
            rollback(session);
            return Err(BridgeError::execution(e));
        }
        for entry in session.take_pending_journal() {
            self.journal.enlist(&entry).map_err(BridgeError::execution)?;
        }
        Ok(())
    }

    fn execute_single(
        &self,
        ctx: &ExecutionContext<'_>,
        command: &Command,
        mode: ExecuteMode,
    ) -> Result<ExecutionResult, BridgeError> {
        let sql = command
            .sql()
            .ok_or_else(|| BridgeError::execution("Command carries no statement"))?;
        let prepared = self.translator.substitute_workarounds(sql);

        if self.translator.is_ddl(&prepared) {
            self.add_ddl_command(ctx, &prepared, mode)
        } else {
            execute_wrapped(ctx.session, self.translator.as_ref(), command, &prepared, mode)
        }
    }

    fn execute_batch(
        &self,
        ctx: &ExecutionContext<'_>,
        statements: &[String],
    ) -> Result<ExecutionResult, BridgeError> {
        let mut counts = Vec::with_capacity(statements.len());
        for sql in statements {
            let prepared = self.translator.substitute_workarounds(sql);
            let count = if self.translator.is_ddl(&prepared) {
                self.add_ddl_command(ctx, &prepared, ExecuteMode::Update)?
                    .update_count()
                    .unwrap_or(0)
            } else {
                execute_update(ctx.session, self.translator.as_ref(), &prepared)?
            };
            counts.push(count);
        }
        Ok(ExecutionResult::Batch { counts })
    }

    /// Run one schema-mutating statement.
    ///
    /// `prepared` is the caller's statement after workaround substitution.
    /// Unrecognised forms fail with `NotSupported` before anything runs. The
    /// statement is journaled when its transaction commits.
    pub fn add_ddl_command(
        &self,
        ctx: &ExecutionContext<'_>,
        prepared: &str,
        mode: ExecuteMode,
    ) -> Result<ExecutionResult, BridgeError> {
        let ddl_type = self.translator.classify_ddl(prepared).ok_or_else(|| {
            BridgeError::NotSupported(format!(
                "Unrecognised DDL statement: {}",
                self.translator.restore_original_text(prepared)
            ))
        })?;
        debug!("Classified statement as {}", ddl_type);

        if mode == ExecuteMode::Query {
            return Err(BridgeError::execution("DDL statements do not produce a result set"));
        }

        let count = self
            .apply_ddl(ctx, prepared, ddl_type, mode)
            .map_err(BridgeError::execution)?;
        Ok(ExecutionResult::UpdateCount { count })
    }

    fn apply_ddl(
        &self,
        ctx: &ExecutionContext<'_>,
        prepared: &str,
        ddl_type: DdlType,
        mode: ExecuteMode,
    ) -> Result<usize> {
        let change = self.translator.describe_schema_change(prepared, ddl_type)?;

        let mut engine_sql = self.translator.rewrite(prepared)?;
        if has_trailing_statement(&engine_sql, LexMode::Engine) {
            bail!("A DDL command must hold a single statement");
        }
        if ddl_type.has_column_list() {
            engine_sql = self.translator.rewrite_create_table(&engine_sql)?;
        }
        debug!("Rewrote DDL to: {}", engine_sql);

        let conn = ctx.session.connection();
        let count = match mode {
            ExecuteMode::Update => conn.execute(&engine_sql, [])?,
            _ => {
                conn.execute_batch(&engine_sql)?;
                0
            }
        };

        self.sync_catalog(ctx.session, change)?;

        let original = self.translator.restore_original_text(prepared);
        ctx.session
            .defer_journal(JournalEntry::from_context(ctx, ddl_type, original));

        info!("Applied {} in execution {}", ddl_type, ctx.exec_id);
        Ok(count)
    }

    /// Reflect an executed schema change in the shadow catalog
    fn sync_catalog(&self, session: &Session, change: SchemaChange) -> Result<()> {
        let catalog = ShadowCatalog::new(session.connection());

        match change {
            SchemaChange::CreateTable(table) => {
                let escaped = self.translator.escape_identifier(&table.name);
                let registration = catalog.register_table(&table.name, &escaped, ObjectKind::Table)?;
                if !registration.is_new() {
                    debug!("Table {} is already tracked", table.name);
                }

                // IF NOT EXISTS may have left an older table in place
                let engine_columns = session.table_columns(&escaped)?;
                for column in &table.columns {
                    let column_escaped = self.translator.escape_identifier(&column.name);
                    if engine_columns
                        .iter()
                        .any(|(name, _)| name.eq_ignore_ascii_case(&column_escaped))
                    {
                        self.register_column(&catalog, &table.name, registration.id(), column)?;
                    } else {
                        debug!("Column {} is not in the engine table {}", column.name, escaped);
                    }
                }
            }
            SchemaChange::CreateTableAsSelect { table } => {
                self.register_derived(session, &catalog, &table, ObjectKind::Table)?;
            }
            SchemaChange::CreateView { view } => {
                self.register_derived(session, &catalog, &view, ObjectKind::View)?;
            }
            SchemaChange::DropTable { table: name } | SchemaChange::DropView { view: name } => {
                if catalog.drop_table(&self.tracked_name(&catalog, &name)?)? == 0 {
                    debug!("Dropped object {} was not tracked", name);
                }
            }
            SchemaChange::RenameTable { from, to } => {
                let escaped = self.translator.escape_identifier(&to);
                if catalog.rename_table(&self.tracked_name(&catalog, &from)?, &to, &escaped)? == 0 {
                    warn!("Renamed table {} is not tracked in the catalog", from);
                }
            }
            SchemaChange::AddColumn { table, column } => {
                let escaped = self.translator.escape_identifier(&table);
                match catalog.lookup_table(&escaped)? {
                    Some(entry) => self.register_column(&catalog, &entry.original_name, entry.id, &column)?,
                    None => warn!("Column {} added to untracked table {}", column.name, table),
                }
            }
            SchemaChange::Untracked => {}
        }

        Ok(())
    }

    /// Original name the catalog tracks `name` under; any spelling that
    /// escapes to the same engine name refers to the same object
    fn tracked_name(&self, catalog: &ShadowCatalog<'_>, name: &str) -> Result<String> {
        let escaped = self.translator.escape_identifier(name);
        Ok(catalog
            .lookup_table(&escaped)?
            .map_or_else(|| name.to_string(), |entry| entry.original_name))
    }

    /// Register a column and, when it is new, its default
    fn register_column(
        &self,
        catalog: &ShadowCatalog<'_>,
        table_name: &str,
        table_id: i64,
        column: &ColumnDefinition,
    ) -> Result<()> {
        let escaped = self.translator.escape_identifier(&column.name);
        let inserted = catalog.register_column(&column.name, &escaped, &column.type_name, table_id)?;
        if let (true, Some(default)) = (inserted, &column.default) {
            catalog.set_column_default(table_name, &column.name, default)?;
        }
        Ok(())
    }

    /// Register a table or view whose columns only the engine knows
    fn register_derived(
        &self,
        session: &Session,
        catalog: &ShadowCatalog<'_>,
        name: &str,
        kind: ObjectKind,
    ) -> Result<()> {
        let escaped = self.translator.escape_identifier(name);
        let table_id = catalog.register_table(name, &escaped, kind)?.id();
        for (column, declared_type) in session.table_columns(&escaped)? {
            let escaped_column = self.translator.escape_identifier(&column);
            catalog.register_column(&column, &escaped_column, &declared_type.to_uppercase(), table_id)?;
        }
        Ok(())
    }
}

fn rollback(session: &Session) {
    if let Err(e) = session.rollback() {
        warn!("Rollback failed: {}", e);
    }
}
