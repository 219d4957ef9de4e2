use std::io::Read;
use std::sync::Arc;
use tracing::{error, info};

use access_bridge::config::Config;
use access_bridge::{
    create_translator, split_statements, Command, CommandCoordinator, Database, DdlJournal, DialectKind,
    ExecuteMode, FileJournal, MemoryJournal,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    let script = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path).map_err(|e| {
            error!("Failed to read script {}: {}", path, e);
            e
        })?,
        None => {
            let mut script = String::new();
            std::io::stdin().read_to_string(&mut script)?;
            script
        }
    };

    let database = Database::open(&config.database.url, config.busy_timeout()).map_err(|e| {
        error!("Failed to open database: {}", e);
        e
    })?;
    let mut session = database.session()?;
    session.set_auto_commit(config.session.auto_commit)?;

    let dialect: DialectKind = config.session.dialect.parse()?;
    let journal: Arc<dyn DdlJournal> = match &config.journal.path {
        Some(path) => Arc::new(FileJournal::new(path)),
        None => Arc::new(MemoryJournal::new()),
    };
    let coordinator = CommandCoordinator::new(create_translator(dialect), journal);

    info!(
        "Running script against {} ({} dialect, auto-commit {})",
        database.path(),
        coordinator.translator().dialect_name(),
        session.auto_commit()
    );

    for sql in split_statements(&script) {
        let command = Command::NoArguments(sql);
        match coordinator.execute_base(&session, &command, ExecuteMode::Execute) {
            Ok(result) => println!("{}", serde_json::to_string(&result)?),
            Err(e) => {
                error!("Statement failed: {}", e);
                session.rollback()?;
                return Err(e.into());
            }
        }
    }

    if !session.auto_commit() {
        coordinator.commit(&session)?;
    }

    Ok(())
}
