use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub auto_commit: bool,
    pub dialect: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JournalConfig {
    /// JSON-lines journal file; the journal stays in memory when unset
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Try to load from .env file
        let _ = dotenv::dotenv();

        let mut builder = config::Config::builder()
            .set_default("database.url", "./bridge.db")?
            .set_default("database.busy_timeout_ms", 5000)?
            .set_default("session.auto_commit", true)?
            .set_default("session.dialect", "access")?
            .set_default("logging.level", "info")?;

        // Load from environment variables
        if let Ok(database_url) = env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", database_url)?;
        }

        if let Ok(timeout) = env::var("BUSY_TIMEOUT_MS") {
            builder = builder.set_override(
                "database.busy_timeout_ms",
                timeout.parse::<u64>().unwrap_or(5000),
            )?;
        }

        if let Ok(auto_commit) = env::var("AUTO_COMMIT") {
            builder = builder.set_override(
                "session.auto_commit",
                auto_commit.parse::<bool>().unwrap_or(true),
            )?;
        }

        if let Ok(dialect) = env::var("SQL_DIALECT") {
            builder = builder.set_override("session.dialect", dialect)?;
        }

        if let Ok(journal_path) = env::var("JOURNAL_PATH") {
            builder = builder.set_override("journal.path", journal_path)?;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            builder = builder.set_override("logging.level", log_level)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.database.busy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        // Clear environment variables for this test
        env::remove_var("DATABASE_URL");
        env::remove_var("AUTO_COMMIT");
        env::remove_var("SQL_DIALECT");
        env::remove_var("JOURNAL_PATH");
        env::remove_var("BUSY_TIMEOUT_MS");

        let config = Config::from_env();
        assert!(config.is_ok());

        let config = config.unwrap();
        assert!(config.session.auto_commit);
        assert_eq!(config.session.dialect, "access");
        assert_eq!(config.busy_timeout(), Duration::from_millis(5000));
    }
}
