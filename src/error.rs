use thiserror::Error;

/// Errors surfaced by the bridge layer
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Schema provisioning failed: {0}")]
    SchemaProvision(String),

    #[error("Feature not supported: {0}")]
    NotSupported(String),

    #[error("{0}")]
    Execution(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    /// Wrap any failure into the uniform execution channel, keeping only its message
    pub fn execution(err: impl std::fmt::Display) -> Self {
        BridgeError::Execution(err.to_string())
    }
}

/// Convert rusqlite::Error to BridgeError
impl From<rusqlite::Error> for BridgeError {
    fn from(err: rusqlite::Error) -> Self {
        BridgeError::Database(err.to_string())
    }
}

/// Convert anyhow::Error to BridgeError
impl From<anyhow::Error> for BridgeError {
    fn from(err: anyhow::Error) -> Self {
        BridgeError::Execution(err.to_string())
    }
}

impl From<config::ConfigError> for BridgeError {
    fn from(err: config::ConfigError) -> Self {
        BridgeError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_keeps_message_only() {
        let error = BridgeError::execution("no such table: Orders");
        assert_eq!(error.to_string(), "no such table: Orders");
    }

    #[test]
    fn test_rusqlite_error_conversion() {
        let error: BridgeError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(error, BridgeError::Database(_)));
    }

    #[test]
    fn test_not_supported_display() {
        let error = BridgeError::NotSupported("CREATE TRIGGER".to_string());
        assert_eq!(error.to_string(), "Feature not supported: CREATE TRIGGER");
    }
}
