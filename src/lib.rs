pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;

pub use error::BridgeError;
pub use models::*;
pub use services::{
    create_translator, split_statements, AccessDialectTranslator, CommandCoordinator, DdlJournal, DialectKind,
    DialectTranslator, FileJournal, GenericDialectTranslator, MemoryJournal, SchemaChange,
};
pub use storage::{Database, Session, ShadowCatalog};
