pub mod coordinator; // DDL/DML routing and transaction boundaries
pub mod journal;
pub mod surface;
pub mod translation; // Access to SQLite dialect translation

pub use coordinator::*;
pub use journal::*;
pub use translation::{
    create_translator, split_statements, AccessDialectTranslator, ColumnDefinition, DialectKind,
    DialectTranslator, GenericDialectTranslator, SchemaChange, TableDefinition,
};
