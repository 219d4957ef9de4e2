pub mod catalog;
pub mod session;

pub use catalog::ShadowCatalog;
pub use session::{Database, Session};
