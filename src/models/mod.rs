pub mod catalog;
pub mod command;
pub mod journal;

pub use catalog::*;
pub use command::*;
pub use journal::*;
