//! Concrete collaborators behind the store adapters

pub mod sheets;
pub mod sqlite;

pub use sheets::*;
pub use sqlite::*;
