//! Utility modules

pub mod memory_sheet;
pub mod memory_store;

pub use memory_sheet::*;
pub use memory_store::*;
