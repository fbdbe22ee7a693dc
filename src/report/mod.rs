//! Reporting over a full record set
//!
//! Nothing here touches a store; callers pass in the records they read.

pub mod export;
pub mod filter;

pub use export::*;
pub use filter::*;
