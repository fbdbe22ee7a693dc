//! Record store adapters
//!
//! Each adapter owns its collaborator and a read/write gate: `append` runs
//! under the write half, reads under the read half.

pub mod local;
pub mod remote;

pub use local::*;
pub use remote::*;
