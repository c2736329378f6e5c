//! Utility modules

pub mod amount;
pub mod date;
pub mod memory_storage;

pub use amount::*;
pub use date::*;
pub use memory_storage::*;
