//! In-tree port implementations.

pub mod memory;

pub use memory::MemoryStorage;
