//! Ports - the abstraction seams of the engine.
//!
//! Hexagonal Architecture の「ポート」。The manager only ever talks to a
//! [`QueueStorage`] and a [`QueueProcessor`]; concrete backends (an embedded
//! database, a vendor SDK adapter) live outside this crate and plug in here.

pub mod processor;
pub mod storage;

pub use processor::QueueProcessor;
pub use storage::QueueStorage;
