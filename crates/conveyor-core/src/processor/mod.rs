//! Processor building blocks.
//!
//! - [`ProcessorCore`]: the stream/suspension plumbing every concrete
//!   processor embeds (events, input requests, correlated waits).
//! - [`DynamicProcessor`]: a composite that routes each item to one of
//!   several concrete processors by discriminator, relaying events and input
//!   requests transparently.

pub mod core;
pub mod dynamic;

pub use self::core::ProcessorCore;
pub use dynamic::DynamicProcessor;
