//! Two-tier input protocol.
//!
//! Processing can suspend at two levels while waiting for a human:
//! - **processor-level**: the processor itself needs data mid-item
//!   (confirm a network address, scan a code, acknowledge a PIN),
//! - **queue-level**: the manager needs a flow decision between items
//!   (proceed to the next item, or pick an error-handling action).
//!
//! Both levels share the same mechanics: a request with a correlation id and
//! a timeout goes out on a broadcast stream, the caller answers through a
//! correlated response, and [`InputRegistry`] guarantees the waiting side is
//! always resolved - by the answer, by the timeout, or by an abort sweep.

pub mod registry;
pub mod request;
pub mod response;

pub use registry::{Correlated, InputRegistry};
pub use request::{InputPrompt, QueueInputRequest, QueuePrompt, UserInputRequest};
pub use response::{
    ErrorHandlingAction, InputDisposition, QueueInputResponse, UserInputResponse,
};
