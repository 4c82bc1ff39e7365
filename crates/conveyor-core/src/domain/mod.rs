//! Domain model (item contract, statuses, results, states, events, ids).

pub mod errors;
pub mod event;
pub mod ids;
pub mod item;
pub mod result;
pub mod state;

pub use errors::QueueError;
pub use event::ProcessingEvent;
pub use ids::RequestId;
pub use item::{QueueItem, QueueItemStatus};
pub use result::{ProcessingError, ProcessingResult};
pub use state::ProcessingState;
