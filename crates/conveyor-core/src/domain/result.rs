//! Processing result model: the single value a processor produces per item.

use serde::{Deserialize, Serialize};

/// Finite classification of processing failures.
///
/// Deliberately domain-agnostic: concrete processors map their vendor or
/// transport errors onto these kinds so callers can render a message without
/// inspecting processor internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingError {
    /// No concrete processor registered for the item's discriminator.
    ProcessorNotFound,

    /// Transport-level failure (network, socket, host unreachable).
    Communication,

    /// Device-level failure (reader, printer, tag hardware).
    Hardware,

    /// The item carried data the processor cannot act on.
    InvalidInput,

    /// The operation exceeded its allotted time.
    Timeout,

    /// The operation was canceled, by the caller or by an abort.
    Canceled,

    /// The backing service rejected the operation.
    NotAuthorized,

    /// The underlying resource is busy with another operation.
    Busy,

    /// Anything the processor could not classify.
    Unexpected,
}

impl ProcessingError {
    /// Is retrying the same item plausibly useful?
    pub fn is_retryable(self) -> bool {
        !matches!(
            self,
            ProcessingError::ProcessorNotFound | ProcessingError::InvalidInput
        )
    }
}

/// Result of exactly one processor invocation. Never partial: a processor
/// either ran the item to completion or reports a single error kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProcessingResult {
    /// The item was processed; `payload` carries domain output (receipt data,
    /// transaction ids, ...) as loose JSON so the engine stays generic.
    Success(serde_json::Value),

    /// The item failed with a classified error.
    Error(ProcessingError),
}

impl ProcessingResult {
    /// Success with an empty payload.
    pub fn success() -> Self {
        ProcessingResult::Success(serde_json::Value::Null)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProcessingResult::Success(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ProcessingError::Communication, true)]
    #[case(ProcessingError::Timeout, true)]
    #[case(ProcessingError::ProcessorNotFound, false)]
    #[case(ProcessingError::InvalidInput, false)]
    fn retryability(#[case] error: ProcessingError, #[case] retryable: bool) {
        assert_eq!(error.is_retryable(), retryable);
    }

    #[test]
    fn error_kind_serializes_screaming_snake() {
        let json = serde_json::to_string(&ProcessingError::ProcessorNotFound).unwrap();
        assert_eq!(json, "\"PROCESSOR_NOT_FOUND\"");
    }
}
