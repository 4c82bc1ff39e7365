//! Input responses: how the caller answers a request.

use serde::{Deserialize, Serialize};

use crate::domain::RequestId;

/// How a wait for input ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputDisposition {
    /// The caller answered.
    Answered,

    /// The request was swept by an abort, or the caller declined.
    Canceled,

    /// The request's timeout elapsed without an answer.
    TimedOut,
}

/// What the caller decided to do with a failed item.
///
/// Two of these reposition the item, two abandon work:
/// - `RetryImmediately` re-runs the same item in place.
/// - `RetryLater` moves it to the tail of the pending set and continues.
/// - `AbortCurrent` cancels this item and continues with the rest.
/// - `AbortAll` cancels the item and the whole remaining queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorHandlingAction {
    RetryImmediately,
    RetryLater,
    AbortCurrent,
    AbortAll,
}

/// Answer to a processor-level [`UserInputRequest`](super::UserInputRequest).
#[derive(Debug, Clone, PartialEq)]
pub struct UserInputResponse {
    pub request_id: RequestId,
    pub disposition: InputDisposition,
    pub value: Option<serde_json::Value>,
}

impl UserInputResponse {
    pub fn answered(request_id: RequestId, value: serde_json::Value) -> Self {
        Self {
            request_id,
            disposition: InputDisposition::Answered,
            value: Some(value),
        }
    }

    /// Plain confirmation without data.
    pub fn confirmed(request_id: RequestId) -> Self {
        Self::answered(request_id, serde_json::Value::Bool(true))
    }

    pub fn canceled(request_id: RequestId) -> Self {
        Self {
            request_id,
            disposition: InputDisposition::Canceled,
            value: None,
        }
    }

    pub fn timeout(request_id: RequestId) -> Self {
        Self {
            request_id,
            disposition: InputDisposition::TimedOut,
            value: None,
        }
    }

    pub fn is_answered(&self) -> bool {
        self.disposition == InputDisposition::Answered
    }
}

/// Answer to a queue-level [`QueueInputRequest`](super::QueueInputRequest).
///
/// `proceed` answers a `ConfirmNextItem` prompt; `action` answers an
/// `ErrorRetryOrSkip` prompt. Constructors keep the two uses apart.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueInputResponse {
    pub request_id: RequestId,
    pub disposition: InputDisposition,
    pub proceed: bool,
    pub action: Option<ErrorHandlingAction>,
}

impl QueueInputResponse {
    /// Confirm transition to the next item.
    pub fn proceed(request_id: RequestId) -> Self {
        Self {
            request_id,
            disposition: InputDisposition::Answered,
            proceed: true,
            action: None,
        }
    }

    /// Decline the next item: it moves to the tail of the pending set.
    pub fn skip(request_id: RequestId) -> Self {
        Self {
            request_id,
            disposition: InputDisposition::Answered,
            proceed: false,
            action: None,
        }
    }

    pub fn canceled(request_id: RequestId) -> Self {
        Self {
            request_id,
            disposition: InputDisposition::Canceled,
            proceed: false,
            action: None,
        }
    }

    pub fn timeout(request_id: RequestId) -> Self {
        Self {
            request_id,
            disposition: InputDisposition::TimedOut,
            proceed: false,
            action: None,
        }
    }

    fn with_action(request_id: RequestId, action: ErrorHandlingAction) -> Self {
        Self {
            request_id,
            disposition: InputDisposition::Answered,
            proceed: false,
            action: Some(action),
        }
    }

    /// Re-run the failed item in place.
    pub fn retry_immediately(request_id: RequestId) -> Self {
        Self::with_action(request_id, ErrorHandlingAction::RetryImmediately)
    }

    /// Move the failed item to the tail and continue.
    pub fn retry_later(request_id: RequestId) -> Self {
        Self::with_action(request_id, ErrorHandlingAction::RetryLater)
    }

    /// Cancel the failed item, keep the rest of the queue.
    pub fn abort_current(request_id: RequestId) -> Self {
        Self::with_action(request_id, ErrorHandlingAction::AbortCurrent)
    }

    /// Cancel the failed item and the whole remaining queue.
    pub fn abort_all(request_id: RequestId) -> Self {
        Self::with_action(request_id, ErrorHandlingAction::AbortAll)
    }
}
