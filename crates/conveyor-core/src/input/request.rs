//! Input requests: what the processor or the manager asks the caller.

use std::time::Duration;

use crate::domain::{ProcessingError, RequestId};

/// Prompt shapes a processor can raise mid-item.
///
/// These are the canonical shapes observed across the four consuming domains
/// (payment capture, refund, printing, tag operations); concrete apps render
/// them however they like. Each shape carries its own default timeout.
#[derive(Debug, Clone, PartialEq)]
pub enum InputPrompt {
    /// "Print the customer receipt?"
    ConfirmReceipt,

    /// "Is this network address / port correct?"
    ConfirmNetworkInfo,

    /// "Confirm the authentication keys before writing."
    ConfirmKeys,

    /// "Scan this code to continue."
    Scan { code: String },

    /// "Confirm you have saved this PIN."
    ConfirmSavePin { pin: String },
}

impl InputPrompt {
    /// Default timeout per prompt shape. Interactive scans and PIN handling
    /// get generous windows; plain confirmations stay short.
    pub fn default_timeout(&self) -> Duration {
        match self {
            InputPrompt::ConfirmReceipt => Duration::from_secs(10),
            InputPrompt::ConfirmNetworkInfo => Duration::from_secs(5),
            InputPrompt::ConfirmKeys => Duration::from_secs(5),
            InputPrompt::Scan { .. } => Duration::from_secs(60),
            InputPrompt::ConfirmSavePin { .. } => Duration::from_secs(90),
        }
    }
}

/// A processor-level request for external input.
///
/// The processor originates the request and suspends on it; the caller
/// answers with a [`UserInputResponse`](super::UserInputResponse) correlated
/// by `id`. Without an answer within `timeout`, the wait resolves to a
/// synthesized timeout response - it never hangs.
#[derive(Debug, Clone, PartialEq)]
pub struct UserInputRequest {
    pub id: RequestId,
    pub timeout: Option<Duration>,
    pub prompt: InputPrompt,
}

impl UserInputRequest {
    /// New request with the prompt's default timeout.
    pub fn new(prompt: InputPrompt) -> Self {
        Self {
            id: RequestId::generate(),
            timeout: Some(prompt.default_timeout()),
            prompt,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Wait indefinitely for an answer (bounded only by abort).
    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }
}

/// Prompt shapes the manager raises between items.
#[derive(Debug, Clone, PartialEq)]
pub enum QueuePrompt {
    /// Confirm transition to the next pending item.
    ConfirmNextItem {
        item_id: String,
        current_index: usize,
        total_items: usize,
    },

    /// The current item failed; pick an
    /// [`ErrorHandlingAction`](super::ErrorHandlingAction).
    ErrorRetryOrSkip {
        item_id: String,
        error: ProcessingError,
    },
}

/// A queue-level request for a flow decision, raised by the manager's drive
/// loop. Same correlation and timeout semantics as [`UserInputRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueueInputRequest {
    pub id: RequestId,
    pub timeout: Option<Duration>,
    pub prompt: QueuePrompt,
}

impl QueueInputRequest {
    pub fn new(prompt: QueuePrompt, timeout: Option<Duration>) -> Self {
        Self {
            id: RequestId::generate(),
            timeout,
            prompt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_defaults_are_applied() {
        let request = UserInputRequest::new(InputPrompt::ConfirmReceipt);
        assert_eq!(request.timeout, Some(Duration::from_secs(10)));

        let request = UserInputRequest::new(InputPrompt::Scan {
            code: "00020126".into(),
        });
        assert_eq!(request.timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn requests_get_distinct_ids() {
        let a = UserInputRequest::new(InputPrompt::ConfirmKeys);
        let b = UserInputRequest::new(InputPrompt::ConfirmKeys);
        assert_ne!(a.id, b.id);
    }
}
