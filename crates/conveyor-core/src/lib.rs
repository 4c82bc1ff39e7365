//! conveyor-core
//!
//! Core building blocks for a sequential item-processing queue with
//! pluggable processors and human-in-the-loop suspension.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（item, status, result, state, events, ids, errors）
//! - **input**: 入力プロトコル（requests, responses, correlation registry）
//! - **ports**: 抽象化レイヤー（QueueStorage, QueueProcessor）
//! - **processor**: プロセッサ部品（ProcessorCore, DynamicProcessor）
//! - **manager**: キュー制御（QueueManager, drive loop）
//! - **impls**: 実装（MemoryStorage など開発用）
//!
//! # Typical wiring
//! A concrete domain defines an item type implementing
//! [`QueueItem`](domain::QueueItem) and an event enum implementing
//! [`ProcessingEvent`](domain::ProcessingEvent), builds one or more
//! processors around [`ProcessorCore`](processor::ProcessorCore), optionally
//! composes them with a [`DynamicProcessor`](processor::DynamicProcessor),
//! and hands processor plus storage to a
//! [`QueueManager`](manager::QueueManager).

pub mod domain;
pub mod impls;
pub mod input;
pub mod manager;
pub mod ports;
pub mod processor;

pub use domain::{
    ProcessingError, ProcessingEvent, ProcessingResult, ProcessingState, QueueError, QueueItem,
    QueueItemStatus, RequestId,
};
pub use impls::MemoryStorage;
pub use input::{
    ErrorHandlingAction, InputDisposition, InputPrompt, QueueInputRequest, QueueInputResponse,
    QueuePrompt, UserInputRequest, UserInputResponse,
};
pub use manager::{QueueManager, StartMode};
pub use ports::{QueueProcessor, QueueStorage};
pub use processor::{DynamicProcessor, ProcessorCore};
