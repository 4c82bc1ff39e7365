//! Queue manager: the sequential drive loop over storage and processor.
//!
//! キュー制御の中核。One manager owns one [`QueueStorage`] and one
//! [`QueueProcessor`] and runs at most one item at a time. Callers observe
//! progress through watch/broadcast channels and answer the flow decisions
//! the drive loop raises between items.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::{
    ProcessingError, ProcessingEvent, ProcessingResult, ProcessingState, QueueError, QueueItem,
    QueueItemStatus,
};
use crate::input::{
    ErrorHandlingAction, InputDisposition, InputRegistry, QueueInputRequest, QueueInputResponse,
    QueuePrompt, UserInputRequest, UserInputResponse,
};
use crate::ports::{QueueProcessor, QueueStorage};

/// Backlog for queue-level input requests. One decision is outstanding at a
/// time, so this only covers subscriber lag.
const QUEUE_INPUT_BUFFER: usize = 4;

/// Default window for queue-level decisions before the loop falls back to
/// its timeout policy.
const DEFAULT_QUEUE_INPUT_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether the drive loop pauses for confirmation between items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Items flow back to back.
    Immediate,

    /// After each successful item, raise
    /// [`QueuePrompt::ConfirmNextItem`] before taking the next one.
    Confirmation,
}

struct RunState<I> {
    running: bool,
    current: Option<I>,
    drive: Option<JoinHandle<()>>,
}

/// Sequential processing engine.
///
/// Lifecycle per run: `start_processing` spawns the drive loop, which pulls
/// the highest-priority pending item, marks it `Processing`, hands it to the
/// processor, and settles the outcome - including asking the caller what to
/// do with failures. The run ends in [`ProcessingState::QueueDone`] when the
/// pending set drains, or [`ProcessingState::QueueCanceled`] on abort.
///
/// Design note: the run mutex only guards the running flag, the current item
/// and the drive handle. It is never held across a processor call or an
/// input wait, so `abort`, `remove` and the observers stay responsive while
/// an item is in flight.
pub struct QueueManager<I, E>
where
    I: QueueItem,
    E: ProcessingEvent,
{
    storage: Arc<dyn QueueStorage<I>>,
    processor: Arc<dyn QueueProcessor<I, E>>,
    start_mode: StartMode,
    input_timeout: Option<Duration>,
    run: Mutex<RunState<I>>,
    queue_inputs: InputRegistry<QueueInputResponse>,
    queue_input_requests: broadcast::Sender<QueueInputRequest>,
    queue_state: watch::Sender<Vec<I>>,
    processing_state: watch::Sender<ProcessingState<I>>,
    /// Items enqueued since construction.
    total_enqueued: AtomicUsize,
    /// Items settled (done, failed-and-abandoned, or canceled) in the
    /// current run.
    settled: AtomicUsize,
}

impl<I, E> QueueManager<I, E>
where
    I: QueueItem,
    E: ProcessingEvent,
{
    pub fn new(
        storage: Arc<dyn QueueStorage<I>>,
        processor: Arc<dyn QueueProcessor<I, E>>,
        start_mode: StartMode,
    ) -> Self {
        Self {
            storage,
            processor,
            start_mode,
            input_timeout: Some(DEFAULT_QUEUE_INPUT_TIMEOUT),
            run: Mutex::new(RunState {
                running: false,
                current: None,
                drive: None,
            }),
            queue_inputs: InputRegistry::new(),
            queue_input_requests: broadcast::channel(QUEUE_INPUT_BUFFER).0,
            queue_state: watch::channel(Vec::new()).0,
            processing_state: watch::channel(ProcessingState::QueueIdle).0,
            total_enqueued: AtomicUsize::new(0),
            settled: AtomicUsize::new(0),
        }
    }

    /// Override the window for queue-level decisions.
    pub fn with_input_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.input_timeout = timeout;
        self
    }

    // --- observation -----------------------------------------------------

    /// Snapshot of active (pending + processing) items in processing order.
    pub fn queue_state(&self) -> watch::Receiver<Vec<I>> {
        self.queue_state.subscribe()
    }

    pub fn processing_state(&self) -> watch::Receiver<ProcessingState<I>> {
        self.processing_state.subscribe()
    }

    /// The processor's domain event stream, re-exposed so callers only hold
    /// the manager.
    pub fn processor_events(&self) -> broadcast::Receiver<E> {
        self.processor.events()
    }

    /// Item-level input requests raised by the processor mid-item.
    pub fn user_input_requests(&self) -> broadcast::Receiver<UserInputRequest> {
        self.processor.user_input_requests()
    }

    /// Queue-level flow decisions raised by the drive loop between items.
    pub fn queue_input_requests(&self) -> broadcast::Receiver<QueueInputRequest> {
        self.queue_input_requests.subscribe()
    }

    /// Items enqueued over the manager's lifetime.
    pub fn full_size(&self) -> usize {
        self.total_enqueued.load(Ordering::Relaxed)
    }

    /// Items currently waiting.
    pub async fn enqueued_size(&self) -> Result<usize, QueueError> {
        Ok(self
            .storage
            .get_all_by_status(&[QueueItemStatus::Pending])
            .await?
            .len())
    }

    /// Items settled in the current run.
    pub fn current_index(&self) -> usize {
        self.settled.load(Ordering::Relaxed)
    }

    pub async fn get_current_item(&self) -> Option<I> {
        self.run.lock().await.current.clone()
    }

    // --- commands --------------------------------------------------------

    /// Add an item to the pending set. Does not start processing.
    pub async fn enqueue(&self, mut item: I) -> Result<(), QueueError> {
        item.set_status(QueueItemStatus::Pending);
        debug!(item_id = item.id(), priority = item.priority(), "enqueue");
        self.storage.insert(item).await?;
        self.total_enqueued.fetch_add(1, Ordering::Relaxed);
        self.refresh_queue_state().await?;
        Ok(())
    }

    /// Start the drive loop. Idempotent: a second call while a run is in
    /// flight is a no-op.
    pub async fn start_processing(self: &Arc<Self>) {
        let mut run = self.run.lock().await;
        if run.running {
            debug!("start_processing ignored, already running");
            return;
        }
        run.running = true;
        self.settled.store(0, Ordering::Relaxed);
        let manager = Arc::clone(self);
        run.drive = Some(tokio::spawn(async move {
            manager.drive_loop().await;
        }));
        info!("processing started");
    }

    /// Replace an item with an edited copy carrying the same id. Covers both
    /// the in-flight item and a queued item a caller edits while a
    /// confirmation prompt is open (changing its processor kind, say).
    pub async fn replace_current_item(&self, item: I) -> Result<(), QueueError> {
        let mut run = self.run.lock().await;
        if run
            .current
            .as_ref()
            .is_some_and(|current| current.id() == item.id())
        {
            run.current = Some(item.clone());
        }
        drop(run);
        self.storage.update(&item).await?;
        self.refresh_queue_state().await
    }

    /// Remove an item from the queue. Removing the item currently being
    /// processed aborts that item first; the drive loop then continues with
    /// the next pending item.
    pub async fn remove(&self, item: &I) -> Result<(), QueueError> {
        let is_current = {
            let run = self.run.lock().await;
            run.current.as_ref().is_some_and(|c| c.id() == item.id())
        };
        if is_current {
            info!(item_id = item.id(), "removing the in-flight item, aborting it");
            self.processor.abort(Some(item.clone())).await;
        }
        self.storage.remove(item).await?;
        self.refresh_queue_state().await
    }

    /// Drop every pending item. The in-flight item, if any, is untouched.
    pub async fn clear_queue(&self) -> Result<(), QueueError> {
        self.storage
            .remove_by_status(&[QueueItemStatus::Pending])
            .await?;
        self.refresh_queue_state().await
    }

    /// Stop processing. Safe from any state and idempotent: resolves every
    /// suspended input wait, aborts the in-flight item, marks the remaining
    /// active items canceled, and ends the run in
    /// [`ProcessingState::QueueCanceled`].
    pub async fn abort(&self) -> Result<(), QueueError> {
        let (was_running, current, drive) = {
            let mut run = self.run.lock().await;
            let was_running = run.running;
            run.running = false;
            (was_running, run.current.take(), run.drive.take())
        };
        info!(was_running, "abort requested");

        // Unblock queue-level waits first so the drive loop stops asking,
        // then the processor-level ones via the processor itself.
        self.queue_inputs.cancel_all();
        self.processor.abort(current.clone()).await;

        for item in self
            .storage
            .get_all_by_status(&[QueueItemStatus::Pending, QueueItemStatus::Processing])
            .await?
        {
            self.storage
                .update_status(&item, QueueItemStatus::Canceled)
                .await?;
        }

        if let Some(drive) = drive {
            drive.abort();
        }
        self.refresh_queue_state().await?;
        if was_running {
            self.set_state(ProcessingState::QueueCanceled);
        }
        Ok(())
    }

    /// Answer a processor-level input request.
    pub async fn provide_input(&self, response: UserInputResponse) {
        self.processor.provide_input(response).await;
    }

    /// Answer a queue-level flow decision. Returns false when no matching
    /// request is outstanding.
    pub fn provide_queue_input(&self, response: QueueInputResponse) -> bool {
        self.queue_inputs.resolve(response)
    }

    // --- drive loop ------------------------------------------------------

    async fn drive_loop(self: Arc<Self>) {
        // An immediate retry bypasses the priority fetch: the same item runs
        // again even if something higher-priority arrived while the error
        // prompt was open.
        let mut retry: Option<I> = None;
        let finished = loop {
            if !self.is_running().await {
                break false;
            }
            let item = match retry.take() {
                Some(item) => item,
                None => match self.storage.get_next_pending().await {
                    Ok(Some(item)) => item,
                    // A drained pending set only counts as completion when
                    // this run actually settled something; a restart after an
                    // abort finds nothing and must not overwrite
                    // QueueCanceled.
                    Ok(None) => break self.current_index() > 0,
                    Err(err) => {
                        error!(%err, "drive loop stopped: storage failure");
                        break false;
                    }
                },
            };

            match self.run_item(item).await {
                Ok(ItemOutcome::Continue) => {}
                Ok(ItemOutcome::Retry(item)) => retry = Some(item),
                Ok(ItemOutcome::Stop) => break false,
                Err(err) => {
                    error!(%err, "drive loop stopped: storage failure");
                    break false;
                }
            }
        };

        {
            let mut run = self.run.lock().await;
            run.running = false;
            run.current = None;
            run.drive = None;
        }
        if finished {
            info!(settled = self.current_index(), "queue drained");
            self.set_state(ProcessingState::QueueDone);
        }
    }

    /// Process one item end to end, including the follow-up decision.
    async fn run_item(&self, item: I) -> Result<ItemOutcome<I>, QueueError> {
        self.storage
            .update_status(&item, QueueItemStatus::Processing)
            .await?;
        let mut current = item;
        current.set_status(QueueItemStatus::Processing);
        self.run.lock().await.current = Some(current.clone());
        self.refresh_queue_state().await?;
        self.set_state(ProcessingState::ItemProcessing(current.clone()));
        debug!(item_id = current.id(), "processing item");

        let result = self.processor.process(current.clone()).await;
        self.run.lock().await.current = None;

        match result {
            ProcessingResult::Success(payload) => {
                self.storage
                    .update_status(&current, QueueItemStatus::Done)
                    .await?;
                self.settled.fetch_add(1, Ordering::Relaxed);
                self.refresh_queue_state().await?;
                self.set_state(ProcessingState::ItemDone(
                    current.clone(),
                    ProcessingResult::Success(payload),
                ));
                self.confirm_next_item().await
            }
            // The item was canceled underneath the processor (targeted abort
            // or removal); settle it without asking the caller.
            ProcessingResult::Error(ProcessingError::Canceled) => {
                match self
                    .storage
                    .update_status(&current, QueueItemStatus::Canceled)
                    .await
                {
                    // ItemNotFound: the item was removed from storage while
                    // in flight, nothing left to mark.
                    Ok(()) | Err(QueueError::ItemNotFound(_)) => {}
                    Err(err) => return Err(err),
                }
                self.settled.fetch_add(1, Ordering::Relaxed);
                self.refresh_queue_state().await?;
                self.set_state(ProcessingState::ItemFailed(
                    current,
                    ProcessingError::Canceled,
                ));
                Ok(ItemOutcome::Continue)
            }
            ProcessingResult::Error(error) => {
                warn!(item_id = current.id(), ?error, "item failed");
                self.storage
                    .update_status(&current, QueueItemStatus::Failed)
                    .await?;
                self.refresh_queue_state().await?;
                self.set_state(ProcessingState::ItemFailed(current.clone(), error));
                self.settle_failure(current, error).await
            }
        }
    }

    /// Confirmation-mode gate between a finished item and the next one.
    async fn confirm_next_item(&self) -> Result<ItemOutcome<I>, QueueError> {
        if self.start_mode != StartMode::Confirmation {
            return Ok(ItemOutcome::Continue);
        }
        let Some(next) = self.storage.get_next_pending().await? else {
            return Ok(ItemOutcome::Continue);
        };

        let response = self
            .request_queue_input(QueuePrompt::ConfirmNextItem {
                item_id: next.id().to_owned(),
                current_index: self.current_index(),
                total_items: self.full_size(),
            })
            .await;

        match response.disposition {
            InputDisposition::Answered if response.proceed => Ok(ItemOutcome::Continue),
            // Declined or unanswered: the offered item goes to the tail and
            // the loop moves on.
            InputDisposition::Answered | InputDisposition::TimedOut => {
                let mut next = next;
                self.reposition_to_tail(&mut next).await?;
                self.set_state(ProcessingState::ItemSkipped(next));
                Ok(ItemOutcome::Continue)
            }
            InputDisposition::Canceled => self.settle_cancellation().await,
        }
    }

    /// Ask the caller what to do with a failed item and apply the decision.
    async fn settle_failure(
        &self,
        mut item: I,
        error: ProcessingError,
    ) -> Result<ItemOutcome<I>, QueueError> {
        let response = self
            .request_queue_input(QueuePrompt::ErrorRetryOrSkip {
                item_id: item.id().to_owned(),
                error,
            })
            .await;

        let action = match response.disposition {
            InputDisposition::Answered => response
                .action
                .unwrap_or(ErrorHandlingAction::RetryLater),
            // Nobody answered: defer the item rather than abandoning it.
            InputDisposition::TimedOut => ErrorHandlingAction::RetryLater,
            InputDisposition::Canceled => return self.settle_cancellation().await,
        };
        info!(item_id = item.id(), ?action, "failure decision");

        match action {
            ErrorHandlingAction::RetryImmediately => {
                self.storage
                    .update_status(&item, QueueItemStatus::Pending)
                    .await?;
                item.set_status(QueueItemStatus::Pending);
                self.refresh_queue_state().await?;
                self.set_state(ProcessingState::ItemRetrying(item.clone()));
                Ok(ItemOutcome::Retry(item))
            }
            ErrorHandlingAction::RetryLater => {
                self.reposition_to_tail(&mut item).await?;
                self.refresh_queue_state().await?;
                self.set_state(ProcessingState::ItemSkipped(item));
                Ok(ItemOutcome::Continue)
            }
            ErrorHandlingAction::AbortCurrent => {
                self.processor.abort(Some(item.clone())).await;
                self.storage
                    .update_status(&item, QueueItemStatus::Canceled)
                    .await?;
                self.settled.fetch_add(1, Ordering::Relaxed);
                self.refresh_queue_state().await?;
                Ok(ItemOutcome::Continue)
            }
            ErrorHandlingAction::AbortAll => {
                self.processor.abort(Some(item.clone())).await;
                self.storage
                    .update_status(&item, QueueItemStatus::Canceled)
                    .await?;
                self.settle_cancellation().await
            }
        }
    }

    /// Cancel everything still active and end the run. Used when a queue
    /// input resolves to cancellation while the loop is still running; an
    /// external [`abort`](Self::abort) sets `running` to false first and
    /// publishes `QueueCanceled` itself.
    async fn settle_cancellation(&self) -> Result<ItemOutcome<I>, QueueError> {
        if !self.is_running().await {
            return Ok(ItemOutcome::Stop);
        }
        for item in self
            .storage
            .get_all_by_status(&[QueueItemStatus::Pending, QueueItemStatus::Processing])
            .await?
        {
            self.storage
                .update_status(&item, QueueItemStatus::Canceled)
                .await?;
        }
        self.refresh_queue_state().await?;
        self.set_state(ProcessingState::QueueCanceled);
        Ok(ItemOutcome::Stop)
    }

    // --- internals -------------------------------------------------------

    async fn is_running(&self) -> bool {
        self.run.lock().await.running
    }

    async fn request_queue_input(&self, prompt: QueuePrompt) -> QueueInputResponse {
        let request = QueueInputRequest::new(prompt, self.input_timeout);
        let request_id = request.id;
        let timeout = request.timeout;
        let rx = self.queue_inputs.register(request_id);
        let _ = self.queue_input_requests.send(request);
        self.queue_inputs.wait(request_id, rx, timeout).await
    }

    /// Move `item` behind every other pending item by dropping its priority
    /// below the current minimum. Relative order of the others is untouched.
    async fn reposition_to_tail(&self, item: &mut I) -> Result<(), QueueError> {
        let pending = self
            .storage
            .get_all_by_status(&[QueueItemStatus::Pending])
            .await?;
        let min_priority = pending
            .iter()
            .filter(|p| p.id() != item.id())
            .map(|p| p.priority())
            .min()
            .unwrap_or(item.priority());
        // Saturating: after enough deferrals the floor is i32::MIN, which
        // still sorts last.
        item.set_priority(min_priority.saturating_sub(1));
        item.set_status(QueueItemStatus::Pending);
        self.storage.update(item).await?;
        self.refresh_queue_state().await
    }

    async fn refresh_queue_state(&self) -> Result<(), QueueError> {
        let active = self
            .storage
            .get_all_by_status(&[QueueItemStatus::Processing, QueueItemStatus::Pending])
            .await?;
        self.queue_state.send_replace(active);
        Ok(())
    }

    fn set_state(&self, state: ProcessingState<I>) {
        self.processing_state.send_replace(state);
    }
}

/// How one drive-loop iteration ended.
enum ItemOutcome<I> {
    /// Take the next pending item (the current one settled or went back
    /// into the pending set).
    Continue,

    /// Re-run this item right away, ahead of the priority order.
    Retry(I),

    /// The run is over; the loop must not emit `QueueDone`.
    Stop,
}
