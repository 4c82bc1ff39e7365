//! Dynamic routing across multiple concrete processors.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::{ProcessingError, ProcessingEvent, ProcessingResult, QueueItem};
use crate::input::{UserInputRequest, UserInputResponse};
use crate::ports::QueueProcessor;
use crate::processor::ProcessorCore;

type Delegate<I, E> = Arc<dyn QueueProcessor<I, E>>;

/// A composite processor that routes each item to a registered delegate by
/// the item's discriminator, falling back to a default delegate when no exact
/// match exists.
///
/// The composite presents a single event stream and a single input-request
/// stream to its caller: while a delegate runs, relay tasks forward the
/// delegate's emissions onto the composite's own streams. Delegate started
/// events are filtered out because the composite already emitted its own
/// started event before delegation; everything else passes through untouched.
///
/// Design note: the relay tasks live exactly as long as the delegation. They
/// are held by a guard whose `Drop` aborts them, so they are torn down on
/// normal completion, on error, and on cancellation alike.
pub struct DynamicProcessor<I, E>
where
    I: QueueItem,
    E: ProcessingEvent,
{
    delegates: HashMap<String, Delegate<I, E>>,
    fallback: Option<Delegate<I, E>>,
    core: ProcessorCore<E>,
    /// Delegate currently executing an item, if any. Inputs and aborts are
    /// forwarded to it.
    current: Mutex<Option<Delegate<I, E>>>,
}

impl<I, E> DynamicProcessor<I, E>
where
    I: QueueItem,
    E: ProcessingEvent,
{
    pub fn new() -> Self {
        Self {
            delegates: HashMap::new(),
            fallback: None,
            core: ProcessorCore::new(),
            current: Mutex::new(None),
        }
    }

    /// Register a delegate for a discriminator. Replaces any previous
    /// delegate registered under the same key.
    pub fn with_delegate(
        mut self,
        kind: impl Into<String>,
        processor: Delegate<I, E>,
    ) -> Self {
        self.delegates.insert(kind.into(), processor);
        self
    }

    /// Delegate used when no discriminator matches.
    pub fn with_fallback(mut self, processor: Delegate<I, E>) -> Self {
        self.fallback = Some(processor);
        self
    }

    fn resolve(&self, kind: &str) -> Option<&Delegate<I, E>> {
        self.delegates.get(kind).or(self.fallback.as_ref())
    }

    fn take_current(&self) -> Option<Delegate<I, E>> {
        self.current.lock().expect("current delegate lock").take()
    }

    fn set_current(&self, delegate: Option<Delegate<I, E>>) {
        *self.current.lock().expect("current delegate lock") = delegate;
    }

    fn spawn_relays(&self, delegate: &Delegate<I, E>) -> RelayGuard {
        let events = relay_events(delegate.events(), self.core.event_sender());
        let inputs = relay_input_requests(
            delegate.user_input_requests(),
            self.core.input_request_sender(),
        );
        RelayGuard {
            handles: [events, inputs],
        }
    }
}

impl<I, E> Default for DynamicProcessor<I, E>
where
    I: QueueItem,
    E: ProcessingEvent,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<I, E> QueueProcessor<I, E> for DynamicProcessor<I, E>
where
    I: QueueItem,
    E: ProcessingEvent,
{
    fn events(&self) -> broadcast::Receiver<E> {
        self.core.events()
    }

    fn user_input_requests(&self) -> broadcast::Receiver<UserInputRequest> {
        self.core.user_input_requests()
    }

    async fn process(&self, item: I) -> ProcessingResult {
        let kind = item.processor_kind().to_owned();
        self.core.emit(E::started());

        let Some(delegate) = self.resolve(&kind).cloned() else {
            warn!(item_id = item.id(), kind, "no processor registered");
            return ProcessingResult::Error(ProcessingError::ProcessorNotFound);
        };
        debug!(item_id = item.id(), kind, "delegating item");

        let _relays = self.spawn_relays(&delegate);
        self.set_current(Some(Arc::clone(&delegate)));

        let result = delegate.process(item).await;

        self.set_current(None);
        result
    }

    async fn provide_input(&self, response: UserInputResponse) {
        // Delegation in flight: the request the caller is answering was
        // relayed from the delegate, so the answer goes back the same way.
        let current = self
            .current
            .lock()
            .expect("current delegate lock")
            .clone();
        match current {
            Some(delegate) => delegate.provide_input(response).await,
            None => {
                self.core.provide_input(response);
            }
        }
    }

    async fn abort(&self, item: Option<I>) -> bool {
        self.core.emit(E::canceled());
        self.core.cancel_pending_inputs();

        let delegate = self.take_current().or_else(|| {
            item.as_ref()
                .and_then(|i| self.resolve(i.processor_kind()).cloned())
        });
        match delegate {
            Some(delegate) => {
                // Same relay pair as process, so whatever the delegate emits
                // while shutting down still reaches the composite's streams.
                let _relays = self.spawn_relays(&delegate);
                delegate.abort(item).await
            }
            None => false,
        }
    }
}

/// Aborts the relay tasks when delegation ends, however it ends.
struct RelayGuard {
    handles: [JoinHandle<()>; 2],
}

impl Drop for RelayGuard {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

fn relay_events<E: ProcessingEvent>(
    mut rx: broadcast::Receiver<E>,
    tx: broadcast::Sender<E>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                // The composite already announced the start itself.
                Ok(event) if event.is_started() => continue,
                Ok(event) => {
                    let _ = tx.send(event);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event relay lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn relay_input_requests(
    mut rx: broadcast::Receiver<UserInputRequest>,
    tx: broadcast::Sender<UserInputRequest>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(request) => {
                    let _ = tx.send(request);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "input request relay lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QueueItemStatus;
    use crate::input::{InputDisposition, InputPrompt};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct TestItem {
        id: String,
        priority: i32,
        status: QueueItemStatus,
        kind: String,
    }

    impl TestItem {
        fn new(id: &str, kind: &str) -> Self {
            Self {
                id: id.to_owned(),
                priority: 0,
                status: QueueItemStatus::Pending,
                kind: kind.to_owned(),
            }
        }
    }

    impl QueueItem for TestItem {
        fn id(&self) -> &str {
            &self.id
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn set_priority(&mut self, priority: i32) {
            self.priority = priority;
        }

        fn status(&self) -> QueueItemStatus {
            self.status
        }

        fn set_status(&mut self, status: QueueItemStatus) {
            self.status = status;
        }

        fn processor_kind(&self) -> &str {
            &self.kind
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum TestEvent {
        Started,
        Progress(String),
        Canceled,
    }

    impl ProcessingEvent for TestEvent {
        fn started() -> Self {
            TestEvent::Started
        }

        fn canceled() -> Self {
            TestEvent::Canceled
        }

        fn is_started(&self) -> bool {
            matches!(self, TestEvent::Started)
        }
    }

    /// Delegate that emits a progress event tagged with its name and reports
    /// success carrying the processed item id.
    struct NamedProcessor {
        name: &'static str,
        core: ProcessorCore<TestEvent>,
    }

    impl NamedProcessor {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                core: ProcessorCore::new(),
            })
        }
    }

    #[async_trait]
    impl QueueProcessor<TestItem, TestEvent> for NamedProcessor {
        fn events(&self) -> broadcast::Receiver<TestEvent> {
            self.core.events()
        }

        fn user_input_requests(&self) -> broadcast::Receiver<UserInputRequest> {
            self.core.user_input_requests()
        }

        async fn process(&self, item: TestItem) -> ProcessingResult {
            self.core.emit(TestEvent::Started);
            self.core.emit(TestEvent::Progress(self.name.to_owned()));
            // Yield so the relay task gets to forward before we return.
            tokio::time::sleep(Duration::from_millis(10)).await;
            ProcessingResult::Success(serde_json::json!({
                "processed_by": self.name,
                "item_id": item.id,
            }))
        }

        async fn provide_input(&self, response: UserInputResponse) {
            self.core.provide_input(response);
        }

        async fn abort(&self, _item: Option<TestItem>) -> bool {
            self.core.emit(TestEvent::Canceled);
            self.core.cancel_pending_inputs();
            true
        }
    }

    /// Delegate that suspends on a confirmation before reporting success.
    struct AskingProcessor {
        core: ProcessorCore<TestEvent>,
    }

    #[async_trait]
    impl QueueProcessor<TestItem, TestEvent> for AskingProcessor {
        fn events(&self) -> broadcast::Receiver<TestEvent> {
            self.core.events()
        }

        fn user_input_requests(&self) -> broadcast::Receiver<UserInputRequest> {
            self.core.user_input_requests()
        }

        async fn process(&self, _item: TestItem) -> ProcessingResult {
            self.core.emit(TestEvent::Started);
            let response = self
                .core
                .request_input(
                    UserInputRequest::new(InputPrompt::ConfirmReceipt)
                        .with_timeout(Duration::from_secs(5)),
                )
                .await;
            match response.disposition {
                InputDisposition::Answered => {
                    ProcessingResult::Success(serde_json::json!({"confirmed": true}))
                }
                InputDisposition::Canceled => {
                    ProcessingResult::Error(ProcessingError::Canceled)
                }
                InputDisposition::TimedOut => {
                    ProcessingResult::Error(ProcessingError::Timeout)
                }
            }
        }

        async fn provide_input(&self, response: UserInputResponse) {
            self.core.provide_input(response);
        }

        async fn abort(&self, _item: Option<TestItem>) -> bool {
            self.core.cancel_pending_inputs();
            true
        }
    }

    #[tokio::test]
    async fn routes_items_by_discriminator() {
        let dynamic = DynamicProcessor::new()
            .with_delegate("alpha", NamedProcessor::new("alpha") as Delegate<_, _>)
            .with_delegate("beta", NamedProcessor::new("beta") as Delegate<_, _>);

        let result = dynamic.process(TestItem::new("i1", "beta")).await;
        let ProcessingResult::Success(data) = result else {
            panic!("expected success");
        };
        assert_eq!(data["processed_by"], "beta");
    }

    #[tokio::test]
    async fn unknown_discriminator_without_fallback_is_processor_not_found() {
        let dynamic: DynamicProcessor<TestItem, TestEvent> = DynamicProcessor::new()
            .with_delegate("alpha", NamedProcessor::new("alpha") as Delegate<_, _>);

        let result = dynamic.process(TestItem::new("i1", "gamma")).await;
        assert_eq!(
            result,
            ProcessingResult::Error(ProcessingError::ProcessorNotFound)
        );
    }

    #[tokio::test]
    async fn unknown_discriminator_goes_to_the_fallback() {
        let dynamic = DynamicProcessor::new()
            .with_delegate("alpha", NamedProcessor::new("alpha") as Delegate<_, _>)
            .with_fallback(NamedProcessor::new("fallback") as Delegate<_, _>);

        let result = dynamic.process(TestItem::new("i1", "gamma")).await;
        let ProcessingResult::Success(data) = result else {
            panic!("expected success");
        };
        assert_eq!(data["processed_by"], "fallback");
    }

    #[tokio::test]
    async fn delegate_events_are_relayed_and_started_is_not_duplicated() {
        let dynamic = DynamicProcessor::new()
            .with_delegate("alpha", NamedProcessor::new("alpha") as Delegate<_, _>);
        let mut events = dynamic.events();

        dynamic.process(TestItem::new("i1", "alpha")).await;

        let mut started = 0;
        let mut progress = 0;
        while let Ok(Ok(event)) =
            tokio::time::timeout(Duration::from_millis(100), events.recv()).await
        {
            match event {
                TestEvent::Started => started += 1,
                TestEvent::Progress(_) => progress += 1,
                TestEvent::Canceled => {}
            }
        }
        assert_eq!(started, 1, "composite emits started exactly once");
        assert_eq!(progress, 1, "delegate progress passes through");
    }

    #[tokio::test]
    async fn relays_stop_once_process_returns() {
        let delegate = NamedProcessor::new("alpha");
        let dynamic = DynamicProcessor::new()
            .with_delegate("alpha", delegate.clone() as Delegate<_, _>);
        let mut events = dynamic.events();

        dynamic.process(TestItem::new("i1", "alpha")).await;
        while tokio::time::timeout(Duration::from_millis(50), events.recv())
            .await
            .is_ok()
        {}

        // A late emission from the delegate must not reach the composite.
        delegate.core.emit(TestEvent::Progress("late".into()));
        assert!(
            tokio::time::timeout(Duration::from_millis(100), events.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn input_requests_relay_out_and_answers_relay_back() {
        let dynamic = Arc::new(
            DynamicProcessor::new().with_delegate(
                "ask",
                Arc::new(AskingProcessor {
                    core: ProcessorCore::new(),
                }) as Delegate<_, _>,
            ),
        );
        let mut requests = dynamic.user_input_requests();

        let answerer = {
            let dynamic = Arc::clone(&dynamic);
            tokio::spawn(async move {
                let request = requests.recv().await.unwrap();
                dynamic
                    .provide_input(UserInputResponse::confirmed(request.id))
                    .await;
            })
        };

        let result = dynamic.process(TestItem::new("i1", "ask")).await;
        assert!(result.is_success());
        answerer.await.unwrap();
    }

    #[tokio::test]
    async fn abort_cancels_a_suspended_delegate() {
        let dynamic = Arc::new(
            DynamicProcessor::new().with_delegate(
                "ask",
                Arc::new(AskingProcessor {
                    core: ProcessorCore::new(),
                }) as Delegate<_, _>,
            ),
        );
        let mut requests = dynamic.user_input_requests();

        let runner = {
            let dynamic = Arc::clone(&dynamic);
            tokio::spawn(async move { dynamic.process(TestItem::new("i1", "ask")).await })
        };
        requests.recv().await.unwrap();

        assert!(dynamic.abort(None).await);
        let result = tokio::time::timeout(Duration::from_secs(1), runner)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, ProcessingResult::Error(ProcessingError::Canceled));
    }
}
