use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::{sleep, Duration};
use tracing::info;

use conveyor_core::{
    DynamicProcessor, InputPrompt, MemoryStorage, ProcessingError, ProcessingEvent,
    ProcessingResult, ProcessingState, ProcessorCore, QueueItem, QueueItemStatus, QueueManager,
    QueueProcessor, StartMode, UserInputRequest, UserInputResponse,
};

/// A document waiting to be printed.
#[derive(Debug, Clone, Serialize)]
struct PrintJob {
    id: String,
    document: String,
    kind: &'static str,
    priority: i32,
    #[serde(skip)]
    status: QueueItemStatus,
    created_at: DateTime<Utc>,
}

impl PrintJob {
    fn new(id: &str, document: &str, kind: &'static str, priority: i32) -> Self {
        Self {
            id: id.to_owned(),
            document: document.to_owned(),
            kind,
            priority,
            status: QueueItemStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

impl QueueItem for PrintJob {
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
        self.kind
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PrintEvent {
    Started,
    PageRendered { page: u32 },
    Canceled,
}

impl ProcessingEvent for PrintEvent {
    fn started() -> Self {
        PrintEvent::Started
    }

    fn canceled() -> Self {
        PrintEvent::Canceled
    }

    fn is_started(&self) -> bool {
        matches!(self, PrintEvent::Started)
    }
}

/// Prints customer receipts; asks for confirmation before feeding paper.
struct ReceiptPrinter {
    core: ProcessorCore<PrintEvent>,
}

#[async_trait]
impl QueueProcessor<PrintJob, PrintEvent> for ReceiptPrinter {
    fn events(&self) -> broadcast::Receiver<PrintEvent> {
        self.core.events()
    }

    fn user_input_requests(&self) -> broadcast::Receiver<UserInputRequest> {
        self.core.user_input_requests()
    }

    async fn process(&self, job: PrintJob) -> ProcessingResult {
        self.core.emit(PrintEvent::Started);

        let response = self
            .core
            .request_input(UserInputRequest::new(InputPrompt::ConfirmReceipt))
            .await;
        if !response.is_answered() {
            return ProcessingResult::Error(ProcessingError::Canceled);
        }

        sleep(Duration::from_millis(30)).await; // the platen is slow
        self.core.emit(PrintEvent::PageRendered { page: 1 });
        ProcessingResult::Success(serde_json::json!({
            "document": job.document,
            "pages": 1,
        }))
    }

    async fn provide_input(&self, response: UserInputResponse) {
        self.core.provide_input(response);
    }

    async fn abort(&self, _job: Option<PrintJob>) -> bool {
        self.core.emit(PrintEvent::Canceled);
        self.core.cancel_pending_inputs();
        true
    }
}

/// Prints multi-page reports without any interaction.
struct ReportPrinter {
    core: ProcessorCore<PrintEvent>,
}

#[async_trait]
impl QueueProcessor<PrintJob, PrintEvent> for ReportPrinter {
    fn events(&self) -> broadcast::Receiver<PrintEvent> {
        self.core.events()
    }

    fn user_input_requests(&self) -> broadcast::Receiver<UserInputRequest> {
        self.core.user_input_requests()
    }

    async fn process(&self, job: PrintJob) -> ProcessingResult {
        self.core.emit(PrintEvent::Started);
        for page in 1..=3 {
            sleep(Duration::from_millis(10)).await;
            self.core.emit(PrintEvent::PageRendered { page });
        }
        ProcessingResult::Success(serde_json::json!({
            "document": job.document,
            "pages": 3,
        }))
    }

    async fn provide_input(&self, response: UserInputResponse) {
        self.core.provide_input(response);
    }

    async fn abort(&self, _job: Option<PrintJob>) -> bool {
        self.core.emit(PrintEvent::Canceled);
        self.core.cancel_pending_inputs();
        true
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // (A) ストレージとプロセッサを用意
    let storage = Arc::new(MemoryStorage::<PrintJob>::new());
    let processor = Arc::new(
        DynamicProcessor::new()
            .with_delegate(
                "receipt",
                Arc::new(ReceiptPrinter {
                    core: ProcessorCore::new(),
                }) as Arc<dyn QueueProcessor<PrintJob, PrintEvent>>,
            )
            .with_fallback(Arc::new(ReportPrinter {
                core: ProcessorCore::new(),
            }) as Arc<dyn QueueProcessor<PrintJob, PrintEvent>>),
    );

    let manager = Arc::new(QueueManager::new(
        storage,
        processor as Arc<dyn QueueProcessor<PrintJob, PrintEvent>>,
        StartMode::Immediate,
    ));

    // (B) 購読者を起動：イベント、入力要求、状態遷移
    let mut events = manager.processor_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!(?event, "printer event");
        }
    });

    // Confirmation prompts get auto-approved here; a real frontend would
    // show a dialog.
    let mut input_requests = manager.user_input_requests();
    let responder = Arc::clone(&manager);
    tokio::spawn(async move {
        while let Ok(request) = input_requests.recv().await {
            info!(request_id = %request.id, prompt = ?request.prompt, "auto-confirming");
            responder
                .provide_input(UserInputResponse::confirmed(request.id))
                .await;
        }
    });

    let mut state = manager.processing_state();
    let observer = tokio::spawn(async move {
        loop {
            let snapshot = state.borrow_and_update().clone();
            match snapshot {
                ProcessingState::QueueIdle => {}
                ProcessingState::ItemProcessing(job) => {
                    println!("processing {} ({})", job.id, job.document)
                }
                ProcessingState::ItemRetrying(job) => println!("retrying {}", job.id),
                ProcessingState::ItemDone(job, result) => {
                    println!("done {} -> {:?}", job.id, result)
                }
                ProcessingState::ItemFailed(job, error) => {
                    println!("failed {} -> {:?}", job.id, error)
                }
                ProcessingState::ItemSkipped(job) => println!("deferred {}", job.id),
                ProcessingState::QueueCanceled => {
                    println!("queue canceled");
                    break;
                }
                ProcessingState::QueueDone => {
                    println!("queue drained");
                    break;
                }
            }
            if state.changed().await.is_err() {
                break;
            }
        }
    });

    // (C) ジョブ投入：優先度順に処理される
    manager
        .enqueue(PrintJob::new("job-1", "daily-report.pdf", "report", 1))
        .await
        .expect("enqueue");
    manager
        .enqueue(PrintJob::new("job-2", "receipt-0042.txt", "receipt", 10))
        .await
        .expect("enqueue");
    manager
        .enqueue(PrintJob::new("job-3", "inventory.pdf", "report", 5))
        .await
        .expect("enqueue");

    // (D) 処理開始、完了まで待つ
    manager.start_processing().await;
    observer.await.expect("observer");

    println!(
        "totals: enqueued={} settled={}",
        manager.full_size(),
        manager.current_index()
    );
}
