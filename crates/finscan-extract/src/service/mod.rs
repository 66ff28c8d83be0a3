//! Queue-driven extraction service.
//!
//! Workers pull items off a [`WorkQueue`], fetch raw bytes from the
//! [`ObjectStore`], run the engine and write the acquired text and the final
//! record back to storage before acknowledging. Progress is reported as
//! [`ServiceEvent`]s; nothing here renders UI.

mod types;

use std::sync::Arc;

use tokio::sync::mpsc;

use finscan::retry::backoff_delay;
use finscan::storage::{record_key, text_key, ObjectStore, StorageError};
use finscan::work_queue::{WorkHandle, WorkQueue};

use crate::acquisition::CancellationFlag;
use crate::engine::{ExtractionEngine, ExtractionOutput, ExtractionRequest};

pub use types::{ServiceEvent, ServiceSummary};

/// Worker pool over the engine and its storage/queue collaborators.
#[derive(Clone)]
pub struct ExtractionService {
    engine: Arc<ExtractionEngine>,
    queue: Arc<dyn WorkQueue>,
    store: Arc<dyn ObjectStore>,
    workers: usize,
    fetch_retries: u32,
    backoff_base_ms: u64,
    cancel: CancellationFlag,
}

impl ExtractionService {
    /// Worker count and fetch retries come from the engine's `service` config.
    pub fn new(
        engine: Arc<ExtractionEngine>,
        queue: Arc<dyn WorkQueue>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        let config = engine.config();
        let workers = config.service.workers.max(1);
        let fetch_retries = config.service.fetch_retries.max(1);
        let backoff_base_ms = config.acquisition.backoff_base_ms;
        Self {
            engine,
            queue,
            store,
            workers,
            fetch_retries,
            backoff_base_ms,
            cancel: CancellationFlag::new(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Share a cancellation flag; workers stop taking new items once it is set
    /// and in-flight documents finalize at their next stage boundary.
    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Drain the queue. Returns once every worker has seen an empty queue
    /// (or cancellation).
    pub async fn run(
        &self,
        event_tx: mpsc::Sender<ServiceEvent>,
    ) -> anyhow::Result<ServiceSummary> {
        let pending = self.queue.pending().await?;
        tracing::info!(
            "Extraction service starting: {} workers, {} items pending",
            self.workers,
            pending
        );
        let _ = event_tx
            .send(ServiceEvent::Started {
                workers: self.workers,
                pending,
            })
            .await;

        // One task per worker; each holds at most one document at a time.
        let mut handles = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            let service = self.clone();
            let event_tx = event_tx.clone();
            handles.push(tokio::spawn(async move {
                service.worker_loop(worker_id, &event_tx).await
            }));
        }

        let mut summary = ServiceSummary::default();
        for worker in futures::future::try_join_all(handles).await? {
            summary.merge(&worker?);
        }
        tracing::info!(
            "Extraction service finished: {} complete, {} manual review, {} validation failed, {} requeued, {} dead-lettered",
            summary.complete,
            summary.manual_review,
            summary.validation_failed,
            summary.requeued,
            summary.dead_lettered
        );
        Ok(summary)
    }

    async fn worker_loop(
        &self,
        worker_id: usize,
        event_tx: &mpsc::Sender<ServiceEvent>,
    ) -> anyhow::Result<ServiceSummary> {
        let mut summary = ServiceSummary::default();
        loop {
            if self.cancel.is_cancelled() {
                tracing::debug!("Worker {} stopping: cancelled", worker_id);
                break;
            }
            let Some(handle) = self.queue.receive().await? else {
                break;
            };
            self.process_item(worker_id, handle, event_tx, &mut summary)
                .await?;
        }
        Ok(summary)
    }

    async fn process_item(
        &self,
        worker_id: usize,
        handle: WorkHandle,
        event_tx: &mpsc::Sender<ServiceEvent>,
        summary: &mut ServiceSummary,
    ) -> anyhow::Result<()> {
        let item = handle.item().clone();
        let _ = event_tx
            .send(ServiceEvent::DocumentStarted {
                worker_id,
                document_id: item.document_id.clone(),
                delivery: handle.delivery,
            })
            .await;

        let content = match self.fetch(&item.object_key).await {
            Ok(content) => content,
            Err(e) => {
                // Missing or malformed keys will not heal on redelivery.
                let requeue = matches!(e, StorageError::Io(_));
                let error = format!("fetch {}: {}", item.object_key, e);
                return self
                    .fail(worker_id, handle, error, requeue, event_tx, summary)
                    .await;
            }
        };

        let request = ExtractionRequest::new(item.document_id.clone(), content)
            .with_template_hint(item.template_type_hint())
            .with_cloud_authorized(item.cloud_authorized);
        let output = self.engine.process(request, &self.cancel).await;

        if let Err(e) = self.write_outputs(&output).await {
            let error = format!("write outputs: {}", e);
            return self
                .fail(worker_id, handle, error, true, event_tx, summary)
                .await;
        }
        self.queue.complete(handle).await?;

        let record = &output.record;
        summary.record(record.status);
        let _ = event_tx
            .send(ServiceEvent::DocumentFinished {
                worker_id,
                document_id: record.document_id.clone(),
                status: record.status,
                aggregate_confidence: record.audit.aggregate_confidence,
            })
            .await;
        Ok(())
    }

    /// Fetch raw bytes, retrying transient I/O failures with backoff.
    async fn fetch(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let mut attempt = 0;
        loop {
            match self.store.get(key).await {
                Ok(content) => return Ok(content),
                Err(e @ (StorageError::NotFound(_) | StorageError::InvalidKey(_))) => {
                    return Err(e)
                }
                Err(e) if attempt + 1 >= self.fetch_retries => return Err(e),
                Err(e) => {
                    let delay = backoff_delay(attempt, self.backoff_base_ms);
                    tracing::debug!(
                        "Fetch of {} failed (attempt {}), retrying in {:?}: {}",
                        key,
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn write_outputs(&self, output: &ExtractionOutput) -> anyhow::Result<()> {
        let document_id = &output.record.document_id;
        if let Some(text) = &output.text {
            self.store
                .put(&text_key(document_id), text.as_bytes())
                .await?;
        }
        let json = output.record.to_json(true)?;
        self.store
            .put(&record_key(document_id), json.as_bytes())
            .await?;
        Ok(())
    }

    async fn fail(
        &self,
        worker_id: usize,
        handle: WorkHandle,
        error: String,
        requeue: bool,
        event_tx: &mpsc::Sender<ServiceEvent>,
        summary: &mut ServiceSummary,
    ) -> anyhow::Result<()> {
        let document_id = handle.item().document_id.clone();
        tracing::warn!("Document {} failed: {}", document_id, error);
        self.queue.fail(handle, &error, requeue).await?;
        if requeue {
            summary.requeued += 1;
        } else {
            summary.dead_lettered += 1;
        }
        let _ = event_tx
            .send(ServiceEvent::DocumentFailed {
                worker_id,
                document_id,
                error,
                requeued: requeue,
            })
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finscan::budget::AtomicBudget;
    use finscan::config::EngineConfig;
    use finscan::models::FinalStatus;
    use finscan::storage::FsObjectStore;
    use finscan::work_queue::{MemoryQueue, WorkItem};

    fn item(id: &str, key: &str) -> WorkItem {
        WorkItem {
            document_id: id.to_string(),
            object_key: key.to_string(),
            template_hint: None,
            cloud_authorized: false,
        }
    }

    fn service(queue: Arc<MemoryQueue>, store: Arc<FsObjectStore>) -> ExtractionService {
        let engine =
            ExtractionEngine::new(EngineConfig::default(), Arc::new(AtomicBudget::empty()));
        ExtractionService::new(Arc::new(engine), queue, store).with_workers(2)
    }

    #[tokio::test]
    async fn test_run_writes_outputs_and_acknowledges() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsObjectStore::new(dir.path()));
        store
            .put("raw/a.txt", b"Some letter with no recognizable form layout")
            .await
            .unwrap();
        let queue = Arc::new(MemoryQueue::from_items(vec![item("a", "raw/a.txt")], 3));

        let (tx, mut rx) = mpsc::channel(64);
        let summary = service(queue.clone(), store.clone())
            .run(tx)
            .await
            .unwrap();

        assert_eq!(summary.processed(), 1);
        assert_eq!(summary.manual_review, 1);
        assert_eq!(queue.completed(), 1);
        let record = store.get("records/a.json").await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&record).unwrap();
        assert_eq!(json["document_id"], "a");
        assert_eq!(json["status"], "requires_manual_review");
        assert!(store.get("text/a.txt").await.is_ok());

        let mut finished = 0;
        while let Ok(event) = rx.try_recv() {
            if let ServiceEvent::DocumentFinished { status, .. } = event {
                assert_eq!(status, FinalStatus::RequiresManualReview);
                finished += 1;
            }
        }
        assert_eq!(finished, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_workers_bound_documents_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsObjectStore::new(dir.path()));
        let mut items = Vec::new();
        for i in 0..6 {
            let key = format!("raw/{}.txt", i);
            store
                .put(&key, b"Plain correspondence without a form layout")
                .await
                .unwrap();
            items.push(item(&i.to_string(), &key));
        }
        let queue = Arc::new(MemoryQueue::from_items(items, 3));

        let (tx, mut rx) = mpsc::channel(64);
        let summary = service(queue.clone(), store).run(tx).await.unwrap();
        assert_eq!(summary.processed(), 6);
        assert_eq!(queue.completed(), 6);

        let mut in_flight = 0i32;
        let mut peak = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                ServiceEvent::DocumentStarted { worker_id, .. } => {
                    assert!(worker_id < 2);
                    in_flight += 1;
                    peak = peak.max(in_flight);
                }
                ServiceEvent::DocumentFinished { .. } | ServiceEvent::DocumentFailed { .. } => {
                    in_flight -= 1;
                }
                _ => {}
            }
        }
        assert_eq!(in_flight, 0);
        assert!(peak <= 2);
    }

    #[tokio::test]
    async fn test_missing_object_is_dead_lettered() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsObjectStore::new(dir.path()));
        let queue = Arc::new(MemoryQueue::from_items(vec![item("b", "raw/b.pdf")], 3));

        let (tx, _rx) = mpsc::channel(64);
        let summary = service(queue.clone(), store.clone())
            .run(tx)
            .await
            .unwrap();

        assert_eq!(summary.processed(), 0);
        assert_eq!(summary.dead_lettered, 1);
        let dead = queue.dead_letters();
        assert_eq!(dead.len(), 1);
        assert!(dead[0].1.contains("Object not found"));
        assert!(store.get("records/b.json").await.is_err());
    }

    #[tokio::test]
    async fn test_cancelled_service_takes_no_items() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsObjectStore::new(dir.path()));
        let queue = Arc::new(MemoryQueue::from_items(vec![item("c", "raw/c.txt")], 3));
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let (tx, _rx) = mpsc::channel(64);
        let summary = service(queue.clone(), store)
            .with_cancellation(cancel)
            .run(tx)
            .await
            .unwrap();

        assert_eq!(summary, ServiceSummary::default());
        assert_eq!(queue.pending().await.unwrap(), 1);
    }
}
