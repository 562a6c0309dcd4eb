//! In-process fetch queue backed by a worker pool

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::QueueError;
use crate::exclusion::ExclusionRegistry;
use crate::fetch::FetchHandler;
use crate::queue::{FetchQueue, FetchTask};

/// Bounded channel drained by a fixed number of worker tasks.
///
/// `enqueue` waits while the buffer is full. Each task is handled once; failures
/// are logged by the handler and the worker moves on to the next task.
pub struct InMemoryQueue {
    sender: Mutex<Option<mpsc::Sender<FetchTask>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    exclusions: Arc<ExclusionRegistry>,
}

impl InMemoryQueue {
    /// Spawn `workers` tasks on the current runtime.
    /// Zero workers or zero capacity are raised to one.
    pub fn new(handler: FetchHandler, workers: usize, capacity: usize) -> Self {
        let workers = workers.max(1);
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let exclusions = handler.exclusions();

        let handles = (0..workers)
            .map(|id| {
                let receiver = receiver.clone();
                let handler = handler.clone();
                tokio::spawn(run_worker(id, receiver, handler))
            })
            .collect();

        info!("Started {} fetch workers", workers);

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(handles),
            exclusions,
        }
    }
}

async fn run_worker(
    id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<FetchTask>>>,
    handler: FetchHandler,
) {
    loop {
        // Hold the lock only while waiting for the next task
        let task = receiver.lock().await.recv().await;
        let Some(task) = task else {
            break;
        };

        debug!("Worker {} handling {}@{}", id, task.module_path, task.version);
        let _ = handler.handle(&task.module_path, &task.version).await;
    }
    debug!("Worker {} stopped", id);
}

#[async_trait::async_trait]
impl FetchQueue for InMemoryQueue {
    async fn enqueue(&self, module_path: &str, version: &str) -> Result<(), QueueError> {
        if self.exclusions.is_excluded(module_path, version)? {
            return Ok(());
        }

        let sender = self
            .sender
            .lock()
            .await
            .clone()
            .ok_or(QueueError::Closed)?;

        sender
            .send(FetchTask::new(module_path, version))
            .await
            .map_err(|_| QueueError::Closed)
    }

    async fn close(&self) {
        // Dropping the last sender lets workers drain the buffer and exit
        self.sender.lock().await.take();

        let handles = std::mem::take(&mut *self.workers.lock().await);
        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!("Fetch worker terminated abnormally: {}", e);
            }
        }
    }
}
