//! Fetch queue backed by an external task service
//!
//! Tasks are handed to the service under a named queue; the service later calls
//! back into the `fetch` entry point, which runs the [`FetchHandler`](crate::fetch::FetchHandler).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(test)]
use mockall::automock;
use tracing::{debug, warn};

use crate::error::QueueError;
use crate::exclusion::ExclusionRegistry;
use crate::queue::{FetchQueue, FetchTask};

/// Client for the task service
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait TaskDispatcher: Send + Sync {
    /// Submits `task` to the queue named `queue`
    async fn dispatch(&self, queue: &str, task: &FetchTask) -> Result<(), QueueError>;
}

/// Posts tasks as JSON to `{endpoint}/queues/{queue}/tasks`
pub struct HttpTaskDispatcher {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTaskDispatcher {
    pub fn new(endpoint: &str) -> Result<Self, QueueError> {
        let client = reqwest::Client::builder()
            .user_agent("modsearch")
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait::async_trait]
impl TaskDispatcher for HttpTaskDispatcher {
    async fn dispatch(&self, queue: &str, task: &FetchTask) -> Result<(), QueueError> {
        let url = format!("{}/queues/{}/tasks", self.endpoint, queue);

        let response = self.client.post(&url).json(task).send().await?;
        let status = response.status();

        if !status.is_success() {
            warn!("Task service returned status {}: {}", status, url);
            return Err(QueueError::Rejected {
                queue: queue.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}

pub struct ManagedQueue {
    dispatcher: Arc<dyn TaskDispatcher>,
    queue_name: String,
    exclusions: Arc<ExclusionRegistry>,
    closed: AtomicBool,
}

impl ManagedQueue {
    pub fn new(
        dispatcher: Arc<dyn TaskDispatcher>,
        queue_name: &str,
        exclusions: Arc<ExclusionRegistry>,
    ) -> Self {
        Self {
            dispatcher,
            queue_name: queue_name.to_string(),
            exclusions,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait::async_trait]
impl FetchQueue for ManagedQueue {
    async fn enqueue(&self, module_path: &str, version: &str) -> Result<(), QueueError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }
        if self.exclusions.is_excluded(module_path, version)? {
            return Ok(());
        }

        let task = FetchTask::new(module_path, version);
        self.dispatcher.dispatch(&self.queue_name, &task).await?;
        debug!(
            "Dispatched {}@{} to queue {}",
            module_path, version, self.queue_name
        );
        Ok(())
    }

    async fn close(&self) {
        // Dispatched tasks belong to the service; nothing to wait for
        self.closed.store(true, Ordering::Release);
    }
}
