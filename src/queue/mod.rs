//! Fetch dispatch queue
//!
//! A [`FetchQueue`] accepts `module@version` pairs and arranges for the
//! [`FetchHandler`] to run on them, either in-process or through an external
//! task service. Excluded versions are dropped at enqueue time.
//!
//! # Modules
//!
//! - [`worker`]: Bounded channel served by a local worker pool
//! - [`managed`]: Dispatch to an external task service over HTTP

pub mod managed;
pub mod worker;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{Config, DeploymentMode};
use crate::error::QueueError;
use crate::fetch::FetchHandler;

pub use managed::{HttpTaskDispatcher, ManagedQueue, TaskDispatcher};
pub use worker::InMemoryQueue;

/// A request to fetch and index one module version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchTask {
    pub module_path: String,
    pub version: String,
}

impl FetchTask {
    pub fn new(module_path: &str, version: &str) -> Self {
        Self {
            module_path: module_path.to_string(),
            version: version.to_string(),
        }
    }

    /// Parse `module@version`; the last `@` separates the two
    pub fn parse(spec: &str) -> Option<Self> {
        let (module_path, version) = spec.trim().rsplit_once('@')?;
        if module_path.is_empty() || version.is_empty() {
            return None;
        }
        Some(Self::new(module_path, version))
    }
}

#[async_trait::async_trait]
pub trait FetchQueue: Send + Sync {
    /// Schedule a fetch of `module_path@version`.
    ///
    /// Returns `Ok(())` without scheduling anything when the version is excluded.
    async fn enqueue(&self, module_path: &str, version: &str) -> Result<(), QueueError>;

    /// Stop accepting tasks and wait for in-flight local work
    async fn close(&self);
}

/// Build the queue for `mode`
pub fn new_queue(
    mode: DeploymentMode,
    config: &Config,
    handler: FetchHandler,
) -> Result<Arc<dyn FetchQueue>, QueueError> {
    match mode {
        DeploymentMode::Local => Ok(Arc::new(InMemoryQueue::new(
            handler,
            config.workers,
            config.queue_capacity,
        ))),
        DeploymentMode::Managed => {
            let endpoint = config.task_endpoint.as_deref().ok_or_else(|| {
                QueueError::Config("managed mode requires a task endpoint".to_string())
            })?;
            let dispatcher = HttpTaskDispatcher::new(endpoint)?;
            Ok(Arc::new(ManagedQueue::new(
                Arc::new(dispatcher),
                &config.queue_name,
                handler.exclusions(),
            )))
        }
    }
}
