//! Registry of batch controllers, addressed by workload.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing;

use gbphub_core::error::AppError;
use gbphub_core::result::AppResult;
use gbphub_core::types::BatchId;
use gbphub_entity::batch::{BatchFilter, Workload as WorkloadKind};

use crate::controller::{BatchController, StartOutcome};
use crate::progress::ProgressSnapshot;
use crate::workload::Workload;

/// Object-safe view of a [`BatchController`].
#[async_trait]
pub trait BatchRunner: Send + Sync + std::fmt::Debug {
    /// Workload this runner drives.
    fn workload(&self) -> WorkloadKind;

    /// Start a batch.
    async fn start(&self, filter: BatchFilter) -> AppResult<StartOutcome>;

    /// Progress of a batch.
    async fn status(&self, batch_id: BatchId) -> AppResult<Option<ProgressSnapshot>>;

    /// Request cancellation of a running batch.
    async fn cancel(&self, batch_id: BatchId) -> AppResult<()>;

    /// Wait for a batch to finish.
    async fn wait(&self, batch_id: BatchId) -> AppResult<Option<ProgressSnapshot>>;

    /// Close out batches a previous process left running.
    async fn recover_interrupted(&self) -> AppResult<usize>;

    /// Stop running batches.
    async fn shutdown(&self, grace: Duration);
}

#[async_trait]
impl<W: Workload> BatchRunner for BatchController<W> {
    fn workload(&self) -> WorkloadKind {
        self.kind()
    }

    async fn start(&self, filter: BatchFilter) -> AppResult<StartOutcome> {
        BatchController::start(self, filter).await
    }

    async fn status(&self, batch_id: BatchId) -> AppResult<Option<ProgressSnapshot>> {
        BatchController::status(self, batch_id).await
    }

    async fn cancel(&self, batch_id: BatchId) -> AppResult<()> {
        BatchController::cancel(self, batch_id).await
    }

    async fn wait(&self, batch_id: BatchId) -> AppResult<Option<ProgressSnapshot>> {
        BatchController::wait(self, batch_id).await
    }

    async fn recover_interrupted(&self) -> AppResult<usize> {
        BatchController::recover_interrupted(self).await
    }

    async fn shutdown(&self, grace: Duration) {
        BatchController::shutdown(self, grace).await
    }
}

/// Runners by workload.
#[derive(Debug, Default, Clone)]
pub struct BatchRegistry {
    runners: HashMap<WorkloadKind, Arc<dyn BatchRunner>>,
}

impl BatchRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a runner, replacing any earlier one for the same workload.
    pub fn register(&mut self, runner: Arc<dyn BatchRunner>) {
        let workload = runner.workload();
        tracing::info!("Registered batch runner for workload '{}'", workload);
        self.runners.insert(workload, runner);
    }

    /// The runner for a workload.
    pub fn get(&self, workload: WorkloadKind) -> AppResult<Arc<dyn BatchRunner>> {
        self.runners.get(&workload).cloned().ok_or_else(|| {
            AppError::not_found(format!("No runner registered for workload '{workload}'"))
        })
    }

    /// Registered workloads in a stable order.
    pub fn workloads(&self) -> Vec<WorkloadKind> {
        WorkloadKind::ALL
            .into_iter()
            .filter(|w| self.runners.contains_key(w))
            .collect()
    }

    /// Every registered runner.
    pub fn runners(&self) -> impl Iterator<Item = &Arc<dyn BatchRunner>> {
        self.runners.values()
    }

    /// Close out interrupted batches of every workload.
    pub async fn recover_interrupted(&self) -> AppResult<usize> {
        let mut total = 0;
        for runner in self.runners.values() {
            total += runner.recover_interrupted().await?;
        }
        Ok(total)
    }

    /// Stop every runner, giving each up to `grace`.
    pub async fn shutdown(&self, grace: Duration) {
        let all = self.runners.values().map(|runner| runner.shutdown(grace));
        futures::future::join_all(all).await;
    }
}
