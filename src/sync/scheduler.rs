//! Пул передач с ограничением параллельности
//!
//! Задачи выполняются в две фазы: сначала все удаления, потом все передачи.
//! Ошибка или таймаут одной задачи не останавливает остальные: результат
//! каждой задачи попадает в `TaskResult`.

use super::diff::is_reserved_marker;
use super::types::{emit, ProgressCallback, TaskOutcome, TaskResult, TransferTask};
use crate::error::Result;
use crate::settings::LIMIT_CONNECTIONS;
use crate::types::{SyncPhase, SyncProgress};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct TransferScheduler {
    max_concurrency: usize,
    task_timeout: Duration,
    cancel: Option<CancellationToken>,
}

impl TransferScheduler {
    pub fn new(max_concurrency: usize, task_timeout: Duration) -> Self {
        Self {
            max_concurrency: max_concurrency.clamp(1, LIMIT_CONNECTIONS),
            task_timeout,
            cancel: None,
        }
    }

    /// Отмена: начатые задачи завершаются, не начатые получают `Cancelled`
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Выполняет задачи и возвращает результат каждой.
    ///
    /// Прогресс: для каждой непустой фазы 0%, затем `floor(done*100/total)`
    /// после каждой завершённой задачи; в конце `{active: false, 100%, done}`.
    pub async fn run<F, Fut>(
        &self,
        tasks: Vec<TransferTask>,
        execute: F,
        progress: Option<&ProgressCallback>,
    ) -> Vec<TaskResult>
    where
        F: Fn(TransferTask) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let (deletes, transfers): (Vec<_>, Vec<_>) =
            tasks.into_iter().partition(TransferTask::is_delete);

        let mut results = Vec::with_capacity(deletes.len() + transfers.len());
        results.extend(self.run_phase(SyncPhase::Deleting, deletes, &execute, progress).await);
        results.extend(
            self.run_phase(SyncPhase::Transferring, transfers, &execute, progress)
                .await,
        );

        emit(progress, SyncProgress::finished(SyncPhase::Transferring));
        results
    }

    async fn run_phase<F, Fut>(
        &self,
        phase: SyncPhase,
        tasks: Vec<TransferTask>,
        execute: &F,
        progress: Option<&ProgressCallback>,
    ) -> Vec<TaskResult>
    where
        F: Fn(TransferTask) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let total = tasks.len();
        if total == 0 {
            return Vec::new();
        }

        log::debug!("{:?}: {} tasks, concurrency {}", phase, total, self.max_concurrency);
        emit(progress, SyncProgress::started(phase));
        let completed = AtomicUsize::new(0);

        stream::iter(tasks)
            .map(|task| {
                let completed = &completed;
                async move {
                    let outcome = self.run_task(&task, execute).await;
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    emit(progress, SyncProgress::running(phase, done, total));
                    TaskResult { task, outcome }
                }
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await
    }

    async fn run_task<F, Fut>(&self, task: &TransferTask, execute: &F) -> TaskOutcome
    where
        F: Fn(TransferTask) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        if is_reserved_marker(task.path()) {
            log::info!("Ignoring {}", task.path());
            return TaskOutcome::Skipped;
        }

        if self.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
            return TaskOutcome::Cancelled;
        }

        match tokio::time::timeout(self.task_timeout, execute(task.clone())).await {
            Ok(Ok(())) => TaskOutcome::Completed,
            Ok(Err(e)) => {
                log::warn!("Task {:?} failed: {}", task, e);
                TaskOutcome::Failed(e.to_string())
            }
            Err(_) => {
                log::warn!("Task {:?} timed out after {:?}", task, self.task_timeout);
                TaskOutcome::TimedOut
            }
        }
    }
}
