use crate::types::{SyncDirection, SyncProgress};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Получатель событий прогресса (UI, CLI, логи)
pub type ProgressCallback = Arc<dyn Fn(SyncProgress) + Send + Sync>;

pub(crate) fn emit(progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(callback) = progress {
        callback(event);
    }
}

/// Где удаляется файл
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locality {
    Local,
    Remote,
}

/// Одна единица работы для планировщика
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransferTask {
    Upload { path: String },
    Download { path: String },
    Delete { path: String, locality: Locality },
}

impl TransferTask {
    pub fn upload(path: impl Into<String>) -> Self {
        Self::Upload { path: path.into() }
    }

    pub fn download(path: impl Into<String>) -> Self {
        Self::Download { path: path.into() }
    }

    pub fn delete(path: impl Into<String>, locality: Locality) -> Self {
        Self::Delete {
            path: path.into(),
            locality,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Upload { path } | Self::Download { path } | Self::Delete { path, .. } => path,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete { .. })
    }
}

/// Чем закончилась задача
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed,
    /// Служебный файл ОС, не передаётся
    Skipped,
    Failed(String),
    TimedOut,
    /// Не начата из-за отмены
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task: TransferTask,
    pub outcome: TaskOutcome,
}

/// Сводка по пакету задач
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub cancelled: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[TaskResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            match result.outcome {
                TaskOutcome::Completed => summary.completed += 1,
                TaskOutcome::Skipped => summary.skipped += 1,
                TaskOutcome::Failed(_) => summary.failed += 1,
                TaskOutcome::TimedOut => summary.timed_out += 1,
                TaskOutcome::Cancelled => summary.cancelled += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.completed + self.skipped + self.failed + self.timed_out + self.cancelled
    }
}

/// Итог push / pull
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub direction: SyncDirection,
    /// Удалено файлов (на сервере при push, локально при pull)
    pub deleted: usize,
    /// Загружено или скачано файлов
    pub transferred: usize,
    /// Служебные файлы ОС, которые не синхронизируются
    pub skipped: usize,
    /// Путь и причина для каждой неудачной задачи (включая таймауты)
    pub failed: Vec<(String, String)>,
    pub cancelled: usize,
    /// Локальные файлы, удалённые при pull из-за расхождения дайджеста
    pub integrity_repairs: usize,
}

impl SyncReport {
    pub fn new(direction: SyncDirection) -> Self {
        Self {
            direction,
            deleted: 0,
            transferred: 0,
            skipped: 0,
            failed: Vec::new(),
            cancelled: 0,
            integrity_repairs: 0,
        }
    }

    /// Добавляет результаты планировщика
    pub fn absorb(&mut self, results: &[TaskResult]) {
        for result in results {
            match &result.outcome {
                TaskOutcome::Completed if result.task.is_delete() => self.deleted += 1,
                TaskOutcome::Completed => self.transferred += 1,
                TaskOutcome::Skipped => self.skipped += 1,
                TaskOutcome::Failed(msg) => {
                    self.failed.push((result.task.path().to_string(), msg.clone()))
                }
                TaskOutcome::TimedOut => self
                    .failed
                    .push((result.task.path().to_string(), "timed out".to_string())),
                TaskOutcome::Cancelled => self.cancelled += 1,
            }
        }
    }

    /// Ничего не передано и не удалено: повторный запуск ничего не изменит.
    /// Пропущенные служебные файлы ОС не считаются.
    pub fn is_noop(&self) -> bool {
        self.deleted == 0
            && self.transferred == 0
            && self.failed.is_empty()
            && self.cancelled == 0
            && self.integrity_repairs == 0
    }

    /// Всё, что было запланировано, выполнено
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.cancelled == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_absorbs_outcomes() {
        let results = vec![
            TaskResult {
                task: TransferTask::delete("old.txt", Locality::Remote),
                outcome: TaskOutcome::Completed,
            },
            TaskResult {
                task: TransferTask::upload("a.txt"),
                outcome: TaskOutcome::Completed,
            },
            TaskResult {
                task: TransferTask::upload("desktop.ini"),
                outcome: TaskOutcome::Skipped,
            },
            TaskResult {
                task: TransferTask::upload("b.txt"),
                outcome: TaskOutcome::TimedOut,
            },
            TaskResult {
                task: TransferTask::upload("c.txt"),
                outcome: TaskOutcome::Cancelled,
            },
        ];

        let mut report = SyncReport::new(SyncDirection::Push);
        report.absorb(&results);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.transferred, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, vec![("b.txt".to_string(), "timed out".to_string())]);
        assert_eq!(report.cancelled, 1);
        assert!(!report.is_complete());

        let summary = BatchSummary::from_results(&results);
        assert_eq!(summary.total(), 5);
        assert_eq!(summary.completed, 2);
    }

    #[test]
    fn test_task_serialization() {
        let json = serde_json::to_value(TransferTask::delete("x", Locality::Local)).unwrap();
        assert_eq!(json["kind"], "delete");
        assert_eq!(json["locality"], "local");
    }
}
