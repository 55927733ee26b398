use crate::error::{SyncError, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

/// Корневые директории приложения.
///
/// Передаётся явно туда, где нужны пути; глобального состояния нет.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    base: PathBuf,
}

impl AppPaths {
    /// Пути внутри произвольной базовой директории (тесты, портативный режим)
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Стандартная директория данных ОС
    pub fn discover() -> Result<Self> {
        let dirs = ProjectDirs::from("com", "marcosbrendon", "svmg").ok_or_else(|| {
            SyncError::InvalidConfig("Unable to determine the user data directory".into())
        })?;
        Ok(Self::new(dirs.data_dir()))
    }

    /// Создаёт основные директории
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(self.modpacks_dir())?;
        fs::create_dir_all(self.staging_dir())?;
        fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn modpacks_dir(&self) -> PathBuf {
        self.base.join("modpacks")
    }

    pub fn modpack_dir(&self, uuid: &str) -> PathBuf {
        self.modpacks_dir().join(uuid)
    }

    /// Временная распаковка архивов
    pub fn staging_dir(&self) -> PathBuf {
        self.base.join("temp")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base.join("logs")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.base.join("settings.json")
    }

    /// Удаляет логи сессий старше `keep_days` дней
    pub fn cleanup_old_logs(&self, keep_days: u64) -> Result<usize> {
        use std::time::{Duration, SystemTime};

        let logs_path = self.logs_dir();
        if !logs_path.exists() {
            return Ok(0);
        }

        let now = SystemTime::now();
        let cutoff = Duration::from_secs(keep_days * 24 * 60 * 60);
        let mut deleted_count = 0;

        for entry in fs::read_dir(&logs_path)?.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if !(name.starts_with("svmg_") && name.ends_with(".log")) {
                continue;
            }

            let age = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok());

            if matches!(age, Some(age) if age > cutoff) && fs::remove_file(&path).is_ok() {
                log::debug!("Deleted old log file: {}", name);
                deleted_count += 1;
            }
        }

        Ok(deleted_count)
    }
}
