use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// External workspace crates
use svmg_core as core;

// Re-export for internal use
use core::{error, types};

// Local modules
pub mod api;
pub mod file_index;
pub mod manifest;
pub mod modpacks;
pub mod mods;
pub mod paths;
pub mod settings;
pub mod sync;
pub mod utils;

pub use api::{ApiResponse, RemoteStore, SyncClient};
pub use error::{ErrorInfo, SyncError, Result};
pub use file_index::{Digest, FileIndex};
pub use modpacks::{ArchiveInstaller, InstallReport, ModPackage, PackageEntry, PackageLibrary};
pub use mods::DependencyReport;
pub use paths::AppPaths;
pub use settings::SyncSettings;
pub use sync::{ProgressCallback, SyncCoordinator, SyncReport};
pub use types::{Mod, PackageSummary, SyncDirection, SyncPhase, SyncProgress};

/// User-Agent для запросов к серверу модпаков
pub const USER_AGENT: &str = concat!("svmg/", env!("CARGO_PKG_VERSION"));

/// Сколько дней хранить логи сессий
const LOG_RETENTION_DAYS: u64 = 7;

/// Логгер: файл на каждую сессию, в debug-сборке ещё и stdout
pub fn setup_logging(logs_dir: &Path) -> PathBuf {
    let _ = fs::create_dir_all(logs_dir);

    let session_id = Local::now().timestamp();
    let log_file = logs_dir.join(format!("svmg_{}.log", session_id));

    let dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Debug)
        .level_for("hyper", log::LevelFilter::Warn)
        .level_for("hyper_util", log::LevelFilter::Warn)
        .level_for("reqwest", log::LevelFilter::Warn);

    let file_output: fern::Output = match fern::log_file(&log_file) {
        Ok(file) => file.into(),
        Err(_) => fern::Output::writer(Box::new(std::io::sink()), "\n"),
    };

    #[cfg(debug_assertions)]
    let logger = dispatch.chain(std::io::stdout()).chain(file_output);

    #[cfg(not(debug_assertions))]
    let logger = dispatch.chain(file_output);

    if let Err(e) = logger.apply() {
        eprintln!("Failed to initialize logger: {}", e);
    }

    log::info!("=== svmg {} started ===", env!("CARGO_PKG_VERSION"));
    log::info!("Session ID: {}", session_id);
    log::info!("Log file: {:?}", log_file);
    log_file
}

// ============================================================================
// Engine facade
// ============================================================================

/// Точка входа для UI / CLI: push, pull, установка архивов, проверка зависимостей
pub struct Engine {
    paths: AppPaths,
    settings: SyncSettings,
    library: Arc<PackageLibrary>,
    coordinator: Arc<SyncCoordinator>,
    installer: ArchiveInstaller,
}

impl Engine {
    /// Стандартный запуск: директория данных ОС, логи, настройки, HTTP-клиент
    pub fn start() -> Result<Self> {
        let paths = AppPaths::discover()?;
        paths.init()?;
        setup_logging(&paths.logs_dir());

        match paths.cleanup_old_logs(LOG_RETENTION_DAYS) {
            Ok(0) => {}
            Ok(n) => log::debug!("Removed {} old log files", n),
            Err(e) => log::warn!("Failed to cleanup old logs: {}", e),
        }

        Self::open(paths)
    }

    /// Движок поверх заданной базовой директории с настройками из `settings.json`
    pub fn open(paths: AppPaths) -> Result<Self> {
        paths.init()?;
        let settings = SyncSettings::load(&paths.settings_file());
        let client = SyncClient::new(&settings)?;
        log::info!("Using sync server {}", client.base_url());
        Self::with_remote(paths, settings, Arc::new(client))
    }

    /// Движок с произвольным удалённым хранилищем
    pub fn with_remote(paths: AppPaths, settings: SyncSettings, remote: Arc<dyn RemoteStore>) -> Result<Self> {
        paths.init()?;
        let library = Arc::new(PackageLibrary::open(paths.modpacks_dir())?);
        let coordinator = Arc::new(SyncCoordinator::new(remote, settings.clone(), Arc::clone(&library)));
        let installer = ArchiveInstaller::new(paths.staging_dir());

        Ok(Self {
            paths,
            settings,
            library,
            coordinator,
            installer,
        })
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn library(&self) -> &Arc<PackageLibrary> {
        &self.library
    }

    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    pub fn create_modpack(&self, name: &str) -> Result<Arc<PackageEntry>> {
        self.library.create(name)
    }

    pub fn list_modpacks(&self) -> Result<Vec<PackageSummary>> {
        self.library.list()
    }

    pub async fn accept_remote(&self, uuid: &str) -> Result<Arc<PackageEntry>> {
        self.coordinator.accept_remote(uuid).await
    }

    /// Загружает локальные изменения модпака на сервер
    pub async fn push(&self, uuid: &str, progress: Option<ProgressCallback>) -> Result<SyncReport> {
        self.coordinator.push(uuid, progress).await
    }

    /// Приводит локальную копию к состоянию сервера
    pub async fn pull(&self, uuid: &str, progress: Option<ProgressCallback>) -> Result<SyncReport> {
        self.coordinator.pull(uuid, progress).await
    }

    pub fn spawn_pull(
        &self,
        uuid: &str,
        progress: Option<ProgressCallback>,
    ) -> tokio::task::JoinHandle<Result<SyncReport>> {
        self.coordinator.spawn_pull(uuid.to_string(), progress)
    }

    /// Ошибка для UI на языке из настроек
    pub fn error_info(&self, error: &SyncError) -> ErrorInfo {
        error.localized_error_info(self.settings.language)
    }

    /// Прерывает текущие передачи
    pub fn cancel_sync(&self) {
        self.coordinator.cancel();
    }

    /// Устанавливает моды из архива во включённые моды модпака
    pub async fn install_archive(&self, uuid: &str, archive: &Path) -> Result<InstallReport> {
        let entry = self.library.get(uuid)?;
        let package = entry.lock().await;
        self.installer.install(archive, &package.mods_enabled_dir()).await
    }

    /// Проверяет, что обязательные зависимости мода есть среди включённых модов
    pub fn check_dependencies(&self, uuid: &str, mod_name: &str) -> Result<DependencyReport> {
        let mod_name = modpacks::package::checked_mod_name(mod_name)?;
        let entry = self.library.get(uuid)?;
        let root = entry.root();

        let mod_dir = [modpacks::MODS_ENABLED_DIR, modpacks::MODS_DISABLED_DIR]
            .iter()
            .map(|dir| root.join(dir).join(mod_name))
            .find(|path| path.is_dir())
            .ok_or_else(|| SyncError::ModNotFound(mod_name.to_string()))?;

        let target = mods::load_mod(&mod_dir)?;
        let enabled = mods::list_mods(&root.join(modpacks::MODS_ENABLED_DIR))?;
        Ok(mods::check_dependencies(&target, &enabled))
    }
}
