//! Push / pull модпака
//!
//! Push делает сервер копией локальной папки, pull делает локальную папку
//! копией сервера. Сервер при pull считается источником истины. Оба
//! направления идемпотентны: повторный запуск без изменений не создаёт задач.

use super::diff::{compute_download, compute_upload, is_reserved_marker};
use super::scheduler::TransferScheduler;
use super::types::{emit, Locality, ProgressCallback, SyncReport, TransferTask};
use crate::api::RemoteStore;
use crate::error::{SyncError, Result};
use crate::file_index::{self, Digest, FileIndex};
use crate::manifest;
use crate::modpacks::{ModPackage, PackageEntry, PackageLibrary, DESCRIPTOR_FILE};
use crate::settings::SyncSettings;
use crate::types::{PackageDescriptor, SyncDirection, SyncPhase, SyncProgress};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct SyncCoordinator {
    remote: Arc<dyn RemoteStore>,
    settings: SyncSettings,
    library: Arc<PackageLibrary>,
    /// Токен текущих передач; после отмены заменяется новым
    cancel: Mutex<CancellationToken>,
}

impl SyncCoordinator {
    pub fn new(remote: Arc<dyn RemoteStore>, settings: SyncSettings, library: Arc<PackageLibrary>) -> Self {
        Self {
            remote,
            settings,
            library,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn library(&self) -> &Arc<PackageLibrary> {
        &self.library
    }

    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.remote
    }

    /// Отменяет текущие передачи. Следующий push/pull начнётся с новым токеном.
    pub fn cancel(&self) {
        let mut current = self.cancel.lock().unwrap_or_else(|e| e.into_inner());
        current.cancel();
        *current = CancellationToken::new();
    }

    fn scheduler(&self, cancel: CancellationToken) -> TransferScheduler {
        TransferScheduler::new(self.settings.effective_max_connections(), self.settings.transfer_timeout())
            .with_cancellation(cancel)
    }

    fn batch_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .child_token()
    }

    // ========== Remote package management ==========

    /// Скачивает описание удалённого модпака и создаёт его локальную копию
    pub async fn accept_remote(&self, uuid: &str) -> Result<Arc<PackageEntry>> {
        let info = self.remote.get_modpack_info(uuid).await?;
        if info.is_not_found() {
            return Err(SyncError::PackageNotFound(uuid.to_string()));
        }
        if !info.is_ok() {
            return Err(info.error("getModpackInfo"));
        }

        let package = ModPackage::accept_remote(self.library.modpacks_dir(), &info.body, uuid)?;
        self.library.insert(package)
    }

    pub async fn is_owner(&self, uuid: &str) -> Result<bool> {
        let entry = self.library.get(uuid)?;
        let token = entry.lock().await.token().to_string();
        Ok(self.remote.is_owner(uuid, &token).await)
    }

    /// Удаляет модпак на сервере (локальная копия не трогается)
    pub async fn delete_remote(&self, uuid: &str) -> Result<()> {
        let entry = self.library.get(uuid)?;
        let token = entry.lock().await.token().to_string();
        let response = self.remote.delete_modpack(uuid, &token).await?;
        if !response.is_success() {
            return Err(response.error("removeModpack"));
        }
        log::info!("Removed remote modpack {}", uuid);
        Ok(())
    }

    // ========== Push ==========

    pub async fn push(&self, uuid: &str, progress: Option<ProgressCallback>) -> Result<SyncReport> {
        let entry = self.library.get(uuid)?;
        let package = entry.lock().await;
        let progress = progress.as_ref();

        log::info!("Pushing modpack '{}' ({})", package.name(), uuid);
        self.ensure_remote_exists(&package).await?;

        emit(progress, SyncProgress::started(SyncPhase::Mapping));
        let local = FileIndex::build_async(package.root().to_path_buf()).await?;
        let remote = self.fetch_remote_index(uuid).await?;
        let plan = compute_upload(&local, &remote);
        let ignored = plan.ignored.len();

        let tasks: Vec<TransferTask> = plan
            .to_delete_remote
            .into_iter()
            .map(|path| TransferTask::delete(path, Locality::Remote))
            .chain(plan.to_upload.into_iter().map(TransferTask::upload))
            .collect();
        log::info!("Push plan for {}: {} tasks", uuid, tasks.len());

        let root = package.root().to_path_buf();
        let token = package.token().to_string();
        let remote_store = Arc::clone(&self.remote);

        let results = self
            .scheduler(self.batch_token())
            .run(
                tasks,
                |task| push_task(Arc::clone(&remote_store), root.clone(), uuid.to_string(), token.clone(), task),
                progress,
            )
            .await;

        let mut report = SyncReport::new(SyncDirection::Push);
        report.skipped = ignored;
        report.absorb(&results);
        log_report(uuid, &report);
        Ok(report)
    }

    /// Создаёт модпак на сервере, если его там ещё нет
    async fn ensure_remote_exists(&self, package: &ModPackage) -> Result<()> {
        let info = self.remote.get_modpack_info(package.uuid()).await?;
        if info.is_success() {
            return Ok(());
        }
        if !info.is_not_found() {
            return Err(info.error("getModpackInfo"));
        }

        log::info!("Modpack {} not found on server, creating", package.uuid());
        let created = self.remote.create_modpack(package.uuid(), package.token()).await?;
        if !created.is_success() {
            return Err(created.error("createModpackDirectory"));
        }

        let descriptor = tokio::fs::read(package.descriptor_path()).await?;
        let uploaded = self
            .remote
            .upload_file(package.uuid(), package.token(), DESCRIPTOR_FILE, descriptor)
            .await?;
        if !uploaded.is_success() {
            return Err(uploaded.error("uploadFile"));
        }
        Ok(())
    }

    async fn fetch_remote_index(&self, uuid: &str) -> Result<FileIndex> {
        let response = self.remote.get_hash_map(uuid).await?;
        if !response.is_ok() {
            return Err(response.error("getModpackHashMap"));
        }
        FileIndex::from_json(response.body)
    }

    // ========== Pull ==========

    pub async fn pull(&self, uuid: &str, progress: Option<ProgressCallback>) -> Result<SyncReport> {
        let entry = self.library.get(uuid)?;
        let mut package = entry.lock().await;
        let progress = progress.as_ref();
        let root = package.root().to_path_buf();

        log::info!("Pulling modpack '{}' ({})", package.name(), uuid);
        emit(progress, SyncProgress::started(SyncPhase::Mapping));

        let remote = self.fetch_remote_index(uuid).await?;
        let local = FileIndex::build_async(root.clone()).await?;

        let mut report = SyncReport::new(SyncDirection::Pull);
        report.integrity_repairs = remove_mismatched(&root, &local, &remote)?;
        prune_empty_dirs(&root)?;
        package.ensure_layout()?;

        let local = FileIndex::build_async(root.clone()).await?;
        let mut plan = compute_download(&remote, &local);
        report.skipped = plan.ignored.len();

        let baseline = FileIndex::load(&package.snapshot_path()).ok();
        let descriptor_unchanged = baseline
            .as_ref()
            .and_then(|b| b.get(DESCRIPTOR_FILE))
            .is_some_and(|digest| remote.get(DESCRIPTOR_FILE) == Some(digest));
        if descriptor_unchanged && local.contains(DESCRIPTOR_FILE) {
            plan.to_download.remove(DESCRIPTOR_FILE);
        }

        let tasks: Vec<TransferTask> = plan
            .to_delete_local
            .into_iter()
            .map(|path| TransferTask::delete(path, Locality::Local))
            .chain(plan.to_download.into_iter().map(TransferTask::download))
            .collect();
        log::info!("Pull plan for {}: {} tasks", uuid, tasks.len());

        let remote_store = Arc::clone(&self.remote);
        let downloaded_descriptor: Arc<Mutex<Option<Vec<u8>>>> = Arc::new(Mutex::new(None));

        let results = self
            .scheduler(self.batch_token())
            .run(
                tasks,
                |task| {
                    let expected = remote.get(task.path());
                    pull_task(
                        Arc::clone(&remote_store),
                        root.clone(),
                        uuid.to_string(),
                        expected,
                        Arc::clone(&downloaded_descriptor),
                        task,
                    )
                },
                progress,
            )
            .await;
        report.absorb(&results);

        let descriptor_bytes = downloaded_descriptor
            .lock()
            .map_err(|_| SyncError::InvalidConfig("descriptor slot poisoned".into()))?
            .take();
        if let Some(bytes) = descriptor_bytes {
            match parse_descriptor(&bytes) {
                Ok(remote_descriptor) => package.merge_remote_descriptor(remote_descriptor)?,
                Err(e) => {
                    // остальные файлы уже на месте, битым считается только дескриптор
                    log::warn!("Remote {} of {} is unusable: {}", DESCRIPTOR_FILE, uuid, e);
                    report.transferred = report.transferred.saturating_sub(1);
                    report.failed.push((DESCRIPTOR_FILE.to_string(), e.to_string()));
                }
            }
        }

        prune_empty_dirs(&root)?;
        package.ensure_layout()?;

        // базовый снимок обновляется только после полного pull
        if report.is_complete() {
            remote.save(&package.snapshot_path())?;
        }
        package.reload()?;

        log_report(uuid, &report);
        Ok(report)
    }

    /// Pull в фоне на рантайме tokio
    pub fn spawn_pull(
        self: &Arc<Self>,
        uuid: String,
        progress: Option<ProgressCallback>,
    ) -> JoinHandle<Result<SyncReport>> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move { coordinator.pull(&uuid, progress).await })
    }

    /// Push в фоне на рантайме tokio
    pub fn spawn_push(
        self: &Arc<Self>,
        uuid: String,
        progress: Option<ProgressCallback>,
    ) -> JoinHandle<Result<SyncReport>> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move { coordinator.push(&uuid, progress).await })
    }
}

async fn push_task(
    remote: Arc<dyn RemoteStore>,
    root: PathBuf,
    uuid: String,
    token: String,
    task: TransferTask,
) -> Result<()> {
    match task {
        TransferTask::Upload { path } => {
            let data = tokio::fs::read(file_index::local_path(&root, &path)).await?;
            let response = remote.upload_file(&uuid, &token, &path, data).await?;
            if !response.is_success() {
                return Err(response.error("uploadFile"));
            }
            log::debug!("Uploaded {}", path);
            Ok(())
        }
        TransferTask::Delete { path, .. } => {
            let response = remote.delete_file(&uuid, &token, &path).await?;
            // уже удалён кем-то другим
            if !response.is_success() && !response.is_not_found() {
                return Err(response.error("removeModpackFile"));
            }
            log::debug!("Removed remote {}", path);
            Ok(())
        }
        TransferTask::Download { path } => Err(SyncError::InvalidConfig(format!(
            "Download task {} in push batch",
            path
        ))),
    }
}

async fn pull_task(
    remote: Arc<dyn RemoteStore>,
    root: PathBuf,
    uuid: String,
    expected: Option<Digest>,
    descriptor_slot: Arc<Mutex<Option<Vec<u8>>>>,
    task: TransferTask,
) -> Result<()> {
    match task {
        TransferTask::Download { path } => {
            let response = remote.download_file(&uuid, &path).await?;
            if !response.is_ok() {
                return Err(response.error("getModpackFile"));
            }

            let data = response.raw;
            if let Some(expected) = expected {
                let actual = Digest::from_bytes(&data);
                if actual != expected {
                    return Err(SyncError::HashMismatch {
                        path,
                        expected: expected.to_hex(),
                        actual: actual.to_hex(),
                    });
                }
            }

            if path == DESCRIPTOR_FILE {
                // сливается с локальным дескриптором после пачки
                let mut slot = descriptor_slot
                    .lock()
                    .map_err(|_| SyncError::InvalidConfig("descriptor slot poisoned".into()))?;
                *slot = Some(data);
                return Ok(());
            }

            let target = file_index::local_path(&root, &path);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, data).await?;
            log::debug!("Downloaded {}", path);
            Ok(())
        }
        TransferTask::Delete { path, .. } => {
            match tokio::fs::remove_file(file_index::local_path(&root, &path)).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        }
        TransferTask::Upload { path } => Err(SyncError::InvalidConfig(format!(
            "Upload task {} in pull batch",
            path
        ))),
    }
}

/// Дескриптор с сервера, с той же починкой JSON, что и при чтении с диска
fn parse_descriptor(bytes: &[u8]) -> Result<PackageDescriptor> {
    let value = manifest::parse(&String::from_utf8_lossy(bytes))?;
    serde_json::from_value(value).map_err(|e| SyncError::Parse(format!("{}: {}", DESCRIPTOR_FILE, e)))
}

/// Удаляет локальные файлы, которые есть на сервере с другим дайджестом.
/// Дескриптор не трогается.
fn remove_mismatched(root: &Path, local: &FileIndex, remote: &FileIndex) -> Result<usize> {
    let mut repaired = 0;
    for (path, digest) in local.iter() {
        if path == DESCRIPTOR_FILE || is_reserved_marker(path) {
            continue;
        }
        let Some(remote_digest) = remote.get(path) else {
            continue;
        };
        if remote_digest == digest {
            continue;
        }

        let mismatch = SyncError::HashMismatch {
            path: path.to_string(),
            expected: remote_digest.to_hex(),
            actual: digest.to_hex(),
        };
        log::warn!("{}, re-downloading", mismatch);
        std::fs::remove_file(file_index::local_path(root, path))?;
        repaired += 1;
    }
    Ok(repaired)
}

/// Удаляет пустые папки снизу вверх (корень остаётся)
fn prune_empty_dirs(root: &Path) -> Result<()> {
    let dirs: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .collect();

    for dir in dirs {
        let is_empty = std::fs::read_dir(&dir)?.next().is_none();
        if is_empty {
            std::fs::remove_dir(&dir)?;
        }
    }
    Ok(())
}

fn log_report(uuid: &str, report: &SyncReport) {
    log::info!(
        "{:?} of {} finished: {} transferred, {} deleted, {} skipped, {} failed, {} cancelled, {} repaired",
        report.direction,
        uuid,
        report.transferred,
        report.deleted,
        report.skipped,
        report.failed.len(),
        report.cancelled,
        report.integrity_repairs
    );
    for (path, reason) in &report.failed {
        log::warn!("  {}: {}", path, reason);
    }
}
