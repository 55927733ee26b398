//! Коллекция модпаков с логической блокировкой на каждый пакет

use super::package::{self, ModPackage, DESCRIPTOR_FILE};
use crate::error::{SyncError, Result};
use crate::types::PackageSummary;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, MutexGuard};

/// Модпак + его блокировка.
///
/// Всё, что строит индекс или меняет раскладку (push, pull, установка,
/// включение/выключение), выполняется под этим мьютексом.
#[derive(Debug)]
pub struct PackageEntry {
    uuid: String,
    root: PathBuf,
    package: Mutex<ModPackage>,
}

impl PackageEntry {
    pub fn new(package: ModPackage) -> Self {
        Self {
            uuid: package.uuid().to_string(),
            root: package.root().to_path_buf(),
            package: Mutex::new(package),
        }
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn lock(&self) -> MutexGuard<'_, ModPackage> {
        self.package.lock().await
    }

    /// Без ожидания: `None`, если пакет сейчас синхронизируется
    pub fn try_lock(&self) -> Option<MutexGuard<'_, ModPackage>> {
        self.package.try_lock().ok()
    }
}

/// Все модпаки из `<base>/modpacks`, по uuid
#[derive(Debug)]
pub struct PackageLibrary {
    modpacks_dir: PathBuf,
    packages: RwLock<HashMap<String, Arc<PackageEntry>>>,
}

impl PackageLibrary {
    pub fn new(modpacks_dir: impl Into<PathBuf>) -> Self {
        Self {
            modpacks_dir: modpacks_dir.into(),
            packages: RwLock::new(HashMap::new()),
        }
    }

    /// Библиотека с уже загруженными модпаками
    pub fn open(modpacks_dir: impl Into<PathBuf>) -> Result<Self> {
        let library = Self::new(modpacks_dir);
        library.scan()?;
        Ok(library)
    }

    pub fn modpacks_dir(&self) -> &Path {
        &self.modpacks_dir
    }

    /// Перечитывает папку модпаков. Битые модпаки пропускаются с предупреждением.
    /// Уже загруженные записи (и их блокировки) сохраняются.
    pub fn scan(&self) -> Result<usize> {
        std::fs::create_dir_all(&self.modpacks_dir)?;

        let mut found = HashMap::new();
        for entry in std::fs::read_dir(&self.modpacks_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() || !path.join(DESCRIPTOR_FILE).is_file() {
                continue;
            }

            match ModPackage::open(&path) {
                Ok(package) => {
                    found.insert(package.uuid().to_string(), package);
                }
                Err(e) => log::warn!("Skipping invalid modpack at {}: {}", path.display(), e),
            }
        }

        let mut packages = self.write_map()?;
        packages.retain(|uuid, _| found.contains_key(uuid));
        for (uuid, package) in found {
            packages
                .entry(uuid)
                .or_insert_with(|| Arc::new(PackageEntry::new(package)));
        }

        log::info!("Loaded {} modpacks from {}", packages.len(), self.modpacks_dir.display());
        Ok(packages.len())
    }

    pub fn get(&self, uuid: &str) -> Result<Arc<PackageEntry>> {
        self.read_map()?
            .get(uuid)
            .cloned()
            .ok_or_else(|| SyncError::PackageNotFound(uuid.to_string()))
    }

    pub fn contains(&self, uuid: &str) -> bool {
        self.read_map().map(|m| m.contains_key(uuid)).unwrap_or(false)
    }

    pub fn insert(&self, package: ModPackage) -> Result<Arc<PackageEntry>> {
        let entry = Arc::new(PackageEntry::new(package));
        self.write_map()?
            .insert(entry.uuid().to_string(), Arc::clone(&entry));
        Ok(entry)
    }

    pub fn create(&self, name: &str) -> Result<Arc<PackageEntry>> {
        let package = ModPackage::create(&self.modpacks_dir, name)?;
        self.insert(package)
    }

    /// Удаляет модпак из библиотеки и с диска (ждёт окончания синхронизации)
    pub async fn remove(&self, uuid: &str) -> Result<()> {
        let entry = self.get(uuid)?;
        let guard = entry.lock().await;
        guard.clone().delete()?;
        drop(guard);

        self.write_map()?.remove(uuid);
        Ok(())
    }

    /// Краткая информация обо всех модпаках.
    /// Читает только диск, поэтому не ждёт идущих синхронизаций.
    pub fn list(&self) -> Result<Vec<PackageSummary>> {
        let entries: Vec<Arc<PackageEntry>> = self.read_map()?.values().cloned().collect();
        let mut summaries: Vec<PackageSummary> = entries
            .iter()
            .filter_map(|entry| match package::read_summary(entry.root()) {
                Ok(summary) => Some(summary),
                Err(e) => {
                    log::warn!("Skipping modpack {} in listing: {}", entry.uuid(), e);
                    None
                }
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.uuid.cmp(&b.uuid)));
        Ok(summaries)
    }

    pub fn len(&self) -> usize {
        self.read_map().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_map(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Arc<PackageEntry>>>> {
        self.packages
            .read()
            .map_err(|_| SyncError::InvalidConfig("Modpack library lock poisoned".into()))
    }

    fn write_map(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<PackageEntry>>>> {
        self.packages
            .write()
            .map_err(|_| SyncError::InvalidConfig("Modpack library lock poisoned".into()))
    }
}
