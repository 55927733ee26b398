//! Модпак на диске: `modpacks/<uuid>/` с дескриптором и тремя папками

use crate::error::{SyncError, Result};
use crate::file_index::SNAPSHOT_FILE;
use crate::manifest;
use crate::mods;
use crate::types::{Mod, PackageDescriptor, PackageSummary};
use crate::utils;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Дескриптор модпака в корне
pub const DESCRIPTOR_FILE: &str = "modpack.json";
pub const MODS_ENABLED_DIR: &str = "mods_enabled";
pub const MODS_DISABLED_DIR: &str = "mods_disabled";
pub const SAVES_DIR: &str = "saves";

#[derive(Debug, Clone)]
pub struct ModPackage {
    root: PathBuf,
    descriptor: PackageDescriptor,
}

impl ModPackage {
    /// Новый модпак с новой идентичностью
    pub fn create(modpacks_dir: &Path, name: &str) -> Result<Self> {
        let descriptor = PackageDescriptor {
            name: name.to_string(),
            image: String::new(),
            token: utils::gen_token(),
            uuid: utils::gen_uuid(),
            version: "0.0.0".to_string(),
        };
        log::info!("Creating modpack '{}' ({})", name, descriptor.uuid);
        Self::materialize(modpacks_dir, descriptor)
    }

    /// Локальная копия удалённого модпака.
    ///
    /// uuid, имя, картинка и версия берутся с сервера; токен генерируется
    /// локальный (серверный токен клиенту не отдаётся).
    pub fn accept_remote(modpacks_dir: &Path, remote: &serde_json::Value, uuid: &str) -> Result<Self> {
        let field = |key: &str| remote.get(key).and_then(|v| v.as_str()).unwrap_or_default();

        let remote_uuid = match field("uuid") {
            "" => uuid,
            other => other,
        };
        if remote_uuid != uuid {
            return Err(SyncError::ApiError(format!(
                "Server returned modpack {} for requested {}",
                remote_uuid, uuid
            )));
        }

        let descriptor = PackageDescriptor {
            name: field("name").to_string(),
            image: field("image").to_string(),
            token: utils::gen_token(),
            uuid: uuid.to_string(),
            version: match field("version") {
                "" => "0.0.0".to_string(),
                v => v.to_string(),
            },
        };
        log::info!("Accepting remote modpack '{}' ({})", descriptor.name, uuid);
        Self::materialize(modpacks_dir, descriptor)
    }

    fn materialize(modpacks_dir: &Path, descriptor: PackageDescriptor) -> Result<Self> {
        let root = modpacks_dir.join(&descriptor.uuid);
        if root.join(DESCRIPTOR_FILE).exists() {
            return Err(SyncError::FileCollision(format!(
                "Modpack {} already exists",
                descriptor.uuid
            )));
        }

        let package = Self { root, descriptor };
        package.ensure_layout()?;
        package.save()?;
        Ok(package)
    }

    /// Загружает модпак из его корня.
    ///
    /// Недостающие uuid/token генерируются и сразу сохраняются,
    /// поэтому при следующем открытии они уже не меняются.
    pub fn open(root: &Path) -> Result<Self> {
        let descriptor_path = root.join(DESCRIPTOR_FILE);
        if !descriptor_path.is_file() {
            return Err(SyncError::PackageNotFound(root.display().to_string()));
        }

        let value = manifest::read_file(&descriptor_path)?;
        let mut descriptor: PackageDescriptor = serde_json::from_value(value).map_err(|e| {
            SyncError::Parse(format!("{}: {}", descriptor_path.display(), e))
        })?;

        let mut dirty = false;
        if descriptor.uuid.is_empty() {
            descriptor.uuid = root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(utils::gen_uuid);
            dirty = true;
        }
        if descriptor.token.is_empty() {
            descriptor.token = utils::gen_token();
            dirty = true;
        }
        if descriptor.version.is_empty() {
            descriptor.version = "0.0.0".to_string();
            dirty = true;
        }

        let package = Self {
            root: root.to_path_buf(),
            descriptor,
        };
        package.ensure_layout()?;
        if dirty {
            log::info!("Assigned missing identity to modpack {}", package.uuid());
            package.save()?;
        }
        Ok(package)
    }

    /// Перечитывает дескриптор с диска
    pub fn reload(&mut self) -> Result<()> {
        *self = Self::open(&self.root)?;
        Ok(())
    }

    /// Создаёт недостающие папки, ничего не удаляя
    pub fn ensure_layout(&self) -> Result<()> {
        fs::create_dir_all(self.mods_enabled_dir())?;
        fs::create_dir_all(self.mods_disabled_dir())?;
        fs::create_dir_all(self.saves_dir())?;
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let json = serde_json::to_string_pretty(&self.descriptor)?;
        fs::write(self.descriptor_path(), json)?;
        Ok(())
    }

    // ========== Accessors ==========

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn descriptor(&self) -> &PackageDescriptor {
        &self.descriptor
    }

    pub fn uuid(&self) -> &str {
        &self.descriptor.uuid
    }

    pub fn token(&self) -> &str {
        &self.descriptor.token
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn version(&self) -> &str {
        &self.descriptor.version
    }

    pub fn image(&self) -> Result<Vec<u8>> {
        utils::decode_image(&self.descriptor.image)
    }

    pub fn descriptor_path(&self) -> PathBuf {
        self.root.join(DESCRIPTOR_FILE)
    }

    /// Индекс удалённой стороны на момент последнего pull
    pub fn snapshot_path(&self) -> PathBuf {
        self.root.join(SNAPSHOT_FILE)
    }

    pub fn mods_enabled_dir(&self) -> PathBuf {
        self.root.join(MODS_ENABLED_DIR)
    }

    pub fn mods_disabled_dir(&self) -> PathBuf {
        self.root.join(MODS_DISABLED_DIR)
    }

    pub fn saves_dir(&self) -> PathBuf {
        self.root.join(SAVES_DIR)
    }

    // ========== Mutations ==========

    /// Переименование. Возвращает `false`, если имя не изменилось (файл не трогается).
    pub fn rename(&mut self, name: &str) -> Result<bool> {
        if self.descriptor.name == name {
            return Ok(false);
        }
        log::info!("Renaming modpack {}: '{}' -> '{}'", self.uuid(), self.descriptor.name, name);
        self.descriptor.name = name.to_string();
        self.save()?;
        Ok(true)
    }

    pub fn set_image(&mut self, bytes: &[u8]) -> Result<()> {
        self.descriptor.image = utils::encode_image(bytes);
        self.save()
    }

    /// Принимает скачанный дескриптор: имя, картинка и версия с сервера,
    /// uuid и токен остаются локальными.
    pub fn merge_remote_descriptor(&mut self, remote: PackageDescriptor) -> Result<()> {
        self.descriptor.name = remote.name;
        self.descriptor.image = remote.image;
        self.descriptor.version = if remote.version.is_empty() {
            "0.0.0".to_string()
        } else {
            remote.version
        };
        self.save()
    }

    pub fn enable_mod(&self, name: &str) -> Result<()> {
        let name = checked_mod_name(name)?;
        move_mod(&self.mods_disabled_dir().join(name), &self.mods_enabled_dir().join(name))?;
        log::info!("Enabled mod '{}' in modpack {}", name, self.uuid());
        Ok(())
    }

    pub fn disable_mod(&self, name: &str) -> Result<()> {
        let name = checked_mod_name(name)?;
        move_mod(&self.mods_enabled_dir().join(name), &self.mods_disabled_dir().join(name))?;
        log::info!("Disabled mod '{}' in modpack {}", name, self.uuid());
        Ok(())
    }

    pub fn enable_all(&self) -> Result<usize> {
        let names = self.list_disabled_mods()?;
        for name in &names {
            self.enable_mod(name)?;
        }
        Ok(names.len())
    }

    pub fn disable_all(&self) -> Result<usize> {
        let names = self.list_enabled_mods()?;
        for name in &names {
            self.disable_mod(name)?;
        }
        Ok(names.len())
    }

    /// Имена папок включённых модов
    pub fn list_enabled_mods(&self) -> Result<Vec<String>> {
        list_dir_names(&self.mods_enabled_dir())
    }

    pub fn list_disabled_mods(&self) -> Result<Vec<String>> {
        list_dir_names(&self.mods_disabled_dir())
    }

    pub fn enabled_mods(&self) -> Result<Vec<Mod>> {
        mods::list_mods(&self.mods_enabled_dir())
    }

    pub fn disabled_mods(&self) -> Result<Vec<Mod>> {
        mods::list_mods(&self.mods_disabled_dir())
    }

    /// Удаляет мод (включённый или выключенный)
    pub fn delete_mod(&self, name: &str) -> Result<()> {
        let name = checked_mod_name(name)?;
        for dir in [self.mods_enabled_dir(), self.mods_disabled_dir()] {
            let path = dir.join(name);
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
                log::info!("Deleted mod '{}' from modpack {}", name, self.uuid());
                return Ok(());
            }
        }
        Err(SyncError::ModNotFound(name.to_string()))
    }

    /// Удаляет модпак целиком
    pub fn delete(self) -> Result<()> {
        log::info!("Deleting modpack {} at {}", self.uuid(), self.root.display());
        fs::remove_dir_all(&self.root)?;
        Ok(())
    }

}

/// Сводка модпака прямо с диска, без записи недостающих полей
pub fn read_summary(root: &Path) -> Result<PackageSummary> {
    let descriptor_path = root.join(DESCRIPTOR_FILE);
    let value = manifest::read_file(&descriptor_path)?;
    let descriptor: PackageDescriptor = serde_json::from_value(value)
        .map_err(|e| SyncError::Parse(format!("{}: {}", descriptor_path.display(), e)))?;

    Ok(PackageSummary {
        uuid: descriptor.uuid,
        name: descriptor.name,
        version: descriptor.version,
        enabled_mods: list_dir_names(&root.join(MODS_ENABLED_DIR))?.len(),
        disabled_mods: list_dir_names(&root.join(MODS_DISABLED_DIR))?.len(),
    })
}

/// Имя мода должно быть одним компонентом пути
pub(crate) fn checked_mod_name(name: &str) -> Result<&str> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(name),
        _ => Err(SyncError::ModNotFound(name.to_string())),
    }
}

fn move_mod(from: &Path, to: &Path) -> Result<()> {
    if !from.is_dir() {
        return Err(SyncError::ModNotFound(from.display().to_string()));
    }
    if to.exists() {
        return Err(SyncError::FileCollision(to.display().to_string()));
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(from, to)?;
    Ok(())
}

fn list_dir_names(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}
