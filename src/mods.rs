//! Моды внутри модпака: чтение `manifest.json` и проверка зависимостей

use crate::error::{SyncError, Result};
use crate::manifest::{self, MANIFEST_FILE};
use crate::types::{Mod, ModDependency, OneOrMany};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::Path;

/// Манифест в формате SMAPI (после нормализации ключей)
#[derive(Debug, Default, Deserialize)]
struct ModManifest {
    #[serde(rename = "Name", default, deserialize_with = "lenient_string")]
    name: String,
    #[serde(rename = "Author", default, deserialize_with = "lenient_string")]
    author: String,
    #[serde(rename = "Version", default, deserialize_with = "lenient_string")]
    version: String,
    #[serde(rename = "Description", default, deserialize_with = "lenient_string")]
    description: String,
    #[serde(rename = "UniqueID", default, deserialize_with = "lenient_string")]
    unique_id: String,
    #[serde(rename = "EntryDll", default, deserialize_with = "lenient_string")]
    entry_dll: String,
    #[serde(rename = "MinimumApiVersion", default, deserialize_with = "lenient_string")]
    minimum_api_version: String,
    #[serde(rename = "UpdateKeys", default)]
    update_keys: OneOrMany<String>,
    #[serde(rename = "Dependencies", default)]
    dependencies: Vec<ManifestDependency>,
}

#[derive(Debug, Deserialize)]
struct ManifestDependency {
    #[serde(rename = "UniqueID", default, deserialize_with = "lenient_string")]
    unique_id: String,
    #[serde(rename = "IsRequired", default)]
    is_required: bool,
}

/// Строковые поля манифеста иногда приходят числом или объектом
/// (старый SMAPI писал `Version` как `{MajorVersion, MinorVersion, PatchVersion}`)
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Object(map) => {
            let part = |key: &str| map.get(key).and_then(Value::as_u64);
            match (part("MajorVersion"), part("MinorVersion"), part("PatchVersion")) {
                (Some(major), Some(minor), Some(patch)) => format!("{}.{}.{}", major, minor, patch),
                _ => Value::Object(map).to_string(),
            }
        }
        other => other.to_string(),
    })
}

impl ModManifest {
    fn into_mod(self, install_directory_name: String) -> Mod {
        Mod {
            name: self.name,
            author: self.author,
            version: self.version,
            description: self.description,
            unique_id: self.unique_id,
            entry_point: self.entry_dll,
            minimum_api_version: self.minimum_api_version,
            update_keys: self.update_keys.into_vec(),
            dependencies: self
                .dependencies
                .into_iter()
                .map(|d| ModDependency {
                    unique_id: d.unique_id,
                    is_required: d.is_required,
                })
                .collect(),
            install_directory_name,
        }
    }
}

/// Собирает `Mod` из уже разобранного JSON манифеста
pub fn mod_from_manifest(value: Value, install_directory_name: &str) -> Result<Mod> {
    let manifest: ModManifest =
        serde_json::from_value(value).map_err(|e| SyncError::Parse(e.to_string()))?;
    Ok(manifest.into_mod(install_directory_name.to_string()))
}

/// Читает мод из его папки.
///
/// Папка без `manifest.json` даёт мод с пустыми полями (его всё равно можно
/// включать/выключать); битый манифест даёт ошибку `Parse`.
pub fn load_mod(mod_dir: &Path) -> Result<Mod> {
    let dir_name = mod_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| SyncError::ModNotFound(mod_dir.display().to_string()))?;

    let manifest_path = mod_dir.join(MANIFEST_FILE);
    if !manifest_path.is_file() {
        return Ok(Mod {
            install_directory_name: dir_name,
            ..Default::default()
        });
    }

    mod_from_manifest(manifest::read_manifest(&manifest_path)?, &dir_name)
}

/// Все моды в директории. Моды с битым манифестом пропускаются.
pub fn list_mods(dir: &Path) -> Result<Vec<Mod>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut mods = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }

        match load_mod(&entry.path()) {
            Ok(m) => mods.push(m),
            Err(e) => log::warn!("Skipping mod {}: {}", entry.path().display(), e),
        }
    }

    mods.sort_by(|a, b| a.install_directory_name.cmp(&b.install_directory_name));
    Ok(mods)
}

// ============================================================================
// Dependency checker
// ============================================================================

/// Результат проверки зависимостей
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyReport {
    pub ok: bool,
    /// UniqueID обязательных зависимостей, которых нет среди включённых модов
    pub missing: Vec<String>,
}

/// Проверяет, что все обязательные зависимости мода включены.
/// Зависимости без UniqueID не проверяются.
pub fn check_dependencies(target: &Mod, enabled: &[Mod]) -> DependencyReport {
    let missing: Vec<String> = target
        .dependencies
        .iter()
        .filter(|dep| dep.is_required && !dep.unique_id.is_empty())
        .filter(|dep| !enabled.iter().any(|m| m.matches_id(&dep.unique_id)))
        .map(|dep| dep.unique_id.clone())
        .collect();

    if !missing.is_empty() {
        log::warn!(
            "Missing dependencies for mod '{}': {}",
            target.name,
            missing.join(", ")
        );
    }

    DependencyReport {
        ok: missing.is_empty(),
        missing,
    }
}
