//! Установка модов из архивов в `mods_enabled` модпака
//!
//! 1. распаковка во временную папку `<staging>/<uuid>/`;
//! 2. переименование папок снизу вверх (запрещённые символы и пробелы → `_`);
//! 3. поиск корней модов (папки, где лежит `manifest.json`);
//! 4. перенос корней в целевую папку, существующие не перезаписываются.
//!
//! Временная папка удаляется всегда, в том числе после ошибки распаковки.

use super::extract::{self, ArchiveFormat};
use crate::error::{SyncError, Result};
use crate::manifest::MANIFEST_FILE;
use crate::utils;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Символы, недопустимые в именах папок (плюс пробел)
const RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*', ' '];

/// Итог установки одного архива
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReport {
    /// Папки модов, перенесённые в целевую директорию
    pub installed: Vec<String>,
    /// Папки, которые уже были установлены и остались нетронутыми
    pub already_installed: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ArchiveInstaller {
    staging_root: PathBuf,
}

impl ArchiveInstaller {
    pub fn new(staging_root: impl Into<PathBuf>) -> Self {
        Self {
            staging_root: staging_root.into(),
        }
    }

    /// Устанавливает архив в `target_dir` (обычно `mods_enabled`)
    pub async fn install(&self, archive: &Path, target_dir: &Path) -> Result<InstallReport> {
        let staging_root = self.staging_root.clone();
        let archive = archive.to_path_buf();
        let target_dir = target_dir.to_path_buf();

        tokio::task::spawn_blocking(move || install_blocking(&staging_root, &archive, &target_dir))
            .await?
    }
}

fn install_blocking(staging_root: &Path, archive: &Path, target_dir: &Path) -> Result<InstallReport> {
    let format = ArchiveFormat::detect(archive)?;
    let staging = staging_root.join(utils::gen_uuid());

    log::info!("Installing {} into {}", archive.display(), target_dir.display());
    let result = stage_and_move(format, archive, &staging, target_dir);

    if staging.exists() {
        if let Err(e) = fs::remove_dir_all(&staging) {
            log::warn!("Failed to remove staging dir {}: {}", staging.display(), e);
        }
    }

    match &result {
        Ok(report) => log::info!(
            "Installed {} mods from {} ({} already installed)",
            report.installed.len(),
            archive.display(),
            report.already_installed.len()
        ),
        Err(e) => log::error!("Failed to install {}: {}", archive.display(), e),
    }
    result
}

fn stage_and_move(
    format: ArchiveFormat,
    archive: &Path,
    staging: &Path,
    target_dir: &Path,
) -> Result<InstallReport> {
    extract::extract(archive, staging)?;
    sanitize_tree(staging)?;

    let archive_name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut fallback_name = sanitize_name(format.stem(&archive_name));
    if fallback_name.is_empty() {
        fallback_name = format!("mod_{}", utils::gen_uuid());
    }

    let roots = find_mod_roots(staging, &fallback_name)?;
    if roots.is_empty() {
        log::warn!("No {} found in {}", MANIFEST_FILE, archive.display());
    }
    check_unique_folders(&roots)?;

    fs::create_dir_all(target_dir)?;
    let mut report = InstallReport::default();

    for (source, folder) in roots {
        let destination = target_dir.join(&folder);
        if destination.exists() {
            log::info!("Mod '{}' is already installed, skipping", folder);
            report.already_installed.push(folder);
            continue;
        }

        utils::move_dir(&source, &destination)?;
        report.installed.push(folder);
    }

    Ok(report)
}

/// Два корня из разных папок архива могут получить одно имя
fn check_unique_folders(roots: &[(PathBuf, String)]) -> Result<()> {
    let mut seen = HashSet::new();
    for (_, folder) in roots {
        if !seen.insert(folder.as_str()) {
            return Err(SyncError::FileCollision(format!(
                "archive contains more than one mod folder named '{}'",
                folder
            )));
        }
    }
    Ok(())
}

/// Заменяет зарезервированные символы и пробелы на `_`
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if RESERVED_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Переименовывает все вложенные папки снизу вверх.
/// Переименование поверх существующей соседней папки даёт `FileCollision`.
pub fn sanitize_tree(dir: &Path) -> Result<()> {
    let mut children: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.path())
        .collect();
    children.sort();

    for child in children {
        sanitize_tree(&child)?;

        let Some(name) = child.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let clean = sanitize_name(&name);
        if clean == name {
            continue;
        }

        let renamed = dir.join(&clean);
        if renamed.exists() {
            return Err(SyncError::FileCollision(format!(
                "'{}' conflicts with existing '{}'",
                name, clean
            )));
        }
        fs::rename(&child, &renamed)?;
    }

    Ok(())
}

/// Верхние папки с `manifest.json`.
///
/// Манифесты внутри уже найденного мода отдельными модами не считаются.
/// Если манифест лежит прямо в корне распаковки, мод называется по архиву.
pub fn find_mod_roots(staging: &Path, fallback_name: &str) -> Result<Vec<(PathBuf, String)>> {
    if staging.join(MANIFEST_FILE).is_file() {
        return Ok(vec![(staging.to_path_buf(), fallback_name.to_string())]);
    }

    let mut roots = Vec::new();
    collect_roots(staging, &mut roots)?;
    Ok(roots)
}

fn collect_roots(dir: &Path, roots: &mut Vec<(PathBuf, String)>) -> Result<()> {
    let mut children: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.path())
        .collect();
    children.sort();

    for child in children {
        if child.join(MANIFEST_FILE).is_file() {
            let name = child
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            roots.push((child, name));
        } else {
            collect_roots(&child, roots)?;
        }
    }

    Ok(())
}
