//! Сравнение локального и удалённого индексов

use crate::file_index::{FileIndex, SNAPSHOT_FILE};
use crate::modpacks::DESCRIPTOR_FILE;
use std::collections::BTreeSet;

/// Служебные файлы ОС: не синхронизируются ни в одну сторону
pub const RESERVED_MARKERS: &[&str] = &["desktop.ini", ".ds_store", "thumbs.db"];

/// Путь оканчивается служебным файлом ОС (без учёта регистра)
pub fn is_reserved_marker(path: &str) -> bool {
    let lower = path.to_lowercase();
    RESERVED_MARKERS.iter().any(|marker| lower.ends_with(marker))
}

/// Путь, который вообще не участвует в сравнении
fn is_excluded(path: &str) -> bool {
    path == SNAPSHOT_FILE || is_reserved_marker(path)
}

fn reserved_markers(a: &FileIndex, b: &FileIndex) -> BTreeSet<String> {
    a.iter()
        .chain(b.iter())
        .map(|(path, _)| path)
        .filter(|path| is_reserved_marker(path))
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadPlan {
    pub to_upload: BTreeSet<String>,
    pub to_delete_remote: BTreeSet<String>,
    /// Служебные файлы ОС с любой стороны, оставленные как есть
    pub ignored: BTreeSet<String>,
}

impl UploadPlan {
    pub fn is_empty(&self) -> bool {
        self.to_upload.is_empty() && self.to_delete_remote.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadPlan {
    pub to_download: BTreeSet<String>,
    pub to_delete_local: BTreeSet<String>,
    /// Служебные файлы ОС с любой стороны, оставленные как есть
    pub ignored: BTreeSet<String>,
}

impl DownloadPlan {
    pub fn is_empty(&self) -> bool {
        self.to_download.is_empty() && self.to_delete_local.is_empty()
    }
}

/// Что загрузить и что удалить на сервере, чтобы он совпал с локальной копией
pub fn compute_upload(local: &FileIndex, remote: &FileIndex) -> UploadPlan {
    let to_upload = local
        .iter()
        .filter(|(path, _)| !is_excluded(path))
        .filter(|(path, digest)| remote.get(path) != Some(*digest))
        .map(|(path, _)| path.to_string())
        .collect();

    let to_delete_remote = remote
        .iter()
        .filter(|(path, _)| !is_excluded(path))
        .filter(|(path, _)| !local.contains(path))
        .map(|(path, _)| path.to_string())
        .collect();

    UploadPlan {
        to_upload,
        to_delete_remote,
        ignored: reserved_markers(local, remote),
    }
}

/// Что скачать и что удалить локально, чтобы копия совпала с сервером.
/// Дескриптор модпака локально никогда не удаляется.
pub fn compute_download(remote: &FileIndex, local: &FileIndex) -> DownloadPlan {
    let to_download = remote
        .iter()
        .filter(|(path, _)| !is_excluded(path))
        .filter(|(path, digest)| local.get(path) != Some(*digest))
        .map(|(path, _)| path.to_string())
        .collect();

    let to_delete_local = local
        .iter()
        .filter(|(path, _)| !is_excluded(path) && *path != DESCRIPTOR_FILE)
        .filter(|(path, _)| !remote.contains(path))
        .map(|(path, _)| path.to_string())
        .collect();

    DownloadPlan {
        to_download,
        to_delete_local,
        ignored: reserved_markers(remote, local),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_index::Digest;

    fn index(entries: &[(&str, &str)]) -> FileIndex {
        entries
            .iter()
            .map(|(path, data)| (path.to_string(), Digest::from_bytes(data.as_bytes())))
            .collect()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_upload_plan() {
        let local = index(&[("a", "1"), ("b", "2")]);
        let remote = index(&[("a", "1"), ("c", "3")]);

        let plan = compute_upload(&local, &remote);
        assert_eq!(plan.to_upload, set(&["b"]));
        assert_eq!(plan.to_delete_remote, set(&["c"]));
    }

    #[test]
    fn test_download_plan_is_mirror() {
        let remote = index(&[("a", "1"), ("b", "2")]);
        let local = index(&[("a", "1"), ("c", "3")]);

        let plan = compute_download(&remote, &local);
        assert_eq!(plan.to_download, set(&["b"]));
        assert_eq!(plan.to_delete_local, set(&["c"]));
    }

    #[test]
    fn test_changed_digest_transfers() {
        let local = index(&[("mods_enabled/A/config.json", "new")]);
        let remote = index(&[("mods_enabled/A/config.json", "old")]);

        assert_eq!(
            compute_upload(&local, &remote).to_upload,
            set(&["mods_enabled/A/config.json"])
        );
        assert_eq!(
            compute_download(&remote, &local).to_download,
            set(&["mods_enabled/A/config.json"])
        );
    }

    #[test]
    fn test_descriptor_never_deleted_locally() {
        let remote = index(&[]);
        let local = index(&[(DESCRIPTOR_FILE, "{}")]);
        assert!(compute_download(&remote, &local).is_empty());
        // при push дескриптор загружается как обычный файл
        assert_eq!(
            compute_upload(&local, &index(&[])).to_upload,
            set(&[DESCRIPTOR_FILE])
        );
    }

    #[test]
    fn test_markers_and_snapshot_excluded() {
        let local = index(&[
            ("mods_enabled/desktop.ini", "x"),
            ("saves/.DS_Store", "x"),
            ("Thumbs.db", "x"),
            (SNAPSHOT_FILE, "{}"),
        ]);
        let remote = index(&[("mods_enabled/Desktop.INI", "y"), (SNAPSHOT_FILE, "[]")]);

        let upload = compute_upload(&local, &remote);
        assert!(upload.is_empty());
        assert_eq!(
            upload.ignored,
            set(&[
                "Thumbs.db",
                "mods_enabled/Desktop.INI",
                "mods_enabled/desktop.ini",
                "saves/.DS_Store"
            ])
        );
        let download = compute_download(&remote, &local);
        assert!(download.is_empty());
        assert_eq!(download.ignored, upload.ignored);
    }

    #[test]
    fn test_identical_indexes_yield_nothing() {
        let both = index(&[("a", "1"), ("dir/b", "2")]);
        assert!(compute_upload(&both, &both).is_empty());
        assert!(compute_download(&both, &both).is_empty());
    }
}
