//! Контентный индекс директории: относительный путь → дайджест содержимого
//!
//! Дайджест: XXH3-128 по содержимому файла, поэтому не зависит от порядка
//! обхода и от платформы. Пути всегда записываются через `/`, чтобы индексы
//! с Windows и Linux сравнивались напрямую.

use crate::error::{SyncError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;
use xxhash_rust::xxh3::Xxh3;

/// Снимок индекса, который хранится в корне модпака
pub const SNAPSHOT_FILE: &str = "hashmap.json";

const CHUNK_SIZE: usize = 64 * 1024;

/// 128-битный дайджест содержимого файла
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(u128);

impl Digest {
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(xxhash_rust::xxh3::xxh3_128(data))
    }

    pub fn to_hex(&self) -> String {
        format!("{:032x}", self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != 32 {
            return Err(SyncError::Parse(format!("Invalid digest length: {}", s)));
        }
        u128::from_str_radix(s, 16)
            .map(Self)
            .map_err(|e| SyncError::Parse(format!("Invalid digest '{}': {}", s, e)))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Дайджест одного файла (потоково, блоками по 64 KiB)
pub fn hash_of(path: &Path) -> Result<Digest> {
    let mut file = File::open(path)?;
    let mut hasher = Xxh3::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(Digest(hasher.digest128()))
}

/// Относительный путь с прямыми слешами
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Обратное преобразование: ключ индекса → путь на диске
pub fn local_path(root: &Path, key: &str) -> PathBuf {
    key.split('/')
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .fold(root.to_path_buf(), |acc, part| acc.join(part))
}

/// Индекс файлов директории
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileIndex {
    entries: BTreeMap<String, Digest>,
}

impl FileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Обходит дерево и считает дайджест каждого обычного файла.
    /// Снимок `hashmap.json` в корне в индекс не попадает.
    pub fn build(root: &Path) -> Result<Self> {
        let started = std::time::Instant::now();
        let mut entries = BTreeMap::new();

        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(key) = relative_key(root, entry.path()) else {
                continue;
            };
            if key == SNAPSHOT_FILE {
                continue;
            }

            entries.insert(key, hash_of(entry.path())?);
        }

        log::debug!(
            "Indexed {} files under {} in {:?}",
            entries.len(),
            root.display(),
            started.elapsed()
        );

        Ok(Self { entries })
    }

    /// `build` в blocking-пуле tokio
    pub async fn build_async(root: PathBuf) -> Result<Self> {
        tokio::task::spawn_blocking(move || Self::build(&root)).await?
    }

    /// Индекс из плоского JSON-объекта (ответ сервера)
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| SyncError::Parse(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| SyncError::Parse(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut ser)?;
        std::fs::write(path, out)?;
        Ok(())
    }

    pub fn insert(&mut self, path: impl Into<String>, digest: Digest) {
        self.entries.insert(path.into(), digest);
    }

    pub fn get(&self, path: &str) -> Option<Digest> {
        self.entries.get(path).copied()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Digest)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn without(mut self, path: &str) -> Self {
        self.entries.remove(path);
        self
    }
}

impl FromIterator<(String, Digest)> for FileIndex {
    fn from_iter<I: IntoIterator<Item = (String, Digest)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_digest_is_pure_function_of_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, b"same bytes").unwrap();
        fs::write(&b, b"same bytes").unwrap();

        assert_eq!(hash_of(&a).unwrap(), hash_of(&b).unwrap());
        assert_eq!(hash_of(&a).unwrap(), Digest::from_bytes(b"same bytes"));

        fs::write(&b, b"other bytes").unwrap();
        assert_ne!(hash_of(&a).unwrap(), hash_of(&b).unwrap());
    }

    #[test]
    fn test_streaming_matches_one_shot_for_large_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &data).unwrap();

        assert_eq!(hash_of(&path).unwrap(), Digest::from_bytes(&data));
    }

    #[test]
    fn test_build_uses_forward_slashes_and_skips_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("mods_enabled/ContentPatcher")).unwrap();
        fs::create_dir_all(root.join("saves")).unwrap();
        fs::write(root.join("mods_enabled/ContentPatcher/manifest.json"), b"{}").unwrap();
        fs::write(root.join("modpack.json"), b"{\"name\":\"x\"}").unwrap();
        fs::write(root.join(SNAPSHOT_FILE), b"{}").unwrap();

        let index = FileIndex::build(root).unwrap();
        let keys: Vec<&str> = index.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["mods_enabled/ContentPatcher/manifest.json", "modpack.json"]);
    }

    #[test]
    fn test_save_and_load_flat_object() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.txt"), b"a").unwrap();

        let index = FileIndex::build(root).unwrap();
        let snapshot = root.join(SNAPSHOT_FILE);
        index.save(&snapshot).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&snapshot).unwrap()).unwrap();
        assert_eq!(raw["a.txt"], Digest::from_bytes(b"a").to_hex());

        assert_eq!(FileIndex::load(&snapshot).unwrap(), index);
        // Снимок не попадает в повторный индекс
        assert_eq!(FileIndex::build(root).unwrap(), index);
    }

    #[test]
    fn test_from_json_rejects_bad_digest() {
        let err = FileIndex::from_json(serde_json::json!({"a.txt": "zz"})).unwrap_err();
        assert!(matches!(err, SyncError::Parse(_)));
    }

    #[test]
    fn test_local_path_ignores_traversal() {
        let root = Path::new("/packs/abc");
        assert_eq!(
            local_path(root, "mods_enabled/../../etc/passwd"),
            root.join("mods_enabled").join("etc").join("passwd")
        );
        assert_eq!(relative_key(root, &root.join("saves").join("a.sav")).unwrap(), "saves/a.sav");
    }
}
