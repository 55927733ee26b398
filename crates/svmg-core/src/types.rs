use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(t) => vec![t],
            OneOrMany::Many(v) => v,
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

// ============================================================================
// Modpack
// ============================================================================

fn default_version() -> String {
    "0.0.0".to_string()
}

/// Содержимое `modpack.json`
///
/// `uuid` и `token` назначаются один раз при создании и дальше только
/// читаются. Пустые строки означают, что дескриптор был записан без них
/// и идентичность нужно сгенерировать при загрузке.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    pub name: String,
    /// Миниатюра в base64
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub uuid: String,
    #[serde(default = "default_version")]
    pub version: String,
}

/// Краткая информация о модпаке для списков
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSummary {
    pub uuid: String,
    pub name: String,
    pub version: String,
    pub enabled_mods: usize,
    pub disabled_mods: usize,
}

// ============================================================================
// Mods
// ============================================================================

/// Объявленная зависимость мода
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModDependency {
    pub unique_id: String,
    pub is_required: bool,
}

/// Установленный мод, собранный из его `manifest.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mod {
    pub name: String,
    pub author: String,
    pub version: String,
    pub description: String,
    /// Идентичность для зависимостей (сравнивается без учёта регистра)
    pub unique_id: String,
    pub entry_point: String,
    pub minimum_api_version: String,
    pub update_keys: Vec<String>,
    pub dependencies: Vec<ModDependency>,
    /// Имя папки на диске, может отличаться от `name`
    pub install_directory_name: String,
}

impl Mod {
    /// Совпадает ли `unique_id` мода с переданным (без учёта регистра)
    pub fn matches_id(&self, unique_id: &str) -> bool {
        !self.unique_id.is_empty() && self.unique_id.eq_ignore_ascii_case(unique_id)
    }
}

// ============================================================================
// Sync
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    Push,
    Pull,
}

/// Текущая фаза синхронизации
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// Построение индексов и сравнение
    Mapping,
    /// Удаление файлов
    Deleting,
    /// Загрузка / скачивание файлов
    Transferring,
}

/// Событие прогресса push/pull
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    pub active: bool,
    /// 0..=100, округление вниз
    pub percent_complete: u8,
    pub phase: SyncPhase,
    pub done: bool,
}

impl SyncProgress {
    pub fn running(phase: SyncPhase, completed: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100
        } else {
            (completed.min(total) * 100 / total) as u8
        };
        Self {
            active: true,
            percent_complete: percent,
            phase,
            done: false,
        }
    }

    pub fn started(phase: SyncPhase) -> Self {
        Self {
            active: true,
            percent_complete: 0,
            phase,
            done: false,
        }
    }

    pub fn finished(phase: SyncPhase) -> Self {
        Self {
            active: false,
            percent_complete: 100,
            phase,
            done: true,
        }
    }
}
