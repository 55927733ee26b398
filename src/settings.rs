use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use svmg_core::i18n::Language;

/// Жёсткий потолок параллельных передач
pub const LIMIT_CONNECTIONS: usize = 50;

pub const DEFAULT_SERVER_URL: &str = "http://svmgapi.marcosbrendon.com:3000";

/// Настройки синхронизации (`settings.json` в базовой директории)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncSettings {
    pub server_url: String,
    /// Одновременных передач, ограничено `LIMIT_CONNECTIONS`
    pub max_connections: usize,
    /// Таймаут одной передачи (секунды)
    pub transfer_timeout_secs: u64,
    /// Таймаут проверки владельца (секунды)
    pub ownership_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub language: Language,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            max_connections: 20,
            transfer_timeout_secs: 300,
            ownership_timeout_secs: 5,
            connect_timeout_secs: 10,
            language: Language::default(),
        }
    }
}

impl SyncSettings {
    /// Читает настройки. Отсутствующий или битый файл даёт значения по умолчанию.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };

        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Invalid settings file {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// `max_connections`, приведённое к 1..=LIMIT_CONNECTIONS
    pub fn effective_max_connections(&self) -> usize {
        self.max_connections.clamp(1, LIMIT_CONNECTIONS)
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs.max(1))
    }

    pub fn ownership_timeout(&self) -> Duration {
        Duration::from_secs(self.ownership_timeout_secs.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }

    /// URL сервера без завершающего `/`
    pub fn base_url(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }
}
