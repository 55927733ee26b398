//! Сервер модпаков в памяти для тестов синхронизации

use super::client::{ApiResponse, RemoteStore};
use crate::error::{SyncError, Result};
use crate::file_index::Digest;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct RemotePackage {
    token: String,
    files: BTreeMap<String, Vec<u8>>,
}

#[derive(Debug, Default)]
pub struct MemoryRemote {
    packages: Mutex<HashMap<String, RemotePackage>>,
    failing_paths: Mutex<HashSet<String>>,
    uploads: AtomicUsize,
    downloads: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Запросы к этому пути будут отвечать 500
    pub fn fail_path(&self, path: &str) {
        self.failing_paths.lock().unwrap().insert(path.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing_paths.lock().unwrap().clear();
    }

    pub fn file(&self, uuid: &str, path: &str) -> Option<Vec<u8>> {
        self.packages
            .lock()
            .unwrap()
            .get(uuid)
            .and_then(|p| p.files.get(path).cloned())
    }

    pub fn paths(&self, uuid: &str) -> Vec<String> {
        self.packages
            .lock()
            .unwrap()
            .get(uuid)
            .map(|p| p.files.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Прямая запись (как будто файл загрузил другой клиент)
    pub fn put(&self, uuid: &str, path: &str, data: &[u8]) {
        self.packages
            .lock()
            .unwrap()
            .entry(uuid.to_string())
            .or_default()
            .files
            .insert(path.to_string(), data.to_vec());
    }

    pub fn remove(&self, uuid: &str, path: &str) {
        if let Some(p) = self.packages.lock().unwrap().get_mut(uuid) {
            p.files.remove(path);
        }
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn reset_counters(&self) {
        self.uploads.store(0, Ordering::SeqCst);
        self.downloads.store(0, Ordering::SeqCst);
        self.deletes.store(0, Ordering::SeqCst);
    }

    fn is_failing(&self, path: &str) -> bool {
        self.failing_paths.lock().unwrap().contains(path)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, RemotePackage>>> {
        self.packages
            .lock()
            .map_err(|_| SyncError::ApiError("memory remote poisoned".into()))
    }
}

fn not_found() -> ApiResponse {
    ApiResponse::json(404, json!({"message": "not found"}))
}

fn unauthorized() -> ApiResponse {
    ApiResponse::json(401, json!({"message": "invalid token"}))
}

fn server_error() -> ApiResponse {
    ApiResponse::json(500, json!({"message": "injected failure"}))
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn create_modpack(&self, uuid: &str, token: &str) -> Result<ApiResponse> {
        let mut packages = self.lock()?;
        if packages.contains_key(uuid) {
            return Ok(ApiResponse::json(409, json!({"message": "exists"})));
        }
        packages.insert(
            uuid.to_string(),
            RemotePackage {
                token: token.to_string(),
                files: BTreeMap::new(),
            },
        );
        Ok(ApiResponse::json(201, json!({"uuid": uuid})))
    }

    async fn upload_file(&self, uuid: &str, token: &str, path: &str, data: Vec<u8>) -> Result<ApiResponse> {
        if self.is_failing(path) {
            return Ok(server_error());
        }
        let mut packages = self.lock()?;
        let Some(package) = packages.get_mut(uuid) else {
            return Ok(not_found());
        };
        if package.token != token {
            return Ok(unauthorized());
        }
        package.files.insert(path.to_string(), data);
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(ApiResponse::json(200, json!({"code": 0})))
    }

    async fn get_modpack_info(&self, uuid: &str) -> Result<ApiResponse> {
        let packages = self.lock()?;
        let Some(package) = packages.get(uuid) else {
            return Ok(not_found());
        };

        let mut info = package
            .files
            .get("modpack.json")
            .and_then(|raw| serde_json::from_slice::<Map<String, Value>>(raw).ok())
            .unwrap_or_default();
        info.remove("token");
        info.insert("uuid".into(), Value::String(uuid.to_string()));
        Ok(ApiResponse::json(200, Value::Object(info)))
    }

    async fn get_hash_map(&self, uuid: &str) -> Result<ApiResponse> {
        let packages = self.lock()?;
        let Some(package) = packages.get(uuid) else {
            return Ok(not_found());
        };

        let map: Map<String, Value> = package
            .files
            .iter()
            .map(|(path, data)| (path.clone(), Value::String(Digest::from_bytes(data).to_hex())))
            .collect();
        Ok(ApiResponse::json(200, Value::Object(map)))
    }

    async fn download_file(&self, uuid: &str, path: &str) -> Result<ApiResponse> {
        if self.is_failing(path) {
            return Ok(server_error());
        }
        let packages = self.lock()?;
        match packages.get(uuid).and_then(|p| p.files.get(path)) {
            Some(data) => {
                self.downloads.fetch_add(1, Ordering::SeqCst);
                Ok(ApiResponse::new(200, data.clone()))
            }
            None => Ok(not_found()),
        }
    }

    async fn delete_file(&self, uuid: &str, token: &str, path: &str) -> Result<ApiResponse> {
        if self.is_failing(path) {
            return Ok(server_error());
        }
        let mut packages = self.lock()?;
        let Some(package) = packages.get_mut(uuid) else {
            return Ok(not_found());
        };
        if package.token != token {
            return Ok(unauthorized());
        }
        match package.files.remove(path) {
            Some(_) => {
                self.deletes.fetch_add(1, Ordering::SeqCst);
                Ok(ApiResponse::json(200, json!({"code": 0})))
            }
            None => Ok(not_found()),
        }
    }

    async fn delete_modpack(&self, uuid: &str, token: &str) -> Result<ApiResponse> {
        let mut packages = self.lock()?;
        match packages.get(uuid) {
            Some(p) if p.token == token => {
                packages.remove(uuid);
                Ok(ApiResponse::json(200, json!({"code": 0})))
            }
            Some(_) => Ok(unauthorized()),
            None => Ok(not_found()),
        }
    }

    async fn is_owner(&self, uuid: &str, token: &str) -> bool {
        self.lock()
            .map(|p| p.get(uuid).map(|p| p.token == token).unwrap_or(false))
            .unwrap_or(false)
    }
}
