//! HTTP-клиент сервера модпаков
//!
//! Все методы возвращают `ApiResponse` для любого HTTP-статуса: решение о том,
//! что делать с 404 или 500, принимает вызывающий код. Ошибкой считается
//! только сбой транспорта (DNS, таймаут, обрыв соединения).

use crate::error::{SyncError, Result};
use crate::settings::SyncSettings;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;

/// Ответ сервера
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    /// Тело как JSON; `Value::Null`, если это не JSON
    pub body: Value,
    pub raw: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, raw: Vec<u8>) -> Self {
        let body = serde_json::from_slice(&raw).unwrap_or(Value::Null);
        Self { status, body, raw }
    }

    pub fn json(status: u16, body: Value) -> Self {
        let raw = serde_json::to_vec(&body).unwrap_or_default();
        Self { status, body, raw }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Ошибка API с описанием операции
    pub fn error(&self, operation: &str) -> SyncError {
        let detail = self
            .body
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| String::from_utf8_lossy(&self.raw).chars().take(200).collect());
        SyncError::ApiError(format!("{} failed with HTTP {}: {}", operation, self.status, detail))
    }
}

/// Удалённое хранилище модпаков
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// POST `/createModpackDirectory/{uuid}/{token}`
    async fn create_modpack(&self, uuid: &str, token: &str) -> Result<ApiResponse>;

    /// POST `/uploadFile/{uuid}/{path}` (заголовок `token`, multipart-поле `file`)
    async fn upload_file(&self, uuid: &str, token: &str, path: &str, data: Vec<u8>) -> Result<ApiResponse>;

    /// GET `/getModpackInfo/{uuid}`
    async fn get_modpack_info(&self, uuid: &str) -> Result<ApiResponse>;

    /// GET `/getModpackHashMap/{uuid}`
    async fn get_hash_map(&self, uuid: &str) -> Result<ApiResponse>;

    /// GET `/getModpackFile/{uuid}/{path}`
    async fn download_file(&self, uuid: &str, path: &str) -> Result<ApiResponse>;

    /// DELETE `/removeModpackFile/{uuid}/{path}`
    async fn delete_file(&self, uuid: &str, token: &str, path: &str) -> Result<ApiResponse>;

    /// DELETE `/removeModpack/{uuid}`
    async fn delete_modpack(&self, uuid: &str, token: &str) -> Result<ApiResponse>;

    /// POST `/isOwner/{uuid}`. Любая ошибка означает «не владелец».
    async fn is_owner(&self, uuid: &str, token: &str) -> bool;
}

/// Относительный путь для URL: каждый сегмент кодируется отдельно
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| urlencoding::encode(s).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Реализация `RemoteStore` поверх reqwest
#[derive(Debug, Clone)]
pub struct SyncClient {
    client: Client,
    base_url: String,
    ownership_timeout: Duration,
}

impl SyncClient {
    pub fn new(settings: &SyncSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::USER_AGENT)
            .timeout(settings.transfer_timeout())
            .connect_timeout(settings.connect_timeout())
            .pool_max_idle_per_host(settings.effective_max_connections())
            .build()
            .map_err(|e| SyncError::ApiError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.base_url().to_string(),
            ownership_timeout: settings.ownership_timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str, uuid: &str, path: Option<&str>) -> String {
        let mut url = format!("{}/{}/{}", self.base_url, endpoint, urlencoding::encode(uuid));
        if let Some(path) = path {
            url.push('/');
            url.push_str(&encode_path(path));
        }
        url
    }

    async fn send(request: RequestBuilder) -> Result<ApiResponse> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let raw = response.bytes().await?.to_vec();
        Ok(ApiResponse::new(status, raw))
    }
}

#[async_trait]
impl RemoteStore for SyncClient {
    async fn create_modpack(&self, uuid: &str, token: &str) -> Result<ApiResponse> {
        let url = format!("{}/{}", self.url("createModpackDirectory", uuid, None), urlencoding::encode(token));
        log::debug!("Creating remote modpack {}", uuid);
        Self::send(self.client.post(url)).await
    }

    async fn upload_file(&self, uuid: &str, token: &str, path: &str, data: Vec<u8>) -> Result<ApiResponse> {
        let file_name = path.rsplit('/').next().unwrap_or(path).to_string();
        let part = reqwest::multipart::Part::bytes(data).file_name(file_name);
        let form = reqwest::multipart::Form::new().part("file", part);

        let request = self
            .client
            .post(self.url("uploadFile", uuid, Some(path)))
            .header("token", token)
            .multipart(form);
        Self::send(request).await
    }

    async fn get_modpack_info(&self, uuid: &str) -> Result<ApiResponse> {
        Self::send(self.client.get(self.url("getModpackInfo", uuid, None))).await
    }

    async fn get_hash_map(&self, uuid: &str) -> Result<ApiResponse> {
        Self::send(self.client.get(self.url("getModpackHashMap", uuid, None))).await
    }

    async fn download_file(&self, uuid: &str, path: &str) -> Result<ApiResponse> {
        Self::send(self.client.get(self.url("getModpackFile", uuid, Some(path)))).await
    }

    async fn delete_file(&self, uuid: &str, token: &str, path: &str) -> Result<ApiResponse> {
        let request = self
            .client
            .delete(self.url("removeModpackFile", uuid, Some(path)))
            .header("token", token);
        Self::send(request).await
    }

    async fn delete_modpack(&self, uuid: &str, token: &str) -> Result<ApiResponse> {
        let request = self
            .client
            .delete(self.url("removeModpack", uuid, None))
            .header("token", token);
        Self::send(request).await
    }

    async fn is_owner(&self, uuid: &str, token: &str) -> bool {
        let request = self
            .client
            .post(self.url("isOwner", uuid, None))
            .timeout(self.ownership_timeout)
            .json(&serde_json::json!({ "token": token }));

        match Self::send(request).await {
            Ok(response) => response.is_ok() || response.body.get("code").and_then(Value::as_i64) == Some(-1),
            Err(e) => {
                log::warn!("Ownership check for {} failed: {}", uuid, e);
                false
            }
        }
    }
}
