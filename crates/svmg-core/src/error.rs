use serde::Serialize;
use thiserror::Error;

use crate::i18n::Language;

/// Информация об ошибке с подсказкой для восстановления
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    /// Код ошибки для идентификации
    pub code: String,
    /// Человекочитаемое сообщение
    pub message: String,
    /// Подсказка для исправления
    pub recovery_hint: Option<String>,
    /// Технические детали (для логов)
    pub details: Option<String>,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            recovery_hint: None,
            details: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.recovery_hint = Some(hint.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Manifest or descriptor still invalid after the repair pass
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Archive extraction error: {0}")]
    Archive(String),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Unsupported archive format: {0}")]
    UnsupportedArchive(String),

    #[error("File collision: {0}")]
    FileCollision(String),

    #[error("Modpack not found: {0}")]
    PackageNotFound(String),

    #[error("Mod not found: {0}")]
    ModNotFound(String),

    #[error("File hash mismatch for {path}: expected {expected}, got {actual}")]
    HashMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Join error: {0}")]
    Join(String),
}

impl SyncError {
    /// Информация об ошибке с подсказкой (английский по умолчанию)
    pub fn to_error_info(&self) -> ErrorInfo {
        self.localized_error_info(Language::English)
    }

    /// Возвращает локализованную информацию об ошибке
    pub fn localized_error_info(&self, lang: Language) -> ErrorInfo {
        match self {
            SyncError::Io(e) => {
                let kind = e.kind();
                match lang {
                    Language::English => {
                        let hint = match kind {
                            std::io::ErrorKind::PermissionDenied => {
                                "Check access permissions to the modpacks folder"
                            }
                            std::io::ErrorKind::NotFound => {
                                "File or folder not found. Try syncing the modpack again"
                            }
                            _ => "Ensure the modpack folder is accessible and not locked by another process",
                        };
                        ErrorInfo::new("IO_ERROR", format!("Filesystem error: {}", kind))
                            .with_hint(hint)
                            .with_details(e.to_string())
                    }
                    Language::Portuguese => {
                        let hint = match kind {
                            std::io::ErrorKind::PermissionDenied => {
                                "Verifique as permissões da pasta de modpacks"
                            }
                            std::io::ErrorKind::NotFound => {
                                "Arquivo ou pasta não encontrado. Tente sincronizar a modpack novamente"
                            }
                            _ => "Verifique se a pasta da modpack está acessível e não está em uso",
                        };
                        ErrorInfo::new("IO_ERROR", format!("Erro de sistema de arquivos: {}", kind))
                            .with_hint(hint)
                            .with_details(e.to_string())
                    }
                }
            }
            SyncError::Http(e) => {
                let status = e.status().map(|s| s.as_u16());
                match lang {
                    Language::English => {
                        let (message, hint) = if e.is_timeout() {
                            ("Server timeout", "Check your internet connection and try again")
                        } else if e.is_connect() {
                            ("Failed to connect to sync server", "The sync server might be temporarily unavailable")
                        } else if status == Some(404) {
                            ("Resource not found", "The modpack may have been removed from the server")
                        } else {
                            ("Network error", "Check your internet connection")
                        };
                        ErrorInfo::new("HTTP_ERROR", message)
                            .with_hint(hint)
                            .with_details(e.to_string())
                    }
                    Language::Portuguese => {
                        let (message, hint) = if e.is_timeout() {
                            ("Tempo esgotado", "Verifique sua conexão e tente novamente")
                        } else if e.is_connect() {
                            ("Falha ao conectar ao servidor", "O servidor de sincronização pode estar indisponível")
                        } else if status == Some(404) {
                            ("Recurso não encontrado", "A modpack pode ter sido removida do servidor")
                        } else {
                            ("Erro de rede", "Verifique sua conexão com a internet")
                        };
                        ErrorInfo::new("HTTP_ERROR", message)
                            .with_hint(hint)
                            .with_details(e.to_string())
                    }
                }
            }
            SyncError::Json(e) => match lang {
                Language::English => ErrorInfo::new("JSON_ERROR", "Data processing error")
                    .with_details(e.to_string()),
                Language::Portuguese => ErrorInfo::new("JSON_ERROR", "Erro ao processar dados")
                    .with_details(e.to_string()),
            },
            SyncError::Parse(msg) => match lang {
                Language::English => ErrorInfo::new("PARSE_ERROR", "Corrupt manifest")
                    .with_hint("The file could not be repaired automatically. Fix it by hand or reinstall the mod")
                    .with_details(msg.clone()),
                Language::Portuguese => ErrorInfo::new("PARSE_ERROR", "Manifesto corrompido")
                    .with_hint("O arquivo não pôde ser reparado automaticamente. Corrija-o ou reinstale o mod")
                    .with_details(msg.clone()),
            },
            SyncError::Archive(msg) => match lang {
                Language::English => ErrorInfo::new("ARCHIVE_ERROR", "Archive extraction error")
                    .with_hint("The archive may be corrupted. Try downloading it again")
                    .with_details(msg.clone()),
                Language::Portuguese => ErrorInfo::new("ARCHIVE_ERROR", "Erro ao extrair arquivo")
                    .with_hint("O arquivo pode estar corrompido. Tente baixá-lo novamente")
                    .with_details(msg.clone()),
            },
            SyncError::Zip(e) => match lang {
                Language::English => ErrorInfo::new("ZIP_ERROR", "ZIP archive error")
                    .with_hint("The archive may be corrupted. Try downloading it again")
                    .with_details(e.to_string()),
                Language::Portuguese => ErrorInfo::new("ZIP_ERROR", "Erro no arquivo ZIP")
                    .with_hint("O arquivo pode estar corrompido. Tente baixá-lo novamente")
                    .with_details(e.to_string()),
            },
            SyncError::UnsupportedArchive(name) => match lang {
                Language::English => ErrorInfo::new("UNSUPPORTED_ARCHIVE", "Unsupported archive format")
                    .with_hint("Supported formats: .zip, .rar, .tar.gz, .tar.zst")
                    .with_details(name.clone()),
                Language::Portuguese => ErrorInfo::new("UNSUPPORTED_ARCHIVE", "Formato de arquivo não suportado")
                    .with_hint("Formatos suportados: .zip, .rar, .tar.gz, .tar.zst")
                    .with_details(name.clone()),
            },
            SyncError::FileCollision(path) => match lang {
                Language::English => ErrorInfo::new("FILE_COLLISION", "A file or folder with this name already exists")
                    .with_details(path.clone()),
                Language::Portuguese => ErrorInfo::new("FILE_COLLISION", "Já existe um arquivo ou pasta com este nome")
                    .with_details(path.clone()),
            },
            SyncError::PackageNotFound(id) => match lang {
                Language::English => ErrorInfo::new("MODPACK_NOT_FOUND", format!("Modpack '{}' not found", id))
                    .with_hint("The modpack may have been deleted. Refresh the modpack list"),
                Language::Portuguese => ErrorInfo::new("MODPACK_NOT_FOUND", format!("Modpack '{}' não encontrada", id))
                    .with_hint("A modpack pode ter sido removida. Atualize a lista de modpacks"),
            },
            SyncError::ModNotFound(name) => match lang {
                Language::English => ErrorInfo::new("MOD_NOT_FOUND", format!("Mod '{}' not found", name)),
                Language::Portuguese => ErrorInfo::new("MOD_NOT_FOUND", format!("Mod '{}' não encontrado", name)),
            },
            SyncError::HashMismatch {
                path,
                expected,
                actual,
            } => match lang {
                Language::English => ErrorInfo::new("HASH_MISMATCH", "File hash mismatch")
                    .with_hint("The file will be downloaded again on the next sync")
                    .with_details(format!("{}: expected {}, got {}", path, expected, actual)),
                Language::Portuguese => ErrorInfo::new("HASH_MISMATCH", "Hash do arquivo não confere")
                    .with_hint("O arquivo será baixado novamente na próxima sincronização")
                    .with_details(format!("{}: esperado {}, obtido {}", path, expected, actual)),
            },
            SyncError::InvalidConfig(msg) => match lang {
                Language::English => ErrorInfo::new("INVALID_CONFIG", "Invalid configuration")
                    .with_hint("Check settings.json")
                    .with_details(msg.clone()),
                Language::Portuguese => ErrorInfo::new("INVALID_CONFIG", "Configuração inválida")
                    .with_hint("Verifique o settings.json")
                    .with_details(msg.clone()),
            },
            SyncError::ApiError(msg) => match lang {
                Language::English => ErrorInfo::new("API_ERROR", "Sync server error")
                    .with_hint("The service may be temporarily unavailable. Try again later")
                    .with_details(msg.clone()),
                Language::Portuguese => ErrorInfo::new("API_ERROR", "Erro no servidor de sincronização")
                    .with_hint("O serviço pode estar indisponível. Tente mais tarde")
                    .with_details(msg.clone()),
            },
            SyncError::Join(msg) => match lang {
                Language::English => ErrorInfo::new("TASK_ERROR", "Task execution error")
                    .with_details(msg.clone()),
                Language::Portuguese => ErrorInfo::new("TASK_ERROR", "Erro ao executar tarefa")
                    .with_details(msg.clone()),
            },
        }
    }
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(err: tokio::task::JoinError) -> Self {
        SyncError::Join(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl serde::Serialize for SyncError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        // Сериализуем как ErrorInfo для более полной информации
        self.to_error_info().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_info_codes() {
        let err = SyncError::UnsupportedArchive("mod.7z".into());
        let info = err.to_error_info();
        assert_eq!(info.code, "UNSUPPORTED_ARCHIVE");
        assert_eq!(info.details.as_deref(), Some("mod.7z"));

        let info = SyncError::ModNotFound("Automate".into()).localized_error_info(Language::Portuguese);
        assert_eq!(info.message, "Mod 'Automate' não encontrado");
    }

    #[test]
    fn test_io_hint_depends_on_kind() {
        let err = SyncError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let info = err.to_error_info();
        assert!(info.recovery_hint.unwrap().contains("not found"));
    }

    #[test]
    fn test_serialize_as_error_info() {
        let err = SyncError::PackageNotFound("abc".into());
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["code"], "MODPACK_NOT_FOUND");
    }
}
