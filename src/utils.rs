use crate::error::{SyncError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use std::path::Path;

/// Длина токена записи в байтах (до hex-кодирования)
pub const TOKEN_BYTES: usize = 64;

/// Случайный токен записи: 64 байта в hex (128 символов)
pub fn gen_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// UUID v4 без дефисов
pub fn gen_uuid() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Изображение в base64 для `modpack.json`
pub fn encode_image(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

pub fn decode_image(encoded: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(encoded.trim())
        .map_err(|e| SyncError::Parse(format!("Invalid image data: {}", e)))
}

/// Копирование директории рекурсивно
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;

    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());

        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}

/// Перемещение директории: `rename`, при ошибке (другой диск) копирование + удаление
pub fn move_dir(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }

    match std::fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) => {
            log::debug!(
                "rename {} -> {} failed ({}), falling back to copy",
                src.display(),
                dst.display(),
                e
            );
            copy_dir_recursive(src, dst)?;
            std::fs::remove_dir_all(src)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_and_uuid_shape() {
        let token = gen_token();
        assert_eq!(token.len(), TOKEN_BYTES * 2);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, gen_token());

        let uuid = gen_uuid();
        assert_eq!(uuid.len(), 32);
        assert!(!uuid.contains('-'));
    }

    #[test]
    fn test_image_base64() {
        let encoded = encode_image(&[0x89, b'P', b'N', b'G']);
        assert_eq!(decode_image(&encoded).unwrap(), vec![0x89, b'P', b'N', b'G']);
        assert!(decode_image("***").is_err());
    }

    #[test]
    fn test_move_dir() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("nested")).unwrap();
        std::fs::write(src.join("nested/file.txt"), "data").unwrap();

        let dst = dir.path().join("out/dst");
        move_dir(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(std::fs::read_to_string(dst.join("nested/file.txt")).unwrap(), "data");
    }
}
