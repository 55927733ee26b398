//! Распаковка архивов модов по расширению файла

use crate::error::{SyncError, Result};
use std::fs::File;
use std::path::Path;
use std::process::Command;

/// Поддерживаемые форматы архивов
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
    TarZst,
    /// Через внешний `unrar`
    Rar,
}

impl ArchiveFormat {
    /// Формат по имени файла (без учёта регистра)
    pub fn detect(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if name.ends_with(".zip") {
            Ok(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Ok(Self::TarGz)
        } else if name.ends_with(".tar.zst") {
            Ok(Self::TarZst)
        } else if name.ends_with(".rar") {
            Ok(Self::Rar)
        } else {
            Err(SyncError::UnsupportedArchive(path.display().to_string()))
        }
    }

    /// Имя архива без расширения формата
    pub fn stem<'a>(&self, file_name: &'a str) -> &'a str {
        let suffix_len = match self {
            Self::Zip => 4,
            Self::TarGz if file_name.to_lowercase().ends_with(".tgz") => 4,
            Self::TarGz => 7,
            Self::TarZst => 8,
            Self::Rar => 4,
        };
        file_name
            .get(..file_name.len().saturating_sub(suffix_len))
            .unwrap_or(file_name)
    }
}

/// Распаковывает архив в `dest` (синхронно)
pub fn extract(archive: &Path, dest: &Path) -> Result<ArchiveFormat> {
    let format = ArchiveFormat::detect(archive)?;
    std::fs::create_dir_all(dest)?;

    match format {
        ArchiveFormat::Zip => extract_zip(archive, dest)?,
        ArchiveFormat::TarGz => {
            let gz = flate2::read::GzDecoder::new(File::open(archive)?);
            unpack_tar(tar::Archive::new(gz), dest)?;
        }
        ArchiveFormat::TarZst => {
            let decoder = zstd::stream::Decoder::new(File::open(archive)?)?;
            unpack_tar(tar::Archive::new(decoder), dest)?;
        }
        ArchiveFormat::Rar => extract_rar(archive, dest)?,
    }

    log::debug!("Extracted {} ({:?}) to {}", archive.display(), format, dest.display());
    Ok(format)
}

fn extract_zip(archive: &Path, dest: &Path) -> Result<()> {
    let mut zip = zip::ZipArchive::new(File::open(archive)?)?;

    for i in 0..zip.len() {
        let mut file = zip.by_index(i)?;
        let outpath = match file.enclosed_name() {
            Some(path) => dest.join(path),
            None => {
                log::warn!("Skipping unsafe zip entry: {}", file.name());
                continue;
            }
        };

        if file.is_dir() {
            std::fs::create_dir_all(&outpath)?;
        } else {
            if let Some(p) = outpath.parent() {
                std::fs::create_dir_all(p)?;
            }
            let mut outfile = File::create(&outpath)?;
            std::io::copy(&mut file, &mut outfile)?;
        }
    }

    Ok(())
}

fn unpack_tar<R: std::io::Read>(mut archive: tar::Archive<R>, dest: &Path) -> Result<()> {
    archive
        .unpack(dest)
        .map_err(|e| SyncError::Archive(format!("tar: {}", e)))
}

fn extract_rar(archive: &Path, dest: &Path) -> Result<()> {
    // unrar ожидает каталог назначения с завершающим разделителем
    let mut target = dest.as_os_str().to_owned();
    target.push(std::path::MAIN_SEPARATOR_STR);

    let output = Command::new("unrar")
        .arg("x")
        .arg("-o+")
        .arg("-y")
        .arg(archive)
        .arg(&target)
        .output()
        .map_err(|e| SyncError::Archive(format!("Failed to run unrar: {}", e)))?;

    if !output.status.success() {
        return Err(SyncError::Archive(format!(
            "unrar exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, files: &[(&str, &str)]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, content) in files {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_detect_formats() {
        assert_eq!(ArchiveFormat::detect(Path::new("a.ZIP")).unwrap(), ArchiveFormat::Zip);
        assert_eq!(ArchiveFormat::detect(Path::new("a.tar.gz")).unwrap(), ArchiveFormat::TarGz);
        assert_eq!(ArchiveFormat::detect(Path::new("a.tgz")).unwrap(), ArchiveFormat::TarGz);
        assert_eq!(ArchiveFormat::detect(Path::new("a.tar.zst")).unwrap(), ArchiveFormat::TarZst);
        assert_eq!(ArchiveFormat::detect(Path::new("a.rar")).unwrap(), ArchiveFormat::Rar);
        assert!(matches!(
            ArchiveFormat::detect(Path::new("a.7z")).unwrap_err(),
            SyncError::UnsupportedArchive(_)
        ));
    }

    #[test]
    fn test_stem() {
        assert_eq!(ArchiveFormat::Zip.stem("Better Ranching.zip"), "Better Ranching");
        assert_eq!(ArchiveFormat::TarGz.stem("pack.tar.gz"), "pack");
        assert_eq!(ArchiveFormat::TarGz.stem("pack.tgz"), "pack");
        assert_eq!(ArchiveFormat::TarZst.stem("pack.tar.zst"), "pack");
    }

    #[test]
    fn test_extract_zip_nested() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("mod.zip");
        write_zip(&archive, &[("Mod/manifest.json", "{}"), ("Mod/assets/a.png", "png")]);

        let dest = dir.path().join("out");
        assert_eq!(extract(&archive, &dest).unwrap(), ArchiveFormat::Zip);
        assert!(dest.join("Mod/manifest.json").is_file());
        assert!(dest.join("Mod/assets/a.png").is_file());
    }

    #[test]
    fn test_extract_tar_gz() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("mod.tar.gz");
        {
            let gz = flate2::write::GzEncoder::new(
                File::create(&archive).unwrap(),
                flate2::Compression::default(),
            );
            let mut builder = tar::Builder::new(gz);
            let data = b"{\"Name\": \"T\"}";
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, "TarMod/manifest.json", &data[..])
                .unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        let dest = dir.path().join("out");
        extract(&archive, &dest).unwrap();
        assert!(dest.join("TarMod/manifest.json").is_file());
    }

    #[test]
    fn test_extract_tar_zst() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("Backup.tar.zst");
        {
            let zst = zstd::stream::Encoder::new(File::create(&archive).unwrap(), 3).unwrap();
            let mut builder = tar::Builder::new(zst);
            let data = b"{\"Name\": \"Z\"}";
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, "ZstMod/manifest.json", &data[..])
                .unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        let dest = dir.path().join("out");
        assert_eq!(extract(&archive, &dest).unwrap(), ArchiveFormat::TarZst);
        assert_eq!(
            std::fs::read_to_string(dest.join("ZstMod/manifest.json")).unwrap(),
            r#"{"Name": "Z"}"#
        );
    }

    #[test]
    fn test_corrupt_zip_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.zip");
        std::fs::write(&archive, b"definitely not a zip").unwrap();
        assert!(extract(&archive, &dir.path().join("out")).is_err());
    }
}
