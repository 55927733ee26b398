// Модпаки: раскладка на диске, коллекция и установка модов из архивов

pub mod extract;
pub mod install;
pub mod library;
pub mod package;

pub use install::{ArchiveInstaller, InstallReport};
pub use library::{PackageEntry, PackageLibrary};
pub use package::{ModPackage, DESCRIPTOR_FILE, MODS_DISABLED_DIR, MODS_ENABLED_DIR, SAVES_DIR};
