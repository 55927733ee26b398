pub mod error;
pub mod i18n;
pub mod types;

// Re-export commonly used items
pub use error::{ErrorInfo, SyncError, Result};
pub use i18n::Language;
pub use types::{
    Mod, ModDependency, OneOrMany, PackageDescriptor, PackageSummary, SyncDirection, SyncPhase,
    SyncProgress,
};
