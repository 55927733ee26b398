//! Content-addressed синхронизация модпаков с сервером
//!
//! - `diff`: сравнение индексов и план передач
//! - `scheduler`: ограниченный пул передач с прогрессом, таймаутом и отменой
//! - `coordinator`: push / pull поверх `RemoteStore`

pub mod coordinator;
pub mod diff;
pub mod scheduler;
mod types;

pub use coordinator::SyncCoordinator;
pub use diff::{compute_download, compute_upload, is_reserved_marker, DownloadPlan, UploadPlan};
pub use scheduler::TransferScheduler;
pub use types::*;
