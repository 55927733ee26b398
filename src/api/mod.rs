pub mod client;

#[cfg(test)]
pub mod memory;

pub use client::{ApiResponse, RemoteStore, SyncClient};
