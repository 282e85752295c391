//! Storage client abstraction and implementations.
//!
//! This module provides one interface, [`BlobClient`], over several
//! storage backends:
//!
//! - **S3**: AWS S3 and S3-compatible services (MinIO, Ceph RGW, etc.)
//! - **Azure**: Azure Blob Storage
//! - **Kvpbase**: Kvpbase object storage servers
//! - **Komodo**: Komodo document indices
//! - **Filesystem**: Local filesystem storage
//! - **Memory**: In-memory storage (for testing)

mod azure;
mod client;
mod config;
pub mod enumeration;
mod filesystem;
mod komodo;
mod kvpbase;
mod memory;
mod object;
mod public_url;
mod rest;
mod s3;

pub use azure::AzureClient;
pub use client::BlobClient;
pub use config::{
    AzureSettings, BlobSettings, FilesystemSettings, KomodoSettings, KvpbaseSettings,
    MemorySettings, S3Settings,
};
pub use filesystem::FilesystemClient;
pub use komodo::{KomodoClient, KomodoDocument, KomodoEnumerateRequest, KomodoEnumerateResponse};
pub use kvpbase::{KvpbaseClient, KvpbaseListing, KvpbaseObject};
pub use memory::MemoryClient;
pub use s3::S3Client;

use crate::Result;
use std::sync::Arc;

/// Create a storage client from settings.
///
/// # Example
///
/// ```rust,ignore
/// use blobstore_core::storage::{create_client, BlobSettings};
///
/// let settings = BlobSettings::from_url("memory://")?;
/// let client = create_client(&settings)?;
/// ```
pub fn create_client(settings: &BlobSettings) -> Result<Arc<dyn BlobClient>> {
    match settings {
        BlobSettings::S3(s) => Ok(Arc::new(S3Client::new(s.clone())?)),
        BlobSettings::Azure(s) => Ok(Arc::new(AzureClient::new(s.clone())?)),
        BlobSettings::Kvpbase(s) => Ok(Arc::new(KvpbaseClient::new(s.clone())?)),
        BlobSettings::Komodo(s) => Ok(Arc::new(KomodoClient::new(s.clone())?)),
        BlobSettings::Filesystem(s) => Ok(Arc::new(FilesystemClient::new(s.clone()))),
        BlobSettings::Memory(s) => Ok(Arc::new(MemoryClient::with_settings(s.clone()))),
    }
}

/// Create a storage client straight from a storage URL.
///
/// Shorthand for [`BlobSettings::from_url`] followed by [`create_client`].
pub fn create_client_from_url(url: &str) -> Result<Arc<dyn BlobClient>> {
    create_client(&BlobSettings::from_url(url)?)
}
