//! Blobstore Core Library
//!
//! This crate provides one asynchronous object-storage contract,
//! [`BlobClient`], and adapters for S3, Azure Blob Storage, Kvpbase, Komodo,
//! the local filesystem and an in-memory store.

pub mod context;
pub mod error;
pub mod model;
pub mod storage;

pub use context::{LogSink, OpContext};
pub use error::{Error, ErrorKind, Result, StorageError};
pub use model::{
    BlobData, BlobMetadata, BlobStream, EmptyObjectPolicy, EmptyResult, EnumerationResult,
    RawMetadata, WritePayload, WriteRequest, DEFAULT_CONTENT_TYPE,
};
pub use storage::{create_client, create_client_from_url, BlobClient, BlobSettings};
