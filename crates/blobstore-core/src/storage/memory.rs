//! In-memory storage backend for testing.

use async_trait::async_trait;
use bytes::Bytes;
use object_store::memory::InMemory;
use std::sync::Arc;

use super::config::MemorySettings;
use super::enumeration;
use super::object::ObjectStoreClient;
use super::BlobClient;
use crate::context::OpContext;
use crate::model::{BlobData, BlobMetadata, EnumerationResult, WritePayload};
use crate::Result;

/// In-memory storage backend using object_store
///
/// This backend is primarily useful for testing purposes as it doesn't
/// persist data between runs.
pub struct MemoryClient {
    inner: ObjectStoreClient,
}

impl MemoryClient {
    /// Create a new in-memory storage client
    pub fn new() -> Self {
        Self::with_settings(MemorySettings::default())
    }

    pub fn with_settings(settings: MemorySettings) -> Self {
        Self {
            inner: ObjectStoreClient::new(Arc::new(InMemory::new()), "Memory", settings.page_size),
        }
    }

    /// Shorthand for a client with a custom enumeration page size.
    pub fn with_page_size(page_size: usize) -> Self {
        Self::with_settings(MemorySettings { page_size })
    }
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobClient for MemoryClient {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str, ctx: &OpContext) -> Result<Bytes> {
        self.inner.get(key, ctx).await
    }

    async fn get_stream(&self, key: &str, ctx: &OpContext) -> Result<BlobData> {
        self.inner.get_stream(key, ctx).await
    }

    async fn get_metadata(&self, key: &str, ctx: &OpContext) -> Result<BlobMetadata> {
        self.inner.head(key, ctx).await
    }

    async fn write(
        &self,
        key: &str,
        content_type: &str,
        payload: WritePayload,
        ctx: &OpContext,
    ) -> Result<()> {
        self.inner.put(key, content_type, payload, ctx).await
    }

    async fn delete(&self, key: &str, ctx: &OpContext) -> Result<()> {
        self.inner.delete(key, ctx).await
    }

    async fn enumerate(
        &self,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
        ctx: &OpContext,
    ) -> Result<EnumerationResult> {
        enumeration::enumerate_page(&self.inner, prefix, continuation_token, ctx).await
    }

    fn generate_url(&self, key: &str) -> String {
        format!("memory:///{}", key)
    }
}
