//! Storage client trait definition.

use async_trait::async_trait;
use bytes::Bytes;

use super::enumeration;
use crate::context::OpContext;
use crate::model::{BlobData, BlobMetadata, EmptyResult, EnumerationResult, WritePayload, WriteRequest};
use crate::{Error, Result};

/// The capability set every storage backend exposes.
///
/// Every operation takes an [`OpContext`] carrying the cancellation token and
/// optional log sink. Implementations hold no per-call mutable state, so one
/// client can serve any number of concurrent calls.
#[async_trait]
pub trait BlobClient: Send + Sync {
    /// Short backend name ("s3", "azure", "filesystem", ...)
    fn backend_name(&self) -> &'static str;

    /// Read an object fully into memory.
    async fn get(&self, key: &str, ctx: &OpContext) -> Result<Bytes>;

    /// Open an object as a stream positioned at its first byte.
    async fn get_stream(&self, key: &str, ctx: &OpContext) -> Result<BlobData>;

    /// Fetch an object's metadata.
    async fn get_metadata(&self, key: &str, ctx: &OpContext) -> Result<BlobMetadata>;

    /// Create or replace an object. A zero-length payload is valid.
    async fn write(
        &self,
        key: &str,
        content_type: &str,
        payload: WritePayload,
        ctx: &OpContext,
    ) -> Result<()>;

    /// Remove an object. Removing an absent key succeeds.
    async fn delete(&self, key: &str, ctx: &OpContext) -> Result<()>;

    /// List one page of keys starting with `prefix`.
    ///
    /// Pass the previous page's `next_continuation_token` to continue.
    async fn enumerate(
        &self,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
        ctx: &OpContext,
    ) -> Result<EnumerationResult>;

    /// Public URL for a key. Pure; performs no I/O.
    fn generate_url(&self, key: &str) -> String;

    /// Check whether an object exists by fetching its metadata.
    async fn exists(&self, key: &str, ctx: &OpContext) -> Result<bool> {
        match self.get_metadata(key, ctx).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Write each request in order, stopping at the first failure.
    ///
    /// Objects written before a failure are left in place.
    async fn write_many(&self, requests: Vec<WriteRequest>, ctx: &OpContext) -> Result<()> {
        let total = requests.len();
        for (i, request) in requests.into_iter().enumerate() {
            ctx.ensure_active()?;
            ctx.log(&format!(
                "write_many {}/{}: {}",
                i + 1,
                total,
                request.key
            ));
            self.write(&request.key, &request.content_type, request.payload, ctx)
                .await?;
        }
        Ok(())
    }

    /// Delete every object in the bucket/container/root.
    ///
    /// On failure the objects already removed are carried in
    /// [`Error::EmptyAborted`].
    async fn empty(&self, ctx: &OpContext) -> Result<EmptyResult> {
        enumeration::empty_all(self, ctx).await
    }
}

/// Reject keys no backend can address.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::invalid_input("key must not be empty"));
    }
    Ok(())
}
