//! S3-compatible storage backend using object_store.

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::ObjectStore;
use std::sync::Arc;
use tracing::info;

use super::config::S3Settings;
use super::enumeration;
use super::object::ObjectStoreClient;
use super::public_url::{endpoint_host, render_template, scheme};
use super::BlobClient;
use crate::context::OpContext;
use crate::model::{BlobData, BlobMetadata, EnumerationResult, WritePayload};
use crate::{Error, Result};

/// S3 storage backend
pub struct S3Client {
    inner: ObjectStoreClient,
    settings: S3Settings,
}

impl S3Client {
    /// Create a new S3 client
    pub fn new(settings: S3Settings) -> Result<Self> {
        let store = builder(&settings)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create S3 client: {}", e)))?;

        info!(
            "Created S3 client for bucket: {}, region: {}, endpoint: {:?}",
            settings.bucket, settings.region, settings.endpoint
        );

        Ok(Self::with_store(settings, Arc::new(store)))
    }

    /// Create a client over an already-built store.
    ///
    /// URL generation still follows `settings`.
    pub fn with_store(settings: S3Settings, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner: ObjectStoreClient::new(store, "S3", settings.page_size),
            settings,
        }
    }

    pub fn settings(&self) -> &S3Settings {
        &self.settings
    }
}

/// Builder for the store behind an [`S3Client`]. Requests and public URLs
/// address the bucket the same way.
fn builder(settings: &S3Settings) -> AmazonS3Builder {
    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(&settings.bucket)
        .with_region(&settings.region);

    if let Some(endpoint) = &settings.endpoint {
        let url = if endpoint.contains("://") {
            endpoint.clone()
        } else {
            format!("{}://{}", scheme(settings.use_ssl), endpoint)
        };
        builder = builder.with_endpoint(url);
        // Custom endpoints are addressed path-style
        builder = builder.with_virtual_hosted_style_request(false);
    } else {
        builder = builder.with_virtual_hosted_style_request(!settings.path_style);
    }

    if let Some(access_key) = &settings.access_key {
        builder = builder.with_access_key_id(access_key);
    }

    if let Some(secret_key) = &settings.secret_key {
        builder = builder.with_secret_access_key(secret_key);
    }

    if let Some(token) = &settings.session_token {
        builder = builder.with_token(token);
    }

    if !settings.use_ssl {
        builder = builder.with_allow_http(true);
    }

    builder
}

#[async_trait]
impl BlobClient for S3Client {
    fn backend_name(&self) -> &'static str {
        "s3"
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
        let s = &self.settings;
        if let Some(template) = &s.base_url {
            return render_template(template, &[("bucket", s.bucket.as_str()), ("key", key)]);
        }

        let scheme = scheme(s.use_ssl);
        match &s.endpoint {
            Some(endpoint) => format!(
                "{}://{}/{}/{}",
                scheme,
                endpoint_host(endpoint),
                s.bucket,
                key
            ),
            None if s.path_style => format!(
                "{}://s3.{}.amazonaws.com/{}/{}",
                scheme, s.region, s.bucket, key
            ),
            None => format!(
                "{}://{}.s3.{}.amazonaws.com/{}",
                scheme, s.bucket, s.region, key
            ),
        }
    }
}
