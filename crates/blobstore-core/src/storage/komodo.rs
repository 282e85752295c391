//! Komodo storage backend.
//!
//! Documents live in a single index at `/{index_guid}/{key}`. Enumeration is
//! a POST against `/{index_guid}/enumerate` and pages are chained through a
//! continuation string issued by the server.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{header, Method};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::client::validate_key;
use super::config::KomodoSettings;
use super::enumeration::{self, NativePage, PageSource};
use super::public_url::render_template;
use super::rest::RestTransport;
use super::BlobClient;
use crate::context::OpContext;
use crate::model::{
    BlobData, BlobMetadata, EmptyObjectPolicy, EnumerationResult, RawMetadata, WritePayload,
};
use crate::{Error, Result};

/// Document metadata as Komodo reports it. Komodo only tracks when a
/// document was stored, so there is no separate modification time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KomodoDocument {
    pub key: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content_length: u64,
    #[serde(rename = "ETag", default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub created_utc: Option<DateTime<Utc>>,
}

impl From<KomodoDocument> for RawMetadata {
    fn from(doc: KomodoDocument) -> Self {
        RawMetadata {
            key: doc.key,
            content_length: doc.content_length,
            content_type: doc.content_type,
            etag: doc.etag,
            created: doc.created_utc,
            last_modified: None,
        }
    }
}

/// Body of an enumerate request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KomodoEnumerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    pub max_results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
}

/// Body of an enumerate response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KomodoEnumerateResponse {
    #[serde(default)]
    pub documents: Vec<KomodoDocument>,
    #[serde(default)]
    pub continuation_token: Option<String>,
}

/// Komodo storage backend
pub struct KomodoClient {
    transport: RestTransport,
    settings: KomodoSettings,
}

impl KomodoClient {
    pub fn new(settings: KomodoSettings) -> Result<Self> {
        if settings.index_guid.is_empty() {
            return Err(Error::Config("Komodo index GUID is required".to_string()));
        }
        let transport = RestTransport::new(&settings.endpoint, &settings.api_key, "Komodo")?;

        info!(
            "Created Komodo client for endpoint: {}, index: {}",
            settings.endpoint, settings.index_guid
        );

        Ok(Self {
            transport,
            settings,
        })
    }

    pub fn settings(&self) -> &KomodoSettings {
        &self.settings
    }

    fn document_url(&self, key: &str) -> Result<url::Url> {
        validate_key(key)?;
        Ok(self.transport.url(&[&self.settings.index_guid, key]))
    }

    fn policy(&self) -> EmptyObjectPolicy {
        self.settings.empty_object_policy
    }
}

#[async_trait]
impl PageSource for KomodoClient {
    /// Continuation string issued by the server
    type Cursor = String;

    async fn list_page(
        &self,
        prefix: Option<&str>,
        cursor: Option<String>,
        ctx: &OpContext,
    ) -> Result<NativePage<String>> {
        let url = self
            .transport
            .url(&[&self.settings.index_guid, "enumerate"]);
        let body = KomodoEnumerateRequest {
            prefix: prefix.map(str::to_string),
            max_results: self.settings.page_size.max(1),
            continuation_token: cursor,
        };
        ctx.log(&format!(
            "Komodo ENUMERATE: {} prefix={:?} token={:?}",
            url, body.prefix, body.continuation_token
        ));

        let request = self.transport.request(Method::POST, url).json(&body);
        let response = self
            .transport
            .send(request, &self.settings.index_guid, ctx)
            .await?;
        let page: KomodoEnumerateResponse = self.transport.read_json(response, ctx).await?;

        let next_cursor = page.continuation_token.filter(|t| !t.is_empty());
        if next_cursor.is_some() && page.documents.is_empty() {
            warn!(
                "{} returned an empty page with a continuation token",
                self.transport.label()
            );
        }

        Ok(NativePage {
            entries: page.documents.into_iter().map(RawMetadata::from).collect(),
            next_cursor,
        })
    }
}

#[async_trait]
impl BlobClient for KomodoClient {
    fn backend_name(&self) -> &'static str {
        "komodo"
    }

    async fn get(&self, key: &str, ctx: &OpContext) -> Result<Bytes> {
        let url = self.document_url(key)?;
        ctx.log(&format!("Komodo GET: {}", url));

        let response = self
            .transport
            .send(self.transport.request(Method::GET, url), key, ctx)
            .await?;
        let data = self.transport.read_body(response, ctx).await?;
        if data.is_empty() && self.policy() == EmptyObjectPolicy::Missing {
            return Err(Error::not_found(key));
        }
        Ok(data)
    }

    async fn get_stream(&self, key: &str, ctx: &OpContext) -> Result<BlobData> {
        let url = self.document_url(key)?;
        ctx.log(&format!("Komodo GET (stream): {}", url));

        let response = self
            .transport
            .send(self.transport.request(Method::GET, url), key, ctx)
            .await?;
        self.transport.into_blob(response, ctx).await
    }

    async fn get_metadata(&self, key: &str, ctx: &OpContext) -> Result<BlobMetadata> {
        let mut url = self.document_url(key)?;
        url.set_query(Some("metadata"));
        ctx.log(&format!("Komodo HEAD: {}", url));

        let response = self
            .transport
            .send(self.transport.request(Method::GET, url), key, ctx)
            .await?;
        let doc: KomodoDocument = self.transport.read_json(response, ctx).await?;

        if doc.content_length == 0 && self.policy() == EmptyObjectPolicy::Missing {
            return Err(Error::not_found(key));
        }
        Ok(BlobMetadata::from_raw(doc.into()))
    }

    async fn write(
        &self,
        key: &str,
        content_type: &str,
        payload: WritePayload,
        ctx: &OpContext,
    ) -> Result<()> {
        let url = self.document_url(key)?;
        ctx.log(&format!(
            "Komodo POST: {} ({} bytes)",
            url,
            payload.content_length()
        ));

        let data = ctx.run(payload.into_bytes()).await?;
        let mut request = self
            .transport
            .request(Method::POST, url)
            .body(data);
        if !content_type.is_empty() {
            request = request.header(header::CONTENT_TYPE, content_type);
        }

        self.transport.send(request, key, ctx).await?;
        Ok(())
    }

    async fn delete(&self, key: &str, ctx: &OpContext) -> Result<()> {
        let url = self.document_url(key)?;
        ctx.log(&format!("Komodo DELETE: {}", url));

        self.transport
            .send_idempotent_delete(self.transport.request(Method::DELETE, url), key, ctx)
            .await
    }

    async fn enumerate(
        &self,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
        ctx: &OpContext,
    ) -> Result<EnumerationResult> {
        enumeration::enumerate_page(self, prefix, continuation_token, ctx).await
    }

    fn generate_url(&self, key: &str) -> String {
        let s = &self.settings;
        if let Some(template) = &s.base_url {
            return render_template(
                template,
                &[("container", s.index_guid.as_str()), ("key", key)],
            );
        }
        format!(
            "{}/{}/{}",
            s.endpoint.trim_end_matches('/'),
            s.index_guid,
            key
        )
    }
}
