//! Kvpbase storage backend.
//!
//! Objects live at `/{user_guid}/{container}/{key}`. Listing is index based:
//! the server returns `_count` objects starting at `_index` together with the
//! total number of matching objects.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{header, Method};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::client::validate_key;
use super::config::KvpbaseSettings;
use super::enumeration::{self, NativePage, PageSource};
use super::public_url::render_template;
use super::rest::RestTransport;
use super::BlobClient;
use crate::context::OpContext;
use crate::model::{
    BlobData, BlobMetadata, EmptyObjectPolicy, EnumerationResult, RawMetadata, WritePayload,
};
use crate::{Error, Result};

/// Object metadata as Kvpbase reports it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KvpbaseObject {
    pub key: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content_length: u64,
    #[serde(rename = "ETag", default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub created_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_update_utc: Option<DateTime<Utc>>,
}

impl From<KvpbaseObject> for RawMetadata {
    fn from(obj: KvpbaseObject) -> Self {
        RawMetadata {
            key: obj.key,
            content_length: obj.content_length,
            content_type: obj.content_type,
            etag: obj.etag,
            created: obj.created_utc,
            last_modified: obj.last_update_utc,
        }
    }
}

/// Response to a container listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KvpbaseListing {
    #[serde(default)]
    pub objects: Vec<KvpbaseObject>,
    /// Objects matching the listing's prefix, across all pages
    pub total_count: u64,
}

/// Kvpbase storage backend
pub struct KvpbaseClient {
    transport: RestTransport,
    settings: KvpbaseSettings,
}

impl KvpbaseClient {
    pub fn new(settings: KvpbaseSettings) -> Result<Self> {
        if settings.user_guid.is_empty() || settings.container.is_empty() {
            return Err(Error::Config(
                "Kvpbase user GUID and container are required".to_string(),
            ));
        }
        let transport = RestTransport::new(&settings.endpoint, &settings.api_key, "Kvpbase")?;

        info!(
            "Created Kvpbase client for endpoint: {}, user: {}, container: {}",
            settings.endpoint, settings.user_guid, settings.container
        );

        Ok(Self {
            transport,
            settings,
        })
    }

    pub fn settings(&self) -> &KvpbaseSettings {
        &self.settings
    }

    fn object_url(&self, key: &str) -> Result<url::Url> {
        validate_key(key)?;
        Ok(self
            .transport
            .url(&[&self.settings.user_guid, &self.settings.container, key]))
    }

    fn policy(&self) -> EmptyObjectPolicy {
        self.settings.empty_object_policy
    }
}

#[async_trait]
impl PageSource for KvpbaseClient {
    /// Index of the first object of the page
    type Cursor = u64;

    async fn list_page(
        &self,
        prefix: Option<&str>,
        cursor: Option<u64>,
        ctx: &OpContext,
    ) -> Result<NativePage<u64>> {
        let index = cursor.unwrap_or(0);
        let count = self.settings.page_size.max(1);

        let mut url = self
            .transport
            .url(&[&self.settings.user_guid, &self.settings.container]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("_index", &index.to_string());
            query.append_pair("_count", &count.to_string());
            if let Some(prefix) = prefix {
                query.append_pair("_prefix", prefix);
            }
        }
        ctx.log(&format!("Kvpbase LIST: {}", url));

        let response = self
            .transport
            .send(
                self.transport.request(Method::GET, url),
                &self.settings.container,
                ctx,
            )
            .await?;
        let listing: KvpbaseListing = self.transport.read_json(response, ctx).await?;

        let returned = listing.objects.len() as u64;
        let next = index + returned;
        let next_cursor = (returned > 0 && next < listing.total_count).then_some(next);

        Ok(NativePage {
            entries: listing.objects.into_iter().map(RawMetadata::from).collect(),
            next_cursor,
        })
    }
}

#[async_trait]
impl BlobClient for KvpbaseClient {
    fn backend_name(&self) -> &'static str {
        "kvpbase"
    }

    async fn get(&self, key: &str, ctx: &OpContext) -> Result<Bytes> {
        let url = self.object_url(key)?;
        ctx.log(&format!("Kvpbase GET: {}", url));

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
        let url = self.object_url(key)?;
        ctx.log(&format!("Kvpbase GET (stream): {}", url));

        let response = self
            .transport
            .send(self.transport.request(Method::GET, url), key, ctx)
            .await?;
        self.transport.into_blob(response, ctx).await
    }

    async fn get_metadata(&self, key: &str, ctx: &OpContext) -> Result<BlobMetadata> {
        let mut url = self.object_url(key)?;
        url.query_pairs_mut().append_pair("_metadata", "true");
        ctx.log(&format!("Kvpbase HEAD: {}", url));

        let response = self
            .transport
            .send(self.transport.request(Method::GET, url), key, ctx)
            .await?;
        let object: KvpbaseObject = self.transport.read_json(response, ctx).await?;

        if object.content_length == 0 && self.policy() == EmptyObjectPolicy::Missing {
            return Err(Error::not_found(key));
        }
        Ok(BlobMetadata::from_raw(object.into()))
    }

    async fn write(
        &self,
        key: &str,
        content_type: &str,
        payload: WritePayload,
        ctx: &OpContext,
    ) -> Result<()> {
        let url = self.object_url(key)?;
        ctx.log(&format!(
            "Kvpbase PUT: {} ({} bytes)",
            url,
            payload.content_length()
        ));

        let data = ctx.run(payload.into_bytes()).await?;
        let mut request = self
            .transport
            .request(Method::PUT, url)
            .body(data);
        if !content_type.is_empty() {
            request = request.header(header::CONTENT_TYPE, content_type);
        }

        self.transport.send(request, key, ctx).await?;
        Ok(())
    }

    async fn delete(&self, key: &str, ctx: &OpContext) -> Result<()> {
        let url = self.object_url(key)?;
        ctx.log(&format!("Kvpbase DELETE: {}", url));

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
            return render_template(template, &[("container", s.container.as_str()), ("key", key)]);
        }
        format!(
            "{}/{}/{}/{}",
            s.endpoint.trim_end_matches('/'),
            s.user_guid,
            s.container,
            key
        )
    }
}
