//! Azure Blob Storage backend implementation.

use async_trait::async_trait;
use bytes::Bytes;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::ObjectStore;
use std::sync::Arc;
use tracing::{debug, info};

use super::config::AzureSettings;
use super::enumeration;
use super::object::ObjectStoreClient;
use super::public_url::{endpoint_host, render_template, scheme};
use super::BlobClient;
use crate::context::OpContext;
use crate::model::{BlobData, BlobMetadata, EnumerationResult, WritePayload};
use crate::{Error, Result};

/// Azure Blob Storage backend
pub struct AzureClient {
    inner: ObjectStoreClient,
    settings: AzureSettings,
}

impl AzureClient {
    /// Create a new Azure Blob Storage client
    ///
    /// Authentication methods (in order of precedence):
    /// 1. SAS token (`sas_token`)
    /// 2. Storage account key (`account_key`)
    /// 3. Service principal (`client_id` + `client_secret` + `tenant_id`)
    /// 4. Default credential chain (environment, managed identity, CLI)
    pub fn new(settings: AzureSettings) -> Result<Self> {
        let mut builder = MicrosoftAzureBuilder::new()
            .with_account(&settings.account_name)
            .with_container_name(&settings.container_name);

        if let Some(endpoint) = &settings.endpoint {
            builder = builder.with_endpoint(endpoint.clone());
        }

        if !settings.use_ssl {
            builder = builder.with_allow_http(true);
        }

        if let Some(sas_token) = &settings.sas_token {
            builder = builder.with_sas_authorization(parse_sas_token(sas_token));
            debug!("Azure authentication: SAS token");
        } else if let Some(key) = &settings.account_key {
            builder = builder.with_access_key(key);
            debug!("Azure authentication: Account key");
        } else if let Some(client_secret) = &settings.client_secret {
            if let Some(client_id) = &settings.client_id {
                builder = builder.with_client_id(client_id);
            }
            if let Some(tenant_id) = &settings.tenant_id {
                builder = builder.with_tenant_id(tenant_id);
            }
            builder = builder.with_client_secret(client_secret);
            debug!("Azure authentication: Service principal");
        } else {
            debug!("Azure authentication: default credential chain");
        }

        let store = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to create Azure client: {}", e)))?;

        info!(
            "Created Azure client for account: {}, container: {}, endpoint: {:?}",
            settings.account_name, settings.container_name, settings.endpoint
        );

        Ok(Self::with_store(settings, Arc::new(store)))
    }

    /// Create a client over an already-built store.
    pub fn with_store(settings: AzureSettings, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner: ObjectStoreClient::new(store, "Azure", settings.page_size),
            settings,
        }
    }

    pub fn settings(&self) -> &AzureSettings {
        &self.settings
    }
}

/// Split a SAS query string into key-value pairs.
fn parse_sas_token(sas_token: &str) -> Vec<(String, String)> {
    sas_token
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            match (parts.next(), parts.next()) {
                (Some(k), Some(v)) => Some((k.to_string(), v.to_string())),
                _ => None,
            }
        })
        .collect()
}

#[async_trait]
impl BlobClient for AzureClient {
    fn backend_name(&self) -> &'static str {
        "azure"
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
            return render_template(
                template,
                &[("container", s.container_name.as_str()), ("key", key)],
            );
        }

        let scheme = scheme(s.use_ssl);
        match &s.endpoint {
            Some(endpoint) => format!(
                "{}://{}/{}/{}",
                scheme,
                endpoint_host(endpoint),
                s.container_name,
                key
            ),
            None => format!(
                "{}://{}.blob.core.windows.net/{}/{}",
                scheme, s.account_name, s.container_name, key
            ),
        }
    }
}
