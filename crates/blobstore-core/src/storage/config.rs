//! Backend settings.
//!
//! Each backend is configured by one plain settings struct. [`BlobSettings`]
//! groups them behind a `backend` tag so a whole store can be described in a
//! YAML file or a single URL.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::model::EmptyObjectPolicy;
use crate::{Error, Result};

fn default_true() -> bool {
    true
}

fn default_s3_region() -> String {
    "us-east-1".to_string()
}

fn default_s3_page_size() -> usize {
    1000
}

fn default_azure_page_size() -> usize {
    5000
}

fn default_rest_page_size() -> usize {
    1000
}

fn default_fs_page_size() -> usize {
    1000
}

/// Settings for AWS S3 and S3-compatible stores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Settings {
    /// Bucket name
    pub bucket: String,
    /// AWS region (e.g., "us-east-1")
    #[serde(default = "default_s3_region")]
    pub region: String,
    /// Custom endpoint (for S3-compatible services like MinIO), host[:port]
    /// or a full URL
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Access key ID
    #[serde(default)]
    pub access_key: Option<String>,
    /// Secret access key
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Session token for temporary credentials
    #[serde(default)]
    pub session_token: Option<String>,
    /// Use HTTPS
    #[serde(default = "default_true")]
    pub use_ssl: bool,
    /// Use path-style requests (required for MinIO/Ceph RGW)
    #[serde(default)]
    pub path_style: bool,
    /// URL template with `{bucket}` and `{key}` placeholders
    #[serde(default)]
    pub base_url: Option<String>,
    /// Keys per enumeration page
    #[serde(default = "default_s3_page_size")]
    pub page_size: usize,
}

impl S3Settings {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: default_s3_region(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            session_token: None,
            use_ssl: true,
            path_style: false,
            base_url: None,
            page_size: default_s3_page_size(),
        }
    }
}

/// Settings for Azure Blob Storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureSettings {
    /// Storage account name
    pub account_name: String,
    /// Blob container name
    pub container_name: String,
    /// Storage account key
    #[serde(default)]
    pub account_key: Option<String>,
    /// Shared access signature, with or without the leading `?`
    #[serde(default)]
    pub sas_token: Option<String>,
    /// Azure AD client ID (service principal)
    #[serde(default)]
    pub client_id: Option<String>,
    /// Azure AD tenant ID (service principal)
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Client secret (service principal)
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Custom endpoint for sovereign clouds or emulators
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Use HTTPS
    #[serde(default = "default_true")]
    pub use_ssl: bool,
    /// URL template with `{container}` and `{key}` placeholders
    #[serde(default)]
    pub base_url: Option<String>,
    /// Keys per enumeration page
    #[serde(default = "default_azure_page_size")]
    pub page_size: usize,
}

impl AzureSettings {
    pub fn new(account_name: impl Into<String>, container_name: impl Into<String>) -> Self {
        Self {
            account_name: account_name.into(),
            container_name: container_name.into(),
            account_key: None,
            sas_token: None,
            client_id: None,
            tenant_id: None,
            client_secret: None,
            endpoint: None,
            use_ssl: true,
            base_url: None,
            page_size: default_azure_page_size(),
        }
    }
}

/// Settings for a Kvpbase server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvpbaseSettings {
    /// Server URL, e.g. `http://localhost:8000`
    pub endpoint: String,
    /// Owning user GUID
    pub user_guid: String,
    /// Container name
    pub container: String,
    /// API key sent as `x-api-key`
    pub api_key: String,
    /// URL template with `{container}` and `{key}` placeholders
    #[serde(default)]
    pub base_url: Option<String>,
    /// Objects per enumeration page
    #[serde(default = "default_rest_page_size")]
    pub page_size: usize,
    /// Whether zero-length objects count as present
    #[serde(default)]
    pub empty_object_policy: EmptyObjectPolicy,
}

impl KvpbaseSettings {
    pub fn new(
        endpoint: impl Into<String>,
        user_guid: impl Into<String>,
        container: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            user_guid: user_guid.into(),
            container: container.into(),
            api_key: api_key.into(),
            base_url: None,
            page_size: default_rest_page_size(),
            empty_object_policy: EmptyObjectPolicy::default(),
        }
    }
}

/// Settings for a Komodo index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KomodoSettings {
    /// Server URL, e.g. `http://localhost:9090`
    pub endpoint: String,
    /// Index GUID documents are stored in
    pub index_guid: String,
    /// API key sent as `x-api-key`
    pub api_key: String,
    /// URL template with `{container}` (the index) and `{key}` placeholders
    #[serde(default)]
    pub base_url: Option<String>,
    /// Documents per enumeration page
    #[serde(default = "default_rest_page_size")]
    pub page_size: usize,
    /// Whether zero-length documents count as present
    #[serde(default)]
    pub empty_object_policy: EmptyObjectPolicy,
}

impl KomodoSettings {
    pub fn new(
        endpoint: impl Into<String>,
        index_guid: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            index_guid: index_guid.into(),
            api_key: api_key.into(),
            base_url: None,
            page_size: default_rest_page_size(),
            empty_object_policy: EmptyObjectPolicy::default(),
        }
    }
}

/// Settings for a directory on the local filesystem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesystemSettings {
    /// Directory objects are stored under
    pub root: PathBuf,
    /// Keys per enumeration page
    #[serde(default = "default_fs_page_size")]
    pub page_size: usize,
}

impl FilesystemSettings {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_size: default_fs_page_size(),
        }
    }
}

/// Settings for the in-process store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySettings {
    /// Keys per enumeration page
    #[serde(default = "default_fs_page_size")]
    pub page_size: usize,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            page_size: default_fs_page_size(),
        }
    }
}

/// Settings for any supported backend, tagged by `backend`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend")]
pub enum BlobSettings {
    #[serde(rename = "s3")]
    S3(S3Settings),
    #[serde(rename = "azure")]
    Azure(AzureSettings),
    #[serde(rename = "kvpbase")]
    Kvpbase(KvpbaseSettings),
    #[serde(rename = "komodo")]
    Komodo(KomodoSettings),
    #[serde(rename = "filesystem")]
    Filesystem(FilesystemSettings),
    #[serde(rename = "memory")]
    Memory(MemorySettings),
}

impl BlobSettings {
    /// Parse settings from a URL string
    ///
    /// Supported URL formats:
    /// - `s3://bucket-name?region=us-east-1&endpoint=localhost:9000&path_style=true&ssl=false`
    /// - `azure://container@account.blob.core.windows.net`
    /// - `kvpbase://host:port/user-guid/container?api_key=...&ssl=true`
    /// - `komodo://host:port/index-guid?api_key=...&ssl=true`
    /// - `file:///path/to/data`
    /// - `memory://`
    ///
    /// Cloud credentials are taken from the usual environment variables.
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = url::Url::parse(url)
            .map_err(|e| Error::Config(format!("Invalid storage URL: {}", e)))?;

        let query = |name: &str| {
            parsed
                .query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.to_string())
        };
        let flag = |name: &str, default: bool| query(name).map(|v| v == "true").unwrap_or(default);
        let page_size = |default: usize| -> Result<usize> {
            match query("page_size") {
                Some(v) => v
                    .parse()
                    .map_err(|_| Error::Config(format!("Invalid page_size: {}", v))),
                None => Ok(default),
            }
        };

        match parsed.scheme() {
            "s3" | "s3a" => {
                let bucket = required(parsed.host_str(), "S3 bucket")?;
                Ok(Self::S3(S3Settings {
                    bucket,
                    region: query("region").unwrap_or_else(default_s3_region),
                    endpoint: query("endpoint"),
                    access_key: std::env::var("AWS_ACCESS_KEY_ID").ok(),
                    secret_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
                    session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
                    use_ssl: flag("ssl", true),
                    path_style: flag("path_style", false),
                    base_url: query("base_url"),
                    page_size: page_size(default_s3_page_size())?,
                }))
            }
            "azure" | "az" => {
                let host = required(parsed.host_str(), "Azure account")?;
                let account_name = host.split('.').next().unwrap_or(&host).to_string();
                let container_name = if parsed.username().is_empty() {
                    parsed.path().trim_start_matches('/').to_string()
                } else {
                    parsed.username().to_string()
                };
                if container_name.is_empty() {
                    return Err(Error::Config("Azure container is required".to_string()));
                }

                let mut settings = AzureSettings::new(account_name, container_name);
                settings.account_key = std::env::var("AZURE_STORAGE_KEY").ok();
                settings.sas_token = query("sas_token");
                settings.endpoint = query("endpoint");
                settings.use_ssl = flag("ssl", true);
                settings.page_size = page_size(default_azure_page_size())?;
                Ok(Self::Azure(settings))
            }
            "kvpbase" => {
                let endpoint = rest_endpoint(&parsed, flag("ssl", false))?;
                let mut segments = path_segments(&parsed);
                if segments.len() != 2 {
                    return Err(Error::Config(
                        "Kvpbase URL must be kvpbase://host/user-guid/container".to_string(),
                    ));
                }
                let container = segments.remove(1);
                let user_guid = segments.remove(0);

                let mut settings = KvpbaseSettings::new(
                    endpoint,
                    user_guid,
                    container,
                    query("api_key").unwrap_or_default(),
                );
                settings.page_size = page_size(default_rest_page_size())?;
                Ok(Self::Kvpbase(settings))
            }
            "komodo" => {
                let endpoint = rest_endpoint(&parsed, flag("ssl", false))?;
                let segments = path_segments(&parsed);
                let [index_guid] = <[String; 1]>::try_from(segments).map_err(|_| {
                    Error::Config("Komodo URL must be komodo://host/index-guid".to_string())
                })?;

                let mut settings =
                    KomodoSettings::new(endpoint, index_guid, query("api_key").unwrap_or_default());
                settings.page_size = page_size(default_rest_page_size())?;
                Ok(Self::Komodo(settings))
            }
            "file" => {
                let root = parsed
                    .to_file_path()
                    .map_err(|_| Error::Config(format!("Invalid filesystem URL: {}", url)))?;
                let mut settings = FilesystemSettings::new(root);
                settings.page_size = page_size(default_fs_page_size())?;
                Ok(Self::Filesystem(settings))
            }
            "memory" => Ok(Self::Memory(MemorySettings {
                page_size: page_size(default_fs_page_size())?,
            })),
            scheme => Err(Error::Config(format!(
                "Unknown storage scheme: {}",
                scheme
            ))),
        }
    }

    /// Load settings from a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// The backend tag of these settings
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::S3(_) => "s3",
            Self::Azure(_) => "azure",
            Self::Kvpbase(_) => "kvpbase",
            Self::Komodo(_) => "komodo",
            Self::Filesystem(_) => "filesystem",
            Self::Memory(_) => "memory",
        }
    }
}

fn required(value: Option<&str>, what: &str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::Config(format!("{} is required", what)))
}

fn rest_endpoint(parsed: &url::Url, ssl: bool) -> Result<String> {
    let host = required(parsed.host_str(), "Server host")?;
    let scheme = if ssl { "https" } else { "http" };
    Ok(match parsed.port() {
        Some(port) => format!("{}://{}:{}", scheme, host, port),
        None => format!("{}://{}", scheme, host),
    })
}

fn path_segments(parsed: &url::Url) -> Vec<String> {
    parsed
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}
