pub mod empty;
pub mod list;
pub mod object;

use anyhow::{Context, Result};
use blobstore_core::{create_client, BlobClient, BlobSettings};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Where the store comes from: a storage URL or a YAML settings file.
pub struct StoreArgs {
    pub url: Option<String>,
    pub config: Option<PathBuf>,
}

impl StoreArgs {
    pub fn settings(&self) -> Result<BlobSettings> {
        match (&self.url, &self.config) {
            (Some(url), _) => Ok(BlobSettings::from_url(url)?),
            (None, Some(path)) => {
                let yaml = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                Ok(BlobSettings::from_yaml(&yaml)?)
            }
            (None, None) => anyhow::bail!("Either --store <URL> or --config <FILE> is required"),
        }
    }

    pub fn open(&self) -> Result<Arc<dyn BlobClient>> {
        let settings = self.settings()?;
        debug!("Opening {} store", settings.backend_name());
        Ok(create_client(&settings)?)
    }
}

/// Command output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "yaml" => Self::Yaml,
            _ => Self::Text,
        }
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
