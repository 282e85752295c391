use anyhow::{Context, Result};
use blobstore_core::{BlobMetadata, OpContext, WritePayload};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::{format_bytes, OutputFormat, StoreArgs};

pub async fn get(store: &StoreArgs, key: &str, output: Option<&Path>, ctx: &OpContext) -> Result<()> {
    let client = store.open()?;
    let blob = client.get_stream(key, ctx).await?;
    let length = blob.content_length();
    let mut reader = blob.into_reader();

    match output {
        Some(path) => {
            let mut file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?;
            tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            info!("Wrote {} ({}) to {}", key, format_bytes(length), path.display());
        }
        None => {
            let mut stdout = tokio::io::stdout();
            tokio::io::copy(&mut reader, &mut stdout).await?;
            stdout.flush().await?;
        }
    }

    Ok(())
}

pub async fn put(
    store: &StoreArgs,
    key: &str,
    file: Option<&Path>,
    data: Option<String>,
    content_type: &str,
    ctx: &OpContext,
) -> Result<()> {
    let client = store.open()?;

    let payload = match (file, data) {
        (Some(path), _) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            let length = file.metadata().await?.len();
            WritePayload::stream(file, length)
        }
        (None, Some(data)) => WritePayload::from(data),
        (None, None) => anyhow::bail!("Either --file or --data is required"),
    };
    let length = payload.content_length();

    client.write(key, content_type, payload, ctx).await?;
    info!(
        "Stored {} ({}) in {} store",
        key,
        format_bytes(length),
        client.backend_name()
    );

    Ok(())
}

pub async fn delete(store: &StoreArgs, key: &str, ctx: &OpContext) -> Result<()> {
    let client = store.open()?;
    client.delete(key, ctx).await?;
    info!("Deleted {}", key);
    Ok(())
}

pub async fn exists(store: &StoreArgs, key: &str, ctx: &OpContext) -> Result<()> {
    let client = store.open()?;
    println!("{}", client.exists(key, ctx).await?);
    Ok(())
}

pub async fn head(
    store: &StoreArgs,
    key: &str,
    format: OutputFormat,
    ctx: &OpContext,
) -> Result<()> {
    let client = store.open()?;
    let meta = client.get_metadata(key, ctx).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&meta)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&meta)?),
        OutputFormat::Text => print_metadata_text(&meta),
    }

    Ok(())
}

pub fn url(store: &StoreArgs, key: &str) -> Result<()> {
    let client = store.open()?;
    println!("{}", client.generate_url(key));
    Ok(())
}

fn print_metadata_text(meta: &BlobMetadata) {
    println!("Key:           {}", meta.key);
    println!(
        "Size:          {} ({} bytes)",
        format_bytes(meta.content_length),
        meta.content_length
    );
    println!("Content-Type:  {}", meta.content_type);
    if !meta.etag.is_empty() {
        println!("ETag:          {}", meta.etag);
    }
    println!(
        "Created:       {}",
        meta.created_utc.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "Last Modified: {}",
        meta.last_modified_utc.format("%Y-%m-%d %H:%M:%S UTC")
    );
}
