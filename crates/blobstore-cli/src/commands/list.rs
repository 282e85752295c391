use anyhow::Result;
use blobstore_core::{BlobMetadata, EnumerationResult, OpContext};
use tracing::info;

use super::{format_bytes, OutputFormat, StoreArgs};

pub async fn run(
    store: &StoreArgs,
    prefix: Option<&str>,
    token: Option<&str>,
    all: bool,
    format: OutputFormat,
    ctx: &OpContext,
) -> Result<()> {
    let client = store.open()?;

    let mut page = client.enumerate(prefix, token, ctx).await?;
    if all {
        let mut blobs = std::mem::take(&mut page.blobs);
        let mut pages = 1;
        while let Some(next) = page.next_continuation_token.take() {
            page = client.enumerate(prefix, Some(&next), ctx).await?;
            blobs.append(&mut page.blobs);
            pages += 1;
        }
        info!("Listed {} object(s) in {} page(s)", blobs.len(), pages);
        page = EnumerationResult {
            blobs,
            next_continuation_token: None,
        };
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&page)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&page)?),
        OutputFormat::Text => print_page_text(&page),
    }

    Ok(())
}

fn print_page_text(page: &EnumerationResult) {
    if page.blobs.is_empty() {
        println!("No objects found");
    } else {
        for blob in &page.blobs {
            print_row(blob);
        }
    }

    if let Some(token) = &page.next_continuation_token {
        println!("\nMore results available; continue with --token {}", token);
    }
}

fn print_row(blob: &BlobMetadata) {
    println!(
        "{:>10}  {}  {}",
        format_bytes(blob.content_length),
        blob.last_modified_utc.format("%Y-%m-%d %H:%M:%S"),
        blob.key
    );
}
