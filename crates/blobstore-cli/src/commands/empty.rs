use anyhow::Result;
use blobstore_core::{Error, OpContext};
use tracing::{error, info};

use super::StoreArgs;

pub async fn run(store: &StoreArgs, yes: bool, ctx: &OpContext) -> Result<()> {
    if !yes {
        anyhow::bail!("Refusing to delete every object without --yes");
    }

    let client = store.open()?;
    info!("Emptying {} store", client.backend_name());

    match client.empty(ctx).await {
        Ok(result) => {
            println!("Deleted {} object(s)", result.len());
            Ok(())
        }
        Err(Error::EmptyAborted { deleted, source }) => {
            error!("Empty stopped after {} object(s)", deleted.len());
            for blob in &deleted.blobs {
                println!("deleted: {}", blob.key);
            }
            Err((*source).into())
        }
        Err(e) => Err(e.into()),
    }
}
