//! Paging over a backend's native listing call.
//!
//! Every backend lists keys differently: object stores resume after the last
//! key they returned, Kvpbase takes a start index, Komodo hands back its own
//! continuation string, and the filesystem walks directories. Each backend
//! implements [`PageSource`] with whatever cursor it natively understands and
//! [`enumerate_page`] turns that into the uniform
//! [`EnumerationResult`](crate::model::EnumerationResult) contract.
//!
//! Continuation tokens are the native cursor, JSON-encoded and then
//! URL-safe base64 encoded. They are opaque to callers and carry no
//! server-side state, so a token stays valid for as long as the native
//! backend honours the underlying cursor.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;

use super::BlobClient;
use crate::context::OpContext;
use crate::model::{BlobMetadata, EmptyResult, EnumerationResult, RawMetadata};
use crate::{Error, Result};

/// One page as returned by a backend's native listing call.
#[derive(Debug)]
pub struct NativePage<C> {
    pub entries: Vec<RawMetadata>,
    /// Cursor for the next page, if the backend reports more data
    pub next_cursor: Option<C>,
}

/// A backend's native "list one page" primitive.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Whatever the backend needs to resume a listing.
    type Cursor: Serialize + DeserializeOwned + Send;

    async fn list_page(
        &self,
        prefix: Option<&str>,
        cursor: Option<Self::Cursor>,
        ctx: &OpContext,
    ) -> Result<NativePage<Self::Cursor>>;
}

/// Encode a native cursor as an opaque continuation token.
pub fn encode_token<C: Serialize>(cursor: &C) -> Result<String> {
    let json = serde_json::to_vec(cursor)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Recover a native cursor from a continuation token.
pub fn decode_token<C: DeserializeOwned>(token: &str) -> Result<C> {
    let json = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|e| Error::invalid_input(format!("malformed continuation token: {}", e)))?;
    serde_json::from_slice(&json)
        .map_err(|e| Error::invalid_input(format!("malformed continuation token: {}", e)))
}

/// Fetch one normalized page from `source`.
pub async fn enumerate_page<S>(
    source: &S,
    prefix: Option<&str>,
    continuation_token: Option<&str>,
    ctx: &OpContext,
) -> Result<EnumerationResult>
where
    S: PageSource + ?Sized,
{
    let prefix = prefix.filter(|p| !p.is_empty());
    let cursor = continuation_token
        .filter(|t| !t.is_empty())
        .map(decode_token::<S::Cursor>)
        .transpose()?;

    let page = source.list_page(prefix, cursor, ctx).await?;

    let next_continuation_token = page.next_cursor.as_ref().map(encode_token).transpose()?;
    let blobs = page
        .entries
        .into_iter()
        .map(BlobMetadata::from_raw)
        .collect::<Vec<_>>();

    ctx.log(&format!(
        "enumerate prefix={:?}: {} entries, more={}",
        prefix,
        blobs.len(),
        next_continuation_token.is_some()
    ));

    Ok(EnumerationResult {
        blobs,
        next_continuation_token,
    })
}

/// Delete everything `client` can enumerate.
///
/// Pages are fetched and deleted one at a time, in page order. When a walk
/// ends with a non-empty page the walk starts over, so backends whose
/// cursors shift as objects disappear are still drained completely. The
/// operation finishes on the first empty page without a continuation token.
///
/// A walk that only lists keys already deleted means the store is not
/// shrinking; the operation then stops with [`Error::EmptyAborted`].
pub async fn empty_all<C>(client: &C, ctx: &OpContext) -> Result<EmptyResult>
where
    C: BlobClient + ?Sized,
{
    let mut result = EmptyResult::default();
    let mut deleted_keys = HashSet::new();
    let mut token: Option<String> = None;
    let mut progressed = false;

    loop {
        let page = match client.enumerate(None, token.as_deref(), ctx).await {
            Ok(page) => page,
            Err(e) => return Err(aborted(result, e)),
        };

        if page.blobs.is_empty() && page.next_continuation_token.is_none() {
            break;
        }

        for blob in page.blobs {
            if let Err(e) = client.delete(&blob.key, ctx).await {
                return Err(aborted(result, e));
            }
            if deleted_keys.insert(blob.key.clone()) {
                progressed = true;
                result.blobs.push(blob);
            }
        }

        token = page.next_continuation_token;
        if token.is_none() {
            if !progressed {
                let stuck = Error::backend(format!(
                    "{} store did not shrink: deleted objects are still listed",
                    client.backend_name()
                ));
                return Err(aborted(result, stuck));
            }
            progressed = false;
        }
    }

    ctx.log(&format!(
        "{} empty: deleted {} object(s)",
        client.backend_name(),
        result.len()
    ));
    Ok(result)
}

fn aborted(deleted: EmptyResult, source: Error) -> Error {
    Error::EmptyAborted {
        deleted,
        source: Box::new(source),
    }
}
