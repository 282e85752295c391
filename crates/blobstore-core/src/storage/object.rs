//! Operations shared by every backend reached through `object_store`.
//!
//! S3, Azure and the in-memory store differ only in how the underlying
//! [`ObjectStore`] is built and how public URLs look. Reads, writes, metadata
//! and paging go through this type so the three normalize identically.

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::path::Path;
use object_store::{
    Attribute, Attributes, GetOptions, GetResult, ObjectMeta, ObjectStore, PutOptions, PutPayload,
};
use std::sync::Arc;
use tokio_util::io::StreamReader;

use super::client::validate_key;
use super::enumeration::{NativePage, PageSource};
use crate::context::OpContext;
use crate::error::StorageError;
use crate::model::{BlobData, BlobMetadata, RawMetadata, WritePayload, DEFAULT_CONTENT_TYPE};
use crate::{Error, Result};

pub(crate) struct ObjectStoreClient {
    store: Arc<dyn ObjectStore>,
    /// Backend label used in log lines and error messages
    label: &'static str,
    page_size: usize,
}

impl ObjectStoreClient {
    pub(crate) fn new(store: Arc<dyn ObjectStore>, label: &'static str, page_size: usize) -> Self {
        Self {
            store,
            label,
            page_size: page_size.max(1),
        }
    }

    /// The store path for `key`. Keys that object_store would rewrite
    /// (empty segments, leading or trailing `/`, control characters) are
    /// rejected so a listed key always reads back unchanged.
    fn path(&self, key: &str) -> Result<Path> {
        validate_key(key)?;
        let path = Path::parse(key)
            .map_err(|e| Error::invalid_input(format!("invalid key {:?}: {}", key, e)))?;
        if path.as_ref() != key {
            return Err(Error::invalid_input(format!(
                "invalid key {:?}: not a normalized path",
                key
            )));
        }
        Ok(path)
    }

    fn map_err(&self, op: &str, key: &str, e: object_store::Error) -> Error {
        match e {
            object_store::Error::NotFound { .. } => Error::not_found(key),
            object_store::Error::PermissionDenied { .. }
            | object_store::Error::Unauthenticated { .. } => Error::Storage(
                StorageError::PermissionDenied(format!("{} {} {}: {}", self.label, op, key, e)),
            ),
            _ => Error::backend(format!("{} {} failed: {}", self.label, op, e)),
        }
    }

    pub(crate) async fn get(&self, key: &str, ctx: &OpContext) -> Result<Bytes> {
        let path = self.path(key)?;
        ctx.log(&format!("{} GET: {}", self.label, path));

        ctx.run(async {
            let result = self
                .store
                .get(&path)
                .await
                .map_err(|e| self.map_err("GET", key, e))?;
            result.bytes().await.map_err(|e| {
                Error::backend(format!("Failed to read {} response: {}", self.label, e))
            })
        })
        .await
    }

    pub(crate) async fn get_stream(&self, key: &str, ctx: &OpContext) -> Result<BlobData> {
        let path = self.path(key)?;
        ctx.log(&format!("{} GET (stream): {}", self.label, path));

        let result = ctx
            .run(async {
                self.store
                    .get(&path)
                    .await
                    .map_err(|e| self.map_err("GET", key, e))
            })
            .await?;

        let content_length = result.meta.size as u64;
        let content_type = content_type_of(&result);
        if content_length == 0 {
            return Ok(BlobData::empty(content_type));
        }

        let stream = result
            .into_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        Ok(BlobData::new(
            content_length,
            content_type,
            StreamReader::new(stream),
        ))
    }

    pub(crate) async fn head(&self, key: &str, ctx: &OpContext) -> Result<BlobMetadata> {
        let path = self.path(key)?;
        ctx.log(&format!("{} HEAD: {}", self.label, path));

        let options = GetOptions {
            head: true,
            ..Default::default()
        };
        let result = ctx
            .run(async {
                self.store
                    .get_opts(&path, options)
                    .await
                    .map_err(|e| self.map_err("HEAD", key, e))
            })
            .await?;

        let content_type = content_type_of(&result);
        let mut raw = raw_from_meta(&result.meta);
        raw.key = key.to_string();
        raw.content_type = Some(content_type);
        Ok(BlobMetadata::from_raw(raw))
    }

    pub(crate) async fn put(
        &self,
        key: &str,
        content_type: &str,
        payload: WritePayload,
        ctx: &OpContext,
    ) -> Result<()> {
        let path = self.path(key)?;
        ctx.log(&format!(
            "{} PUT: {} ({} bytes)",
            self.label,
            path,
            payload.content_length()
        ));

        let mut attributes = Attributes::new();
        if !content_type.is_empty() {
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
        }
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        ctx.run(async {
            let data = payload.into_bytes().await?;
            self.store
                .put_opts(&path, PutPayload::from_bytes(data), options)
                .await
                .map_err(|e| self.map_err("PUT", key, e))?;
            Ok(())
        })
        .await
    }

    pub(crate) async fn delete(&self, key: &str, ctx: &OpContext) -> Result<()> {
        let path = self.path(key)?;
        ctx.log(&format!("{} DELETE: {}", self.label, path));

        ctx.run(async {
            match self.store.delete(&path).await {
                Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
                Err(e) => Err(self.map_err("DELETE", key, e)),
            }
        })
        .await
    }
}

#[async_trait]
impl PageSource for ObjectStoreClient {
    /// The last key of the previous page
    type Cursor = String;

    async fn list_page(
        &self,
        prefix: Option<&str>,
        cursor: Option<String>,
        ctx: &OpContext,
    ) -> Result<NativePage<String>> {
        // object_store prefixes match whole path segments, so list from the
        // enclosing directory and filter on the raw string prefix.
        // A directory object_store cannot parse is listed from the root.
        let dir = prefix
            .and_then(enclosing_dir)
            .and_then(|d| Path::parse(d).ok());
        ctx.log(&format!(
            "{} LIST: dir={:?} prefix={:?} after={:?}",
            self.label, dir, prefix, cursor
        ));

        let mut stream = match &cursor {
            Some(after) => {
                let offset = Path::parse(after.as_str()).map_err(|e| {
                    Error::invalid_input(format!("malformed continuation token: {}", e))
                })?;
                self.store.list_with_offset(dir.as_ref(), &offset)
            }
            None => self.store.list(dir.as_ref()),
        };

        let mut entries = Vec::with_capacity(self.page_size);
        let mut more = false;
        while let Some(meta) = ctx
            .run(async {
                stream
                    .try_next()
                    .await
                    .map_err(|e| self.map_err("LIST", prefix.unwrap_or(""), e))
            })
            .await?
        {
            let key = meta.location.as_ref();
            if prefix.is_some_and(|p| !key.starts_with(p)) {
                continue;
            }
            if entries.len() == self.page_size {
                more = true;
                break;
            }
            entries.push(raw_from_meta(&meta));
        }

        let next_cursor = if more {
            entries.last().map(|e: &RawMetadata| e.key.clone())
        } else {
            None
        };

        Ok(NativePage {
            entries,
            next_cursor,
        })
    }
}

fn content_type_of(result: &GetResult) -> String {
    result
        .attributes
        .get(&Attribute::ContentType)
        .map(|v| v.to_string())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}

fn raw_from_meta(meta: &ObjectMeta) -> RawMetadata {
    RawMetadata {
        key: meta.location.as_ref().to_string(),
        content_length: meta.size as u64,
        content_type: None,
        etag: meta.e_tag.clone(),
        created: None,
        last_modified: Some(meta.last_modified),
    }
}

/// The directory portion of a key prefix (`"logs/2024/ja"` -> `"logs/2024"`).
pub(crate) fn enclosing_dir(prefix: &str) -> Option<&str> {
    prefix
        .rfind('/')
        .map(|idx| &prefix[..idx])
        .filter(|dir| !dir.is_empty())
}
