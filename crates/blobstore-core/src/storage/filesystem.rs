//! Filesystem storage backend implementation.
//!
//! Keys map onto paths under a root directory, with `/` in a key becoming a
//! directory separator. Writes land in a hidden sibling file first and are
//! renamed into place, so an interrupted write never leaves a truncated
//! object behind.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::info;

use super::client::validate_key;
use super::config::FilesystemSettings;
use super::enumeration::{self, NativePage, PageSource};
use super::object::enclosing_dir;
use super::BlobClient;
use crate::context::OpContext;
use crate::error::StorageError;
use crate::model::{
    BlobData, BlobMetadata, EnumerationResult, RawMetadata, WritePayload, DEFAULT_CONTENT_TYPE,
};
use crate::{Error, Result};

/// Suffix of in-progress writes; such files are never listed.
const PARTIAL_SUFFIX: &str = ".blobstore-partial";

/// Filesystem-based storage backend
#[derive(Debug, Clone)]
pub struct FilesystemClient {
    root: PathBuf,
    page_size: usize,
}

impl FilesystemClient {
    /// Create a new filesystem client rooted at `settings.root`
    pub fn new(settings: FilesystemSettings) -> Self {
        info!("Created filesystem client at: {}", settings.root.display());
        Self {
            root: settings.root,
            page_size: settings.page_size.max(1),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Convert a storage key to a filesystem path
    fn key_to_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        let mut path = self.root.clone();
        for part in key.split('/') {
            if part.is_empty() {
                return Err(Error::invalid_input(format!(
                    "key must not contain empty path segments: {}",
                    key
                )));
            }
            if part == ".." || part == "." {
                return Err(Error::invalid_input(format!(
                    "key must not contain relative components: {}",
                    key
                )));
            }
            path.push(part);
        }
        Ok(path)
    }

    /// Convert a filesystem path to a storage key. Names that are not valid
    /// UTF-8 have no key and are skipped.
    fn path_to_key(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?;
        Some(parts.join("/"))
    }

    fn io_error(&self, op: &str, key: &str, path: &Path, e: std::io::Error) -> Error {
        match e.kind() {
            std::io::ErrorKind::NotFound => Error::not_found(key),
            std::io::ErrorKind::PermissionDenied => Error::Storage(
                StorageError::PermissionDenied(format!("{} {}: {}", op, path.display(), e)),
            ),
            _ => Error::backend(format!("Failed to {} {}: {}", op, path.display(), e)),
        }
    }

    /// Stat a path that must be a regular file.
    async fn file_metadata(&self, key: &str, path: &Path) -> Result<std::fs::Metadata> {
        let metadata = fs::metadata(path)
            .await
            .map_err(|e| self.io_error("stat", key, path, e))?;
        if !metadata.is_file() {
            return Err(Error::not_found(key));
        }
        Ok(metadata)
    }

    async fn write_to(&self, tmp: &Path, payload: WritePayload) -> Result<()> {
        let mut file = fs::File::create(tmp)
            .await
            .map_err(|e| self.io_error("create file", "", tmp, e))?;

        match payload {
            WritePayload::Bytes(data) => {
                file.write_all(&data)
                    .await
                    .map_err(|e| self.io_error("write to file", "", tmp, e))?;
            }
            WritePayload::Stream {
                reader,
                content_length,
            } => {
                let mut limited = reader.take(content_length);
                let copied = tokio::io::copy(&mut limited, &mut file)
                    .await
                    .map_err(|e| self.io_error("write to file", "", tmp, e))?;
                if copied != content_length {
                    return Err(Error::invalid_input(format!(
                        "stream ended after {} of {} declared bytes",
                        copied, content_length
                    )));
                }
            }
        }

        file.flush()
            .await
            .map_err(|e| self.io_error("flush file", "", tmp, e))?;
        Ok(())
    }

    /// Every stored key under `start`, sorted.
    async fn walk(&self, start: PathBuf) -> Result<Vec<String>> {
        let mut results = Vec::new();
        let mut stack = vec![start];

        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(self.io_error("read directory", "", &dir, e)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| self.io_error("read directory entry", "", &dir, e))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| self.io_error("stat", "", &path, e))?;

                let is_dir = if file_type.is_symlink() {
                    fs::metadata(&path).await.map(|m| m.is_dir()).unwrap_or(false)
                } else {
                    file_type.is_dir()
                };

                if is_dir {
                    stack.push(path);
                } else if let Some(key) = self.path_to_key(&path) {
                    if !key.ends_with(PARTIAL_SUFFIX) {
                        results.push(key);
                    }
                }
            }
        }

        results.sort();
        Ok(results)
    }
}

fn raw_from_fs(key: String, metadata: &std::fs::Metadata) -> RawMetadata {
    RawMetadata {
        key,
        content_length: metadata.len(),
        content_type: None,
        etag: None,
        created: metadata.created().ok().map(DateTime::<Utc>::from),
        last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    path.with_file_name(format!(
        ".{}.{}-{}{}",
        name,
        std::process::id(),
        nanos,
        PARTIAL_SUFFIX
    ))
}

#[async_trait]
impl PageSource for FilesystemClient {
    /// The last key of the previous page
    type Cursor = String;

    async fn list_page(
        &self,
        prefix: Option<&str>,
        cursor: Option<String>,
        ctx: &OpContext,
    ) -> Result<NativePage<String>> {
        // A directory that is not a valid key is walked from the root.
        let start = prefix
            .and_then(enclosing_dir)
            .and_then(|dir| self.key_to_path(dir).ok())
            .unwrap_or_else(|| self.root.clone());
        ctx.log(&format!(
            "Filesystem LIST: {} prefix={:?} after={:?}",
            start.display(),
            prefix,
            cursor
        ));

        let keys = ctx.run(self.walk(start)).await?;
        let mut remaining = keys
            .into_iter()
            .filter(|k| prefix.map_or(true, |p| k.starts_with(p)))
            .filter(|k| cursor.as_ref().map_or(true, |c| k > c));

        let mut entries = Vec::with_capacity(self.page_size);
        for key in remaining.by_ref().take(self.page_size) {
            let path = self.key_to_path(&key)?;
            // Files removed between the walk and the stat are skipped.
            match ctx.run(self.file_metadata(&key, &path)).await {
                Ok(metadata) => entries.push(raw_from_fs(key, &metadata)),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }

        let next_cursor = match remaining.next() {
            Some(_) => entries.last().map(|e: &RawMetadata| e.key.clone()),
            None => None,
        };

        Ok(NativePage {
            entries,
            next_cursor,
        })
    }
}

#[async_trait]
impl BlobClient for FilesystemClient {
    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    async fn get(&self, key: &str, ctx: &OpContext) -> Result<Bytes> {
        let path = self.key_to_path(key)?;
        ctx.log(&format!("Filesystem GET: {}", path.display()));

        ctx.run(async {
            self.file_metadata(key, &path).await?;
            let data = fs::read(&path)
                .await
                .map_err(|e| self.io_error("read file", key, &path, e))?;
            Ok(Bytes::from(data))
        })
        .await
    }

    async fn get_stream(&self, key: &str, ctx: &OpContext) -> Result<BlobData> {
        let path = self.key_to_path(key)?;
        ctx.log(&format!("Filesystem GET (stream): {}", path.display()));

        ctx.run(async {
            let metadata = self.file_metadata(key, &path).await?;
            let file = fs::File::open(&path)
                .await
                .map_err(|e| self.io_error("open file", key, &path, e))?;
            Ok(BlobData::new(metadata.len(), DEFAULT_CONTENT_TYPE, file))
        })
        .await
    }

    async fn get_metadata(&self, key: &str, ctx: &OpContext) -> Result<BlobMetadata> {
        let path = self.key_to_path(key)?;
        ctx.log(&format!("Filesystem HEAD: {}", path.display()));

        let metadata = ctx.run(self.file_metadata(key, &path)).await?;
        Ok(BlobMetadata::from_raw(raw_from_fs(key.to_string(), &metadata)))
    }

    async fn write(
        &self,
        key: &str,
        _content_type: &str,
        payload: WritePayload,
        ctx: &OpContext,
    ) -> Result<()> {
        let path = self.key_to_path(key)?;
        ctx.log(&format!(
            "Filesystem PUT: {} ({} bytes)",
            path.display(),
            payload.content_length()
        ));

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            ctx.run(async {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.io_error("create directories", key, parent, e))
            })
            .await?;
        }

        let tmp = partial_path(&path);
        let result = ctx
            .run(async {
                self.write_to(&tmp, payload).await?;
                fs::rename(&tmp, &path)
                    .await
                    .map_err(|e| self.io_error("rename file", key, &path, e))
            })
            .await;

        if result.is_err() {
            let _ = fs::remove_file(&tmp).await;
        }
        result
    }

    async fn delete(&self, key: &str, ctx: &OpContext) -> Result<()> {
        let path = self.key_to_path(key)?;
        ctx.log(&format!("Filesystem DELETE: {}", path.display()));

        ctx.run(async {
            match fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(self.io_error("delete file", key, &path, e)),
            }
        })
        .await
    }

    /// Stat the file directly rather than going through metadata.
    async fn exists(&self, key: &str, ctx: &OpContext) -> Result<bool> {
        let path = self.key_to_path(key)?;
        ctx.log(&format!("Filesystem STAT: {}", path.display()));

        ctx.run(async {
            match fs::metadata(&path).await {
                Ok(metadata) => Ok(metadata.is_file()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(self.io_error("stat", key, &path, e)),
            }
        })
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
        let path = match self.key_to_path(key) {
            Ok(path) => path,
            Err(_) => self.root.join(key),
        };
        url::Url::from_file_path(&path)
            .map(String::from)
            .unwrap_or_else(|_| path.display().to_string())
    }
}
