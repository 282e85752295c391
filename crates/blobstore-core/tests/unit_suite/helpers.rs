//! Test helper utilities.
//!
//! Provides the in-process stores the contract tests run against and a
//! tiny harness for spawning fake REST servers.

use std::sync::Arc;

use axum::Router;
use blobstore_core::storage::{
    AzureClient, AzureSettings, FilesystemClient, FilesystemSettings, MemoryClient, S3Client,
    S3Settings,
};
use blobstore_core::{BlobClient, OpContext};
use object_store::memory::InMemory;
use tempfile::TempDir;

/// A client plus whatever must outlive it.
pub struct TestStore {
    pub name: &'static str,
    pub client: Arc<dyn BlobClient>,
    _dir: Option<TempDir>,
}

/// Every adapter that can run without external services.
pub fn in_process_stores(page_size: usize) -> Vec<TestStore> {
    let dir = TempDir::new().unwrap();
    let mut fs_settings = FilesystemSettings::new(dir.path());
    fs_settings.page_size = page_size;

    let mut s3_settings = S3Settings::new("test-bucket");
    s3_settings.page_size = page_size;

    let mut azure_settings = AzureSettings::new("acct", "test-container");
    azure_settings.page_size = page_size;

    vec![
        TestStore {
            name: "memory",
            client: Arc::new(MemoryClient::with_page_size(page_size)),
            _dir: None,
        },
        TestStore {
            name: "filesystem",
            client: Arc::new(FilesystemClient::new(fs_settings)),
            _dir: Some(dir),
        },
        TestStore {
            name: "s3",
            client: Arc::new(S3Client::with_store(s3_settings, Arc::new(InMemory::new()))),
            _dir: None,
        },
        TestStore {
            name: "azure",
            client: Arc::new(AzureClient::with_store(
                azure_settings,
                Arc::new(InMemory::new()),
            )),
            _dir: None,
        },
    ]
}

/// Write `count` small objects named `{prefix}{i:04}`.
pub async fn seed(client: &dyn BlobClient, prefix: &str, count: usize) {
    let ctx = OpContext::new();
    for i in 0..count {
        client
            .write(
                &format!("{}{:04}", prefix, i),
                "text/plain",
                format!("object {}", i).into(),
                &ctx,
            )
            .await
            .unwrap();
    }
}

/// Follow continuation tokens to the end, returning every key and the
/// number of pages fetched.
pub async fn enumerate_all(client: &dyn BlobClient, prefix: Option<&str>) -> (Vec<String>, usize) {
    let ctx = OpContext::new();
    let mut keys = Vec::new();
    let mut pages = 0;
    let mut token: Option<String> = None;

    loop {
        let page = client
            .enumerate(prefix, token.as_deref(), &ctx)
            .await
            .unwrap();
        pages += 1;
        keys.extend(page.blobs.into_iter().map(|b| b.key));
        token = page.next_continuation_token;
        if token.is_none() {
            break;
        }
    }

    (keys, pages)
}

/// Serve `app` on an ephemeral local port, returning its base URL.
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Whether the request carries the expected API key.
pub fn authorized(headers: &axum::http::HeaderMap, api_key: &str) -> bool {
    headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == api_key)
}
