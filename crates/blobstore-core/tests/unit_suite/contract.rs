//! Behavior every in-process adapter must share.
//!
//! Each test runs against the memory, filesystem, S3 and Azure clients
//! (the cloud clients over an in-memory object store).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use blobstore_core::{ErrorKind, OpContext, WritePayload, WriteRequest};
use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use super::helpers::{enumerate_all, in_process_stores, seed};

// ============================================================================
// Read / Write
// ============================================================================

#[tokio::test]
async fn contract_write_then_get_roundtrip() {
    for store in in_process_stores(100) {
        let ctx = OpContext::new();
        let data = Bytes::from_static(b"the quick brown fox");

        store
            .client
            .write("docs/fox.txt", "text/plain", data.clone().into(), &ctx)
            .await
            .unwrap();

        let got = store.client.get("docs/fox.txt", &ctx).await.unwrap();
        assert_eq!(got, data, "{}", store.name);

        let meta = store.client.get_metadata("docs/fox.txt", &ctx).await.unwrap();
        assert_eq!(meta.key, "docs/fox.txt", "{}", store.name);
        assert_eq!(meta.content_length, data.len() as u64, "{}", store.name);
    }
}

#[tokio::test]
async fn contract_zero_length_roundtrip() {
    for store in in_process_stores(100) {
        let ctx = OpContext::new();
        store
            .client
            .write("empty.bin", "application/octet-stream", Bytes::new().into(), &ctx)
            .await
            .unwrap();

        let got = store.client.get("empty.bin", &ctx).await.unwrap();
        assert!(got.is_empty(), "{}", store.name);

        let blob = store.client.get_stream("empty.bin", &ctx).await.unwrap();
        assert_eq!(blob.content_length(), 0, "{}", store.name);

        let meta = store.client.get_metadata("empty.bin", &ctx).await.unwrap();
        assert_eq!(meta.content_length, 0, "{}", store.name);
    }
}

#[tokio::test]
async fn contract_stream_write_and_read() {
    for store in in_process_stores(100) {
        let ctx = OpContext::new();
        let payload = vec![7u8; 64 * 1024];

        store
            .client
            .write(
                "blob/large.bin",
                "application/octet-stream",
                WritePayload::stream(std::io::Cursor::new(payload.clone()), payload.len() as u64),
                &ctx,
            )
            .await
            .unwrap();

        let blob = store.client.get_stream("blob/large.bin", &ctx).await.unwrap();
        assert_eq!(blob.content_length(), payload.len() as u64, "{}", store.name);

        let mut read = Vec::new();
        blob.into_reader().read_to_end(&mut read).await.unwrap();
        assert_eq!(read, payload, "{}", store.name);
    }
}

#[tokio::test]
async fn contract_short_stream_is_invalid_input() {
    for store in in_process_stores(100) {
        let ctx = OpContext::new();
        let err = store
            .client
            .write(
                "short.bin",
                "application/octet-stream",
                WritePayload::stream(std::io::Cursor::new(vec![1u8, 2, 3]), 10),
                &ctx,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput, "{}", store.name);
        assert!(!store.client.exists("short.bin", &ctx).await.unwrap(), "{}", store.name);
    }
}

#[tokio::test]
async fn contract_overwrite_replaces_content() {
    for store in in_process_stores(100) {
        let ctx = OpContext::new();
        store.client.write("k", "text/plain", "one".into(), &ctx).await.unwrap();
        store.client.write("k", "text/plain", "second".into(), &ctx).await.unwrap();

        assert_eq!(store.client.get("k", &ctx).await.unwrap(), "second", "{}", store.name);
    }
}

#[tokio::test]
async fn contract_missing_key_is_not_found() {
    for store in in_process_stores(100) {
        let ctx = OpContext::new();
        let err = store.client.get("missing", &ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound, "{}", store.name);

        let err = store.client.get_metadata("missing", &ctx).await.unwrap_err();
        assert!(err.is_not_found(), "{}", store.name);

        assert!(store.client.get_stream("missing", &ctx).await.is_err());
    }
}

#[tokio::test]
async fn contract_empty_key_is_invalid_input() {
    for store in in_process_stores(100) {
        let ctx = OpContext::new();
        let err = store.client.write("", "text/plain", "x".into(), &ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput, "{}", store.name);
    }
}

// ============================================================================
// Delete / Exists
// ============================================================================

#[tokio::test]
async fn contract_delete_is_idempotent() {
    for store in in_process_stores(100) {
        let ctx = OpContext::new();
        store.client.write("gone", "text/plain", "x".into(), &ctx).await.unwrap();

        store.client.delete("gone", &ctx).await.unwrap();
        store.client.delete("gone", &ctx).await.unwrap();
        assert!(!store.client.exists("gone", &ctx).await.unwrap(), "{}", store.name);
    }
}

#[tokio::test]
async fn contract_exists_tracks_writes() {
    for store in in_process_stores(100) {
        let ctx = OpContext::new();
        assert!(!store.client.exists("a/b.txt", &ctx).await.unwrap(), "{}", store.name);

        store.client.write("a/b.txt", "text/plain", "x".into(), &ctx).await.unwrap();
        assert!(store.client.exists("a/b.txt", &ctx).await.unwrap(), "{}", store.name);
    }
}

// ============================================================================
// Metadata
// ============================================================================

#[tokio::test]
async fn contract_etags_are_unquoted() {
    for store in in_process_stores(100) {
        let ctx = OpContext::new();
        seed(store.client.as_ref(), "tag/", 3).await;

        let meta = store.client.get_metadata("tag/0000", &ctx).await.unwrap();
        assert!(!meta.etag.contains('"'), "{}: {}", store.name, meta.etag);

        let page = store.client.enumerate(Some("tag/"), None, &ctx).await.unwrap();
        assert!(page.blobs.iter().all(|b| !b.etag.contains('"')), "{}", store.name);
    }
}

#[tokio::test]
async fn contract_metadata_timestamps_are_ordered() {
    for store in in_process_stores(100) {
        let ctx = OpContext::new();
        store.client.write("t", "text/plain", "x".into(), &ctx).await.unwrap();

        let meta = store.client.get_metadata("t", &ctx).await.unwrap();
        assert!(meta.created_utc <= meta.last_modified_utc, "{}", store.name);
        assert!(!meta.content_type.is_empty(), "{}", store.name);
    }
}

// ============================================================================
// Bulk operations
// ============================================================================

#[tokio::test]
async fn contract_write_many_writes_in_order() {
    for store in in_process_stores(100) {
        let ctx = OpContext::new();
        let requests = (0..4)
            .map(|i| WriteRequest::new(format!("batch/{}", i), "text/plain", format!("v{}", i)))
            .collect();

        store.client.write_many(requests, &ctx).await.unwrap();

        let (keys, _) = enumerate_all(store.client.as_ref(), Some("batch/")).await;
        assert_eq!(keys, vec!["batch/0", "batch/1", "batch/2", "batch/3"], "{}", store.name);
    }
}

#[tokio::test]
async fn contract_write_many_halts_at_first_failure() {
    for store in in_process_stores(100) {
        let ctx = OpContext::new();
        let requests = vec![
            WriteRequest::new("first", "text/plain", "1"),
            WriteRequest::new("", "text/plain", "bad"),
            WriteRequest::new("third", "text/plain", "3"),
        ];

        let err = store.client.write_many(requests, &ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput, "{}", store.name);

        assert!(store.client.exists("first", &ctx).await.unwrap(), "{}", store.name);
        assert!(!store.client.exists("third", &ctx).await.unwrap(), "{}", store.name);
    }
}

#[tokio::test]
async fn contract_empty_removes_everything() {
    for store in in_process_stores(100) {
        let ctx = OpContext::new();
        seed(store.client.as_ref(), "e/", 5).await;

        let result = store.client.empty(&ctx).await.unwrap();
        assert_eq!(result.len(), 5, "{}", store.name);

        let page = store.client.enumerate(None, None, &ctx).await.unwrap();
        assert!(page.blobs.is_empty(), "{}", store.name);
        assert!(page.next_continuation_token.is_none(), "{}", store.name);
    }
}

#[tokio::test]
async fn contract_empty_spans_many_pages() {
    for store in in_process_stores(4) {
        let ctx = OpContext::new();
        seed(store.client.as_ref(), "p/", 11).await;

        let result = store.client.empty(&ctx).await.unwrap();
        assert_eq!(result.len(), 11, "{}", store.name);

        let (keys, _) = enumerate_all(store.client.as_ref(), None).await;
        assert!(keys.is_empty(), "{}", store.name);
    }
}

#[tokio::test]
async fn contract_empty_on_empty_store() {
    for store in in_process_stores(100) {
        let result = store.client.empty(&OpContext::new()).await.unwrap();
        assert!(result.is_empty(), "{}", store.name);
    }
}

// ============================================================================
// Keys
// ============================================================================

#[tokio::test]
async fn contract_listed_keys_read_back_unchanged() {
    let accepted = ["report#1.txt", "x%y", "x%20y", "sp ace", "odd/{a}^|b"];
    let rejected = ["dir//file", "/leading", "trailing/"];

    for store in in_process_stores(2) {
        let ctx = OpContext::new();
        for key in accepted {
            store
                .client
                .write(key, "text/plain", key.into(), &ctx)
                .await
                .unwrap_or_else(|e| panic!("{}: write {:?}: {}", store.name, key, e));
        }
        for key in rejected {
            let err = store
                .client
                .write(key, "text/plain", "x".into(), &ctx)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{}: {:?}", store.name, key);
        }

        let (mut listed, _) = enumerate_all(store.client.as_ref(), None).await;
        listed.sort();
        let mut expected: Vec<_> = accepted.iter().map(|k| k.to_string()).collect();
        expected.sort();
        assert_eq!(listed, expected, "{}", store.name);

        for key in &listed {
            let data = store.client.get(key, &ctx).await.unwrap();
            assert_eq!(data, Bytes::from(key.clone()), "{}", store.name);
        }

        let result = tokio::time::timeout(Duration::from_secs(10), store.client.empty(&ctx))
            .await
            .unwrap_or_else(|_| panic!("{}: empty did not finish", store.name))
            .unwrap();
        assert_eq!(result.len(), accepted.len(), "{}", store.name);

        let (keys, _) = enumerate_all(store.client.as_ref(), None).await;
        assert!(keys.is_empty(), "{}", store.name);
    }
}

// ============================================================================
// Cancellation and logging
// ============================================================================

#[tokio::test]
async fn contract_cancelled_context_fails_every_operation() {
    for store in in_process_stores(100) {
        seed(store.client.as_ref(), "c/", 2).await;

        let token = CancellationToken::new();
        token.cancel();
        let ctx = OpContext::with_cancellation(token);

        let err = store.client.get("c/0000", &ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled, "{}", store.name);

        let err = store
            .client
            .write("c/new", "text/plain", "x".into(), &ctx)
            .await
            .unwrap_err();
        assert!(err.is_cancelled(), "{}", store.name);

        let err = store.client.enumerate(None, None, &ctx).await.unwrap_err();
        assert!(err.is_cancelled(), "{}", store.name);
    }
}

#[tokio::test]
async fn contract_cancelled_empty_reports_partial_result() {
    for store in in_process_stores(100) {
        seed(store.client.as_ref(), "x/", 3).await;

        let token = CancellationToken::new();
        token.cancel();
        let ctx = OpContext::with_cancellation(token);

        match store.client.empty(&ctx).await {
            Err(blobstore_core::Error::EmptyAborted { deleted, source }) => {
                assert!(deleted.is_empty(), "{}", store.name);
                assert!(source.is_cancelled(), "{}", store.name);
            }
            other => panic!("{}: expected EmptyAborted, got {:?}", store.name, other),
        }
    }
}

#[tokio::test]
async fn contract_log_sink_sees_operations() {
    for store in in_process_stores(100) {
        let lines = Arc::new(Mutex::new(Vec::<String>::new()));
        let captured = lines.clone();
        let ctx = OpContext::new().with_log_sink(move |line| {
            captured.lock().unwrap().push(line.to_string());
        });

        store.client.write("logged", "text/plain", "x".into(), &ctx).await.unwrap();
        store.client.enumerate(None, None, &ctx).await.unwrap();

        let lines = lines.lock().unwrap();
        assert!(!lines.is_empty(), "{}", store.name);
        assert!(lines.iter().any(|l| l.contains("enumerate")), "{}", store.name);
    }
}
