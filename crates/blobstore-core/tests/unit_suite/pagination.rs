//! Enumeration paging across the in-process adapters.

use std::collections::BTreeSet;

use blobstore_core::{ErrorKind, OpContext};

use super::helpers::{enumerate_all, in_process_stores, seed};

#[tokio::test]
async fn pagination_250_objects_in_pages_of_100() {
    for store in in_process_stores(100) {
        seed(store.client.as_ref(), "logs/", 250).await;
        seed(store.client.as_ref(), "other/", 7).await;

        let (keys, pages) = enumerate_all(store.client.as_ref(), Some("logs/")).await;
        assert_eq!(pages, 3, "{}", store.name);
        assert_eq!(keys.len(), 250, "{}", store.name);

        let distinct: BTreeSet<_> = keys.iter().collect();
        assert_eq!(distinct.len(), 250, "{}", store.name);
        assert!(keys.iter().all(|k| k.starts_with("logs/")), "{}", store.name);
    }
}

#[tokio::test]
async fn pagination_page_sizes_and_final_token() {
    for store in in_process_stores(100) {
        let ctx = OpContext::new();
        seed(store.client.as_ref(), "logs/", 250).await;

        let first = store.client.enumerate(Some("logs/"), None, &ctx).await.unwrap();
        assert_eq!(first.blobs.len(), 100, "{}", store.name);
        assert!(first.has_more(), "{}", store.name);

        let second = store
            .client
            .enumerate(Some("logs/"), first.next_continuation_token.as_deref(), &ctx)
            .await
            .unwrap();
        assert_eq!(second.blobs.len(), 100, "{}", store.name);
        assert_eq!(second.blobs[0].key, "logs/0100", "{}", store.name);

        let third = store
            .client
            .enumerate(Some("logs/"), second.next_continuation_token.as_deref(), &ctx)
            .await
            .unwrap();
        assert_eq!(third.blobs.len(), 50, "{}", store.name);
        assert!(third.next_continuation_token.is_none(), "{}", store.name);
    }
}

#[tokio::test]
async fn pagination_exact_multiple_of_page_size() {
    for store in in_process_stores(5) {
        seed(store.client.as_ref(), "", 10).await;

        let (keys, pages) = enumerate_all(store.client.as_ref(), None).await;
        assert_eq!(keys.len(), 10, "{}", store.name);
        assert_eq!(pages, 2, "{}", store.name);
    }
}

#[tokio::test]
async fn pagination_prefix_is_a_plain_string_prefix() {
    for store in in_process_stores(100) {
        let ctx = OpContext::new();
        for key in ["logs/a", "logs/sub/b", "logsX/c", "log", "other/d"] {
            store.client.write(key, "text/plain", "x".into(), &ctx).await.unwrap();
        }

        let (keys, _) = enumerate_all(store.client.as_ref(), Some("logs")).await;
        assert_eq!(keys, vec!["logs/a", "logs/sub/b", "logsX/c"], "{}", store.name);

        let (keys, _) = enumerate_all(store.client.as_ref(), Some("logs/s")).await;
        assert_eq!(keys, vec!["logs/sub/b"], "{}", store.name);
    }
}

#[tokio::test]
async fn pagination_empty_prefix_lists_everything() {
    for store in in_process_stores(100) {
        seed(store.client.as_ref(), "a/", 2).await;
        seed(store.client.as_ref(), "b/", 2).await;

        let (keys, pages) = enumerate_all(store.client.as_ref(), Some("")).await;
        assert_eq!(keys.len(), 4, "{}", store.name);
        assert_eq!(pages, 1, "{}", store.name);
    }
}

#[tokio::test]
async fn pagination_unknown_prefix_yields_one_empty_page() {
    for store in in_process_stores(100) {
        seed(store.client.as_ref(), "a/", 2).await;

        let page = store
            .client
            .enumerate(Some("zzz"), None, &OpContext::new())
            .await
            .unwrap();
        assert!(page.is_empty(), "{}", store.name);
        assert!(!page.has_more(), "{}", store.name);
    }
}

#[tokio::test]
async fn pagination_malformed_token_is_invalid_input() {
    for store in in_process_stores(100) {
        let err = store
            .client
            .enumerate(None, Some("not*a*token"), &OpContext::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput, "{}", store.name);
    }
}
