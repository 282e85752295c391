//! Kvpbase client against an in-process fake server.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use blobstore_core::storage::{KvpbaseClient, KvpbaseListing, KvpbaseObject, KvpbaseSettings};
use blobstore_core::{BlobClient, EmptyObjectPolicy, ErrorKind, OpContext};
use chrono::Utc;
use serde::Deserialize;
use tokio::io::AsyncReadExt;

use super::helpers::{authorized, enumerate_all, seed, spawn_server};

const API_KEY: &str = "kvp-secret";

#[derive(Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
    etag: String,
    created: chrono::DateTime<Utc>,
}

#[derive(Clone, Default)]
struct FakeKvpbase {
    objects: Arc<Mutex<BTreeMap<String, StoredObject>>>,
    /// Status every request is answered with, when set
    fail_with: Arc<Mutex<Option<StatusCode>>>,
}

impl FakeKvpbase {
    fn describe(key: &str, obj: &StoredObject) -> KvpbaseObject {
        KvpbaseObject {
            key: key.to_string(),
            content_type: Some(obj.content_type.clone()),
            content_length: obj.data.len() as u64,
            etag: Some(obj.etag.clone()),
            created_utc: Some(obj.created),
            last_update_utc: Some(obj.created),
        }
    }

    fn check(&self, headers: &HeaderMap) -> Option<Response> {
        if let Some(status) = *self.fail_with.lock().unwrap() {
            return Some(status.into_response());
        }
        if !authorized(headers, API_KEY) {
            return Some(StatusCode::UNAUTHORIZED.into_response());
        }
        None
    }
}

#[derive(Deserialize)]
struct ListParams {
    #[serde(rename = "_index", default)]
    index: usize,
    #[serde(rename = "_count", default)]
    count: usize,
    #[serde(rename = "_prefix")]
    prefix: Option<String>,
}

async fn list_objects(
    State(state): State<FakeKvpbase>,
    Path((_user, _container)): Path<(String, String)>,
    Query(params): Query<ListParams>,
    headers: HeaderMap,
) -> Response {
    if let Some(rejection) = state.check(&headers) {
        return rejection;
    }
    let objects = state.objects.lock().unwrap();
    let matching: Vec<_> = objects
        .iter()
        .filter(|(k, _)| params.prefix.as_deref().map_or(true, |p| k.starts_with(p)))
        .collect();

    Json(KvpbaseListing {
        objects: matching
            .iter()
            .skip(params.index)
            .take(params.count)
            .map(|(k, o)| FakeKvpbase::describe(k, o))
            .collect(),
        total_count: matching.len() as u64,
    })
    .into_response()
}

async fn get_object(
    State(state): State<FakeKvpbase>,
    Path((_user, _container, key)): Path<(String, String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Some(rejection) = state.check(&headers) {
        return rejection;
    }
    let objects = state.objects.lock().unwrap();
    let Some(obj) = objects.get(&key) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if query.contains_key("_metadata") {
        return Json(FakeKvpbase::describe(&key, obj)).into_response();
    }
    ([(header::CONTENT_TYPE, obj.content_type.clone())], obj.data.clone()).into_response()
}

async fn put_object(
    State(state): State<FakeKvpbase>,
    Path((_user, _container, key)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(rejection) = state.check(&headers) {
        return rejection;
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let mut objects = state.objects.lock().unwrap();
    let etag = format!("\"{}-{}\"", body.len(), objects.len());
    objects.insert(
        key,
        StoredObject {
            data: body,
            content_type,
            etag,
            created: Utc::now(),
        },
    );
    StatusCode::CREATED.into_response()
}

async fn delete_object(
    State(state): State<FakeKvpbase>,
    Path((_user, _container, key)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Some(rejection) = state.check(&headers) {
        return rejection;
    }
    match state.objects.lock().unwrap().remove(&key) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn start(page_size: usize) -> (FakeKvpbase, KvpbaseClient) {
    start_with(page_size, API_KEY, EmptyObjectPolicy::Retrievable).await
}

async fn start_with(
    page_size: usize,
    api_key: &str,
    policy: EmptyObjectPolicy,
) -> (FakeKvpbase, KvpbaseClient) {
    let state = FakeKvpbase::default();
    let app = Router::new()
        .route("/{user}/{container}", get(list_objects))
        .route(
            "/{user}/{container}/{*key}",
            get(get_object).put(put_object).delete(delete_object),
        )
        .with_state(state.clone());
    let endpoint = spawn_server(app).await;

    let mut settings = KvpbaseSettings::new(endpoint, "default", "photos", api_key);
    settings.page_size = page_size;
    settings.empty_object_policy = policy;
    (state, KvpbaseClient::new(settings).unwrap())
}

#[tokio::test]
async fn kvpbase_write_get_roundtrip() {
    let (state, client) = start(100).await;
    let ctx = OpContext::new();

    client
        .write("2024/cat.jpg", "image/jpeg", vec![1u8, 2, 3, 4].into(), &ctx)
        .await
        .unwrap();
    assert!(state.objects.lock().unwrap().contains_key("2024/cat.jpg"));

    assert_eq!(client.get("2024/cat.jpg", &ctx).await.unwrap(), vec![1u8, 2, 3, 4]);

    let meta = client.get_metadata("2024/cat.jpg", &ctx).await.unwrap();
    assert_eq!(meta.content_length, 4);
    assert_eq!(meta.content_type, "image/jpeg");
    assert!(!meta.etag.is_empty());
    assert!(!meta.etag.contains('"'));
}

#[tokio::test]
async fn kvpbase_get_stream_reports_length_and_type() {
    let (_state, client) = start(100).await;
    let ctx = OpContext::new();
    client
        .write("doc.txt", "text/plain", "streamed body".into(), &ctx)
        .await
        .unwrap();

    let blob = client.get_stream("doc.txt", &ctx).await.unwrap();
    assert_eq!(blob.content_length(), 13);
    assert_eq!(blob.content_type(), "text/plain");

    let mut body = String::new();
    blob.into_reader().read_to_string(&mut body).await.unwrap();
    assert_eq!(body, "streamed body");
}

#[tokio::test]
async fn kvpbase_missing_and_idempotent_delete() {
    let (_state, client) = start(100).await;
    let ctx = OpContext::new();

    let err = client.get("nope", &ctx).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!client.exists("nope", &ctx).await.unwrap());

    client.write("x", "text/plain", "x".into(), &ctx).await.unwrap();
    assert!(client.exists("x", &ctx).await.unwrap());
    client.delete("x", &ctx).await.unwrap();
    client.delete("x", &ctx).await.unwrap();
    assert!(!client.exists("x", &ctx).await.unwrap());
}

#[tokio::test]
async fn kvpbase_zero_length_objects_follow_policy() {
    let (_state, client) = start(100).await;
    let ctx = OpContext::new();
    client
        .write("empty", "text/plain", Vec::<u8>::new().into(), &ctx)
        .await
        .unwrap();
    assert!(client.get("empty", &ctx).await.unwrap().is_empty());
    assert_eq!(client.get_stream("empty", &ctx).await.unwrap().content_length(), 0);

    let (_state, strict) = start_with(100, API_KEY, EmptyObjectPolicy::Missing).await;
    strict
        .write("empty", "text/plain", Vec::<u8>::new().into(), &ctx)
        .await
        .unwrap();
    assert!(strict.get("empty", &ctx).await.unwrap_err().is_not_found());
    let stream = strict.get_stream("empty", &ctx).await.unwrap();
    assert_eq!(stream.content_length(), 0);
    assert!(stream.into_bytes().await.unwrap().is_empty());
    assert!(!strict.exists("empty", &ctx).await.unwrap());
}

#[tokio::test]
async fn kvpbase_pagination_by_index() {
    let (_state, client) = start(100).await;
    seed(&client, "logs/", 250).await;
    seed(&client, "misc/", 3).await;

    let (keys, pages) = enumerate_all(&client, Some("logs/")).await;
    assert_eq!(pages, 3);
    assert_eq!(keys.len(), 250);
    assert_eq!(keys.first().map(String::as_str), Some("logs/0000"));
    assert_eq!(keys.last().map(String::as_str), Some("logs/0249"));
}

#[tokio::test]
async fn kvpbase_empty_drains_shifting_index() {
    let (state, client) = start(3).await;
    seed(&client, "", 7).await;

    let result = client.empty(&OpContext::new()).await.unwrap();
    assert_eq!(result.len(), 7);
    assert!(state.objects.lock().unwrap().is_empty());

    let page = client.enumerate(None, None, &OpContext::new()).await.unwrap();
    assert!(page.is_empty());
    assert!(!page.has_more());
}

#[tokio::test]
async fn kvpbase_empty_failure_carries_partial_result() {
    let (state, client) = start(2).await;
    seed(&client, "", 4).await;

    let ctx = OpContext::new();
    let first = client.enumerate(None, None, &ctx).await.unwrap();
    assert_eq!(first.blobs.len(), 2);

    *state.fail_with.lock().unwrap() = Some(StatusCode::INTERNAL_SERVER_ERROR);
    match client.empty(&ctx).await {
        Err(blobstore_core::Error::EmptyAborted { deleted, source }) => {
            assert!(deleted.is_empty());
            assert_eq!(source.kind(), ErrorKind::IoFailure);
        }
        other => panic!("expected EmptyAborted, got {:?}", other),
    }
}

#[tokio::test]
async fn kvpbase_status_codes_are_classified() {
    let (_state, client) = start_with(100, "wrong-key", EmptyObjectPolicy::Retrievable).await;
    let err = client.get("anything", &OpContext::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
    assert!(err.to_string().contains("Permission denied"));

    let (state, client) = start(100).await;
    *state.fail_with.lock().unwrap() = Some(StatusCode::BAD_REQUEST);
    let err = client
        .write("k", "text/plain", "x".into(), &OpContext::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn kvpbase_url_is_pure() {
    let (_state, client) = start(100).await;
    let url = client.generate_url("a/b.txt");
    assert!(url.starts_with("http://127.0.0.1:"));
    assert!(url.ends_with("/default/photos/a/b.txt"));
}
