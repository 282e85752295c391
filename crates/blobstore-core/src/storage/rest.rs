//! HTTP plumbing shared by the REST-based stores (Kvpbase, Komodo).
//!
//! Neither store returns a structured error body we can rely on, so failures
//! are classified from the status code alone.

use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use tokio_util::io::StreamReader;
use url::Url;

use crate::context::OpContext;
use crate::error::StorageError;
use crate::model::{BlobData, DEFAULT_CONTENT_TYPE};
use crate::{Error, Result};

pub(crate) const API_KEY_HEADER: &str = "x-api-key";

pub(crate) struct RestTransport {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
    /// Backend label used in log lines and error messages
    label: &'static str,
}

impl RestTransport {
    pub(crate) fn new(endpoint: &str, api_key: &str, label: &'static str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| Error::Config(format!("Invalid {} endpoint {}: {}", label, endpoint, e)))?;
        if endpoint.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "Invalid {} endpoint: {}",
                label, endpoint
            )));
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("Failed to create {} client: {}", label, e)))?;

        Ok(Self {
            http,
            endpoint,
            api_key: api_key.to_string(),
            label,
        })
    }

    pub(crate) fn label(&self) -> &'static str {
        self.label
    }

    /// Endpoint URL extended by `segments`; every `/` in a segment starts a
    /// new path segment and everything else is percent-encoded.
    pub(crate) fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            for segment in segments {
                path.extend(segment.split('/'));
            }
        }
        url
    }

    pub(crate) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(API_KEY_HEADER, &self.api_key)
    }

    /// Send one request and classify any non-2xx status.
    pub(crate) async fn send(
        &self,
        request: RequestBuilder,
        key: &str,
        ctx: &OpContext,
    ) -> Result<Response> {
        ctx.run(async {
            let response = request.send().await.map_err(|e| {
                Error::backend(format!("{} request failed: {}", self.label, e))
            })?;
            let status = response.status();
            if status.is_success() {
                Ok(response)
            } else {
                Err(status_error(self.label, status, key))
            }
        })
        .await
    }

    /// Like [`send`](Self::send), but a 404 counts as success.
    pub(crate) async fn send_idempotent_delete(
        &self,
        request: RequestBuilder,
        key: &str,
        ctx: &OpContext,
    ) -> Result<()> {
        match self.send(request, key, ctx).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub(crate) async fn read_body(&self, response: Response, ctx: &OpContext) -> Result<Bytes> {
        ctx.run(async {
            response.bytes().await.map_err(|e| {
                Error::backend(format!("Failed to read {} response: {}", self.label, e))
            })
        })
        .await
    }

    pub(crate) async fn read_json<T>(&self, response: Response, ctx: &OpContext) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let body = self.read_body(response, ctx).await?;
        serde_json::from_slice(&body).map_err(|e| {
            Error::backend(format!("Malformed {} response: {}", self.label, e))
        })
    }

    /// Wrap a payload response as a stream. Zero-length objects always
    /// yield an empty stream, whatever the empty-object policy says.
    pub(crate) async fn into_blob(&self, response: Response, ctx: &OpContext) -> Result<BlobData> {
        let content_type = content_type_of(&response);
        match response.content_length() {
            Some(0) => Ok(BlobData::empty(content_type)),
            Some(len) => {
                let stream = response
                    .bytes_stream()
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
                Ok(BlobData::new(len, content_type, StreamReader::new(stream)))
            }
            // Chunked responses carry no length; buffer to learn it.
            None => {
                let data = self.read_body(response, ctx).await?;
                Ok(BlobData::from_bytes(data, content_type))
            }
        }
    }
}

fn content_type_of(response: &Response) -> String {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

/// Map a non-success status onto the shared error taxonomy.
pub(crate) fn status_error(label: &str, status: StatusCode, key: &str) -> Error {
    match status {
        StatusCode::NOT_FOUND => Error::not_found(key),
        StatusCode::BAD_REQUEST
        | StatusCode::LENGTH_REQUIRED
        | StatusCode::PAYLOAD_TOO_LARGE
        | StatusCode::UNPROCESSABLE_ENTITY => Error::invalid_input(format!(
            "{} rejected request for {}: {}",
            label, key, status
        )),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Storage(
            StorageError::PermissionDenied(format!("{} {}: {}", label, key, status)),
        ),
        _ => Error::backend(format!("{} returned {} for {}", label, status, key)),
    }
}
