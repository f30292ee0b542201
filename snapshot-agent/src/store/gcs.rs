//! Google Cloud Storage backend (JSON API).
//!
//! Listing follows `nextPageToken` until the bucket is exhausted. Uploads use
//! the single-request `uploadType=media` endpoint with the archive streamed
//! from disk. Requests carry a bearer token from the store's credentials.

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::auth::{Credentials, TokenSource};
use super::{ObjectStore, StoreError};
use crate::transfer::progress_stream::{percent, ProgressCallback, ProgressStream};

pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// One page of `objects.list`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    items: Vec<ObjectItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectItem {
    name: String,
}

#[derive(Debug, Clone)]
pub struct GcsStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    prefix: String,
    tokens: Arc<TokenSource>,
}

impl GcsStore {
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        let client = reqwest::Client::new();
        Self {
            tokens: Arc::new(TokenSource::new(client.clone(), credentials)),
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, StoreError> {
        Ok(match self.tokens.access_token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    async fn fetch_page(&self, page_token: Option<&str>) -> Result<ListPage, StoreError> {
        let url = format!("{}/storage/v1/b/{}/o", self.endpoint, self.bucket);

        let mut query: Vec<(&str, &str)> = vec![("fields", "items(name),nextPageToken")];
        if !self.prefix.is_empty() {
            query.push(("prefix", self.prefix.as_str()));
        }
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let resp = self
            .authorize(self.client.get(&url).query(&query))
            .await?
            .send()
            .await?;

        let resp = check_status(resp).await?;
        resp.json::<ListPage>()
            .await
            .map_err(|e| StoreError::InvalidResponse(format!("objects.list: {}", e)))
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    fn location(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.prefix)
    }

    async fn list_object_names(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self.fetch_page(page_token.as_deref()).await?;
            pages += 1;

            names.extend(page.items.into_iter().map(|item| {
                if item.name.starts_with(&self.prefix) {
                    item.name[self.prefix.len()..].to_string()
                } else {
                    item.name
                }
            }));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!("Listed {} objects in {} page(s) from {}", names.len(), pages, self.location());
        Ok(names)
    }

    async fn put_object(&self, name: &str, source: &Path) -> Result<u64, StoreError> {
        let file = tokio::fs::File::open(source).await?;
        let size = file.metadata().await?.len();
        let object_name = format!("{}{}", self.prefix, name);

        let log_name = object_name.clone();
        let callback: ProgressCallback = Arc::new(move |sent, total| {
            debug!("Uploading {}: {:.1}% ({}/{} bytes)", log_name, percent(sent, total), sent, total);
        });
        let body = reqwest::Body::wrap_stream(ProgressStream::new(
            ReaderStream::new(file),
            size,
            callback,
        ));

        let url = format!("{}/upload/storage/v1/b/{}/o", self.endpoint, self.bucket);
        let resp = self
            .authorize(
                self.client
                    .post(&url)
                    .query(&[("uploadType", "media"), ("name", object_name.as_str())])
                    .header(CONTENT_TYPE, content_type_for(name))
                    .header(CONTENT_LENGTH, size)
                    .body(body),
            )
            .await?
            .send()
            .await?;

        check_status(resp).await?;
        Ok(size)
    }
}

/// Turn a non-2xx response into `StoreError::Status` with the response text.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_else(|_| "Unknown error".to_string());
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

fn content_type_for(name: &str) -> &'static str {
    if name.ends_with(".zip") {
        "application/zip"
    } else {
        "application/octet-stream"
    }
}
