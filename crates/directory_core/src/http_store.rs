//! [`RecordStore`] over the PocketBase REST API.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{
    error::StoreError,
    protocol::{
        AdminAuthRequest, AdminAuthResponse, ListQuery, ListResponse, RecordList, SortKey,
        StoreErrorBody,
    },
};
use tokio::sync::RwLock;
use tracing::{info, warn};
use url::Url;

use crate::store::{RecordStore, DEFAULT_REQUEST_TIMEOUT};

pub struct HttpRecordStore {
    http: Client,
    base_url: Url,
    auth_token: RwLock<Option<String>>,
}

impl HttpRecordStore {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url.trim())
            .with_context(|| format!("invalid record store url '{base_url}'"))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("record store url '{base_url}' cannot carry a path");
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build record store http client")?;
        Ok(Self {
            http,
            base_url,
            auth_token: RwLock::new(None),
        })
    }

    /// Uses a token obtained out-of-band for every following request.
    pub async fn set_auth_token(&self, token: Option<String>) {
        *self.auth_token.write().await = token.filter(|t| !t.trim().is_empty());
    }

    pub async fn authenticate_admin(
        &self,
        identity: &str,
        password: &str,
    ) -> Result<(), StoreError> {
        let url = self.endpoint(&["api", "admins", "auth-with-password"])?;
        let res = self
            .http
            .post(url)
            .json(&AdminAuthRequest {
                identity: identity.to_string(),
                password: password.to_string(),
            })
            .send()
            .await
            .map_err(transport_error)?;
        let body: AdminAuthResponse = decode(check(res, "admins", None).await?).await?;
        info!(identity, "authenticated against record store");
        self.set_auth_token(Some(body.token)).await;
        Ok(())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::Transport(format!("invalid base url {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn records_url(&self, collection: &str, id: Option<&str>) -> Result<Url, StoreError> {
        let mut segments = vec!["api", "collections", collection, "records"];
        segments.extend(id);
        self.endpoint(&segments)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let request = match self.auth_token.read().await.as_deref() {
            Some(token) => request.header(reqwest::header::AUTHORIZATION, token),
            None => request,
        };
        request.send().await.map_err(transport_error)
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn create(&self, collection: &str, body: Value) -> Result<Value, StoreError> {
        let url = self.records_url(collection, None)?;
        let res = self.send(self.http.post(url).json(&body)).await?;
        decode(check(res, collection, None).await?).await
    }

    async fn get_one(&self, collection: &str, id: &str) -> Result<Value, StoreError> {
        let url = self.records_url(collection, Some(id))?;
        let res = self.send(self.http.get(url)).await?;
        decode(check(res, collection, Some(id)).await?).await
    }

    async fn update(&self, collection: &str, id: &str, body: Value) -> Result<Value, StoreError> {
        let url = self.records_url(collection, Some(id))?;
        let res = self.send(self.http.patch(url).json(&body)).await?;
        decode(check(res, collection, Some(id)).await?).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let url = self.records_url(collection, Some(id))?;
        let res = self.send(self.http.delete(url)).await?;
        check(res, collection, Some(id)).await?;
        Ok(())
    }

    async fn get_list(
        &self,
        collection: &str,
        page: u32,
        per_page: u32,
        sort: &SortKey,
    ) -> Result<RecordList<Value>, StoreError> {
        let url = self.records_url(collection, None)?;
        let query = ListQuery {
            page,
            per_page,
            sort: Some(sort.to_string()),
        };
        let res = self.send(self.http.get(url).query(&query)).await?;
        let body: ListResponse<Value> = decode(check(res, collection, None).await?).await?;
        Ok(RecordList {
            items: body.items,
            total_items: body.total_items,
        })
    }
}

async fn check(res: Response, collection: &str, id: Option<&str>) -> Result<Response, StoreError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let body = res.json::<StoreErrorBody>().await.unwrap_or_default();
    warn!(
        collection,
        id = id.unwrap_or_default(),
        status = status.as_u16(),
        message = %body.message,
        "record store request failed"
    );

    Err(match (status, id) {
        // A 404 without a record id means the route or collection is missing.
        (StatusCode::NOT_FOUND, Some(id)) => StoreError::not_found(collection, id),
        (StatusCode::BAD_REQUEST, _) => StoreError::Rejected {
            message: body.message,
        },
        _ => StoreError::Server {
            status: status.as_u16(),
            message: body.message,
        },
    })
}

async fn decode<T: DeserializeOwned>(res: Response) -> Result<T, StoreError> {
    res.json::<T>().await.map_err(|err| {
        if err.is_timeout() {
            StoreError::Timeout
        } else {
            StoreError::Decode(err.to_string())
        }
    })
}

fn transport_error(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout
    } else {
        StoreError::Transport(err.to_string())
    }
}

#[cfg(test)]
#[path = "tests/http_store_tests.rs"]
mod tests;
