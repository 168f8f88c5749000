//! HTTP remote store over reqwest.
//!
//! Apps Script web apps answer through a redirect and reject CORS preflights,
//! so writes go out as `text/plain` with a JSON body. No request is retried
//! here; every retry is the user's call.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use super::{parse_read_body, parse_write_body, CsvMirror, RemoteSnapshot, RemoteStore, WriteOutcome, WriteRequest};
use crate::error::SyncError;

/// Bodies at or below this size are not a usable CSV export.
const MIN_CSV_LEN: usize = 20;

fn build_client(timeout: Duration) -> Result<reqwest::Client, SyncError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SyncError::Transport(format!("failed to build HTTP client: {}", e)))
}

fn parse_endpoint(endpoint: &str) -> Result<Url, SyncError> {
    Url::parse(endpoint.trim()).map_err(|e| SyncError::InvalidEndpoint(format!("{}: {}", endpoint, e)))
}

fn map_transport_error(err: reqwest::Error, timeout: Duration) -> SyncError {
    if err.is_timeout() {
        SyncError::Timeout(timeout.as_secs())
    } else if err.is_connect() {
        SyncError::Transport(format!("could not reach server: {}", err))
    } else {
        SyncError::Transport(err.to_string())
    }
}

fn looks_like_html(body: &str) -> bool {
    body.trim_start().starts_with('<')
}

/// Map a non-2xx response to an error, keeping HTML error pages out of the
/// user-facing message.
fn http_error(status: reqwest::StatusCode, body: &str) -> SyncError {
    let message = if looks_like_html(body) {
        "server routing error (the endpoint returned an HTML page)".to_string()
    } else if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.trim().to_string()
    };
    SyncError::Http {
        status: status.as_u16(),
        message,
    }
}

// ============================================================================
// Primary store
// ============================================================================

/// Apps Script endpoint serving `GET` reads and versioned `POST` writes.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpRemoteStore {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, SyncError> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: parse_endpoint(endpoint)?,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn read(&self) -> Result<Option<RemoteSnapshot>, SyncError> {
        log::info!("[remote] GET {}", self.endpoint);
        let resp = self
            .client
            .get(self.endpoint.clone())
            .send()
            .await
            .map_err(|e| map_transport_error(e, self.timeout))?;

        let status = resp.status();
        let is_json = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("application/json"))
            .unwrap_or(false);
        let body = resp
            .text()
            .await
            .map_err(|e| map_transport_error(e, self.timeout))?;

        if !status.is_success() {
            return Err(http_error(status, &body));
        }
        if !is_json {
            log::warn!("[remote] read returned non-JSON content; treating as no data");
            return Ok(None);
        }
        Ok(parse_read_body(&body))
    }

    async fn write(&self, request: &WriteRequest) -> Result<WriteOutcome, SyncError> {
        let payload = serde_json::to_string(request)?;
        log::info!(
            "[remote] POST {} ({} records, expected version {:?})",
            self.endpoint,
            request.data.len(),
            request.version
        );

        let resp = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "text/plain;charset=utf-8")
            .body(payload)
            .send()
            .await
            .map_err(|e| map_transport_error(e, self.timeout))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| map_transport_error(e, self.timeout))?;

        if !status.is_success() {
            return Err(http_error(status, &body));
        }
        parse_write_body(&body)
    }
}

// ============================================================================
// CSV mirror
// ============================================================================

/// Published CSV export of the sheet (read-only secondary source).
#[derive(Debug, Clone)]
pub struct HttpCsvMirror {
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl HttpCsvMirror {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, SyncError> {
        Ok(Self {
            client: build_client(timeout)?,
            url: parse_endpoint(url)?,
            timeout,
        })
    }

    /// Mirror URL with a cache-busting `t` parameter.
    fn fresh_url(&self) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("t", &chrono::Utc::now().timestamp_millis().to_string());
        url
    }
}

#[async_trait]
impl CsvMirror for HttpCsvMirror {
    async fn fetch_csv(&self) -> Result<Option<String>, SyncError> {
        let url = self.fresh_url();
        log::info!("[remote] GET {} (csv mirror)", self.url);
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| map_transport_error(e, self.timeout))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| map_transport_error(e, self.timeout))?;

        if !status.is_success() {
            return Err(http_error(status, &body));
        }
        if looks_like_html(&body) || body.len() <= MIN_CSV_LEN {
            log::warn!("[remote] csv mirror returned no usable CSV");
            return Ok(None);
        }
        Ok(Some(body))
    }
}
