//! F95Zone `checker.php` client.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::{info, warn};

/// Errors that can occur when calling the checker API
#[derive(Debug, thiserror::Error)]
pub enum CheckerError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Checker returned HTTP {0}")]
    Status(u16),
    #[error("Checker answered with status {0:?}")]
    InvalidResponse(String),
}

#[derive(Debug, Deserialize)]
struct CheckerResponse {
    status: String,
    #[serde(default)]
    msg: serde_json::Value,
}

/// Batched lookup of the current version of F95Zone threads.
#[derive(Debug, Clone)]
pub struct CheckerClient {
    http_client: reqwest::Client,
    base_url: String,
    chunk_size: usize,
    chunk_pause: Duration,
}

impl CheckerClient {
    pub fn new(base_url: impl Into<String>, chunk_size: usize) -> Result<Self, CheckerError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static("Mozilla/5.0 (compatible; tradbridge version checker)"),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json,*/*"));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
            chunk_size: chunk_size.max(1),
            chunk_pause: Duration::from_secs(1),
        })
    }

    /// Override the pause between two chunk requests.
    pub fn with_chunk_pause(mut self, pause: Duration) -> Self {
        self.chunk_pause = pause;
        self
    }

    /// Versions for the given F95Zone thread ids, keyed by id.
    ///
    /// A failing chunk is logged and skipped; ids it covered are simply
    /// missing from the result.
    pub async fn fetch_versions(&self, thread_ids: &[String]) -> HashMap<String, String> {
        let mut versions = HashMap::new();
        let total_chunks = thread_ids.len().div_ceil(self.chunk_size);

        for (index, chunk) in thread_ids.chunks(self.chunk_size).enumerate() {
            if index > 0 && !self.chunk_pause.is_zero() {
                tokio::time::sleep(self.chunk_pause).await;
            }
            match self.fetch_chunk(chunk).await {
                Ok(found) => {
                    info!(
                        "checker chunk {}/{total_chunks}: {} version(s)",
                        index + 1,
                        found.len()
                    );
                    versions.extend(found);
                }
                Err(err) => warn!("checker chunk {}/{total_chunks} failed: {err}", index + 1),
            }
        }

        info!("checker: {}/{} versions fetched", versions.len(), thread_ids.len());
        versions
    }

    /// One `checker.php?threads=a,b,c` request.
    pub async fn fetch_chunk(&self, ids: &[String]) -> Result<HashMap<String, String>, CheckerError> {
        let response = self
            .http_client
            .get(&self.base_url)
            .query(&[("threads", ids.join(","))])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CheckerError::Status(response.status().as_u16()));
        }

        let body: CheckerResponse = response.json().await?;
        if body.status != "ok" {
            return Err(CheckerError::InvalidResponse(body.status));
        }

        let serde_json::Value::Object(map) = body.msg else {
            return Err(CheckerError::InvalidResponse("msg is not an object".to_string()));
        };
        Ok(map
            .into_iter()
            .filter_map(|(id, version)| match version {
                serde_json::Value::String(v) => Some((id, v)),
                serde_json::Value::Number(n) => Some((id, n.to_string())),
                _ => None,
            })
            .collect())
    }
}
