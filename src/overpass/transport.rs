//! The boundary between query construction and the actual HTTP call,
//! injectable so tests never touch the network.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{OverpassError, OverpassResult};

/// Executes a raw Overpass QL query string and returns the parsed JSON body.
/// The default implementation talks to a real Overpass endpoint; tests
/// substitute an in-memory stub.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    async fn execute(&self, query: &str) -> OverpassResult<Value>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> OverpassResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| OverpassError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl QueryTransport for HttpTransport {
    async fn execute(&self, query: &str) -> OverpassResult<Value> {
        let response = self
            .client
            .post(&self.url)
            .form(&[("data", query)])
            .send()
            .await
            .map_err(|e| OverpassError::Transport(e.to_string()))?;
        let body = response
            .text()
            .await
            .map_err(|e| OverpassError::Transport(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| OverpassError::InvalidResponse(e.to_string()))
    }
}
