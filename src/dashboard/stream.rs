//! SSE transport for the dashboard: a line decoder that survives chunk
//! boundaries, and a small client for the runner host's endpoints.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;

use crate::models::StreamMessage;
use crate::runner::{RunOptions, StatusInfo};

/// Outer timeout on the initial response when establishing the streaming
/// connection, so a dead server fails fast instead of hanging the client.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Decodes a newline-delimited SSE body into stream messages.
///
/// A line may be split across two network reads; the trailing incomplete
/// line is held back and prepended to the next chunk. Malformed JSON in a
/// `data:` line is logged and skipped, never fatal to the reader.
#[derive(Default)]
pub struct SseLineDecoder {
    buf: String,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk; returns every complete message it finished.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamMessage> {
        self.buf.push_str(&String::from_utf8_lossy(chunk));
        let mut messages = Vec::new();
        while let Some(pos) = self.buf.find('\n') {
            let line: String = self.buf.drain(..=pos).collect();
            if let Some(message) = decode_line(&line) {
                messages.push(message);
            }
        }
        messages
    }
}

fn decode_line(line: &str) -> Option<StreamMessage> {
    let line = line.trim();
    // Blank separators and `:` comment lines (keep-alives) carry no data.
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let data = line.strip_prefix("data:")?.trim_start();
    match serde_json::from_str(data) {
        Ok(message) => Some(message),
        Err(err) => {
            warn!(error = %err, line = %data, "skipping malformed stream message");
            None
        }
    }
}

/// HTTP client for a serving runner host.
pub struct StreamClient {
    base_url: String,
    client: reqwest::Client,
}

impl StreamClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Start a streaming run; the returned response body is the SSE stream.
    pub async fn start_run(&self, options: &RunOptions) -> Result<reqwest::Response> {
        let mut body = serde_json::to_value(options)?;
        body.as_object_mut()
            .context("options did not serialize to an object")?
            .insert("streaming".to_string(), serde_json::Value::Bool(true));

        let request = self
            .client
            .post(format!("{}/api/runs", self.base_url))
            .json(&body)
            .send();
        let response = tokio::time::timeout(CONNECT_TIMEOUT, request)
            .await
            .context("server did not start streaming within 30s")?
            .context("failed to reach the runner host")?;
        response
            .error_for_status()
            .context("run request was rejected")
    }

    pub async fn status(&self) -> Result<StatusInfo> {
        let response = self
            .client
            .get(format!("{}/api/runs", self.base_url))
            .send()
            .await
            .context("failed to reach the runner host")?;
        Ok(response.error_for_status()?.json().await?)
    }

    pub async fn abort(&self) -> Result<()> {
        self.client
            .delete(format!("{}/api/runs", self.base_url))
            .send()
            .await
            .context("failed to send abort request")?
            .error_for_status()
            .context("abort request was rejected")?;
        Ok(())
    }
}
