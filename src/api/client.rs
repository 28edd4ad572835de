use crate::api::logging::{debug_stream_enabled, emit_debug_payload};
use crate::config::Config;
use crate::util::is_local_endpoint_url;
use anyhow::{anyhow, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::json;
use std::path::PathBuf;
use std::pin::Pin;
#[cfg(test)]
use std::sync::Arc;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

#[cfg(test)]
pub trait MockStreamProducer: Send + Sync {
    fn create_mock_stream(&self, query: &str) -> Result<ByteStream>;
}

/// Opens the long-lived chat response body. Everything past the HTTP call —
/// framing, event semantics, session state — belongs to the decoder pipeline,
/// not here.
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    chat_url: String,
    api_key: Option<String>,
    workspace: PathBuf,
    #[cfg(test)]
    mock_stream_producer: Option<Arc<dyn MockStreamProducer>>,
}

impl ChatClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            chat_url: config.chat_url.clone(),
            api_key: config.api_key.clone(),
            workspace: config.workspace.clone(),
            #[cfg(test)]
            mock_stream_producer: None,
        }
    }

    #[cfg(test)]
    pub fn new_mock(mock_producer: Arc<dyn MockStreamProducer>) -> Self {
        Self {
            http: reqwest::Client::new(),
            chat_url: "http://localhost:8000/chat".to_string(),
            api_key: None,
            workspace: PathBuf::from("."),
            #[cfg(test)]
            mock_stream_producer: Some(mock_producer),
        }
    }

    pub async fn open_stream(&self, query: &str) -> Result<ByteStream> {
        #[cfg(test)]
        {
            if let Some(producer) = &self.mock_stream_producer {
                return producer.create_mock_stream(query);
            }
        }

        let payload = json!({
            "query": query,
            "workspace": self.workspace,
        });

        if debug_stream_enabled() {
            emit_debug_payload(&self.chat_url, &payload);
        }

        let mut request = self
            .http
            .post(&self.chat_url)
            .header("content-type", "application/json")
            .json(&payload);
        if let Some(api_key) = &self.api_key {
            request = request.header("authorization", format!("Bearer {api_key}"));
        }

        let chat_url = self.chat_url.clone();
        let response = request
            .send()
            .await
            .map_err(|error| map_request_error(error, &chat_url))?
            .error_for_status()
            .map_err(|error| map_request_error(error, &chat_url))?;

        let stream = response
            .bytes_stream()
            .map(move |item| item.map_err(|error| map_request_error(error, &chat_url)));
        Ok(Box::pin(stream))
    }
}

fn map_request_error(error: reqwest::Error, chat_url: &str) -> anyhow::Error {
    if error.is_connect() && is_local_endpoint_url(chat_url) {
        return anyhow!(
            "cannot reach local chat endpoint '{}': {}. Start the server or update TIDE_CHAT_URL.",
            chat_url,
            error
        );
    }
    if error.is_connect() {
        return anyhow!("cannot reach chat endpoint '{}': {}", chat_url, error);
    }
    if error.is_timeout() {
        return anyhow!("chat request to '{}' timed out: {}", chat_url, error);
    }
    if let Some(status) = error.status() {
        return anyhow!(
            "chat endpoint '{}' returned HTTP {}: {}",
            chat_url,
            status,
            error
        );
    }
    anyhow!("chat request to '{}' failed: {}", chat_url, error)
}
