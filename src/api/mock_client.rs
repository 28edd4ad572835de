use crate::api::client::{ByteStream, MockStreamProducer};
use anyhow::Result;
use bytes::Bytes;
use futures::stream;
use std::sync::{Arc, Mutex};

/// Feeds canned wire chunks to the decoder pipeline, one `Vec<String>` per
/// turn, exactly as the transport would deliver them.
#[derive(Clone)]
pub struct MockChatStream {
    responses: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockChatStream {
    pub fn new(responses: Vec<Vec<String>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
        }
    }
}

impl MockStreamProducer for MockChatStream {
    fn create_mock_stream(&self, _query: &str) -> Result<ByteStream> {
        let mut responses_guard = self.responses.lock().unwrap();
        if responses_guard.is_empty() {
            return Err(anyhow::anyhow!("MockChatStream: no more responses configured"));
        }
        let chunks = responses_guard.remove(0);

        let byte_chunks: Vec<Result<Bytes>> =
            chunks.into_iter().map(|s| Ok(Bytes::from(s))).collect();

        Ok(Box::pin(stream::iter(byte_chunks)))
    }
}
