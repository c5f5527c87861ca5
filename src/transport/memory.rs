//! In-memory transport for dry runs and tests.

use super::{StreamedPublish, Transport};
use crate::error::Result;

/// One message as it would have reached the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    /// True for length-prefixed publishes.
    pub streamed: bool,
}

impl PublishedMessage {
    pub fn payload_str(&self) -> &str {
        std::str::from_utf8(&self.payload).unwrap_or("<binary>")
    }
}

/// Records every publish and subscription.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    stream: StreamedPublish,
    messages: Vec<PublishedMessage>,
    subscriptions: Vec<String>,
    /// Number of `write` calls, to check the payload really streamed.
    chunks: usize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[PublishedMessage] {
        &self.messages
    }

    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    /// Number of `write` calls seen so far.
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn find(&self, topic: &str) -> Option<&PublishedMessage> {
        self.messages.iter().find(|m| m.topic == topic)
    }

    /// Forget everything recorded so far.
    pub fn take(&mut self) -> Vec<PublishedMessage> {
        self.chunks = 0;
        std::mem::take(&mut self.messages)
    }
}

impl Transport for MemoryTransport {
    fn begin_publish(&mut self, topic: &str, length: usize) -> Result<()> {
        self.stream.begin(topic, length)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.chunks += 1;
        self.stream.write(bytes)
    }

    fn end_publish(&mut self) -> Result<()> {
        let (topic, payload) = self.stream.finish()?;
        self.messages.push(PublishedMessage {
            topic,
            payload,
            streamed: true,
        });
        Ok(())
    }

    fn abort_publish(&mut self) {
        self.stream.abort();
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<()> {
        self.messages.push(PublishedMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            streamed: false,
        });
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<()> {
        self.subscriptions.push(topic.to_string());
        Ok(())
    }
}
