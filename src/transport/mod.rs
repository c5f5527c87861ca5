//! Publish side of the broker connection.
//!
//! Discovery documents go out as length-prefixed streamed publishes
//! (`begin_publish` / `write` / `end_publish`); state values are short and
//! go out with a plain `publish`.

mod memory;

pub use memory::{MemoryTransport, PublishedMessage};

use crate::error::{BridgeError, Result};

/// Broker-facing publish primitives.
pub trait Transport {
    /// Start a streamed publish of exactly `length` payload bytes.
    fn begin_publish(&mut self, topic: &str, length: usize) -> Result<()>;

    /// Append payload bytes to the streamed publish in progress.
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Finish the streamed publish. Fails when the bytes written differ from
    /// the length announced in `begin_publish`.
    fn end_publish(&mut self) -> Result<()>;

    /// Drop a streamed publish that failed part-way without sending it.
    fn abort_publish(&mut self);

    /// Publish a complete short payload.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<()>;

    fn subscribe(&mut self, topic: &str) -> Result<()>;
}

/// Bookkeeping for a streamed publish in progress.
///
/// Shared by the transports so they enforce the declared length the same way.
#[derive(Debug, Default)]
pub struct StreamedPublish {
    pending: Option<Pending>,
}

#[derive(Debug)]
struct Pending {
    topic: String,
    declared: usize,
    payload: Vec<u8>,
}

impl StreamedPublish {
    pub fn begin(&mut self, topic: &str, length: usize) -> Result<()> {
        if let Some(pending) = &self.pending {
            return Err(BridgeError::PublishInProgress(pending.topic.clone()));
        }
        self.pending = Some(Pending {
            topic: topic.to_string(),
            declared: length,
            payload: Vec::with_capacity(length),
        });
        Ok(())
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let pending = self
            .pending
            .as_mut()
            .ok_or(BridgeError::NoPublishInProgress)?;
        pending.payload.extend_from_slice(bytes);
        Ok(())
    }

    /// Returns the topic and the complete payload.
    pub fn finish(&mut self) -> Result<(String, Vec<u8>)> {
        let pending = self.pending.take().ok_or(BridgeError::NoPublishInProgress)?;
        if pending.payload.len() != pending.declared {
            return Err(BridgeError::LengthMismatch {
                topic: pending.topic,
                declared: pending.declared,
                streamed: pending.payload.len(),
            });
        }
        Ok((pending.topic, pending.payload))
    }

    /// Drop a publish that failed half-way.
    pub fn abort(&mut self) {
        self.pending = None;
    }

    pub fn in_progress(&self) -> bool {
        self.pending.is_some()
    }
}
