//! Two-pass streaming encoder for length-prefixed publishes.
//!
//! The transport needs the payload length before the first byte. Rather
//! than buffering the rendered document, [`generate`] walks it twice: once
//! counting bytes, once writing them straight to the transport. Both passes
//! serialize the same immutable [`DiscoveryDocument`] snapshot, so the
//! declared and streamed lengths cannot diverge.

use super::document::DiscoveryDocument;
use crate::error::{BridgeError, Result};
use crate::transport::Transport;
use log::debug;
use std::io;

/// `io::Write` adapter that counts every byte and forwards it when emitting.
struct Emitter<'a> {
    sink: Option<&'a mut dyn Transport>,
    written: usize,
    failure: Option<BridgeError>,
}

impl io::Write for Emitter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(sink) = self.sink.as_mut()
            && let Err(e) = sink.write(buf)
        {
            let err = io::Error::other(e.to_string());
            self.failure = Some(e);
            return Err(err);
        }
        self.written += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn run(doc: &DiscoveryDocument, sink: Option<&mut dyn Transport>) -> Result<usize> {
    let mut emitter = Emitter {
        sink,
        written: 0,
        failure: None,
    };
    let result = serde_json::to_writer(&mut emitter, doc);
    if let Some(failure) = emitter.failure.take() {
        return Err(failure);
    }
    result?;
    Ok(emitter.written)
}

/// Render `doc`, returning the number of payload bytes.
///
/// With `emit = false` nothing reaches `sink`; with `emit = true` every
/// byte is written to it. Both return the same count for the same document.
pub fn generate(doc: &DiscoveryDocument, emit: bool, sink: &mut dyn Transport) -> Result<usize> {
    run(doc, if emit { Some(sink) } else { None })
}

/// Payload length of `doc` without touching any transport.
pub fn measure(doc: &DiscoveryDocument) -> Result<usize> {
    run(doc, None)
}

/// Publish `doc` on `topic`: measure, announce the length, stream.
///
/// A failure part-way aborts only this publish; the transport is ready for
/// the next one.
pub fn publish_discovery(
    topic: &str,
    doc: &DiscoveryDocument,
    transport: &mut dyn Transport,
) -> Result<usize> {
    let declared = generate(doc, false, transport)?;
    transport.begin_publish(topic, declared)?;

    let streamed = match generate(doc, true, transport) {
        Ok(streamed) => streamed,
        Err(e) => {
            transport.abort_publish();
            return Err(e);
        }
    };
    if streamed != declared {
        transport.abort_publish();
        return Err(BridgeError::LengthMismatch {
            topic: topic.to_string(),
            declared,
            streamed,
        });
    }

    transport.end_publish()?;
    debug!("[Discovery] {} ({} bytes)", topic, declared);
    Ok(declared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{DeviceIdentity, MacAddress};
    use crate::naming::{TopicNamer, TopicRoots};
    use crate::sensors::{SensorDescriptor, SensorState, SensorVariant};
    use crate::transport::MemoryTransport;
    use std::net::Ipv4Addr;

    fn namer() -> TopicNamer {
        let identity = DeviceIdentity::new(
            "uno",
            MacAddress([0xDE, 0xAD, 0xBE, 0xAA, 0xBB, 0xCC]),
            Ipv4Addr::new(10, 0, 0, 7),
        );
        TopicNamer::new(identity, TopicRoots::default()).unwrap()
    }

    fn switch_doc() -> DiscoveryDocument {
        let switch = SensorDescriptor::new(SensorVariant::SwitchAlarmLight, 9, -1);
        DiscoveryDocument::for_sensor(&namer(), &switch, SensorState::On).unwrap()
    }

    /// Fails the `fail_on`-th write call.
    struct FlakyTransport {
        inner: MemoryTransport,
        writes: usize,
        fail_on: usize,
    }

    impl Transport for FlakyTransport {
        fn begin_publish(&mut self, topic: &str, length: usize) -> Result<()> {
            self.inner.begin_publish(topic, length)
        }

        fn write(&mut self, bytes: &[u8]) -> Result<()> {
            self.writes += 1;
            if self.writes == self.fail_on {
                return Err(BridgeError::Transport("connection reset".to_string()));
            }
            self.inner.write(bytes)
        }

        fn end_publish(&mut self) -> Result<()> {
            self.inner.end_publish()
        }

        fn abort_publish(&mut self) {
            self.inner.abort_publish()
        }

        fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<()> {
            self.inner.publish(topic, payload)
        }

        fn subscribe(&mut self, topic: &str) -> Result<()> {
            self.inner.subscribe(topic)
        }
    }

    #[test]
    fn test_measure_is_repeatable() {
        let doc = switch_doc();
        let first = measure(&doc).unwrap();
        assert_eq!(measure(&doc).unwrap(), first);
        assert!(first > 0);
    }

    #[test]
    fn test_count_pass_writes_nothing() {
        let doc = switch_doc();
        let mut transport = MemoryTransport::new();
        let n = generate(&doc, false, &mut transport).unwrap();
        assert_eq!(n, measure(&doc).unwrap());
        assert_eq!(transport.chunks(), 0);
        assert!(transport.messages().is_empty());
    }

    #[test]
    fn test_declared_length_matches_bytes_written() {
        let doc = switch_doc();
        let mut transport = MemoryTransport::new();
        let n = publish_discovery("homeassistant/switch/x/config", &doc, &mut transport).unwrap();

        let message = &transport.messages()[0];
        assert!(message.streamed);
        assert_eq!(message.payload.len(), n);
        // Streamed in pieces, not as one buffer
        assert!(transport.chunks() > 1);
    }

    #[test]
    fn test_streamed_bytes_match_in_memory_rendering() {
        let doc = switch_doc();
        let mut transport = MemoryTransport::new();
        publish_discovery("t", &doc, &mut transport).unwrap();
        assert_eq!(transport.messages()[0].payload, doc.to_bytes().unwrap());
    }

    #[test]
    fn test_multibyte_unit_counted_in_bytes() {
        let doc = DiscoveryDocument::for_probe(
            &namer(),
            &crate::sensors::ProbeAddress([0x28, 0, 0, 0, 0, 0, 0, 1]),
        )
        .unwrap();
        let mut transport = MemoryTransport::new();
        let n = publish_discovery("t", &doc, &mut transport).unwrap();
        assert_eq!(n, doc.to_bytes().unwrap().len());
        assert!(transport.messages()[0].payload_str().contains("°F"));
    }

    #[test]
    fn test_failed_write_aborts_only_that_publish() {
        let doc = switch_doc();
        let mut transport = FlakyTransport {
            inner: MemoryTransport::new(),
            writes: 0,
            fail_on: 3,
        };

        let err = publish_discovery("first", &doc, &mut transport).unwrap_err();
        assert!(matches!(err, BridgeError::Transport(_)));
        assert!(transport.inner.messages().is_empty());

        // The next publish on the same transport goes through
        publish_discovery("second", &doc, &mut transport).unwrap();
        assert_eq!(transport.inner.messages().len(), 1);
        assert_eq!(transport.inner.messages()[0].topic, "second");
    }
}
