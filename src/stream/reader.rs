//! Streaming feature reader
//!
//! [`FeatureReader`] runs the decoder on a spawned producer thread and hands
//! root-level entities to the calling thread through a [`RingBuffer`].

use super::buffer::{RingBuffer, StreamState};
use crate::config::StreamConfig;
use crate::decoder::{Decoder, EntitySink};
use crate::entity::{Entity, EntitySchema};
use crate::error::{Error, Result, StreamError};
use crate::events::ParseOutcome;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Producer side of the buffer
struct BufferSink {
    buffer: Arc<RingBuffer<Entity>>,
}

impl EntitySink for BufferSink {
    fn announce(&mut self, schema: &Arc<EntitySchema>) -> Result<()> {
        log::debug!("Streaming entities of {}", schema.name());
        self.buffer.announce_schema(Arc::clone(schema));
        Ok(())
    }

    fn accept(&mut self, entity: Entity) -> Result<()> {
        self.buffer.put(entity)?;
        Ok(())
    }

    fn is_stopped(&self) -> bool {
        self.buffer.is_stopped()
    }
}

/// Pull-style reader over the features of one document
pub struct FeatureReader {
    buffer: Arc<RingBuffer<Entity>>,
    producer: Option<JoinHandle<()>>,
    // Disconnects when the producer thread ends
    exited: Receiver<()>,
    done: bool,
}

impl FeatureReader {
    /// Start decoding `source` on a producer thread
    pub fn spawn<R>(decoder: Decoder, source: R, config: &StreamConfig) -> Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        config.validate()?;
        let buffer = Arc::new(RingBuffer::new(config.capacity(), config.timeout()));

        let producer_buffer = Arc::clone(&buffer);
        let (exit_signal, exited) = mpsc::channel::<()>();
        let producer = thread::Builder::new()
            .name("gml-producer".to_string())
            .spawn(move || {
                let _exit_signal = exit_signal;
                let mut sink = BufferSink {
                    buffer: Arc::clone(&producer_buffer),
                };
                match decoder.decode_into(source, &mut sink) {
                    Ok(ParseOutcome::Completed) => producer_buffer.finish(),
                    Ok(ParseOutcome::Stopped) => producer_buffer.fail(StreamError::Cancelled),
                    Err(Error::Stream(err)) => producer_buffer.fail(err),
                    Err(err) => {
                        log::warn!("Producer failed: {}", err);
                        producer_buffer.fail(StreamError::Aborted(err.to_string()));
                    }
                }
            })?;

        Ok(Self {
            buffer,
            producer: Some(producer),
            exited,
            done: false,
        })
    }

    /// Stream the features of a file
    pub fn open(decoder: Decoder, path: impl AsRef<Path>, config: &StreamConfig) -> Result<Self> {
        let file = File::open(path)?;
        Self::spawn(decoder, BufReader::new(file), config)
    }

    /// Whether another entity is available, waiting for the producer if needed
    pub fn has_next(&self) -> Result<bool> {
        Ok(self.buffer.has_next()?)
    }

    /// Remove and return the next entity
    pub fn next_entity(&self) -> Result<Entity> {
        Ok(self.buffer.pop()?)
    }

    /// Next entity without removing it
    pub fn peek(&self) -> Result<Option<Entity>> {
        Ok(self.buffer.peek()?)
    }

    /// Schema of the streamed entities
    pub fn schema(&self) -> Result<Arc<EntitySchema>> {
        Ok(self.buffer.schema()?)
    }

    /// Session state
    pub fn state(&self) -> StreamState {
        self.buffer.state()
    }

    /// Stop the session and release the producer.
    ///
    /// The producer is joined once it has exited. A producer still blocked
    /// on its source after the liveness timeout is detached instead; it
    /// ends at its next insert or element since the session is stopped.
    pub fn close(&mut self) {
        if self.buffer.state() == StreamState::Running {
            self.buffer.close();
        }
        let Some(handle) = self.producer.take() else {
            self.done = true;
            return;
        };

        // A timed-out producer is blocked on its source
        let grace = match self.buffer.failure() {
            Some(StreamError::Timeout(_)) => Duration::ZERO,
            _ => self.buffer.timeout(),
        };
        match self.exited.recv_timeout(grace) {
            Err(RecvTimeoutError::Timeout) => {
                log::debug!("Detaching stalled producer thread");
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    log::warn!("Producer thread panicked");
                }
            }
        }
        self.done = true;
    }
}

impl Iterator for FeatureReader {
    type Item = Result<Entity>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = match self.has_next() {
            Ok(true) => self.next_entity(),
            Ok(false) => {
                self.done = true;
                return None;
            }
            Err(err) => Err(err),
        };
        if item.is_err() {
            self.done = true;
        }
        Some(item)
    }
}

impl Drop for FeatureReader {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecodeHints;
    use crate::schema::SchemaRegistry;
    use crate::value::Value;
    use pretty_assertions::assert_eq;
    use std::io::{self, Cursor, Read};
    use std::sync::mpsc::{self, Receiver};
    use std::time::{Duration, Instant};

    const APP_XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:gml="http://www.opengis.net/gml"
           xmlns:app="http://example.com/app"
           targetNamespace="http://example.com/app"
           elementFormDefault="qualified">
  <xs:element name="Well" type="app:WellType" substitutionGroup="gml:_Feature"/>
  <xs:complexType name="WellType">
    <xs:complexContent>
      <xs:extension base="gml:AbstractFeatureType">
        <xs:sequence>
          <xs:element name="depth" type="xs:double"/>
          <xs:element ref="gml:pointProperty"/>
        </xs:sequence>
      </xs:extension>
    </xs:complexContent>
  </xs:complexType>
  <xs:element name="Wells" type="app:WellsType" substitutionGroup="gml:_FeatureCollection"/>
  <xs:complexType name="WellsType">
    <xs:complexContent>
      <xs:extension base="gml:AbstractFeatureCollectionType"/>
    </xs:complexContent>
  </xs:complexType>
</xs:schema>"#;

    fn decoder() -> Decoder {
        Decoder::new(Arc::new(SchemaRegistry::from_xsd_str(APP_XSD).unwrap()))
    }

    fn well(i: usize, coordinates: &str) -> String {
        format!(
            r#"<gml:featureMember><app:Well fid="well.{i}"><app:depth>{i}.5</app:depth>
            <gml:pointProperty><gml:Point><gml:coordinates>{coordinates}</gml:coordinates></gml:Point></gml:pointProperty>
            </app:Well></gml:featureMember>"#
        )
    }

    fn document(members: &str) -> String {
        format!(
            r#"<app:Wells xmlns:app="http://example.com/app" xmlns:gml="http://www.opengis.net/gml">{}</app:Wells>"#,
            members
        )
    }

    fn wells(count: usize) -> String {
        document(&(0..count).map(|i| well(i, "1,2")).collect::<String>())
    }

    #[test]
    fn test_streams_all_features_in_order() {
        let config = StreamConfig::new().with_capacity(4);
        let reader = FeatureReader::spawn(decoder(), Cursor::new(wells(25)), &config).unwrap();

        let schema = reader.schema().unwrap();
        assert_eq!(schema.name().local_name, "Well");

        let ids: Vec<String> = reader
            .map(|entity| entity.unwrap().id().unwrap().to_string())
            .collect();
        let expected: Vec<String> = (0..25).map(|i| format!("well.{}", i)).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_peek_and_next() {
        let reader =
            FeatureReader::spawn(decoder(), Cursor::new(wells(2)), &StreamConfig::new()).unwrap();

        assert!(reader.has_next().unwrap());
        let peeked = reader.peek().unwrap().unwrap();
        let first = reader.next_entity().unwrap();
        assert_eq!(peeked, first);
        assert_eq!(first.get("depth"), Some(&Value::Double(0.5)));

        assert!(reader.has_next().unwrap());
        reader.next_entity().unwrap();
        assert!(!reader.has_next().unwrap());
        assert_eq!(reader.state(), StreamState::Finished);
        assert!(matches!(
            reader.next_entity(),
            Err(Error::Stream(StreamError::Exhausted))
        ));
    }

    #[test]
    fn test_producer_failure_aborts() {
        let members = format!("{}{}", well(0, "1,2"), well(1, "1,x"));
        let reader =
            FeatureReader::spawn(decoder(), Cursor::new(document(&members)), &StreamConfig::new())
                .unwrap();

        let items: Vec<Result<Entity>> = reader.collect();
        let last = items.last().unwrap();
        assert!(
            matches!(last, Err(Error::Stream(StreamError::Aborted(msg))) if msg.contains("coordinates")),
            "unexpected {:?}",
            last
        );
        assert!(items.len() <= 2);
    }

    #[test]
    fn test_close_stops_blocked_producer() {
        let config = StreamConfig::new().with_capacity(3);
        let mut reader =
            FeatureReader::spawn(decoder(), Cursor::new(wells(100)), &config).unwrap();
        assert!(reader.has_next().unwrap());
        reader.close();
        assert_eq!(reader.state(), StreamState::Stopped);
        assert!(!reader.has_next().unwrap());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_stop_hint_cancels() {
        let decoder = decoder().with_hints(DecodeHints::new().with_stop(|| true));
        let reader = FeatureReader::spawn(decoder, Cursor::new(wells(3)), &StreamConfig::new())
            .unwrap();
        assert!(!reader.has_next().unwrap());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = StreamConfig::new().with_capacity(1);
        assert!(matches!(
            FeatureReader::spawn(decoder(), Cursor::new(wells(1)), &config),
            Err(Error::Config(_))
        ));
    }

    /// Reader that blocks until its channel delivers more bytes
    struct StalledReader {
        chunks: Receiver<Vec<u8>>,
        pending: Cursor<Vec<u8>>,
    }

    impl Read for StalledReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            loop {
                let n = self.pending.read(buf)?;
                if n > 0 {
                    return Ok(n);
                }
                match self.chunks.recv() {
                    Ok(chunk) => self.pending = Cursor::new(chunk),
                    Err(_) => return Ok(0),
                }
            }
        }
    }

    fn stalled_reader(config: &StreamConfig) -> (FeatureReader, mpsc::Sender<Vec<u8>>) {
        let (sender, chunks) = mpsc::channel();
        let head = r#"<app:Wells xmlns:app="http://example.com/app" xmlns:gml="http://www.opengis.net/gml">"#;
        sender.send(format!("{}{}", head, well(0, "1,2")).into_bytes()).unwrap();

        let source = BufReader::new(StalledReader {
            chunks,
            pending: Cursor::new(Vec::new()),
        });
        let reader = FeatureReader::spawn(decoder(), source, config).unwrap();
        (reader, sender)
    }

    #[test]
    fn test_stalled_producer_times_out() {
        let timeout = Duration::from_millis(200);
        let (reader, _sender) = stalled_reader(&StreamConfig::new().with_timeout(timeout));

        assert!(reader.has_next().unwrap());
        reader.next_entity().unwrap();

        let started = Instant::now();
        let err = reader.has_next().unwrap_err();
        assert!(matches!(err, Error::Stream(StreamError::Timeout(_))));
        assert!(started.elapsed() < timeout + Duration::from_secs(2));
        assert_eq!(reader.state(), StreamState::Stopped);

        // The source is still stalled here
        let started = Instant::now();
        drop(reader);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_close_with_stalled_source_is_bounded() {
        let timeout = Duration::from_millis(200);
        let (mut reader, _sender) = stalled_reader(&StreamConfig::new().with_timeout(timeout));
        assert!(reader.has_next().unwrap());

        let started = Instant::now();
        reader.close();
        assert!(started.elapsed() < timeout + Duration::from_secs(1));
        assert_eq!(reader.state(), StreamState::Stopped);
        assert!(!reader.has_next().unwrap());
    }
}
