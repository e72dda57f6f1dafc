//! Message stream sources
//!
//! A source delivers raw envelopes one at a time. The ingestion pipeline owns
//! its source exclusively and closes it exactly once when the read loop ends.
//!
//! A read error is unrecoverable for the current handle: the pipeline stops
//! reading and does not reconnect. Bad payloads are not read errors; they
//! are handed on as-is and rejected when the envelope is parsed.

use async_trait::async_trait;
use futures::StreamExt;
use std::fmt;
use tokio::io::AsyncRead;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::bytes::{Bytes, BytesMut};
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder, FramedRead};
use tracing::{debug, info, warn};
use wrs_common::config::{SourceConfig, SourceKind};
use wrs_common::{Error, Result};

/// A stream of raw message envelopes
#[async_trait]
pub trait MessageSource: Send {
    /// Block until the next envelope arrives
    ///
    /// `Ok(None)` means the peer ended the stream cleanly.
    async fn next_message(&mut self) -> Result<Option<Vec<u8>>>;

    /// Release the underlying handle. Idempotent.
    async fn close(&mut self) -> Result<()>;
}

/// One newline-delimited frame
#[derive(Debug)]
enum Frame {
    Line(Bytes),
    /// A line over the length limit; its bytes were discarded
    TooLong,
}

/// Newline framing with a length limit
///
/// An over-long line surfaces as [`Frame::TooLong`] instead of an error, so
/// the stream keeps going with the line after it.
struct EnvelopeCodec {
    lines: AnyDelimiterCodec,
}

impl EnvelopeCodec {
    fn new(max_line_bytes: usize) -> Self {
        Self {
            lines: AnyDelimiterCodec::new_with_max_length(
                b"\n".to_vec(),
                b"\n".to_vec(),
                max_line_bytes,
            ),
        }
    }

    fn frame(
        decoded: std::result::Result<Option<Bytes>, AnyDelimiterCodecError>,
    ) -> std::result::Result<Option<Frame>, AnyDelimiterCodecError> {
        match decoded {
            Ok(line) => Ok(line.map(Frame::Line)),
            Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => Ok(Some(Frame::TooLong)),
            Err(e) => Err(e),
        }
    }
}

impl Decoder for EnvelopeCodec {
    type Item = Frame;
    type Error = AnyDelimiterCodecError;

    fn decode(
        &mut self,
        buf: &mut BytesMut,
    ) -> std::result::Result<Option<Frame>, AnyDelimiterCodecError> {
        Self::frame(self.lines.decode(buf))
    }

    fn decode_eof(
        &mut self,
        buf: &mut BytesMut,
    ) -> std::result::Result<Option<Frame>, AnyDelimiterCodecError> {
        Self::frame(self.lines.decode_eof(buf))
    }
}

/// Newline-delimited envelopes read from any async byte stream
///
/// Lines are passed on as raw bytes, so a line that is not UTF-8 reaches the
/// envelope parser instead of ending the stream. Lines longer than
/// `max_line_bytes` are skipped and delivered as an empty payload.
pub struct LineSource<R> {
    frames: Option<FramedRead<R, EnvelopeCodec>>,
    label: String,
    max_line_bytes: usize,
}

impl<R: AsyncRead + Unpin + Send> LineSource<R> {
    pub fn new(reader: R, label: impl Into<String>, max_line_bytes: usize) -> Self {
        Self {
            frames: Some(FramedRead::new(reader, EnvelopeCodec::new(max_line_bytes))),
            label: label.into(),
            max_line_bytes,
        }
    }
}

impl<R> fmt::Debug for LineSource<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineSource")
            .field("label", &self.label)
            .field("max_line_bytes", &self.max_line_bytes)
            .field("open", &self.frames.is_some())
            .finish()
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> MessageSource for LineSource<R> {
    async fn next_message(&mut self) -> Result<Option<Vec<u8>>> {
        let frames = self
            .frames
            .as_mut()
            .ok_or_else(|| Error::StreamRead(format!("{} is closed", self.label)))?;

        match frames.next().await {
            None => Ok(None),
            Some(Ok(Frame::Line(line))) => Ok(Some(line.to_vec())),
            Some(Ok(Frame::TooLong)) => {
                warn!(
                    "{}: skipped envelope longer than {} bytes",
                    self.label, self.max_line_bytes
                );
                Ok(Some(Vec::new()))
            }
            Some(Err(e)) => Err(Error::StreamRead(format!("{}: {}", self.label, e))),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.frames.take().is_some() {
            debug!("Closed stream source {}", self.label);
        }
        Ok(())
    }
}

/// Envelopes fed from inside the process through a channel
///
/// Sending an `Err` simulates a read failure; dropping every sender ends the
/// stream cleanly.
#[derive(Debug)]
pub struct ChannelSource {
    rx: Option<mpsc::Receiver<Result<String>>>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<Result<String>>) -> Self {
        Self { rx: Some(rx) }
    }

    /// Create a connected sender/source pair
    pub fn channel(capacity: usize) -> (mpsc::Sender<Result<String>>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn next_message(&mut self) -> Result<Option<Vec<u8>>> {
        let rx = self
            .rx
            .as_mut()
            .ok_or_else(|| Error::StreamRead("channel source is closed".to_string()))?;

        match rx.recv().await {
            Some(Ok(message)) => Ok(Some(message.into_bytes())),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut rx) = self.rx.take() {
            rx.close();
        }
        Ok(())
    }
}

/// Open the configured stream source
pub async fn connect(config: &SourceConfig) -> Result<Box<dyn MessageSource>> {
    match config.kind {
        SourceKind::Tcp => {
            info!("Connecting to stream at {}", config.addr);
            let stream = TcpStream::connect(&config.addr)
                .await
                .map_err(|e| Error::StreamRead(format!("connect {}: {}", config.addr, e)))?;
            info!("✓ Connected to stream at {}", config.addr);
            Ok(Box::new(LineSource::new(
                stream,
                format!("tcp://{}", config.addr),
                config.max_line_bytes,
            )))
        }
        SourceKind::Stdin => {
            info!("Reading stream from standard input");
            Ok(Box::new(LineSource::new(
                tokio::io::stdin(),
                "stdin",
                config.max_line_bytes,
            )))
        }
    }
}
