//! Lazy Chunk Sequence
//!
//! Async adapter that owns a response byte stream and yields chunks one at
//! a time. Bytes are only read when the consumer asks for the next chunk.

use std::collections::VecDeque;
use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};

use super::chunk::Chunk;
use super::frame::{DecodedFrame, FrameDecoder};
use crate::error::TransportError;

/// Boxed response body as delivered by a transport
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Why a chunk sequence ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamEnd {
    /// The `[DONE]` sentinel was read
    Sentinel,
    /// A `done` chunk was yielded
    DoneChunk,
    /// An `error` chunk was yielded
    ErrorChunk,
    /// The body closed without a terminal frame
    EndOfStream,
    /// Reading the body failed
    TransportFailure,
}

impl StreamEnd {
    /// Whether the sequence ended without a failure
    #[must_use]
    pub fn is_normal(self) -> bool {
        matches!(self, Self::Sentinel | Self::DoneChunk | Self::EndOfStream)
    }
}

/// Lazily decoded chunk sequence for one exchange
///
/// Not restartable: after it ends, every call to [`next_chunk`] returns
/// `None`.
///
/// [`next_chunk`]: ChunkStream::next_chunk
pub struct ChunkStream<S = ByteStream> {
    bytes: S,
    decoder: FrameDecoder,
    /// Chunks decoded from the last read but not yet handed out
    ready: VecDeque<Chunk>,
    end: Option<StreamEnd>,
    reads: u64,
}

impl<S> ChunkStream<S>
where
    S: Stream<Item = Result<Bytes, TransportError>> + Unpin,
{
    /// Wrap a byte stream
    pub fn new(bytes: S) -> Self {
        Self {
            bytes,
            decoder: FrameDecoder::new(),
            ready: VecDeque::new(),
            end: None,
            reads: 0,
        }
    }

    /// Why the sequence ended, once it has
    ///
    /// Set as soon as the terminal frame is decoded, which may be before
    /// the chunks that preceded it have all been handed out.
    #[must_use]
    pub fn end_reason(&self) -> Option<StreamEnd> {
        self.end
    }

    /// Number of reads taken from the byte stream
    #[must_use]
    pub fn reads(&self) -> u64 {
        self.reads
    }

    /// Number of malformed frames skipped
    #[must_use]
    pub fn malformed_count(&self) -> u64 {
        self.decoder.malformed_count()
    }

    /// Next chunk, reading from the body as needed
    ///
    /// A read failure is returned once as `Err` and ends the sequence.
    pub async fn next_chunk(&mut self) -> Option<Result<Chunk, TransportError>> {
        loop {
            if let Some(chunk) = self.ready.pop_front() {
                return Some(Ok(chunk));
            }

            if self.end.is_some() {
                return None;
            }

            match self.bytes.next().await {
                Some(Ok(bytes)) => {
                    self.reads += 1;
                    self.accept(&bytes);
                }
                Some(Err(e)) => {
                    self.end = Some(StreamEnd::TransportFailure);
                    return Some(Err(e));
                }
                None => {
                    let discarded = self.decoder.finish();
                    if discarded > 0 {
                        tracing::debug!(
                            bytes = discarded,
                            "Discarding unterminated line at end of stream"
                        );
                    }
                    self.end = Some(StreamEnd::EndOfStream);
                }
            }
        }
    }

    /// Turn the sequence into a `futures::Stream`
    pub fn into_stream(self) -> impl Stream<Item = Result<Chunk, TransportError>> {
        futures::stream::unfold(self, |mut chunks| async move {
            chunks.next_chunk().await.map(|item| (item, chunks))
        })
    }

    fn accept(&mut self, bytes: &[u8]) {
        for frame in self.decoder.push(bytes) {
            match frame {
                DecodedFrame::Chunk(chunk) => {
                    match &chunk {
                        Chunk::Done { .. } => self.end = Some(StreamEnd::DoneChunk),
                        Chunk::Error { .. } => self.end = Some(StreamEnd::ErrorChunk),
                        _ => {}
                    }
                    self.ready.push_back(chunk);
                }
                DecodedFrame::Sentinel => {
                    self.end = Some(StreamEnd::Sentinel);
                }
            }
        }
    }
}
