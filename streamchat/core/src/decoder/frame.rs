//! Frame Decoding
//!
//! Line-oriented parser for the chat event stream.
//!
//! # Frame Format
//!
//! ```text
//! data: {"type":"start","session_id":"abc"}\n
//! data: {"type":"token","content":"Hel"}\n
//! : keep-alive comment (ignored)\n
//! \n
//! data: {"type":"token","content":"lo"}\n
//! data: [DONE]\n
//! ```
//!
//! Only complete lines are frames. Blank lines and lines without the
//! `data: ` prefix are skipped. A payload that is not valid chunk JSON is
//! logged and skipped; it never ends the sequence.

use super::chunk::Chunk;
use super::utf8::Utf8Decoder;

/// Prefix that marks a line as an event frame
pub const DATA_PREFIX: &str = "data: ";

/// Payload that ends the stream outside the JSON format
pub const DONE_SENTINEL: &str = "[DONE]";

/// One meaningful frame
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodedFrame {
    /// A structured event
    Chunk(Chunk),
    /// The terminal sentinel
    Sentinel,
}

impl DecodedFrame {
    /// Whether nothing may follow this frame
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Chunk(chunk) => chunk.is_terminal(),
            Self::Sentinel => true,
        }
    }
}

/// Push-based decoder state machine
///
/// Buffers incoming bytes and yields complete frames. Once a terminal frame
/// has been produced the decoder is finished and ignores further input.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    utf8: Utf8Decoder,
    /// Carry-over of the last, possibly incomplete line
    line_buffer: String,
    finished: bool,
    /// Frames dropped because their payload did not parse
    malformed: u64,
}

impl FrameDecoder {
    /// Create a new decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a terminal frame has been decoded
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of malformed frames skipped so far
    #[must_use]
    pub fn malformed_count(&self) -> u64 {
        self.malformed
    }

    /// Bytes and text currently held back (incomplete line plus any partial
    /// character)
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.line_buffer.len() + self.utf8.pending_len()
    }

    /// Feed the next read and collect every frame it completes
    pub fn push(&mut self, bytes: &[u8]) -> Vec<DecodedFrame> {
        if self.finished {
            return Vec::new();
        }

        let text = self.utf8.decode(bytes);
        self.line_buffer.push_str(&text);

        let Some(last_newline) = self.line_buffer.rfind('\n') else {
            return Vec::new();
        };

        let remainder = self.line_buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.line_buffer, remainder);

        let mut frames = Vec::new();
        for line in complete.split('\n') {
            let Some(frame) = self.decode_line(line) else {
                continue;
            };

            let terminal = frame.is_terminal();
            frames.push(frame);

            if terminal {
                self.finish();
                self.finished = true;
                break;
            }
        }

        frames
    }

    /// Discard whatever is still buffered, returning its size in bytes
    ///
    /// Called at end-of-stream: an unterminated trailing line is not a frame.
    pub fn finish(&mut self) -> usize {
        let discarded = self.line_buffer.len() + self.utf8.reset();
        self.line_buffer.clear();
        discarded
    }

    fn decode_line(&mut self, line: &str) -> Option<DecodedFrame> {
        if line.trim().is_empty() {
            return None;
        }

        let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
            tracing::trace!(line = %line, "Skipping non-data line");
            return None;
        };

        let payload = rest.trim();
        if payload == DONE_SENTINEL {
            return Some(DecodedFrame::Sentinel);
        }

        match serde_json::from_str::<Chunk>(payload) {
            Ok(chunk) => Some(DecodedFrame::Chunk(chunk)),
            Err(e) => {
                self.malformed += 1;
                tracing::warn!(
                    error = %e,
                    payload = %payload,
                    "Discarding malformed frame"
                );
                None
            }
        }
    }
}
