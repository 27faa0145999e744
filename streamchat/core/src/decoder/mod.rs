//! Frame Decoder
//!
//! Turns the raw bytes of a streaming chat response into typed [`Chunk`]s.
//!
//! # Architecture
//!
//! ```text
//! response body ──bytes──▶ Utf8Decoder ──text──▶ line buffer ──lines──▶ frames
//!                         (partial chars          (partial line       (data: prefix,
//!                          carried over)           carried over)       [DONE], JSON)
//! ```
//!
//! [`FrameDecoder`] is the synchronous state machine; [`ChunkStream`] owns
//! the byte stream and pulls from it lazily. Neither touches conversation
//! state.
//!
//! # Example
//!
//! ```
//! use streamchat_core::decoder::{Chunk, DecodedFrame, FrameDecoder};
//!
//! let mut decoder = FrameDecoder::new();
//! assert!(decoder.push(b"data: {\"type\":\"token\",\"con").is_empty());
//! let frames = decoder.push(b"tent\":\"Hi\"}\ndata: [DONE]\n");
//! assert_eq!(
//!     frames,
//!     vec![DecodedFrame::Chunk(Chunk::token("Hi")), DecodedFrame::Sentinel]
//! );
//! ```

mod chunk;
mod chunk_stream;
mod frame;
mod utf8;

pub use chunk::{Chunk, UNKNOWN_ERROR};
pub use chunk_stream::{ByteStream, ChunkStream, StreamEnd};
pub use frame::{DecodedFrame, FrameDecoder, DATA_PREFIX, DONE_SENTINEL};
pub use utf8::Utf8Decoder;
