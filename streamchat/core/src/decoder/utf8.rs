//! Incremental UTF-8 Decoding
//!
//! Network reads split multi-byte characters at arbitrary points. The
//! decoder holds back an incomplete trailing sequence and completes it with
//! the next read. Invalid sequences become U+FFFD instead of failing.

use std::borrow::Cow;

/// Stateful byte-to-text decoder
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    /// Bytes of a character that has not been completed yet (at most 3)
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Create a decoder with nothing pending
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes held back waiting for the rest of a character
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Decode the next read, completing any character left over from the
    /// previous one
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let data: Cow<'_, [u8]> = if self.pending.is_empty() {
            Cow::Borrowed(bytes)
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(bytes);
            Cow::Owned(joined)
        };

        let mut out = String::with_capacity(data.len());
        let mut rest: &[u8] = &data;

        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid]));

                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid + len..];
                        }
                        None => {
                            // Incomplete sequence at the end of the read
                            self.pending = rest[valid..].to_vec();
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Drop any incomplete character, returning how many bytes were lost
    pub fn reset(&mut self) -> usize {
        let lost = self.pending.len();
        self.pending.clear();
        lost
    }
}
