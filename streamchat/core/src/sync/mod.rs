//! Stream Synchronization
//!
//! Applies a decoded reply to the conversation log while keeping at most
//! one live exchange per conversation.
//!
//! - [`ChatSynchronizer`]: accepts input and drives exchanges
//! - [`ActiveStreams`]: the per-conversation single-active-stream guard
//! - [`ExchangeReport`]: how a finished exchange ended
//!
//! Exchanges are never cancelled. Selecting another conversation while one
//! is streaming only changes where the next submission goes.

mod exchange;
mod guard;
mod synchronizer;

pub use exchange::{failure_annotation, ExchangeOutcome, ExchangeReport, ExchangeState};
pub use guard::{ActiveStream, ActiveStreams};
pub use synchronizer::{ChatSynchronizer, IgnoreReason, SubmitOutcome};
