//! Streamchat Core - Streaming Chat Client Without a UI
//!
//! This crate holds a conversation with a backend agent whose replies arrive
//! incrementally over a long-lived HTTP response. It decodes the response
//! into typed chunks and applies them to an in-memory conversation log,
//! with at most one live reply per conversation.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     Host (CLI, TUI, tests)                        │
//! │        submit(input)                      ChatEvent (down)        │
//! └───────────┬──────────────────────────────────────▲───────────────┘
//!             │                                      │
//! ┌───────────▼──────────────────────────────────────┴───────────────┐
//! │                        ChatSynchronizer                           │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────────┐ │
//! │  │ActiveStreams │  │   Exchange   │  │ ConversationRegistry     │ │
//! │  │ (one per     │  │ Sending →    │  │ (append-only log,        │ │
//! │  │ conversation)│  │ Streaming →  │  │  selected conversation)  │ │
//! │  └──────────────┘  │ Complete /   │  └──────────────────────────┘ │
//! │                    │ Failed       │                               │
//! │                    └──────▲───────┘                               │
//! └───────────────────────────┼──────────────────────────────────────┘
//!                             │ Chunk
//! ┌───────────────────────────┼──────────────────────────────────────┐
//! │  ChunkStream ◀── FrameDecoder ◀── bytes ◀── ChatTransport (HTTP)  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`ChatSynchronizer`]: accepts input and runs exchanges
//! - [`ConversationStore`]: in-memory conversation registry
//! - [`ChunkStream`]: lazily decoded chunk sequence over a response body
//! - [`HttpTransport`]: reqwest client for the streaming endpoint
//! - [`ClientConfig`]: endpoint and limits, from defaults, file and env
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use streamchat_core::{
//!     ChatSynchronizer, ClientConfig, ConversationId, ConversationStore, EnvCredentials,
//!     HttpTransport,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::from_env()?;
//!     let store = Arc::new(ConversationStore::new());
//!     store.select(ConversationId::new());
//!
//!     let sync = ChatSynchronizer::new(
//!         Arc::new(HttpTransport::new(&config)?),
//!         Arc::clone(&store),
//!         Arc::new(EnvCredentials),
//!     )
//!     .with_config(&config);
//!
//!     let outcome = sync.submit("Hello!").await;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`backend`]: transport trait and the HTTP implementation
//! - [`config`]: client configuration
//! - [`conversation`]: messages, conversations and the registry
//! - [`credentials`]: bearer token providers
//! - [`decoder`]: byte stream to chunk decoding
//! - [`error`]: error types
//! - [`messages`]: identifiers and events for hosts
//! - [`sync`]: exchange lifecycle and the synchronizer

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod conversation;
pub mod credentials;
pub mod decoder;
pub mod error;
pub mod messages;
pub mod sync;

// Re-exports for convenience
pub use backend::{ChatRequest, ChatTransport, HttpTransport};
pub use config::{load_config, ClientConfig, ConfigError, ConfigSource};
pub use conversation::{Conversation, ConversationRegistry, ConversationStore, Message};
pub use credentials::{CredentialProvider, EnvCredentials, StaticCredentials, TokenFile};
pub use decoder::{ByteStream, Chunk, ChunkStream, FrameDecoder, StreamEnd};
pub use error::{RegistryError, TransportError};
pub use messages::{ChatEvent, ConversationId, MessageId, MessageRole};
pub use sync::{
    ActiveStreams, ChatSynchronizer, ExchangeOutcome, ExchangeReport, ExchangeState,
    IgnoreReason, SubmitOutcome,
};
