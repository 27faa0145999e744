//! Chat Backend Transport
//!
//! Abstracted access to the streaming chat endpoint through a common trait.
//!
//! # Available Transports
//!
//! - **HTTP**: reqwest client against the backend's SSE endpoint (default)
//!
//! # Usage
//!
//! ```ignore
//! use streamchat_core::backend::{ChatRequest, ChatTransport, HttpTransport};
//! use streamchat_core::{ClientConfig, ConversationId};
//!
//! let transport = HttpTransport::new(&ClientConfig::from_env()?)?;
//! let request = ChatRequest::new(&ConversationId::from("abc"), "Hello!");
//! let body = transport.open_stream(&request, "token").await?;
//! ```

mod http;
mod traits;

pub use http::HttpTransport;
pub use traits::{ChatRequest, ChatTransport};
