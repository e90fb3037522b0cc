//! # chatsync-core
//!
//! Core library for chatsync - a document-grounded chat client that keeps
//! one conversation in sync with its backend.
//!
//! This library provides:
//! - Domain types for conversations, messages and documents
//! - The conversation store, message reconciler, document tracker and
//!   grounding selection
//! - A realtime push channel (Socket.IO over WebSocket)
//! - A REST client for the conversation API
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Three sources feed the same store:
//! - **Optimistic edits:** applied locally before the request goes out
//! - **Responses:** request/response results that settle optimistic edits
//! - **Push events:** delivered asynchronously over the realtime channel
//!
//! [`Session`] sequences them on a single event queue so that every
//! mutation path stays idempotent by id.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chatsync_core::{Config, HttpApi, RealtimeChannel, Session};
//!
//! # async fn run() -> chatsync_core::Result<()> {
//! let config = Config::load()?;
//! let api = Arc::new(HttpApi::new(&config.server)?);
//! let channel = RealtimeChannel::from_config(&config.server, &config.sync);
//!
//! let mut session = Session::new(api, channel, &config);
//! session.connect()?;
//! session.open("3f6c1d9e-0000-0000-0000-000000000000");
//! session.settle().await;
//! session.send_message("Summarize the attached report");
//! session.settle().await;
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use api::{ConversationApi, ConversationSnapshot, HttpApi};
pub use config::Config;
pub use error::{Error, Result};
pub use realtime::{EventKind, PushEvent, RealtimeChannel};
pub use session::{RefreshReason, Session, SessionEvent};
pub use types::*;

// Public modules
pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod notify;
pub mod realtime;
pub mod reconciler;
pub mod selection;
pub mod session;
pub mod store;
pub mod tracker;
pub mod types;
pub mod upload;
