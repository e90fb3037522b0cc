//! Realtime push channel
//!
//! One shared WebSocket connection to the backend's Socket.IO endpoint,
//! with room-scoped delivery and typed event handlers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  frames  ┌──────────────────┐  PushEvent  ┌──────────────┐
//! │ Socket.IO    │ ───────► │ connection task  │ ──────────► │ handlers     │
//! │ server       │ ◄─────── │ (reconnecting)   │             │ (per kind)   │
//! └──────────────┘  join/   └──────────────────┘             └──────────────┘
//!                   leave            ▲
//!                                    │ RealtimeChannel (cloneable handle)
//! ```
//!
//! The channel is an explicitly owned handle: whoever creates it passes
//! clones to the components that subscribe, and calls `shutdown()` when
//! done. Room membership and handler registrations are per conversation
//! and must be torn down by their owner; the connection itself lives for
//! the whole client lifetime.

mod channel;
mod events;

pub use channel::{Handler, HandlerId, RealtimeChannel};
pub use events::{
    decode_event, decode_frame, encode_event, DocProcessed, EventKind, Frame, Lifecycle, Packet,
    PushEvent,
};
