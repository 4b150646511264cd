//! # courier-protocol
//!
//! Wire protocol definitions for the Courier realtime messaging layer.
//!
//! This crate defines the tagged JSON events exchanged between clients and
//! the coordination server, along with the codec that validates them.
//!
//! ## Event Types
//!
//! - `authenticate` - Bind a verified identity to a connection
//! - `join_chat` / `leave_chat` - Room membership
//! - `typing_start` / `typing_stop` - Typing indicators
//! - `message_reaction` / `message_read` - Stateless relays
//! - `presence_update` - Status changes, scoped to joined rooms
//!
//! Outbound events carry ISO-8601 timestamps and camelCase field names;
//! both are part of the client compatibility surface and must not drift.
//!
//! ## Example
//!
//! ```rust
//! use courier_protocol::{codec, Inbound};
//!
//! let text = r#"{"type":"join_chat","chatId":"lobby","userId":"u1"}"#;
//! match codec::decode_client(text).unwrap() {
//!     Inbound::Event(event) => assert_eq!(event.event_type(), "join_chat"),
//!     Inbound::Unknown(_) => unreachable!(),
//! }
//! ```

pub mod codec;
pub mod events;
pub mod timestamp;

pub use codec::{decode_client, encode_server, Inbound, ProtocolError};
pub use events::{ClientEvent, ServerEvent, UserRef};
pub use timestamp::now_iso8601;
