//! # courier-core
//!
//! Rooms, sessions, and timers for the Courier coordination layer.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Room** - Named broadcast scope grouping connections
//! - **RoomRegistry** - Concurrent membership tracking and event fan-out
//! - **ConnectionSession** - Per-connection state machine
//! - **TimerRegistry** - Cancellable single-shot expiry timers
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │   Session   │────▶│ RoomRegistry │────▶│    Room     │
//! └─────────────┘     └──────────────┘     └─────────────┘
//!        │                    │
//!        ▼                    ▼
//! ┌─────────────┐     ┌──────────────┐
//! │TimerRegistry│     │  Mailboxes   │
//! └─────────────┘     └──────────────┘
//! ```
//!
//! The registry is the only structure shared across connections; session
//! fields are owned exclusively by the connection's own task.

pub mod connection;
pub mod registry;
pub mod room;
pub mod session;
pub mod timer;

pub use connection::{ConnectionId, Mailbox};
pub use registry::{RegistryError, RoomRegistry, GLOBAL_ROOM};
pub use room::{validate_room_name, Room, RoomId};
pub use session::{ConnectionSession, Identity, SessionState};
pub use timer::{TimerKey, TimerKind, TimerRegistry};
