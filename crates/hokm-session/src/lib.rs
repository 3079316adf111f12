//! Session persistence and connection tracking for the Hokm server.
//!
//! Two related but distinct concerns live here:
//!
//! - **Sessions** ([`SessionManager`], [`SessionRecord`]) — durable
//!   identity. A session outlives the socket: it records who a player
//!   is, which room they belong to, and when they were last heard from,
//!   so a dropped connection can be resumed.
//! - **Connections** ([`ConnectionRegistry`]) — live delivery. Maps each
//!   player to the outbound channel of their current socket, if any.
//!
//! Sessions are kept in a [`Store`] — an async key/value abstraction
//! with TTLs. [`MemoryStore`] is the in-process implementation; anything
//! with the same shape (an external cache, say) can replace it without
//! touching the manager.
//!
//! # Reconnection windows
//!
//! A disconnected session is classified by the age of its last
//! heartbeat:
//!
//! ```text
//! age ≤ heartbeat_timeout        → Fresh      (resume silently)
//! age ≤ 2 × heartbeat_timeout    → Recovered  (resume, flag recovery)
//! older                          → deleted; reconnection refused
//! ```

mod error;
mod manager;
mod registry;
mod session;
mod store;

pub use error::SessionError;
pub use manager::SessionManager;
pub use registry::ConnectionRegistry;
pub use session::{SessionConfig, SessionFreshness, SessionRecord};
pub use store::{MemoryStore, Store, StoreError};
