//! Wire protocol for the Hokm server.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`RoomCode`],
//!   [`ErrorCode`]) — the message structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! The protocol layer sits between transport (raw websocket frames) and
//! the session/room layers. It doesn't know about connections or game
//! rules — it only knows message shapes. Domain types ([`Card`],
//! [`Team`], `PlayerView`, ...) come from `hokm-engine` and are embedded
//! directly in messages, so the wire shape and the engine's types can
//! never drift apart.
//!
//! [`Card`]: hokm_engine::Card
//! [`Team`]: hokm_engine::Team

mod codec;
mod error;
mod message;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use message::{ClientMessage, ErrorCode, ServerMessage};
pub use types::RoomCode;
