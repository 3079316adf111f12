//! Hokm websocket server: rooms, sessions, and message routing.
//!
//! The layering mirrors the workspace: `hokm-engine` holds the rules,
//! `hokm-protocol` the wire types, `hokm-session` the identity and
//! store plumbing. This crate ties them to sockets: a [`HokmServer`]
//! accepts websocket connections, each of which joins a room actor via
//! the [`MatchRegistry`](registry::MatchRegistry).

pub mod broadcast;
pub mod error;
mod handler;
pub mod registry;
pub mod room;
pub mod server;

pub use error::ServerError;
pub use server::{HokmServer, HokmServerBuilder, ServerState};
