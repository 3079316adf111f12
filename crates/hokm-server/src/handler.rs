//! Per-connection handler: socket lifecycle and message routing.
//!
//! Each accepted socket gets its own Tokio task running this handler,
//! plus a writer task draining the player's outbound channel into the
//! websocket sink. The handler owns the connection's identity: nothing
//! game-related is accepted until the client has joined, created, or
//! reconnected into a room.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_tungstenite::tungstenite::Message;

use hokm_engine::PlayerId;
use hokm_protocol::{
    ClientMessage, Codec, ErrorCode, RoomCode, ServerMessage,
};
use hokm_session::{SessionError, SessionFreshness, Store};

use crate::error::ServerError;
use crate::room::{RoomError, RoomHandle};
use crate::server::ServerState;

/// What this socket has established about who it is.
struct Identity {
    player_id: PlayerId,
    room: RoomHandle,
}

/// Handles one connection from websocket accept to close.
pub(crate) async fn handle_connection<S: Store>(
    stream: TcpStream,
    state: Arc<ServerState<S>>,
) -> Result<(), ServerError> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut source) = ws.split();

    // The writer task is the only thing touching the sink; everyone
    // else (handler, room actor, broadcaster) goes through the channel.
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let codec = state.codec;
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let frame = match codec.encode(&message) {
                Ok(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => Message::text(text),
                    Err(_) => continue,
                },
                Err(error) => {
                    tracing::warn!(%error, "outbound encode failed");
                    continue;
                }
            };
            if sink.send(frame).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut identity: Option<Identity> = None;

    while let Some(frame) = source.next().await {
        let data = match frame {
            Ok(Message::Text(text)) => text.as_bytes().to_vec(),
            Ok(Message::Binary(data)) => data.to_vec(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue, // ping/pong handled by tungstenite
            Err(error) => {
                tracing::debug!(%error, "socket read error");
                break;
            }
        };

        let message: ClientMessage = match state.codec.decode(&data) {
            Ok(message) => message,
            Err(error) => {
                send(
                    &tx,
                    ServerMessage::Error {
                        code: ErrorCode::MalformedMessage,
                        message: error.to_string(),
                    },
                );
                continue;
            }
        };

        dispatch(&state, &tx, &mut identity, message).await;
    }

    // Socket gone: release the live connection but keep the session so
    // the player can come back within the reconnection windows.
    if let Some(identity) = identity {
        let player_id = identity.player_id;
        state.connections.unregister(&player_id).await;
        if let Err(error) =
            state.sessions.mark_disconnected(&player_id).await
        {
            tracing::debug!(%player_id, %error, "disconnect mark failed");
        }
        let _ = identity.room.disconnect(player_id).await;
    }

    drop(tx);
    let _ = writer.await;
    Ok(())
}

async fn dispatch<S: Store>(
    state: &Arc<ServerState<S>>,
    tx: &UnboundedSender<ServerMessage>,
    identity: &mut Option<Identity>,
    message: ClientMessage,
) {
    match message {
        ClientMessage::CreateRoom { username } => {
            if identity.is_some() {
                reject(tx, ErrorCode::InvalidAction, "already in a room");
                return;
            }
            let room = state.matches.lock().await.create_room();
            join_room(state, tx, identity, room, username).await;
        }

        ClientMessage::Join {
            username,
            room_code,
        } => {
            if identity.is_some() {
                reject(tx, ErrorCode::InvalidAction, "already in a room");
                return;
            }
            let Some(room) = state.matches.lock().await.get(&room_code)
            else {
                reject(
                    tx,
                    ErrorCode::RoomNotFound,
                    &format!("no room with code {room_code}"),
                );
                return;
            };
            join_room(state, tx, identity, room, username).await;
        }

        ClientMessage::Reconnect {
            player_id,
            room_code,
        } => {
            if identity.is_some() {
                reject(tx, ErrorCode::InvalidAction, "already in a room");
                return;
            }
            handle_reconnect(state, tx, identity, player_id, room_code)
                .await;
        }

        ClientMessage::Heartbeat => {
            if let Some(identity) = identity {
                if let Err(error) =
                    state.sessions.heartbeat(&identity.player_id).await
                {
                    tracing::debug!(
                        player_id = %identity.player_id,
                        %error,
                        "heartbeat update failed"
                    );
                }
            }
            send(tx, ServerMessage::HeartbeatAck);
        }

        ClientMessage::HokmSelected { suit } => {
            let Some(identity) = identity else {
                reject(tx, ErrorCode::InvalidAction, "not in a room");
                return;
            };
            let _ = identity
                .room
                .hokm_selected(identity.player_id.clone(), suit)
                .await;
        }

        ClientMessage::PlayCard { player_id, card } => {
            let Some(identity) = identity else {
                reject(tx, ErrorCode::InvalidAction, "not in a room");
                return;
            };
            // The payload names a player, but only the connection's own
            // identity may act.
            if player_id != identity.player_id {
                reject(
                    tx,
                    ErrorCode::InvalidAction,
                    "player id does not match this connection",
                );
                return;
            }
            let _ = identity
                .room
                .play_card(identity.player_id.clone(), card)
                .await;
        }

        ClientMessage::ClearRoom { room_code } => {
            let removed = state.matches.lock().await.remove(&room_code);
            match removed {
                Some(room) => {
                    let _ = room.shutdown().await;
                }
                None => reject(
                    tx,
                    ErrorCode::RoomNotFound,
                    &format!("no room with code {room_code}"),
                ),
            }
        }
    }
}

/// Shared tail of CreateRoom and Join: mint an identity, register the
/// connection, seat the player, persist the session.
async fn join_room<S: Store>(
    state: &Arc<ServerState<S>>,
    tx: &UnboundedSender<ServerMessage>,
    identity: &mut Option<Identity>,
    room: RoomHandle,
    username: String,
) {
    let player_id = generate_player_id();
    let room_code = room.room_code().clone();

    // Register before joining so the fourth join's start-of-match
    // broadcast can reach this player.
    state
        .connections
        .register(player_id.clone(), tx.clone())
        .await;

    let info = match room.join(player_id.clone(), username.clone()).await {
        Ok(info) => info,
        Err(error) => {
            state.connections.unregister(&player_id).await;
            let code = match &error {
                RoomError::Full(_) => ErrorCode::RoomFull,
                RoomError::AlreadyInRoom(_) => ErrorCode::InvalidAction,
                _ => ErrorCode::RoomNotFound,
            };
            reject(tx, code, &error.to_string());
            return;
        }
    };

    if let Err(error) = state
        .sessions
        .create(player_id.clone(), room_code.clone(), username)
        .await
    {
        // The seat is taken either way; without a session only
        // reconnection is lost.
        tracing::warn!(%player_id, %error, "session create failed");
    }

    send(
        tx,
        ServerMessage::JoinSuccess {
            player_id: player_id.clone(),
            room_code,
            players: info.players,
        },
    );
    *identity = Some(Identity { player_id, room });
}

async fn handle_reconnect<S: Store>(
    state: &Arc<ServerState<S>>,
    tx: &UnboundedSender<ServerMessage>,
    identity: &mut Option<Identity>,
    player_id: PlayerId,
    room_code: RoomCode,
) {
    let freshness = match state
        .sessions
        .validate_reconnect(&player_id, &room_code)
        .await
    {
        Ok((_, freshness)) => freshness,
        Err(error) => {
            reject(tx, session_error_code(&error), &error.to_string());
            return;
        }
    };

    let Some(room) = state.matches.lock().await.get(&room_code) else {
        // The session points at a room that no longer exists; it will
        // never become valid again, so drop it now.
        let _ = state.sessions.delete(&player_id).await;
        reject(
            tx,
            ErrorCode::RoomGone,
            &format!("room {room_code} no longer exists"),
        );
        return;
    };

    state
        .connections
        .register(player_id.clone(), tx.clone())
        .await;

    let recovered = freshness == SessionFreshness::Recovered;
    if let Err(error) =
        room.reconnect(player_id.clone(), recovered).await
    {
        state.connections.unregister(&player_id).await;
        let _ = state.sessions.mark_disconnected(&player_id).await;
        let code = match &error {
            RoomError::NoActiveGame(_) => ErrorCode::NoActiveGame,
            _ => ErrorCode::RoomGone,
        };
        reject(tx, code, &error.to_string());
        return;
    }

    // ReconnectSuccess and the snapshot come from the room actor.
    *identity = Some(Identity { player_id, room });
}

fn session_error_code(error: &SessionError) -> ErrorCode {
    match error {
        SessionError::NotFound(_) | SessionError::Corrupt(_) => {
            ErrorCode::SessionNotFound
        }
        SessionError::SessionExpired(_) => ErrorCode::SessionExpired,
        SessionError::AlreadyConnected(_) => ErrorCode::AlreadyConnected,
        SessionError::Store(_) => ErrorCode::InvalidAction,
    }
}

fn send(tx: &UnboundedSender<ServerMessage>, message: ServerMessage) {
    let _ = tx.send(message);
}

fn reject(
    tx: &UnboundedSender<ServerMessage>,
    code: ErrorCode,
    message: &str,
) {
    send(
        tx,
        ServerMessage::Error {
            code,
            message: message.to_owned(),
        },
    );
}

/// Mints a fresh opaque player id: `p-` plus 64 bits of randomness in
/// hex. Collisions are not a practical concern at this id width.
fn generate_player_id() -> PlayerId {
    let mut rng = rand::rng();
    let bytes: [u8; 8] = rng.random();
    let hex: String =
        bytes.iter().map(|b| format!("{b:02x}")).collect();
    PlayerId::new(format!("p-{hex}"))
}
