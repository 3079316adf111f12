//! Room actor: an isolated Tokio task that owns one match.
//!
//! Each room runs in its own task and communicates with the rest of the
//! server through an mpsc command channel. The [`MatchState`] inside is
//! owned by exactly one task, so no game state is ever behind a lock —
//! message passing replaces shared mutability.

use hokm_engine::{
    Card, MatchConfig, MatchPhase, MatchState, PlayerId, PlayerView,
    Suit, PLAYER_COUNT,
};
use hokm_protocol::{ErrorCode, RoomCode, ServerMessage};
use hokm_session::Store;
use tokio::sync::{mpsc, oneshot};

use crate::broadcast::Broadcaster;

/// Command channel size per room. Four players never come close.
const COMMAND_CHANNEL_SIZE: usize = 64;

/// Errors a room can return to its callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// The room already seats four players.
    #[error("room {0} is full")]
    Full(RoomCode),

    /// The player already holds a seat in this room.
    #[error("player {0} is already seated")]
    AlreadyInRoom(PlayerId),

    /// The room exists but has no game to rejoin.
    #[error("room {0} has no active game")]
    NoActiveGame(RoomCode),

    /// The room actor is gone (shut down or crashed).
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),
}

/// What a successful join returns.
#[derive(Debug, Clone)]
pub struct JoinInfo {
    pub room_code: RoomCode,
    /// Seated players after this join, in join order.
    pub players: Vec<PlayerId>,
}

/// A metadata snapshot of the room (not the game state).
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub room_code: RoomCode,
    pub players: Vec<PlayerId>,
    /// `None` until the fourth player arrives and the match starts.
    pub phase: Option<MatchPhase>,
}

/// Commands sent to a room actor through its channel. Variants with a
/// `oneshot` reply are request/response; the rest are fire-and-forget.
enum RoomCommand {
    Join {
        player_id: PlayerId,
        username: String,
        reply: oneshot::Sender<Result<JoinInfo, RoomError>>,
    },
    Reconnect {
        player_id: PlayerId,
        recovered: bool,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    HokmSelected {
        player_id: PlayerId,
        suit: Suit,
    },
    PlayCard {
        player_id: PlayerId,
        card: Card,
    },
    Disconnect {
        player_id: PlayerId,
    },
    Info {
        reply: oneshot::Sender<RoomInfo>,
    },
    Shutdown,
}

/// Handle to a running room actor. Cheap to clone.
#[derive(Clone)]
pub struct RoomHandle {
    room_code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_code(&self) -> &RoomCode {
        &self.room_code
    }

    /// Seats a player. The fourth join starts the match.
    pub async fn join(
        &self,
        player_id: PlayerId,
        username: String,
    ) -> Result<JoinInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Join {
                player_id,
                username,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code.clone()))?
    }

    /// Re-admits a reconnecting player: acknowledges, replays their
    /// snapshot, and announces the return to the others.
    pub async fn reconnect(
        &self,
        player_id: PlayerId,
        recovered: bool,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Reconnect {
                player_id,
                recovered,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code.clone()))?
    }

    /// Delivers the hakem's trump choice (fire-and-forget; rejections
    /// go back over the player's own connection).
    pub async fn hokm_selected(
        &self,
        player_id: PlayerId,
        suit: Suit,
    ) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::HokmSelected { player_id, suit })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code.clone()))
    }

    /// Delivers a card play (fire-and-forget, same as above).
    pub async fn play_card(
        &self,
        player_id: PlayerId,
        card: Card,
    ) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::PlayCard { player_id, card })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code.clone()))
    }

    /// Reports that a player's socket dropped.
    pub async fn disconnect(
        &self,
        player_id: PlayerId,
    ) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Disconnect { player_id })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code.clone()))
    }

    /// Requests room metadata.
    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Info { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code.clone()))
    }

    /// Tells the room to shut down.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code.clone()))
    }

    /// Whether the actor behind this handle has stopped (shut down or
    /// finished its match). The registry prunes closed handles.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Spawns a room actor task and returns a handle to it.
pub fn spawn_room<S: Store>(
    room_code: RoomCode,
    broadcaster: Broadcaster<S>,
    config: MatchConfig,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);

    let actor = RoomActor {
        room_code: room_code.clone(),
        config,
        players: Vec::new(),
        game: None,
        finished: false,
        broadcaster,
        receiver: rx,
    };
    tokio::spawn(actor.run());

    RoomHandle {
        room_code,
        sender: tx,
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct RoomActor<S: Store> {
    room_code: RoomCode,
    config: MatchConfig,
    /// Seated players, in join order (the match keeps its own,
    /// hakem-rotated order once it starts).
    players: Vec<PlayerId>,
    game: Option<MatchState>,
    /// Set when the match reaches game over; the actor stops afterwards.
    finished: bool,
    broadcaster: Broadcaster<S>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl<S: Store> RoomActor<S> {
    async fn run(mut self) {
        tracing::info!(room_code = %self.room_code, "room actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Join {
                    player_id,
                    username,
                    reply,
                } => {
                    let result = self.handle_join(player_id, username);
                    let started =
                        matches!(&result, Ok(info) if info.players.len() == PLAYER_COUNT);
                    let _ = reply.send(result);
                    if started {
                        self.start_match().await;
                    }
                }
                RoomCommand::Reconnect {
                    player_id,
                    recovered,
                    reply,
                } => {
                    let result = self.check_reconnect(&player_id);
                    let ok = result.is_ok();
                    let _ = reply.send(result);
                    if ok {
                        self.complete_reconnect(player_id, recovered).await;
                    }
                }
                RoomCommand::HokmSelected { player_id, suit } => {
                    self.handle_hokm_selected(player_id, suit).await;
                }
                RoomCommand::PlayCard { player_id, card } => {
                    self.handle_play_card(player_id, card).await;
                }
                RoomCommand::Disconnect { player_id } => {
                    self.handle_disconnect(player_id).await;
                }
                RoomCommand::Info { reply } => {
                    let _ = reply.send(RoomInfo {
                        room_code: self.room_code.clone(),
                        players: self.players.clone(),
                        phase: self.game.as_ref().map(MatchState::phase),
                    });
                }
                RoomCommand::Shutdown => {
                    tracing::info!(
                        room_code = %self.room_code,
                        "room shutting down"
                    );
                    break;
                }
            }

            // A finished match has nothing left to process; stopping
            // closes the command channel so the registry can reclaim
            // the room.
            if self.finished {
                break;
            }
        }

        tracing::info!(room_code = %self.room_code, "room actor stopped");
    }

    // -- Joining ------------------------------------------------------------

    fn handle_join(
        &mut self,
        player_id: PlayerId,
        username: String,
    ) -> Result<JoinInfo, RoomError> {
        if self.players.contains(&player_id) {
            return Err(RoomError::AlreadyInRoom(player_id));
        }
        if self.players.len() >= PLAYER_COUNT {
            return Err(RoomError::Full(self.room_code.clone()));
        }

        self.players.push(player_id.clone());
        tracing::info!(
            room_code = %self.room_code,
            %player_id,
            username,
            seated = self.players.len(),
            "player joined"
        );

        Ok(JoinInfo {
            room_code: self.room_code.clone(),
            players: self.players.clone(),
        })
    }

    /// Runs the pre-gameplay sequence once the fourth seat fills:
    /// team/hakem draw, initial deal, trump request.
    async fn start_match(&mut self) {
        let mut state = match MatchState::new(
            self.players.clone(),
            self.config,
        ) {
            Ok(state) => state,
            Err(error) => {
                tracing::error!(
                    room_code = %self.room_code,
                    %error,
                    "match construction failed"
                );
                return;
            }
        };

        // ThreadRng is !Send, so keep it out of scope across awaits.
        let assigned = {
            let mut rng = rand::rng();
            state.assign_teams_and_hakem(&mut rng)
        };
        if let Err(error) = assigned {
            tracing::error!(room_code = %self.room_code, %error, "team draw failed");
            return;
        }

        let hakem = match state.hakem() {
            Some(hakem) => hakem.clone(),
            None => return,
        };

        // Persisted truth must never lag what clients observe: snapshots
        // land in the store before any delivery.
        self.broadcaster.sync(&state).await;
        self.broadcaster
            .broadcast(
                state.players(),
                ServerMessage::TeamAssignment {
                    teams: state.roster(),
                    hakem,
                    players: state.players().to_vec(),
                },
            )
            .await;

        self.game = Some(state);
        self.begin_hand().await;
    }

    /// Deals the first 5 cards and asks the hakem for trump. Used both
    /// for the first hand and for every following one.
    async fn begin_hand(&mut self) {
        let Some(state) = self.game.as_mut() else {
            return;
        };

        let dealt = {
            let mut rng = rand::rng();
            state.initial_deal(&mut rng)
        };
        if let Err(error) = dealt {
            tracing::error!(room_code = %self.room_code, %error, "initial deal failed");
            return;
        }

        // Persist before delivery.
        let state = &*state;
        self.broadcaster.sync(state).await;

        self.broadcaster
            .broadcast(
                state.players(),
                ServerMessage::PhaseChange {
                    phase: MatchPhase::InitialDeal,
                },
            )
            .await;
        for player in state.players() {
            let hand = PlayerView::project(state, player).hand;
            self.broadcaster
                .send(player, ServerMessage::InitialDeal { hand })
                .await;
        }
        self.broadcaster
            .broadcast(
                state.players(),
                ServerMessage::PhaseChange {
                    phase: MatchPhase::HokmSelection,
                },
            )
            .await;
        if let Some(hakem) = state.hakem() {
            self.broadcaster
                .send(hakem, ServerMessage::HokmRequest)
                .await;
        }
    }

    // -- Trump selection ----------------------------------------------------

    async fn handle_hokm_selected(
        &mut self,
        player_id: PlayerId,
        suit: Suit,
    ) {
        let Some(state) = self.game.as_mut() else {
            self.reject(&player_id, "no active game").await;
            return;
        };

        if let Err(error) = state.set_hokm(&player_id, suit) {
            let message = error.to_string();
            self.reject(&player_id, &message).await;
            return;
        }

        let hakem = match state.hakem() {
            Some(hakem) => hakem.clone(),
            None => return,
        };
        tracing::info!(
            room_code = %self.room_code,
            hakem = %hakem,
            trump = %suit,
            "hokm selected"
        );

        if let Err(error) = state.final_deal() {
            tracing::error!(room_code = %self.room_code, %error, "final deal failed");
            return;
        }

        // Persist before delivery.
        let state = &*state;
        self.broadcaster.sync(state).await;

        self.broadcaster
            .broadcast(
                state.players(),
                ServerMessage::HokmSelected { suit, hakem },
            )
            .await;
        for player in state.players() {
            let hand = PlayerView::project(state, player).hand;
            self.broadcaster
                .send(player, ServerMessage::FinalDeal { hand })
                .await;
        }
        self.broadcaster
            .broadcast(
                state.players(),
                ServerMessage::PhaseChange {
                    phase: MatchPhase::Gameplay,
                },
            )
            .await;
        if let Some(current) = state.current_player() {
            self.broadcaster
                .broadcast(
                    state.players(),
                    ServerMessage::TurnStart {
                        player_id: current.clone(),
                    },
                )
                .await;
        }
    }

    // -- Card play ----------------------------------------------------------

    async fn handle_play_card(&mut self, player_id: PlayerId, card: Card) {
        let Some(state) = self.game.as_mut() else {
            self.reject(&player_id, "no active game").await;
            return;
        };

        let outcome = match state.play_card(&player_id, card) {
            Ok(outcome) => outcome,
            Err(error) => {
                if error.is_fatal() {
                    tracing::error!(
                        room_code = %self.room_code,
                        %error,
                        "game invariant violated"
                    );
                } else {
                    let message = error.to_string();
                    self.reject(&player_id, &message).await;
                }
                return;
            }
        };

        // Persist before delivery.
        let state = &*state;
        self.broadcaster.sync(state).await;

        let players = state.players().to_vec();
        self.broadcaster
            .broadcast(
                &players,
                ServerMessage::CardPlayed {
                    player_id: outcome.player.clone(),
                    card: outcome.card,
                    led_suit: outcome.led_suit,
                },
            )
            .await;

        let Some(resolution) = outcome.resolution else {
            if let Some(current) = state.current_player() {
                self.broadcaster
                    .broadcast(
                        &players,
                        ServerMessage::TurnStart {
                            player_id: current.clone(),
                        },
                    )
                    .await;
            }
            return;
        };

        self.broadcaster
            .broadcast(
                &players,
                ServerMessage::TrickResult {
                    winner: resolution.winner.clone(),
                    winning_card: resolution.winning_card,
                    winning_team: resolution.winning_team,
                    team_tricks: resolution.team_tricks,
                },
            )
            .await;

        let Some(hand_result) = resolution.hand else {
            // Trick decided mid-hand: the winner leads the next one.
            self.broadcaster
                .broadcast(
                    &players,
                    ServerMessage::TurnStart {
                        player_id: resolution.winner.clone(),
                    },
                )
                .await;
            return;
        };

        self.broadcaster
            .broadcast(
                &players,
                ServerMessage::HandComplete {
                    winning_team: hand_result.winning_team,
                    final_tricks: hand_result.final_tricks,
                    round_scores: hand_result.round_scores,
                    next_hakem: hand_result.next_hakem.clone(),
                },
            )
            .await;

        self.broadcaster
            .broadcast(
                &players,
                ServerMessage::RoundResult {
                    winning_team: hand_result.winning_team,
                    round_scores: hand_result.round_scores,
                },
            )
            .await;

        if hand_result.game_over {
            tracing::info!(
                room_code = %self.room_code,
                winning_team = %hand_result.winning_team,
                "game over"
            );
            self.broadcaster
                .broadcast(
                    &players,
                    ServerMessage::GameOver {
                        winning_team: hand_result.winning_team,
                        round_scores: hand_result.round_scores,
                    },
                )
                .await;
            self.finished = true;
        } else {
            // The engine already staged the next hand.
            self.begin_hand().await;
        }
    }

    // -- Presence -----------------------------------------------------------

    fn check_reconnect(&self, player_id: &PlayerId) -> Result<(), RoomError> {
        if !self.players.contains(player_id) || self.game.is_none() {
            return Err(RoomError::NoActiveGame(self.room_code.clone()));
        }
        Ok(())
    }

    async fn complete_reconnect(
        &mut self,
        player_id: PlayerId,
        recovered: bool,
    ) {
        let Some(state) = self.game.as_ref() else {
            return;
        };

        self.broadcaster
            .send(
                &player_id,
                ServerMessage::ReconnectSuccess {
                    player_id: player_id.clone(),
                    room_code: self.room_code.clone(),
                    recovered,
                },
            )
            .await;
        self.broadcaster.send_snapshot(state, &player_id).await;

        // A hakem who dropped before choosing trump gets prompted again.
        if state.phase() == MatchPhase::HokmSelection
            && state.hakem() == Some(&player_id)
        {
            self.broadcaster
                .send(&player_id, ServerMessage::HokmRequest)
                .await;
        }

        self.broadcaster
            .broadcast_except(
                state.players(),
                &player_id,
                ServerMessage::PlayerReconnected {
                    player_id: player_id.clone(),
                },
            )
            .await;

        tracing::info!(
            room_code = %self.room_code,
            %player_id,
            recovered,
            "player reconnected"
        );
    }

    async fn handle_disconnect(&mut self, player_id: PlayerId) {
        if !self.players.contains(&player_id) {
            return;
        }

        let connected =
            self.broadcaster.connected_count(&self.players).await;
        tracing::info!(
            room_code = %self.room_code,
            %player_id,
            connected,
            "player disconnected"
        );
        let players = self.players.clone();
        self.broadcaster
            .broadcast_except(
                &players,
                &player_id,
                ServerMessage::PlayerDisconnected {
                    player_id: player_id.clone(),
                    connected_players: connected,
                },
            )
            .await;
    }

    /// Sends a game-rule rejection to the offending player only.
    async fn reject(&self, player_id: &PlayerId, message: &str) {
        tracing::debug!(
            room_code = %self.room_code,
            %player_id,
            message,
            "action rejected"
        );
        self.broadcaster
            .send(
                player_id,
                ServerMessage::Error {
                    code: ErrorCode::InvalidAction,
                    message: message.to_owned(),
                },
            )
            .await;
    }
}
