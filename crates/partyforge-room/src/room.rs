//! Room actor: an isolated Tokio task that owns one room's lobby state,
//! mode simulation, and tournament wrapping.
//!
//! Each room runs in its own task, communicating with the outside world
//! through an mpsc channel — the "actor model": no shared mutable game
//! state, just message passing. This is also what gives the server
//! testable property 3 (at-most-one simulation per room) for free: a
//! room's tick, its message handling, and its snapshot broadcast all run
//! on the same task, one command/tick at a time.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use partyforge_protocol::{
    ModeTag, ParticipantView, PlayerId, Recipient, RoomCode, RoomId,
    SystemMessage,
};
use partyforge_tick::{TickConfig, TickPolicy, TickScheduler};
use partyforge_tournament::{RoundResult, TournamentConfig, TournamentState};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant as TokioInstant;

use crate::participant::{Participant, Role};
use crate::{GameLogic, RoomConfig, RoomError, RoomState};

// ---------------------------------------------------------------------------
// Outbound messages
// ---------------------------------------------------------------------------

/// An outbound message from the room actor to a participant's connection
/// handler. The handler forwards these to the wire, choosing the
/// encoding that matches the variant.
pub enum RoomOutbound<G: GameLogic> {
    /// A framework-level message (lobby/tournament broadcasts).
    System(SystemMessage),
    /// A full state snapshot, sent to a participant on join/reconnect.
    State(G::State),
    /// A mode-level server message.
    Message(G::ServerMessage),
    /// A raw binary frame (the Paint grid; spec §9).
    Binary(Vec<u8>),
}

impl<G: GameLogic> Clone for RoomOutbound<G> {
    fn clone(&self) -> Self {
        match self {
            Self::System(s) => Self::System(s.clone()),
            Self::State(s) => Self::State(s.clone()),
            Self::Message(m) => Self::Message(m.clone()),
            Self::Binary(b) => Self::Binary(b.clone()),
        }
    }
}

/// Channel sender for delivering outbound messages to a participant.
pub type PlayerSender<G> = mpsc::UnboundedSender<RoomOutbound<G>>;

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand<G: GameLogic> {
    Join {
        player_id: PlayerId,
        display_name: String,
        sender: PlayerSender<G>,
        reply: oneshot::Sender<Result<JoinedInfo, RoomError>>,
    },
    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    /// The participant's transport connection dropped; start the grace
    /// window without removing their seat (spec §5, §4.4.7).
    MarkDisconnected {
        player_id: PlayerId,
    },
    /// The participant reconnected within the grace window.
    MarkReconnected {
        player_id: PlayerId,
        sender: PlayerSender<G>,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    SetReady {
        player_id: PlayerId,
        ready: bool,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    SelectCharacter {
        player_id: PlayerId,
        character_id: String,
        character_name: String,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    StartGame {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    /// A mode-specific action or input.
    GameMessage {
        sender: PlayerId,
        msg: G::ClientMessage,
        is_state_input: bool,
    },
    GetState {
        reply: oneshot::Sender<RoomInfo>,
    },
    Shutdown,
}

/// What a successful join returns — enough to build the `room-joined`
/// reply (spec §6).
#[derive(Debug, Clone)]
pub struct JoinedInfo {
    pub player: ParticipantView,
    pub mode_tag: ModeTag,
    pub players: Vec<ParticipantView>,
}

/// A snapshot of room metadata (not the game state itself).
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub room_code: RoomCode,
    pub mode_tag: ModeTag,
    pub state: RoomState,
    pub player_count: usize,
    pub max_players: usize,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a running room actor. Cheap to clone (wraps an `mpsc::Sender`).
#[derive(Clone)]
pub struct RoomHandle<G: GameLogic> {
    room_id: RoomId,
    room_code: RoomCode,
    sender: mpsc::Sender<RoomCommand<G>>,
}

impl<G: GameLogic> RoomHandle<G> {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn room_code(&self) -> RoomCode {
        self.room_code
    }

    pub async fn join(
        &self,
        player_id: PlayerId,
        display_name: String,
        sender: PlayerSender<G>,
    ) -> Result<JoinedInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Join {
                player_id,
                display_name,
                sender,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code))?
    }

    pub async fn leave(&self, player_id: PlayerId) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Leave {
                player_id,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code))?
    }

    /// Fire-and-forget: the transport noticed this participant's
    /// connection dropped.
    pub async fn mark_disconnected(&self, player_id: PlayerId) {
        let _ = self
            .sender
            .send(RoomCommand::MarkDisconnected { player_id })
            .await;
    }

    pub async fn mark_reconnected(
        &self,
        player_id: PlayerId,
        sender: PlayerSender<G>,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::MarkReconnected {
                player_id,
                sender,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code))?
    }

    pub async fn set_ready(
        &self,
        player_id: PlayerId,
        ready: bool,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::SetReady {
                player_id,
                ready,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code))?
    }

    pub async fn select_character(
        &self,
        player_id: PlayerId,
        character_id: String,
        character_name: String,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::SelectCharacter {
                player_id,
                character_id,
                character_name,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code))?
    }

    pub async fn start_game(
        &self,
        player_id: PlayerId,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::StartGame {
                player_id,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code))?
    }

    /// Sends a mode message. State-input messages (e.g. `player-input`)
    /// are dropped rather than queued when the room is backed up — see
    /// spec §4.3 backpressure contract.
    pub async fn send_message(
        &self,
        sender: PlayerId,
        msg: G::ClientMessage,
    ) -> Result<(), RoomError> {
        let is_state_input = G::is_state_input(&msg);
        let cmd = RoomCommand::GameMessage {
            sender,
            msg,
            is_state_input,
        };
        if is_state_input {
            // Coalescable: drop silently on backpressure instead of
            // blocking the caller or growing an unbounded queue.
            match self.sender.try_send(cmd) {
                Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => Ok(()),
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    Err(RoomError::Unavailable(self.room_code))
                }
            }
        } else {
            self.sender
                .send(cmd)
                .await
                .map_err(|_| RoomError::Unavailable(self.room_code))
        }
    }

    pub async fn get_info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::GetState { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code))
    }

    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_code))
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor<G: GameLogic> {
    room_id: RoomId,
    room_code: RoomCode,
    mode_tag: ModeTag,
    state: RoomState,
    config: RoomConfig,
    participants: Vec<Participant>,
    senders: HashMap<PlayerId, PlayerSender<G>>,
    disconnect_deadlines: HashMap<PlayerId, Instant>,
    game_state: Option<G::State>,
    game_config: G::Config,
    scheduler: TickScheduler,
    tournament: TournamentState,
    round_transition_at: Option<TokioInstant>,
    last_activity: Instant,
    receiver: mpsc::Receiver<RoomCommand<G>>,
}

impl<G: GameLogic> RoomActor<G> {
    async fn run(mut self) {
        tracing::info!(room = %self.room_code, "room actor started");

        let mut idle_check = tokio::time::interval(Duration::from_secs(30));
        idle_check.tick().await; // consume the immediate first tick

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    match cmd {
                        Some(cmd) => {
                            if self.handle_command(cmd) {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                tick_info = self.scheduler.wait_for_tick() => {
                    self.handle_tick(tick_info.tick, tick_info.dt);
                    self.scheduler.record_tick_end();
                }
                _ = idle_check.tick() => {
                    self.check_idle_and_grace();
                }
            }

            if self.round_transition_due() {
                self.start_next_round();
            }

            if self.state.is_terminal() {
                break;
            }
        }

        tracing::info!(room = %self.room_code, "room actor stopped");
    }

    fn round_transition_due(&self) -> bool {
        matches!(self.round_transition_at, Some(at) if TokioInstant::now() >= at)
    }

    /// Returns `true` if the actor loop should exit.
    fn handle_command(&mut self, cmd: RoomCommand<G>) -> bool {
        self.last_activity = Instant::now();
        match cmd {
            RoomCommand::Join {
                player_id,
                display_name,
                sender,
                reply,
            } => {
                let _ = reply.send(self.handle_join(player_id, display_name, sender));
            }
            RoomCommand::Leave { player_id, reply } => {
                let _ = reply.send(self.handle_leave(player_id));
            }
            RoomCommand::MarkDisconnected { player_id } => {
                self.handle_mark_disconnected(player_id);
            }
            RoomCommand::MarkReconnected {
                player_id,
                sender,
                reply,
            } => {
                let _ = reply.send(self.handle_mark_reconnected(player_id, sender));
            }
            RoomCommand::SetReady {
                player_id,
                ready,
                reply,
            } => {
                let _ = reply.send(self.handle_set_ready(player_id, ready));
            }
            RoomCommand::SelectCharacter {
                player_id,
                character_id,
                character_name,
                reply,
            } => {
                let _ = reply.send(self.handle_select_character(
                    player_id,
                    character_id,
                    character_name,
                ));
            }
            RoomCommand::StartGame { player_id, reply } => {
                let _ = reply.send(self.handle_start_game(player_id));
            }
            RoomCommand::GameMessage {
                sender,
                msg,
                is_state_input: _,
            } => {
                self.handle_game_message(sender, msg);
            }
            RoomCommand::GetState { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Shutdown => {
                self.close("server_shutdown".into());
                return true;
            }
        }
        false
    }

    // -- Lobby Manager operations (spec §4.2) --

    fn handle_join(
        &mut self,
        player_id: PlayerId,
        display_name: String,
        sender: PlayerSender<G>,
    ) -> Result<JoinedInfo, RoomError> {
        if !self.state.is_joinable() {
            return Err(RoomError::RoomInGame(self.room_code));
        }
        if self.participants.iter().any(|p| p.id == player_id) {
            return Err(RoomError::AlreadyInRoom(player_id, self.room_code));
        }
        if self.participants.len() >= self.config.max_players {
            return Err(RoomError::RoomFull(self.room_code));
        }

        let number = self.participants.len() as u8 + 1;
        let role = if self.participants.is_empty() {
            Role::Host
        } else {
            Role::Guest
        };
        let participant = Participant::new(player_id, display_name, number, role);
        self.participants.push(participant);
        self.senders.insert(player_id, sender);

        tracing::info!(
            room = %self.room_code,
            %player_id,
            players = self.participants.len(),
            "participant joined"
        );

        Ok(JoinedInfo {
            player: self.participants.last().unwrap().to_view(),
            mode_tag: self.mode_tag,
            players: self.views(),
        })
    }

    fn handle_leave(&mut self, player_id: PlayerId) -> Result<(), RoomError> {
        let Some(pos) = self.participants.iter().position(|p| p.id == player_id)
        else {
            // Idempotent: leaving twice is a no-op, not an error (spec §4.2).
            return Ok(());
        };

        let was_host = matches!(self.participants[pos].role, Role::Host);
        self.participants.remove(pos);
        self.senders.remove(&player_id);
        self.disconnect_deadlines.remove(&player_id);
        // Renumbering is not required by the invariant ("number is stable
        // for the lifetime of the room"); only host reassignment runs.
        if was_host {
            if let Some(new_host) = self
                .participants
                .iter_mut()
                .min_by_key(|p| p.number)
            {
                new_host.role = Role::Host;
            }
        }

        tracing::info!(
            room = %self.room_code,
            %player_id,
            players = self.participants.len(),
            "participant left"
        );

        if self.state.is_active() {
            if let Some(game_state) = &mut self.game_state {
                let msgs = G::on_player_disconnect(game_state, player_id);
                self.dispatch_game(msgs);
            }
        }

        if self.participants.is_empty() {
            self.close("empty_room".into());
        }

        Ok(())
    }

    fn handle_mark_disconnected(&mut self, player_id: PlayerId) {
        let Some(p) = self.participants.iter_mut().find(|p| p.id == player_id)
        else {
            return;
        };
        p.connected = false;
        self.disconnect_deadlines
            .insert(player_id, Instant::now() + self.config.disconnect_grace);

        if self.state.is_active() {
            if let Some(game_state) = &mut self.game_state {
                let msgs = G::on_player_disconnect(game_state, player_id);
                self.dispatch_game(msgs);
            }
        }
    }

    fn handle_mark_reconnected(
        &mut self,
        player_id: PlayerId,
        sender: PlayerSender<G>,
    ) -> Result<(), RoomError> {
        let Some(p) = self.participants.iter_mut().find(|p| p.id == player_id)
        else {
            return Err(RoomError::NotInRoom(player_id, self.room_code));
        };
        p.connected = true;
        self.disconnect_deadlines.remove(&player_id);
        self.senders.insert(player_id, sender.clone());

        if let Some(game_state) = &self.game_state {
            let _ = sender.send(RoomOutbound::State(game_state.clone()));
        }

        if let Some(game_state) = &mut self.game_state {
            let msgs = G::on_player_reconnect(game_state, player_id);
            self.dispatch_game(msgs);
        }
        Ok(())
    }

    fn handle_set_ready(
        &mut self,
        player_id: PlayerId,
        ready: bool,
    ) -> Result<(), RoomError> {
        let Some(p) = self.participants.iter_mut().find(|p| p.id == player_id)
        else {
            return Err(RoomError::NotInRoom(player_id, self.room_code));
        };
        p.ready = ready;
        let views = self.views();
        self.broadcast_system(SystemMessage::PlayerReadyChanged { players: views }, None);
        Ok(())
    }

    fn handle_select_character(
        &mut self,
        player_id: PlayerId,
        character_id: String,
        character_name: String,
    ) -> Result<(), RoomError> {
        if !self.participants.iter().any(|p| p.id == player_id) {
            return Err(RoomError::NotInRoom(player_id, self.room_code));
        }
        let taken = self.participants.iter().any(|p| {
            p.id != player_id && p.character.as_deref() == Some(character_id.as_str())
        });
        if taken {
            return Err(RoomError::CharacterTaken);
        }

        let p = self
            .participants
            .iter_mut()
            .find(|p| p.id == player_id)
            .expect("checked above");
        p.character = Some(character_id.clone());
        p.character_name = Some(character_name.clone());

        let selections = self
            .participants
            .iter()
            .filter_map(|p| {
                p.character.clone().map(|c| {
                    partyforge_protocol::CharacterSelection {
                        player_id: p.id,
                        character: c,
                        player_name: p.display_name.clone(),
                    }
                })
            })
            .collect();
        self.broadcast_system(
            SystemMessage::CharacterSelectionUpdate { selections },
            None,
        );
        Ok(())
    }

    fn handle_start_game(&mut self, player_id: PlayerId) -> Result<(), RoomError> {
        if !self.state.is_joinable() {
            return Err(RoomError::InvalidState(format!(
                "cannot start game in state {}",
                self.state
            )));
        }
        let Some(host) = self.participants.iter().find(|p| p.id == player_id) else {
            return Err(RoomError::NotInRoom(player_id, self.room_code));
        };
        if !matches!(host.role, Role::Host) {
            return Err(RoomError::NotHost);
        }
        if !self.participants.iter().any(|p| p.ready) {
            return Err(RoomError::NoReadyPlayers);
        }
        let ready_count = self.participants.iter().filter(|p| p.ready).count();
        if ready_count < self.config.min_players {
            return Err(RoomError::NotEnoughPlayers(self.config.min_players));
        }

        self.tournament = TournamentState::new(self.tournament.config().clone());
        self.begin_round();

        self.broadcast_system(
            SystemMessage::GameStarted {
                mode_tag: self.mode_tag,
                players: self.views(),
                tournament_rounds: self.tournament.config().total_rounds,
                current_round: self.tournament.current_round(),
            },
            None,
        );
        Ok(())
    }

    // -- Loop Runtime (spec §4.3) --

    fn handle_game_message(&mut self, sender: PlayerId, msg: G::ClientMessage) {
        if !self.participants.iter().any(|p| p.id == sender) {
            return;
        }
        if !self.state.is_active() {
            return;
        }
        let Some(game_state) = &mut self.game_state else {
            return;
        };

        if G::validate_message(game_state, sender, &msg).is_err() {
            return;
        }

        let msgs = G::handle_message(game_state, sender, msg);
        self.dispatch_game(msgs);
        self.after_simulation_step();
    }

    fn handle_tick(&mut self, tick: u64, dt: Duration) {
        if !self.state.is_active() {
            return;
        }
        let Some(game_state) = &mut self.game_state else {
            return;
        };

        let msgs = G::tick(game_state, dt);
        self.dispatch_game(msgs);

        if let Some(bytes) = G::binary_snapshot(game_state) {
            self.broadcast_binary(bytes);
        }

        let _ = tick; // snapshot cadence (SNAPSHOT_EVERY_N_TICKS) is enforced
                      // by the mode itself via its own tick counter, so every
                      // GameLogic::tick() call here always emits what should
                      // go out this tick.

        self.after_simulation_step();
    }

    fn after_simulation_step(&mut self) {
        let Some(game_state) = &self.game_state else {
            return;
        };

        if let Some(reason) = G::aborted(game_state) {
            self.close(reason);
            return;
        }

        if let Some(outcome) = G::round_outcome(game_state) {
            self.end_round(outcome);
        }
    }

    fn end_round(&mut self, outcome: crate::RoundOutcome) {
        self.scheduler.pause();
        // Modes only know participants by id (`GameLogic::init` takes
        // `&[PlayerId]`, not names), so the room resolves the display
        // name from its own participant table rather than relying on the
        // mode to supply one.
        let winner_name = outcome
            .winner_name
            .or_else(|| outcome.winner_id.and_then(|id| self.participant_name(id)));
        let result = RoundResult {
            winner_id: outcome.winner_id,
            winner_name,
        };
        let scores = self.tournament.record_round(result.clone());

        self.broadcast_system(
            SystemMessage::RoundEnded {
                current_round: self.tournament.current_round(),
                round_winner: result.winner_name.clone(),
                round_winner_id: result.winner_id,
                player_scores: scores.clone(),
            },
            None,
        );

        if self.tournament.is_complete() {
            self.state = RoomState::TournamentEnd;
            let champion = self.tournament.champion();
            self.broadcast_system(
                SystemMessage::TournamentEnded {
                    tournament_winner: champion,
                    player_scores: scores,
                },
                None,
            );
            // After the same transition delay used between rounds, return
            // to the lobby for a rematch (spec §4.6: "return room to
            // lobby (or tournament_end)" — we do both, in sequence).
            self.round_transition_at =
                Some(TokioInstant::now() + self.config.round_transition_delay);
        } else {
            self.state = RoomState::RoundEnd;
            self.round_transition_at =
                Some(TokioInstant::now() + self.config.round_transition_delay);
        }
    }

    fn start_next_round(&mut self) {
        let deadline_was_tournament_end = self.state == RoomState::TournamentEnd;
        self.round_transition_at = None;

        if deadline_was_tournament_end {
            for p in &mut self.participants {
                p.ready = false;
            }
            self.state = RoomState::Lobby;
            self.broadcast_system(
                SystemMessage::GameReset {
                    players: self.views(),
                },
                None,
            );
            return;
        }

        self.tournament.advance_round();
        self.begin_round();
        self.broadcast_system(
            SystemMessage::RoundStarting {
                round: self.tournament.current_round(),
            },
            None,
        );
    }

    fn begin_round(&mut self) {
        self.state = RoomState::Playing;
        let players: Vec<PlayerId> = self.participants.iter().map(|p| p.id).collect();
        self.game_state = Some(G::init(&self.game_config, &players));
        self.scheduler.resume();

        if let Some(game_state) = &self.game_state {
            let msg = RoomOutbound::State(game_state.clone());
            for p in &self.participants {
                self.send_to(p.id, msg.clone());
            }
        }
    }

    fn check_idle_and_grace(&mut self) {
        if self.state == RoomState::Lobby
            && self.last_activity.elapsed() >= self.config.idle_close
        {
            self.close("idle_timeout".into());
            return;
        }

        let now = Instant::now();
        let expired: Vec<PlayerId> = self
            .disconnect_deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for player_id in expired {
            let _ = self.handle_leave(player_id);
        }
    }

    fn close(&mut self, reason: String) {
        if self.state.is_terminal() {
            return;
        }
        self.scheduler.pause();
        self.broadcast_system(SystemMessage::RoomClosed { reason }, None);
        self.state = RoomState::Closed;
    }

    // -- Dispatch helpers --

    fn dispatch_game(&self, msgs: Vec<(Recipient, G::ServerMessage)>) {
        for (recipient, msg) in msgs {
            let outbound = RoomOutbound::Message(msg);
            self.dispatch_to(recipient, outbound);
        }
    }

    fn dispatch_to(&self, recipient: Recipient, outbound: RoomOutbound<G>) {
        match recipient {
            Recipient::All => {
                for p in &self.participants {
                    self.send_to(p.id, outbound.clone());
                }
            }
            Recipient::Player(pid) => self.send_to(pid, outbound),
            Recipient::AllExcept(excluded) => {
                for p in &self.participants {
                    if p.id != excluded {
                        self.send_to(p.id, outbound.clone());
                    }
                }
            }
        }
    }

    fn broadcast_system(&self, msg: SystemMessage, except: Option<PlayerId>) {
        for p in &self.participants {
            if Some(p.id) != except {
                self.send_to(p.id, RoomOutbound::System(msg.clone()));
            }
        }
    }

    fn broadcast_binary(&self, bytes: Vec<u8>) {
        for p in &self.participants {
            self.send_to(p.id, RoomOutbound::Binary(bytes.clone()));
        }
    }

    /// Sends an outbound message to a single participant. Silently drops
    /// if the receiver is gone — the Transport, not the Room, owns
    /// disconnect detection (spec §4.1: "it never throws upstream").
    fn send_to(&self, player_id: PlayerId, msg: RoomOutbound<G>) {
        if let Some(sender) = self.senders.get(&player_id) {
            let _ = sender.send(msg);
        }
    }

    fn views(&self) -> Vec<ParticipantView> {
        self.participants.iter().map(Participant::to_view).collect()
    }

    fn participant_name(&self, id: PlayerId) -> Option<String> {
        self.participants
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.display_name.clone())
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.room_id,
            room_code: self.room_code,
            mode_tag: self.mode_tag,
            state: self.state,
            player_count: self.participants.len(),
            max_players: self.config.max_players,
        }
    }
}

/// Spawns a new room actor task and returns a handle to communicate with it.
pub(crate) fn spawn_room<G: GameLogic>(
    room_id: RoomId,
    room_code: RoomCode,
    mode_tag: ModeTag,
    config: RoomConfig,
    game_config: G::Config,
    tournament_rounds: u32,
    channel_size: usize,
) -> RoomHandle<G> {
    let (tx, rx) = mpsc::channel(channel_size);

    let scheduler = TickScheduler::new(TickConfig {
        tick_rate_hz: config.tick_rate,
        policy: TickPolicy::Skip,
        ..TickConfig::default()
    });
    // Ticks are irrelevant until `start-game`; pause immediately so the
    // scheduler doesn't drift while the room sits in `lobby`.
    let mut scheduler = scheduler;
    scheduler.pause();

    let actor = RoomActor::<G> {
        room_id,
        room_code,
        mode_tag,
        state: RoomState::Lobby,
        config,
        participants: Vec::new(),
        senders: HashMap::new(),
        disconnect_deadlines: HashMap::new(),
        game_state: None,
        game_config,
        scheduler,
        tournament: TournamentState::new(TournamentConfig {
            total_rounds: tournament_rounds.max(1),
        }),
        round_transition_at: None,
        last_activity: Instant::now(),
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        room_code,
        sender: tx,
    }
}
