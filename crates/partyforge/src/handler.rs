//! Per-connection handler: handshake, auth, and message routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive Handshake → validate version
//!   2. Authenticate token → get PlayerId
//!   3. Send HandshakeAck → player is connected
//!   4. Spawn an outbound forwarder that drains the player's room channel
//!   5. Loop: receive envelopes → dispatch system or game messages

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use partyforge_protocol::{
    Channel, Codec, Envelope, Payload, PlayerId, RoomCode, RoomListEntry,
    SystemMessage,
};
use partyforge_room::{GameLogic, PlayerSender, RoomError, RoomOutbound};
use partyforge_session::Authenticator;
use partyforge_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::server::{ServerState, PROTOCOL_VERSION};
use crate::PartyForgeError;

/// Drop guard that disconnects a player's session when the handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async lock.
struct SessionGuard<G: GameLogic, A: Authenticator, C: Codec> {
    player_id: PlayerId,
    state: Arc<ServerState<G, A, C>>,
}

impl<G: GameLogic, A: Authenticator, C: Codec> Drop
    for SessionGuard<G, A, C>
{
    fn drop(&mut self) {
        let player_id = self.player_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let mut sessions = state.sessions.lock().await;
            let _ = sessions.disconnect(player_id);
            state.rooms.lock().await.mark_disconnected(player_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<G, A, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<G, A, C>>,
) -> Result<(), PartyForgeError>
where
    G: GameLogic,
    A: Authenticator,
    C: Codec,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    // --- Step 1: Handshake ---
    let player_id = perform_handshake(&conn, &state).await?;

    tracing::info!(%conn_id, %player_id, "player authenticated");

    // Create session and guard atomically — if session creation fails,
    // no guard is needed. If it succeeds, the guard is immediately active.
    {
        let mut sessions = state.sessions.lock().await;
        sessions.create(player_id).map_err(PartyForgeError::Session)?;
    }
    let _guard = SessionGuard {
        player_id,
        state: Arc::clone(&state),
    };

    // --- Step 2: Outbound forwarder ---
    //
    // A player can be seated in a room at any point after the handshake.
    // The room actor delivers broadcasts and state snapshots through this
    // channel rather than reaching into the connection directly — the
    // handler owns the wire, the room owns the simulation.
    let (room_tx, mut room_rx): (PlayerSender<G>, _) =
        mpsc::unbounded_channel();

    let seq = Arc::new(AtomicU64::new(1));
    let forward_conn = Arc::clone(&conn);
    let forward_state = Arc::clone(&state);
    let forward_seq = Arc::clone(&seq);
    let forward_start = Instant::now();
    let forwarder = tokio::spawn(async move {
        while let Some(outbound) = room_rx.recv().await {
            let payload = match encode_outbound(&forward_state.codec, outbound)
            {
                Some(payload) => payload,
                None => continue,
            };
            let envelope = Envelope {
                seq: forward_seq.fetch_add(1, Ordering::Relaxed),
                timestamp: forward_start.elapsed().as_millis() as u64,
                channel: Channel::ReliableOrdered,
                payload,
            };
            let bytes = match forward_state.codec.encode(&envelope) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::debug!(error = %e, "failed to encode outbound envelope");
                    continue;
                }
            };
            if forward_conn.send(&bytes).await.is_err() {
                break;
            }
        }
    });

    // --- Step 3: Message loop ---
    let start = Instant::now();

    loop {
        let data = match tokio::time::timeout(
            Duration::from_secs(15),
            conn.recv(),
        )
        .await
        {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%player_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%player_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%player_id, "connection timed out");
                break;
            }
        };

        let envelope: Envelope = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(
                    %player_id, error = %e, "failed to decode envelope"
                );
                continue;
            }
        };

        match envelope.payload {
            Payload::System(sys_msg) => {
                let should_close = handle_system_message(
                    &conn, &state, player_id, sys_msg, &room_tx, &seq, &start,
                )
                .await?;
                if should_close {
                    break;
                }
            }
            Payload::Game(game_data) => {
                handle_game_message::<G, A, C>(
                    &conn, &state, player_id, game_data, &seq, &start,
                )
                .await?;
            }
            Payload::Binary(_) => {
                // No framework-level message is defined client→server on
                // the binary channel (spec §9 uses it only for the Paint
                // grid, server→client).
                tracing::debug!(
                    %player_id, "ignoring unexpected inbound binary payload"
                );
            }
        }
    }

    forwarder.abort();

    // _guard drops here → session disconnect fires.
    Ok(())
}

/// Encodes a room actor's outbound message into a wire [`Payload`].
/// Returns `None` if encoding fails (logged, message dropped).
fn encode_outbound<G: GameLogic>(
    codec: &impl Codec,
    outbound: RoomOutbound<G>,
) -> Option<Payload> {
    match outbound {
        RoomOutbound::System(sys) => Some(Payload::System(sys)),
        RoomOutbound::State(state) => match codec.encode(&state) {
            Ok(bytes) => Some(Payload::Game(bytes)),
            Err(e) => {
                tracing::debug!(error = %e, "failed to encode state snapshot");
                None
            }
        },
        RoomOutbound::Message(msg) => match codec.encode(&msg) {
            Ok(bytes) => Some(Payload::Game(bytes)),
            Err(e) => {
                tracing::debug!(error = %e, "failed to encode server message");
                None
            }
        },
        RoomOutbound::Binary(bytes) => Some(Payload::Binary(bytes)),
    }
}

/// Performs the initial handshake: receive Handshake, validate, auth, send Ack.
async fn perform_handshake<G, A, C>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<G, A, C>>,
) -> Result<PlayerId, PartyForgeError>
where
    G: GameLogic,
    A: Authenticator,
    C: Codec,
{
    let start = Instant::now();

    let data = match tokio::time::timeout(
        Duration::from_secs(5),
        conn.recv(),
    )
    .await
    {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(PartyForgeError::Protocol(
                partyforge_protocol::ProtocolError::InvalidMessage(
                    "connection closed before handshake".into(),
                ),
            ));
        }
        Ok(Err(e)) => return Err(PartyForgeError::Transport(e)),
        Err(_) => {
            return Err(PartyForgeError::Protocol(
                partyforge_protocol::ProtocolError::InvalidMessage(
                    "handshake timed out".into(),
                ),
            ));
        }
    };

    let envelope: Envelope = state.codec.decode(&data)?;

    let (version, token) = match envelope.payload {
        Payload::System(SystemMessage::Handshake { version, token }) => {
            (version, token)
        }
        _ => {
            send_error(conn, &state.codec, 400, "expected Handshake", 0, &start)
                .await?;
            return Err(PartyForgeError::Protocol(
                partyforge_protocol::ProtocolError::InvalidMessage(
                    "first message must be Handshake".into(),
                ),
            ));
        }
    };

    if version != PROTOCOL_VERSION {
        send_error(
            conn,
            &state.codec,
            400,
            &format!(
                "version mismatch: expected {PROTOCOL_VERSION}, got {version}"
            ),
            0,
            &start,
        )
        .await?;
        return Err(PartyForgeError::Protocol(
            partyforge_protocol::ProtocolError::InvalidMessage(
                "protocol version mismatch".into(),
            ),
        ));
    }

    let token_str = token.as_deref().unwrap_or("");
    let player_id = match state.auth.authenticate(token_str).await {
        Ok(pid) => pid,
        Err(e) => {
            send_error(conn, &state.codec, 401, "unauthorized", 0, &start)
                .await?;
            return Err(PartyForgeError::Session(e));
        }
    };

    let ack = Envelope {
        seq: 0,
        timestamp: start.elapsed().as_millis() as u64,
        channel: Channel::ReliableOrdered,
        payload: Payload::System(SystemMessage::HandshakeAck {
            player_id,
            server_time: start.elapsed().as_millis() as u64,
        }),
    };
    let ack_bytes = state.codec.encode(&ack)?;
    conn.send(&ack_bytes).await.map_err(PartyForgeError::Transport)?;

    Ok(player_id)
}

/// Handles a system message. Returns `true` if the connection should close.
#[allow(clippy::too_many_arguments)]
async fn handle_system_message<G, A, C>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<G, A, C>>,
    player_id: PlayerId,
    msg: SystemMessage,
    room_tx: &PlayerSender<G>,
    seq: &AtomicU64,
    start: &Instant,
) -> Result<bool, PartyForgeError>
where
    G: GameLogic,
    A: Authenticator,
    C: Codec,
{
    match msg {
        SystemMessage::Heartbeat { client_time } => {
            let ack = Envelope {
                seq: next_seq(seq),
                timestamp: start.elapsed().as_millis() as u64,
                channel: Channel::ReliableOrdered,
                payload: Payload::System(SystemMessage::HeartbeatAck {
                    client_time,
                    server_time: start.elapsed().as_millis() as u64,
                }),
            };
            let bytes = state.codec.encode(&ack)?;
            conn.send(&bytes).await.map_err(PartyForgeError::Transport)?;
        }

        SystemMessage::CreateRoom {
            mode_tag,
            display_name,
            rounds,
        } => {
            let (game_config, room_config) = G::config_for_tag(mode_tag);
            let tournament_rounds = rounds.unwrap_or(1).max(1);

            let code = {
                let mut rooms = state.rooms.lock().await;
                rooms.create_room(
                    mode_tag,
                    room_config,
                    game_config,
                    tournament_rounds,
                )
            };

            let join_result = {
                let mut rooms = state.rooms.lock().await;
                rooms
                    .join_room(player_id, code, display_name, room_tx.clone())
                    .await
            };

            match join_result {
                Ok(info) => {
                    let resp = Envelope {
                        seq: next_seq(seq),
                        timestamp: start.elapsed().as_millis() as u64,
                        channel: Channel::ReliableOrdered,
                        payload: Payload::System(SystemMessage::RoomCreated {
                            room_code: code,
                            player_id: info.player.id,
                            color: info.player.color,
                            number: info.player.number,
                        }),
                    };
                    let bytes = state.codec.encode(&resp)?;
                    conn.send(&bytes)
                        .await
                        .map_err(PartyForgeError::Transport)?;
                }
                Err(e) => {
                    send_error(
                        conn,
                        &state.codec,
                        room_error_code(&e),
                        &e.to_string(),
                        next_seq(seq),
                        start,
                    )
                    .await?;
                }
            }
        }

        SystemMessage::JoinRoomByCode { code, display_name } => {
            match RoomCode::parse(&code) {
                Some(parsed) => {
                    let join_result = {
                        let mut rooms = state.rooms.lock().await;
                        rooms
                            .join_room(
                                player_id,
                                parsed,
                                display_name,
                                room_tx.clone(),
                            )
                            .await
                    };

                    match join_result {
                        Ok(info) => {
                            let resp = Envelope {
                                seq: next_seq(seq),
                                timestamp: start.elapsed().as_millis() as u64,
                                channel: Channel::ReliableOrdered,
                                payload: Payload::System(
                                    SystemMessage::RoomJoined {
                                        player: info.player,
                                        room_code: parsed,
                                        mode_tag: info.mode_tag,
                                        players: info.players,
                                    },
                                ),
                            };
                            let bytes = state.codec.encode(&resp)?;
                            conn.send(&bytes)
                                .await
                                .map_err(PartyForgeError::Transport)?;
                        }
                        Err(e) => {
                            send_error(
                                conn,
                                &state.codec,
                                room_error_code(&e),
                                &e.to_string(),
                                next_seq(seq),
                                start,
                            )
                            .await?;
                        }
                    }
                }
                None => {
                    send_error(
                        conn,
                        &state.codec,
                        400,
                        "invalid room code",
                        next_seq(seq),
                        start,
                    )
                    .await?;
                }
            }
        }

        SystemMessage::ListRooms => {
            let infos = state.rooms.lock().await.list_rooms().await;
            let entries = infos
                .into_iter()
                .map(|info| RoomListEntry {
                    room_code: info.room_code,
                    player_count: info.player_count,
                    max_players: info.max_players,
                    mode_tag: info.mode_tag,
                })
                .collect();

            let resp = Envelope {
                seq: next_seq(seq),
                timestamp: start.elapsed().as_millis() as u64,
                channel: Channel::ReliableOrdered,
                payload: Payload::System(SystemMessage::RoomList {
                    rooms: entries,
                }),
            };
            let bytes = state.codec.encode(&resp)?;
            conn.send(&bytes)
                .await
                .map_err(PartyForgeError::Transport)?;
        }

        SystemMessage::PlayerReady { ready } => {
            let result = state.rooms.lock().await.set_ready(player_id, ready).await;
            if let Err(e) = result {
                send_error(
                    conn,
                    &state.codec,
                    room_error_code(&e),
                    &e.to_string(),
                    next_seq(seq),
                    start,
                )
                .await?;
            }
        }

        SystemMessage::SelectCharacter {
            character_id,
            character_name,
        } => {
            let result = state
                .rooms
                .lock()
                .await
                .select_character(player_id, character_id, character_name)
                .await;
            if let Err(e) = result {
                send_error(
                    conn,
                    &state.codec,
                    room_error_code(&e),
                    &e.to_string(),
                    next_seq(seq),
                    start,
                )
                .await?;
            }
        }

        SystemMessage::StartGame => {
            let result = state.rooms.lock().await.start_game(player_id).await;
            if let Err(e) = result {
                send_error(
                    conn,
                    &state.codec,
                    room_error_code(&e),
                    &e.to_string(),
                    next_seq(seq),
                    start,
                )
                .await?;
            }
        }

        SystemMessage::LeaveRoom => {
            let mut rooms = state.rooms.lock().await;
            if let Err(e) = rooms.leave_room(player_id).await {
                tracing::debug!(
                    %player_id, error = %e, "leave room failed"
                );
            }
        }

        SystemMessage::Disconnect { reason } => {
            tracing::info!(%player_id, %reason, "client disconnected");
            return Ok(true);
        }

        _ => {
            tracing::debug!(
                %player_id, "ignoring unexpected system message"
            );
        }
    }

    Ok(false)
}

/// Handles a game message: decode, route to the player's room.
async fn handle_game_message<G, A, C>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<G, A, C>>,
    player_id: PlayerId,
    game_data: Vec<u8>,
    seq: &AtomicU64,
    start: &Instant,
) -> Result<(), PartyForgeError>
where
    G: GameLogic,
    A: Authenticator,
    C: Codec,
{
    let client_msg: G::ClientMessage = match state.codec.decode(&game_data)
    {
        Ok(msg) => msg,
        Err(e) => {
            send_error(
                conn,
                &state.codec,
                400,
                &format!("invalid game message: {e}"),
                next_seq(seq),
                start,
            )
            .await?;
            return Ok(());
        }
    };

    let result = state
        .rooms
        .lock()
        .await
        .route_message(player_id, client_msg)
        .await;

    if let Err(e) = result {
        send_error(
            conn,
            &state.codec,
            room_error_code(&e),
            &e.to_string(),
            next_seq(seq),
            start,
        )
        .await?;
    }

    Ok(())
}

/// Sends a SystemMessage::Error envelope to the client.
async fn send_error(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    code: u16,
    message: &str,
    seq: u64,
    start: &Instant,
) -> Result<(), PartyForgeError> {
    let envelope = Envelope {
        seq,
        timestamp: start.elapsed().as_millis() as u64,
        channel: Channel::ReliableOrdered,
        payload: Payload::System(SystemMessage::Error {
            code,
            message: message.to_string(),
        }),
    };
    let bytes = codec.encode(&envelope)?;
    conn.send(&bytes).await.map_err(PartyForgeError::Transport)?;
    Ok(())
}

/// Maps a [`RoomError`] to an HTTP-style status code for the wire `Error`
/// reply (spec §7's Policy-kind errors).
fn room_error_code(err: &RoomError) -> u16 {
    match err {
        RoomError::NotFound(_) => 404,
        RoomError::RoomFull(_) => 409,
        RoomError::RoomInGame(_) => 409,
        RoomError::CharacterTaken => 409,
        RoomError::NotHost => 403,
        RoomError::NoReadyPlayers => 409,
        RoomError::NotEnoughPlayers(_) => 409,
        RoomError::AlreadyInRoom(_, _) => 409,
        RoomError::NotInRoom(_, _) => 409,
        RoomError::InvalidState(_) => 400,
        RoomError::Unavailable(_) => 503,
    }
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &AtomicU64) -> u64 {
    seq.fetch_add(1, Ordering::Relaxed)
}
