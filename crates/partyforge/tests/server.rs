//! Integration tests for the PartyForge server, handler, and full connection flow.

use std::time::Duration;

use partyforge::prelude::*;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Mock game and authenticator
// =========================================================================

struct EchoGame;

#[derive(Clone, Default, Serialize, Deserialize)]
struct EchoState {
    messages: Vec<String>,
}

#[derive(Clone, Serialize, Deserialize)]
struct EchoMsg {
    text: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
struct EchoReply {
    from: u64,
    text: String,
}

impl GameLogic for EchoGame {
    type Config = ();
    type State = EchoState;
    type ClientMessage = EchoMsg;
    type ServerMessage = EchoReply;

    fn init(_config: &(), _players: &[PlayerId]) -> EchoState {
        EchoState::default()
    }

    fn handle_message(
        state: &mut EchoState,
        sender: PlayerId,
        msg: EchoMsg,
    ) -> Vec<(Recipient, EchoReply)> {
        state.messages.push(msg.text.clone());
        vec![(
            Recipient::All,
            EchoReply {
                from: sender.0,
                text: msg.text,
            },
        )]
    }

    fn room_config() -> RoomConfig {
        RoomConfig {
            min_players: 1,
            max_players: 4,
            ..RoomConfig::default()
        }
    }
}

/// Accepts any numeric token as a PlayerId.
struct TestAuth;

impl Authenticator for TestAuth {
    async fn authenticate(
        &self,
        token: &str,
    ) -> Result<PlayerId, SessionError> {
        let id: u64 = token
            .parse()
            .map_err(|_| SessionError::AuthFailed("not a number".into()))?;
        Ok(PlayerId(id))
    }
}

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port and returns the address.
async fn start_server() -> String {
    let server = PartyForgeServerBuilder::new()
        .bind("127.0.0.1:0")
        .build::<EchoGame>(TestAuth)
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

fn encode_envelope(envelope: &Envelope) -> Message {
    let bytes = serde_json::to_vec(envelope).expect("encode");
    Message::Binary(bytes.into())
}

fn decode_envelope(msg: Message) -> Envelope {
    serde_json::from_slice(&msg.into_data()).expect("decode")
}

fn system(payload: SystemMessage) -> Envelope {
    Envelope {
        seq: 1,
        timestamp: 0,
        channel: Channel::ReliableOrdered,
        payload: Payload::System(payload),
    }
}

/// Sends a handshake and returns the HandshakeAck envelope.
async fn handshake(ws: &mut ClientWs, player_id: u64) -> Envelope {
    let hs = Envelope {
        seq: 0,
        timestamp: 0,
        channel: Channel::ReliableOrdered,
        payload: Payload::System(SystemMessage::Handshake {
            version: PROTOCOL_VERSION,
            token: Some(player_id.to_string()),
        }),
    };
    ws.send(encode_envelope(&hs)).await.expect("send handshake");
    let msg = ws.next().await.unwrap().expect("recv ack");
    decode_envelope(msg)
}

/// Reads envelopes off `ws` until one matches `pred`, or the overall
/// timeout elapses. Broadcasts (ready/character/game-started) and direct
/// replies can interleave, so tests scan rather than assume ordering.
async fn recv_until(
    ws: &mut ClientWs,
    timeout: Duration,
    mut pred: impl FnMut(&SystemMessage) -> bool,
) -> SystemMessage {
    tokio::time::timeout(timeout, async {
        loop {
            let msg = ws.next().await.expect("stream ended").expect("recv");
            let env = decode_envelope(msg);
            if let Payload::System(sys) = env.payload {
                if pred(&sys) {
                    return sys;
                }
            }
        }
    })
    .await
    .expect("timed out waiting for expected message")
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_handshake_success() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    let ack = handshake(&mut ws, 42).await;
    match ack.payload {
        Payload::System(SystemMessage::HandshakeAck {
            player_id,
            ..
        }) => {
            assert_eq!(player_id, PlayerId(42));
        }
        other => panic!("expected HandshakeAck, got {other:?}"),
    }
}

#[tokio::test]
async fn test_handshake_version_mismatch() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    let hs = Envelope {
        seq: 0,
        timestamp: 0,
        channel: Channel::ReliableOrdered,
        payload: Payload::System(SystemMessage::Handshake {
            version: 999,
            token: Some("1".into()),
        }),
    };
    ws.send(encode_envelope(&hs)).await.expect("send");

    let msg = ws.next().await.unwrap().expect("recv");
    let env = decode_envelope(msg);
    match env.payload {
        Payload::System(SystemMessage::Error { code, .. }) => {
            assert_eq!(code, 400);
        }
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_handshake_auth_failure() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    let hs = Envelope {
        seq: 0,
        timestamp: 0,
        channel: Channel::ReliableOrdered,
        payload: Payload::System(SystemMessage::Handshake {
            version: PROTOCOL_VERSION,
            token: Some("not-a-number".into()),
        }),
    };
    ws.send(encode_envelope(&hs)).await.expect("send");

    let msg = ws.next().await.unwrap().expect("recv");
    let env = decode_envelope(msg);
    match env.payload {
        Payload::System(SystemMessage::Error { code, .. }) => {
            assert_eq!(code, 401);
        }
        other => panic!("expected Error 401, got {other:?}"),
    }
}

#[tokio::test]
async fn test_heartbeat_response() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    handshake(&mut ws, 1).await;

    ws.send(encode_envelope(&system(SystemMessage::Heartbeat {
        client_time: 12345,
    })))
    .await
    .expect("send");

    let msg = ws.next().await.unwrap().expect("recv");
    let env = decode_envelope(msg);
    match env.payload {
        Payload::System(SystemMessage::HeartbeatAck {
            client_time,
            ..
        }) => {
            assert_eq!(client_time, 12345);
        }
        other => panic!("expected HeartbeatAck, got {other:?}"),
    }
}

#[tokio::test]
async fn test_disconnect_closes_connection() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    handshake(&mut ws, 1).await;

    ws.send(encode_envelope(&system(SystemMessage::Disconnect {
        reason: "bye".into(),
    })))
    .await
    .expect("send");

    // Server should close the connection after Disconnect.
    let result = tokio::time::timeout(
        Duration::from_secs(2),
        ws.next(),
    )
    .await;

    match result {
        Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {} // expected
        Ok(Some(Err(_))) => {}                           // also fine
        other => panic!("expected close, got {other:?}"),
    }
}

#[tokio::test]
async fn test_join_room_by_code_not_found() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    handshake(&mut ws, 1).await;

    ws.send(encode_envelope(&system(SystemMessage::JoinRoomByCode {
        code: "ZZZZ".into(),
        display_name: "Nobody".into(),
    })))
    .await
    .expect("send");

    let msg = ws.next().await.unwrap().expect("recv");
    let env = decode_envelope(msg);
    match env.payload {
        Payload::System(SystemMessage::Error { code, message }) => {
            assert_eq!(code, 404);
            assert_eq!(message, "room_not_found");
        }
        other => panic!("expected Error 404, got {other:?}"),
    }
}

#[tokio::test]
async fn test_join_room_by_code_rejects_malformed_code() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    handshake(&mut ws, 1).await;

    ws.send(encode_envelope(&system(SystemMessage::JoinRoomByCode {
        code: "AB01".into(), // digits aren't in the room code alphabet
        display_name: "Nobody".into(),
    })))
    .await
    .expect("send");

    let msg = ws.next().await.unwrap().expect("recv");
    let env = decode_envelope(msg);
    match env.payload {
        Payload::System(SystemMessage::Error { code, .. }) => {
            assert_eq!(code, 400);
        }
        other => panic!("expected Error 400, got {other:?}"),
    }
}

#[tokio::test]
async fn test_game_message_not_in_room() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    handshake(&mut ws, 1).await;

    // Send a game message without joining a room first.
    let game_data = serde_json::to_vec(&EchoMsg {
        text: "hello".into(),
    })
    .unwrap();
    let env = Envelope {
        seq: 1,
        timestamp: 0,
        channel: Channel::ReliableOrdered,
        payload: Payload::Game(game_data),
    };
    ws.send(encode_envelope(&env)).await.expect("send");

    let msg = ws.next().await.unwrap().expect("recv");
    let resp = decode_envelope(msg);
    match resp.payload {
        Payload::System(SystemMessage::Error { code, message }) => {
            assert_eq!(code, 400);
            assert!(message.contains("not in any room"));
        }
        other => panic!("expected Error 400, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_envelope_ignored() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    handshake(&mut ws, 1).await;

    // Send garbage data.
    ws.send(Message::Binary(b"not json".to_vec().into()))
        .await
        .expect("send");

    // Send a valid heartbeat — should still work (bad envelope was skipped).
    ws.send(encode_envelope(&system(SystemMessage::Heartbeat {
        client_time: 999,
    })))
    .await
    .expect("send");

    let msg = ws.next().await.unwrap().expect("recv");
    let env = decode_envelope(msg);
    assert!(matches!(
        env.payload,
        Payload::System(SystemMessage::HeartbeatAck { .. })
    ));
}

#[tokio::test]
async fn test_handshake_non_handshake_first_message() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    // Send a heartbeat as the first message (should be rejected).
    let hb = Envelope {
        seq: 0,
        timestamp: 0,
        channel: Channel::ReliableOrdered,
        payload: Payload::System(SystemMessage::Heartbeat {
            client_time: 0,
        }),
    };
    ws.send(encode_envelope(&hb)).await.expect("send");

    let msg = ws.next().await.unwrap().expect("recv");
    let env = decode_envelope(msg);
    match env.payload {
        Payload::System(SystemMessage::Error { code, .. }) => {
            assert_eq!(code, 400);
        }
        other => panic!("expected Error 400, got {other:?}"),
    }
}

#[tokio::test]
async fn test_multiple_connections_independent() {
    let addr = start_server().await;

    let mut ws1 = connect(&addr).await;
    let mut ws2 = connect(&addr).await;

    let ack1 = handshake(&mut ws1, 10).await;
    let ack2 = handshake(&mut ws2, 20).await;

    match (&ack1.payload, &ack2.payload) {
        (
            Payload::System(SystemMessage::HandshakeAck {
                player_id: p1, ..
            }),
            Payload::System(SystemMessage::HandshakeAck {
                player_id: p2, ..
            }),
        ) => {
            assert_eq!(*p1, PlayerId(10));
            assert_eq!(*p2, PlayerId(20));
        }
        _ => panic!("expected two HandshakeAcks"),
    }
}

#[tokio::test]
async fn test_list_rooms_empty_server() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    handshake(&mut ws, 1).await;

    ws.send(encode_envelope(&system(SystemMessage::ListRooms)))
        .await
        .expect("send");

    let msg = ws.next().await.unwrap().expect("recv");
    let env = decode_envelope(msg);
    match env.payload {
        Payload::System(SystemMessage::RoomList { rooms }) => {
            assert!(rooms.is_empty());
        }
        other => panic!("expected RoomList, got {other:?}"),
    }
}

#[tokio::test]
async fn test_create_room_then_join_by_code() {
    let addr = start_server().await;

    let mut host = connect(&addr).await;
    handshake(&mut host, 1).await;

    host.send(encode_envelope(&system(SystemMessage::CreateRoom {
        mode_tag: ModeTag::Arena,
        display_name: "Host".into(),
        rounds: Some(3),
    })))
    .await
    .expect("send");

    let msg = host.next().await.unwrap().expect("recv");
    let room_code = match decode_envelope(msg).payload {
        Payload::System(SystemMessage::RoomCreated {
            room_code,
            player_id,
            number,
            ..
        }) => {
            assert_eq!(player_id, PlayerId(1));
            assert_eq!(number, 1);
            room_code
        }
        other => panic!("expected RoomCreated, got {other:?}"),
    };

    let mut guest = connect(&addr).await;
    handshake(&mut guest, 2).await;
    guest
        .send(encode_envelope(&system(SystemMessage::JoinRoomByCode {
            code: room_code.to_string(),
            display_name: "Guest".into(),
        })))
        .await
        .expect("send");

    let msg = guest.next().await.unwrap().expect("recv");
    match decode_envelope(msg).payload {
        Payload::System(SystemMessage::RoomJoined {
            room_code: joined_code,
            mode_tag,
            players,
            ..
        }) => {
            assert_eq!(joined_code, room_code);
            assert_eq!(mode_tag, ModeTag::Arena);
            assert_eq!(players.len(), 2);
        }
        other => panic!("expected RoomJoined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_list_rooms_after_create_room() {
    let addr = start_server().await;
    let mut host = connect(&addr).await;
    handshake(&mut host, 1).await;

    host.send(encode_envelope(&system(SystemMessage::CreateRoom {
        mode_tag: ModeTag::Arena,
        display_name: "Host".into(),
        rounds: None,
    })))
    .await
    .expect("send");
    let _ = host.next().await.unwrap().expect("recv RoomCreated");

    let mut observer = connect(&addr).await;
    handshake(&mut observer, 2).await;
    observer
        .send(encode_envelope(&system(SystemMessage::ListRooms)))
        .await
        .expect("send");

    let msg = observer.next().await.unwrap().expect("recv");
    match decode_envelope(msg).payload {
        Payload::System(SystemMessage::RoomList { rooms }) => {
            assert_eq!(rooms.len(), 1);
            assert_eq!(rooms[0].player_count, 1);
            assert_eq!(rooms[0].mode_tag, ModeTag::Arena);
        }
        other => panic!("expected RoomList, got {other:?}"),
    }
}

#[tokio::test]
async fn test_player_ready_broadcasts_to_room() {
    let addr = start_server().await;

    let mut host = connect(&addr).await;
    handshake(&mut host, 1).await;
    host.send(encode_envelope(&system(SystemMessage::CreateRoom {
        mode_tag: ModeTag::Arena,
        display_name: "Host".into(),
        rounds: None,
    })))
    .await
    .expect("send");
    let _ = host.next().await.unwrap().expect("recv RoomCreated");

    host.send(encode_envelope(&system(SystemMessage::PlayerReady {
        ready: true,
    })))
    .await
    .expect("send");

    let sys = recv_until(&mut host, Duration::from_secs(2), |m| {
        matches!(m, SystemMessage::PlayerReadyChanged { .. })
    })
    .await;
    match sys {
        SystemMessage::PlayerReadyChanged { players } => {
            assert_eq!(players.len(), 1);
            assert!(players[0].ready);
        }
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn test_select_character_rejects_duplicate() {
    let addr = start_server().await;

    let mut host = connect(&addr).await;
    handshake(&mut host, 1).await;
    host.send(encode_envelope(&system(SystemMessage::CreateRoom {
        mode_tag: ModeTag::Arena,
        display_name: "Host".into(),
        rounds: None,
    })))
    .await
    .expect("send");
    let room_code = match decode_envelope(
        host.next().await.unwrap().expect("recv"),
    )
    .payload
    {
        Payload::System(SystemMessage::RoomCreated { room_code, .. }) => {
            room_code
        }
        other => panic!("expected RoomCreated, got {other:?}"),
    };

    let mut guest = connect(&addr).await;
    handshake(&mut guest, 2).await;
    guest
        .send(encode_envelope(&system(SystemMessage::JoinRoomByCode {
            code: room_code.to_string(),
            display_name: "Guest".into(),
        })))
        .await
        .expect("send");
    let _ = guest.next().await.unwrap().expect("recv RoomJoined");

    host.send(encode_envelope(&system(SystemMessage::SelectCharacter {
        character_id: "vex".into(),
        character_name: "Vex".into(),
    })))
    .await
    .expect("send");
    let _ = recv_until(&mut host, Duration::from_secs(2), |m| {
        matches!(m, SystemMessage::CharacterSelectionUpdate { .. })
    })
    .await;

    guest
        .send(encode_envelope(&system(SystemMessage::SelectCharacter {
            character_id: "vex".into(),
            character_name: "Vex".into(),
        })))
        .await
        .expect("send");

    let msg = guest.next().await.unwrap().expect("recv");
    match decode_envelope(msg).payload {
        Payload::System(SystemMessage::Error { code, message }) => {
            assert_eq!(code, 409);
            assert_eq!(message, "character_taken");
        }
        other => panic!("expected Error 409, got {other:?}"),
    }
}

#[tokio::test]
async fn test_start_game_requires_ready_player() {
    let addr = start_server().await;
    let mut host = connect(&addr).await;
    handshake(&mut host, 1).await;
    host.send(encode_envelope(&system(SystemMessage::CreateRoom {
        mode_tag: ModeTag::Arena,
        display_name: "Host".into(),
        rounds: None,
    })))
    .await
    .expect("send");
    let _ = host.next().await.unwrap().expect("recv RoomCreated");

    host.send(encode_envelope(&system(SystemMessage::StartGame)))
        .await
        .expect("send");

    let msg = host.next().await.unwrap().expect("recv");
    match decode_envelope(msg).payload {
        Payload::System(SystemMessage::Error { code, message }) => {
            assert_eq!(code, 409);
            assert_eq!(message, "no_ready_players");
        }
        other => panic!("expected Error 409, got {other:?}"),
    }
}

#[tokio::test]
async fn test_start_game_broadcasts_game_started() {
    let addr = start_server().await;
    let mut host = connect(&addr).await;
    handshake(&mut host, 1).await;
    host.send(encode_envelope(&system(SystemMessage::CreateRoom {
        mode_tag: ModeTag::Arena,
        display_name: "Host".into(),
        rounds: Some(5),
    })))
    .await
    .expect("send");
    let _ = host.next().await.unwrap().expect("recv RoomCreated");

    host.send(encode_envelope(&system(SystemMessage::PlayerReady {
        ready: true,
    })))
    .await
    .expect("send");
    let _ = recv_until(&mut host, Duration::from_secs(2), |m| {
        matches!(m, SystemMessage::PlayerReadyChanged { .. })
    })
    .await;

    host.send(encode_envelope(&system(SystemMessage::StartGame)))
        .await
        .expect("send");

    let sys = recv_until(&mut host, Duration::from_secs(2), |m| {
        matches!(m, SystemMessage::GameStarted { .. })
    })
    .await;
    match sys {
        SystemMessage::GameStarted {
            mode_tag,
            players,
            tournament_rounds,
            ..
        } => {
            assert_eq!(mode_tag, ModeTag::Arena);
            assert_eq!(players.len(), 1);
            assert_eq!(tournament_rounds, 5);
        }
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn test_start_game_rejects_non_host() {
    let addr = start_server().await;

    let mut host = connect(&addr).await;
    handshake(&mut host, 1).await;
    host.send(encode_envelope(&system(SystemMessage::CreateRoom {
        mode_tag: ModeTag::Arena,
        display_name: "Host".into(),
        rounds: None,
    })))
    .await
    .expect("send");
    let room_code = match decode_envelope(
        host.next().await.unwrap().expect("recv"),
    )
    .payload
    {
        Payload::System(SystemMessage::RoomCreated { room_code, .. }) => {
            room_code
        }
        other => panic!("expected RoomCreated, got {other:?}"),
    };

    let mut guest = connect(&addr).await;
    handshake(&mut guest, 2).await;
    guest
        .send(encode_envelope(&system(SystemMessage::JoinRoomByCode {
            code: room_code.to_string(),
            display_name: "Guest".into(),
        })))
        .await
        .expect("send");
    let _ = guest.next().await.unwrap().expect("recv RoomJoined");

    guest
        .send(encode_envelope(&system(SystemMessage::StartGame)))
        .await
        .expect("send");

    let msg = guest.next().await.unwrap().expect("recv");
    match decode_envelope(msg).payload {
        Payload::System(SystemMessage::Error { code, message }) => {
            assert_eq!(code, 403);
            assert_eq!(message, "not_host");
        }
        other => panic!("expected Error 403, got {other:?}"),
    }
}
