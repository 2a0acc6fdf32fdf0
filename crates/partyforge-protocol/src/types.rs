//! Core protocol types for PartyForge's wire format.
//!
//! This module defines every type that travels "on the wire" — meaning these
//! are the structures that get serialized to bytes, sent over the network,
//! and deserialized on the other side.
//!
//! Think of this as the "language" that the client and server speak.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a participant (a connected controller).
///
/// This is a "newtype wrapper" — a common Rust pattern where you wrap a
/// primitive type (here `u64`) in a named struct. Why bother?
///
/// 1. **Type safety**: You can't accidentally pass a `RoomId` where a
///    `PlayerId` is expected, even though both are `u64` underneath.
/// 2. **Readability**: Function signatures like `fn kick(player: PlayerId)`
///    are clearer than `fn kick(player: u64)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// Internal identifier for a room (a game instance).
///
/// Rooms are also addressed externally by [`RoomCode`]; this id is the
/// key used for the in-process room table and actor addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// A human-facing 4-letter room code.
///
/// Restricted to an alphabet that avoids visually ambiguous characters
/// (`I`, `O`, `0`, `1` are excluded) so it can be read aloud or typed on
/// a mobile keyboard without confusion. Always stored and compared in
/// uppercase; parsing is case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode([u8; 4]);

impl RoomCode {
    /// The alphabet room codes are drawn from. No `I`, `O`, `0`, `1`.
    pub const ALPHABET: &'static [u8; 24] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";

    /// Builds a room code directly from 4 bytes already in the alphabet.
    ///
    /// Callers (the lobby's code generator) are responsible for only
    /// passing bytes drawn from [`Self::ALPHABET`].
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Parses a room code from user input, case-insensitively.
    ///
    /// Returns `None` if the input isn't exactly 4 characters or contains
    /// a character outside [`Self::ALPHABET`].
    pub fn parse(input: &str) -> Option<Self> {
        let upper = input.to_ascii_uppercase();
        let bytes = upper.as_bytes();
        if bytes.len() != 4 {
            return None;
        }
        let mut out = [0u8; 4];
        for (i, b) in bytes.iter().enumerate() {
            if !Self::ALPHABET.contains(b) {
                return None;
            }
            out[i] = *b;
        }
        Some(Self(out))
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", std::str::from_utf8(&self.0).unwrap_or("????"))
    }
}

impl Serialize for RoomCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RoomCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid room code: {s}"))
        })
    }
}

// ---------------------------------------------------------------------------
// Recipient — who should receive a message?
// ---------------------------------------------------------------------------

/// Specifies who should receive a server message.
///
/// When game logic processes a player's action, it returns a list of
/// `(Recipient, ServerMessage)` pairs. This enum tells the framework
/// WHERE to deliver each message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Send to every player in the room.
    All,
    /// Send to one specific player.
    Player(PlayerId),
    /// Send to everyone EXCEPT the specified player.
    AllExcept(PlayerId),
}

// ---------------------------------------------------------------------------
// Channel — delivery guarantees
// ---------------------------------------------------------------------------

/// The delivery guarantee for a message.
///
/// A lobby operation MUST arrive (reliable), but a position update that's
/// sent 60 times per second can afford to lose a few (unreliable).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "PascalCase")]
pub enum Channel {
    /// Delivered in order, no loss. Used for lobby and tournament events.
    #[default]
    ReliableOrdered,
    /// Delivered (no loss), but may arrive out of order.
    ReliableUnordered,
    /// May be lost, may arrive out of order. Used for input and snapshots.
    Unreliable,
}

// ---------------------------------------------------------------------------
// Mode tag
// ---------------------------------------------------------------------------

/// Which game mode a room is running.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ModeTag {
    Smash,
    Arena,
    Race,
    Flappy,
    Tag,
    Tug,
    Balloon,
    Paint,
}

impl fmt::Display for ModeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Smash => "smash",
            Self::Arena => "arena",
            Self::Race => "race",
            Self::Flappy => "flappy",
            Self::Tag => "tag",
            Self::Tug => "tug",
            Self::Balloon => "balloon",
            Self::Paint => "paint",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// SystemMessage — framework-level messages
// ---------------------------------------------------------------------------

/// A summary of a room returned in room listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomListEntry {
    pub room_code: RoomCode,
    pub player_count: usize,
    pub max_players: usize,
    pub mode_tag: ModeTag,
}

/// A single participant, as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantView {
    pub id: PlayerId,
    pub number: u8,
    pub color: u8,
    pub name: String,
    pub ready: bool,
    pub character: Option<String>,
    pub is_host: bool,
}

/// Messages used by the framework itself (not mode-specific).
///
/// These handle connection lifecycle, heartbeats, the Lobby Manager
/// (§4.2), and the Tournament Controller (§4.6). Mode simulations never
/// construct these directly — they are emitted by the room actor's
/// lobby/tournament layer.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON:
/// `{ "type": "Heartbeat", "client_time": 123 }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    // -- Connection lifecycle --
    Handshake {
        version: u32,
        token: Option<String>,
    },
    HandshakeAck {
        player_id: PlayerId,
        server_time: u64,
    },
    Disconnect {
        reason: String,
    },

    // -- Heartbeat (keep-alive) --
    Heartbeat {
        client_time: u64,
    },
    HeartbeatAck {
        client_time: u64,
        server_time: u64,
    },

    // -- Lobby Manager (spec §4.2) --
    /// C→S: host creates a new room for the given mode.
    CreateRoom {
        mode_tag: ModeTag,
        display_name: String,
        rounds: Option<u32>,
    },
    /// Reply to `CreateRoom`.
    RoomCreated {
        room_code: RoomCode,
        player_id: PlayerId,
        color: u8,
        number: u8,
    },
    /// C→S: join an existing room by its 4-letter code.
    JoinRoomByCode {
        code: String,
        display_name: String,
    },
    /// Reply to `JoinRoomByCode` on success.
    RoomJoined {
        player: ParticipantView,
        room_code: RoomCode,
        mode_tag: ModeTag,
        players: Vec<ParticipantView>,
    },
    /// C→S: leave the current room.
    LeaveRoom,
    /// C→S: list joinable rooms.
    ListRooms,
    RoomList {
        rooms: Vec<RoomListEntry>,
    },
    /// C→S: flip the caller's ready flag.
    PlayerReady {
        ready: bool,
    },
    /// S→room: broadcast after any participant's ready flag changes.
    PlayerReadyChanged {
        players: Vec<ParticipantView>,
    },
    /// C→S: lock in a character choice.
    SelectCharacter {
        character_id: String,
        character_name: String,
    },
    /// S→room: broadcast after a (successful) character selection.
    CharacterSelectionUpdate {
        selections: Vec<CharacterSelection>,
    },
    /// C→S: host starts the game.
    StartGame,
    /// S→room: broadcast when the game actually starts.
    GameStarted {
        mode_tag: ModeTag,
        players: Vec<ParticipantView>,
        tournament_rounds: u32,
        current_round: u32,
    },
    /// S→room: broadcast when a room returns to `lobby` for a rematch.
    GameReset {
        players: Vec<ParticipantView>,
    },
    /// S→room: broadcast before a room is torn down.
    RoomClosed {
        reason: String,
    },

    // -- Tournament Controller (spec §4.6) --
    TournamentConfig {
        tournament_rounds: u32,
        current_round: u32,
    },
    RoundEnded {
        current_round: u32,
        round_winner: Option<String>,
        round_winner_id: Option<PlayerId>,
        player_scores: Vec<(PlayerId, u32)>,
    },
    RoundStarting {
        round: u32,
    },
    TournamentEnded {
        tournament_winner: Option<PlayerId>,
        player_scores: Vec<(PlayerId, u32)>,
    },

    // -- Errors --
    /// A reply payload for request-style operations (`{success, error?}`
    /// in the wire catalogue). `code` follows HTTP-style conventions.
    Error {
        code: u16,
        message: String,
    },
}

/// One entry in a `character-selection-update` broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSelection {
    pub player_id: PlayerId,
    pub character: String,
    pub player_name: String,
}

// ---------------------------------------------------------------------------
// Payload — what's inside an envelope
// ---------------------------------------------------------------------------

/// The content of a message: either a system message or mode data.
///
/// `#[serde(tag = "type", content = "data")]` produces "adjacently tagged"
/// JSON. For a system message:
///   `{ "type": "System", "data": { "type": "Heartbeat", "client_time": 123 } }`
/// For mode data:
///   `{ "type": "Game", "data": [104, 101, 108, 108, 111] }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    /// A framework-level message (handshake, heartbeat, lobby, tournament).
    System(SystemMessage),

    /// Mode-specific data, opaque to the framework.
    /// These bytes are the active mode's `ClientMessage` or
    /// `ServerMessage` serialized by the codec.
    Game(Vec<u8>),

    /// A raw binary payload that bypasses the codec entirely (spec §9:
    /// "do NOT serialize the 60x60 grid as JSON"). Used for the Paint
    /// mode's grid snapshot; every other payload goes through `Game`.
    Binary(Vec<u8>),
}

// ---------------------------------------------------------------------------
// Envelope — the top-level wire format
// ---------------------------------------------------------------------------

/// The top-level message wrapper. Every message on the wire is an Envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Auto-incrementing sequence number.
    pub seq: u64,
    /// Milliseconds since the server started.
    pub timestamp: u64,
    /// The delivery guarantee for this message.
    #[serde(default)]
    pub channel: Channel,
    /// The actual message content (system, mode, or binary data).
    pub payload: Payload,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&PlayerId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_player_id_display() {
        assert_eq!(PlayerId(7).to_string(), "P-7");
    }

    #[test]
    fn test_room_code_parse_accepts_lowercase() {
        let code = RoomCode::parse("abcd").unwrap();
        assert_eq!(code.to_string(), "ABCD");
    }

    #[test]
    fn test_room_code_parse_rejects_ambiguous_letters() {
        assert!(RoomCode::parse("ABIO").is_none());
        assert!(RoomCode::parse("AB01").is_none());
    }

    #[test]
    fn test_room_code_parse_rejects_wrong_length() {
        assert!(RoomCode::parse("ABC").is_none());
        assert!(RoomCode::parse("ABCDE").is_none());
    }

    #[test]
    fn test_room_code_round_trips_through_json() {
        let code = RoomCode::parse("XYZK").unwrap();
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"XYZK\"");
        let decoded: RoomCode = serde_json::from_str(&json).unwrap();
        assert_eq!(code, decoded);
    }

    #[test]
    fn test_channel_default_is_reliable_ordered() {
        assert_eq!(Channel::default(), Channel::ReliableOrdered);
    }

    #[test]
    fn test_mode_tag_serializes_lowercase() {
        let json = serde_json::to_string(&ModeTag::Arena).unwrap();
        assert_eq!(json, "\"arena\"");
    }

    #[test]
    fn test_system_message_create_room_json_format() {
        let msg = SystemMessage::CreateRoom {
            mode_tag: ModeTag::Arena,
            display_name: "Edgar".into(),
            rounds: Some(3),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "CreateRoom");
        assert_eq!(json["mode_tag"], "arena");
        assert_eq!(json["rounds"], 3);
    }

    #[test]
    fn test_system_message_join_room_by_code_round_trip() {
        let msg = SystemMessage::JoinRoomByCode {
            code: "ABCD".into(),
            display_name: "Edgar".into(),
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: SystemMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_payload_binary_variant_round_trips() {
        let payload = Payload::Binary(vec![1, 2, 3]);
        let json: serde_json::Value =
            serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "Binary");
    }

    #[test]
    fn test_envelope_channel_defaults_when_missing() {
        let json = r#"{
            "seq": 1,
            "timestamp": 100,
            "payload": { "type": "Game", "data": [1] }
        }"#;
        let envelope: Envelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.channel, Channel::ReliableOrdered);
    }

    #[test]
    fn test_decode_garbage_returns_error() {
        let garbage = b"not json at all";
        let result: Result<Envelope, _> = serde_json::from_slice(garbage);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_unknown_system_message_type_returns_error() {
        let unknown = r#"{"type": "FlyToMoon", "speed": 9000}"#;
        let result: Result<SystemMessage, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }
}
