//! Error types for the room layer.
//!
//! Spec §7 splits errors into Protocol / Policy / Transient / Fatal kinds.
//! `RoomError` covers the Policy and internal-plumbing cases; Protocol and
//! Transient errors are handled closer to the transport/handler layer.

use partyforge_protocol::{PlayerId, RoomCode};

/// Errors that can occur during room operations.
///
/// Every variant here corresponds to a `{success:false, error:<kind>}`
/// reply named in spec §6's event catalogue, except the plumbing
/// variants (`Unavailable`) which never reach the client verbatim.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No live room has this code.
    #[error("room_not_found")]
    NotFound(RoomCode),

    /// The room has no more seats (max_players reached).
    #[error("room_full")]
    RoomFull(RoomCode),

    /// The room has already left `lobby` — join-room rejects this.
    #[error("room_in_game")]
    RoomInGame(RoomCode),

    /// The requested character is already held by another participant.
    #[error("character_taken")]
    CharacterTaken,

    /// The operation requires the caller to be the host.
    #[error("not_host")]
    NotHost,

    /// `start-game` requires at least one ready participant.
    #[error("no_ready_players")]
    NoReadyPlayers,

    /// `start-game` requires at least `RoomConfig::min_players` ready
    /// participants; this mode needs more than are currently ready.
    #[error("not_enough_players")]
    NotEnoughPlayers(usize),

    /// The player is already in this room.
    #[error("player {0} already in room {1}")]
    AlreadyInRoom(PlayerId, RoomCode),

    /// The player is not in this room.
    #[error("player {0} not in room {1}")]
    NotInRoom(PlayerId, RoomCode),

    /// The room is in a state that doesn't allow this operation.
    #[error("invalid room state for this operation: {0}")]
    InvalidState(String),

    /// The room's command channel is full or closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),
}
