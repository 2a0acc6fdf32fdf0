//! Room configuration and lifecycle state machine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration for a room instance.
///
/// Mode implementations customize these defaults via
/// `GameLogic::room_config()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Minimum participants required for the host to be allowed to start.
    pub min_players: usize,

    /// Maximum participants allowed in the room (mode-dependent cap, ≤ 8).
    pub max_players: usize,

    /// Tick rate in Hz. 0 means event-driven (no fixed-step loop).
    pub tick_rate: u32,

    /// How many ticks between snapshot broadcasts (spec
    /// `SNAPSHOT_EVERY_N_TICKS`). 1 = every tick.
    pub snapshot_every_n_ticks: u32,

    /// How long a disconnected participant is given to reconnect before
    /// their fighter/runner/etc. is treated as permanently gone.
    pub disconnect_grace: Duration,

    /// How long a room may sit idle in `lobby` before it's closed.
    pub idle_close: Duration,

    /// Delay between a round ending and the next round starting, while
    /// wrapped by the Tournament Controller.
    pub round_transition_delay: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_players: 8,
            tick_rate: 60,
            snapshot_every_n_ticks: 1,
            disconnect_grace: Duration::from_millis(2_000),
            idle_close: Duration::from_secs(600),
            round_transition_delay: Duration::from_secs(5),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// The lifecycle state of a room (spec §3).
///
/// Unlike a strictly linear pipeline, a room cycles between `playing` and
/// `round_end` for as many rounds as the tournament configures, only
/// reaching a terminal state at `tournament_end` or `closed`:
///
/// ```text
///           ┌──────────────────────────────┐
///           ▼                              │
/// lobby → playing → round_end → playing ───┘
///                        │
///                        ▼
///                 tournament_end → closed
/// ```
///
/// `lobby` can also be re-entered from `round_end`/`tournament_end` on a
/// rematch, and any state can move to `closed` (idle timeout, last
/// participant leaving, or a fatal simulation error).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    Lobby,
    Playing,
    RoundEnd,
    TournamentEnd,
    Closed,
}

impl RoomState {
    /// Returns `true` if the room is accepting new joins.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Lobby)
    }

    /// Returns `true` if a mode simulation should be receiving ticks.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Playing)
    }

    /// Returns `true` if this state permanently ends the room.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl std::fmt::Display for RoomState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Lobby => "lobby",
            Self::Playing => "playing",
            Self::RoundEnd => "round_end",
            Self::TournamentEnd => "tournament_end",
            Self::Closed => "closed",
        };
        write!(f, "{s}")
    }
}
