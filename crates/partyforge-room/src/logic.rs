//! The `GameLogic` trait — the extension point each mode simulation
//! implements (Arena, Smash, and the five light modes).
//!
//! The framework calls these methods at the right time; a mode just
//! writes its own simulation rules.

use std::time::Duration;

use partyforge_protocol::{ModeTag, PlayerId, Recipient};
use serde::{de::DeserializeOwned, Serialize};

use crate::RoomConfig;

/// What a mode reports when a round concludes.
///
/// Returned by [`GameLogic::round_outcome`]; consumed by the Tournament
/// Controller (spec §4.6), which is the only thing allowed to turn this
/// into a win count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    pub winner_id: Option<PlayerId>,
    pub winner_name: Option<String>,
}

/// The core trait that mode simulations implement.
///
/// Each associated type defines the shape of the mode's data:
/// - `Config` — mode-specific tunables (ring size, damage constants, …)
/// - `State` — the full simulation state, snapshotted to clients
/// - `ClientMessage` — inputs and actions clients can send
/// - `ServerMessage` — state updates and one-shot events the server sends
pub trait GameLogic: Send + Sync + 'static {
    type Config: Send + Sync + Clone + Default;
    type State: Send + Sync + Clone + Serialize + DeserializeOwned;
    type ClientMessage: Send + Sync + Clone + Serialize + DeserializeOwned;
    type ServerMessage: Send + Sync + Clone + Serialize + DeserializeOwned;

    /// Creates the initial state when a room transitions `lobby → playing`,
    /// or when a tournament starts a fresh round (participants carry over,
    /// mode state resets — spec §4.6).
    fn init(config: &Self::Config, players: &[PlayerId]) -> Self::State;

    /// Processes a message from a client. Invalid actions for the current
    /// state are silently ignored (spec §4.4.7) — return an empty vec,
    /// never an error.
    fn handle_message(
        state: &mut Self::State,
        sender: PlayerId,
        msg: Self::ClientMessage,
    ) -> Vec<(Recipient, Self::ServerMessage)>;

    /// Advances the simulation by one fixed tick. Only called when
    /// `room_config().tick_rate > 0`. Default: no-op (turn-based modes).
    fn tick(
        _state: &mut Self::State,
        _dt: Duration,
    ) -> Vec<(Recipient, Self::ServerMessage)> {
        Vec::new()
    }

    /// Validates a client message before `handle_message` runs. Default:
    /// accept everything (modes that need to reject malformed input
    /// override this; rejected messages never reach `handle_message`
    /// and never emit an event, per spec §7 Protocol error handling).
    fn validate_message(
        _state: &Self::State,
        _sender: PlayerId,
        _msg: &Self::ClientMessage,
    ) -> Result<(), String> {
        Ok(())
    }

    /// Called once a disconnected participant's grace period elapses
    /// (spec §4.4.7: treated as eliminated with no ring-out damage).
    fn on_player_disconnect(
        _state: &mut Self::State,
        _player: PlayerId,
    ) -> Vec<(Recipient, Self::ServerMessage)> {
        Vec::new()
    }

    /// Called when a participant reconnects within the grace window.
    fn on_player_reconnect(
        _state: &mut Self::State,
        _player: PlayerId,
    ) -> Vec<(Recipient, Self::ServerMessage)> {
        Vec::new()
    }

    /// Returns `Some` once the round has a winner (or ended in a draw,
    /// `winner_id: None`). Checked after every `handle_message`/`tick`.
    /// Default: never ends (used only by modes driven purely by
    /// lobby-level `start-game`/`leave-room`, if any).
    fn round_outcome(_state: &Self::State) -> Option<RoundOutcome> {
        None
    }

    /// Signals an unrecoverable internal error. When `Some`, the Loop
    /// Runtime tears the room down with `room-closed {reason:"internal"}`
    /// (spec §7 Fatal). Default: never aborts.
    fn aborted(_state: &Self::State) -> Option<String> {
        None
    }

    /// Returns `true` for messages that only carry the latest intent and
    /// can be safely coalesced under backpressure — `player-input` and
    /// its per-mode analogues. One-shot actions (`punch`, `arena-grab`,
    /// `race-tap`, …) must return `false`: the Loop Runtime never drops
    /// those, even when the inbound queue is full (spec §4.3).
    fn is_state_input(_msg: &Self::ClientMessage) -> bool {
        false
    }

    /// A binary payload to broadcast alongside (or instead of) the
    /// per-tick `ServerMessage`s — used only by Paint's 60x60 grid,
    /// which spec §9 forbids serializing as JSON. Default: none.
    fn binary_snapshot(_state: &Self::State) -> Option<Vec<u8>> {
        None
    }

    /// Room configuration for this mode (player counts, tick rate, …).
    fn room_config() -> RoomConfig {
        RoomConfig::default()
    }

    /// Resolves the `Config`/`RoomConfig` pair to use for a `create-room`
    /// request tagged with the given [`ModeTag`] (spec §4.2). A
    /// single-mode `GameLogic` implementation ignores the tag and falls
    /// back to its own defaults; `partyforge_modes::AnyMode` (which hosts
    /// all eight modes behind one room manager) overrides this to
    /// dispatch to the tagged mode's own config.
    fn config_for_tag(_tag: ModeTag) -> (Self::Config, RoomConfig) {
        (Self::Config::default(), Self::room_config())
    }
}
