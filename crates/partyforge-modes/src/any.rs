//! Enum-dispatch across all eight modes.
//!
//! The room actor (`partyforge-room`) is generic over a single
//! [`GameLogic`] implementation, but the lobby lets a room be created for
//! any of the eight modes (spec §4.2 `create-room{mode_tag}`). `AnyMode`
//! is the sum type that lets one `RoomManager<AnyMode>` host rooms of any
//! mode, delegating every call to whichever mode the room was created
//! with.

use partyforge_protocol::{ModeTag, PlayerId, Recipient};
use partyforge_room::{GameLogic, RoomConfig, RoundOutcome};
use serde::{Deserialize, Serialize};

use crate::arena::{Arena, ArenaClientMessage, ArenaConfig, ArenaServerMessage, ArenaState};
use crate::balloon::{
    BalloonClientMessage, BalloonConfig, BalloonMode, BalloonServerMessage, BalloonState,
};
use crate::flappy::{Flappy, FlappyClientMessage, FlappyConfig, FlappyServerMessage, FlappyState};
use crate::paint::{Paint, PaintClientMessage, PaintConfig, PaintServerMessage, PaintState};
use crate::race::{Race, RaceClientMessage, RaceConfig, RaceServerMessage, RaceState};
use crate::smash::{Smash, SmashClientMessage, SmashConfig, SmashServerMessage, SmashState};
use crate::tag::{Tag, TagClientMessage, TagConfig, TagServerMessage, TagState};
use crate::tug::{Tug, TugClientMessage, TugConfig, TugServerMessage, TugState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AnyConfig {
    Arena(ArenaConfig),
    Smash(SmashConfig),
    Race(RaceConfig),
    Flappy(FlappyConfig),
    Tag(TagConfig),
    Tug(TugConfig),
    Balloon(BalloonConfig),
    Paint(PaintConfig),
}

impl Default for AnyConfig {
    fn default() -> Self {
        AnyConfig::Arena(ArenaConfig::default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AnyState {
    Arena(ArenaState),
    Smash(SmashState),
    Race(RaceState),
    Flappy(FlappyState),
    Tag(TagState),
    Tug(TugState),
    Balloon(BalloonState),
    Paint(PaintState),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AnyClientMessage {
    Arena(ArenaClientMessage),
    Smash(SmashClientMessage),
    Race(RaceClientMessage),
    Flappy(FlappyClientMessage),
    Tag(TagClientMessage),
    Tug(TugClientMessage),
    Balloon(BalloonClientMessage),
    Paint(PaintClientMessage),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AnyServerMessage {
    Arena(ArenaServerMessage),
    Smash(SmashServerMessage),
    Race(RaceServerMessage),
    Flappy(FlappyServerMessage),
    Tag(TagServerMessage),
    Tug(TugServerMessage),
    Balloon(BalloonServerMessage),
    Paint(PaintServerMessage),
}

/// Maps a wire-level [`ModeTag`] to that mode's default `GameLogic::Config`
/// and the `RoomConfig` it wants (player counts, tick rate).
pub fn default_config_for(tag: ModeTag) -> (AnyConfig, RoomConfig) {
    match tag {
        ModeTag::Arena => (AnyConfig::Arena(ArenaConfig::default()), Arena::room_config()),
        ModeTag::Smash => (AnyConfig::Smash(SmashConfig::default()), Smash::room_config()),
        ModeTag::Race => (AnyConfig::Race(RaceConfig::default()), Race::room_config()),
        ModeTag::Flappy => (AnyConfig::Flappy(FlappyConfig::default()), Flappy::room_config()),
        ModeTag::Tag => (AnyConfig::Tag(TagConfig::default()), Tag::room_config()),
        ModeTag::Tug => (AnyConfig::Tug(TugConfig::default()), Tug::room_config()),
        ModeTag::Balloon => (AnyConfig::Balloon(BalloonConfig::default()), BalloonMode::room_config()),
        ModeTag::Paint => (AnyConfig::Paint(PaintConfig::default()), Paint::room_config()),
    }
}

pub struct AnyMode;

impl GameLogic for AnyMode {
    type Config = AnyConfig;
    type State = AnyState;
    type ClientMessage = AnyClientMessage;
    type ServerMessage = AnyServerMessage;

    fn init(config: &Self::Config, players: &[PlayerId]) -> Self::State {
        match config {
            AnyConfig::Arena(c) => AnyState::Arena(Arena::init(c, players)),
            AnyConfig::Smash(c) => AnyState::Smash(Smash::init(c, players)),
            AnyConfig::Race(c) => AnyState::Race(Race::init(c, players)),
            AnyConfig::Flappy(c) => AnyState::Flappy(Flappy::init(c, players)),
            AnyConfig::Tag(c) => AnyState::Tag(Tag::init(c, players)),
            AnyConfig::Tug(c) => AnyState::Tug(Tug::init(c, players)),
            AnyConfig::Balloon(c) => AnyState::Balloon(BalloonMode::init(c, players)),
            AnyConfig::Paint(c) => AnyState::Paint(Paint::init(c, players)),
        }
    }

    fn handle_message(
        state: &mut Self::State,
        sender: PlayerId,
        msg: Self::ClientMessage,
    ) -> Vec<(Recipient, Self::ServerMessage)> {
        match (state, msg) {
            (AnyState::Arena(s), AnyClientMessage::Arena(m)) => {
                Arena::handle_message(s, sender, m)
                    .into_iter()
                    .map(|(r, sm)| (r, AnyServerMessage::Arena(sm)))
                    .collect()
            }
            (AnyState::Smash(s), AnyClientMessage::Smash(m)) => {
                Smash::handle_message(s, sender, m)
                    .into_iter()
                    .map(|(r, sm)| (r, AnyServerMessage::Smash(sm)))
                    .collect()
            }
            (AnyState::Race(s), AnyClientMessage::Race(m)) => {
                Race::handle_message(s, sender, m)
                    .into_iter()
                    .map(|(r, sm)| (r, AnyServerMessage::Race(sm)))
                    .collect()
            }
            (AnyState::Flappy(s), AnyClientMessage::Flappy(m)) => {
                Flappy::handle_message(s, sender, m)
                    .into_iter()
                    .map(|(r, sm)| (r, AnyServerMessage::Flappy(sm)))
                    .collect()
            }
            (AnyState::Tag(s), AnyClientMessage::Tag(m)) => {
                Tag::handle_message(s, sender, m)
                    .into_iter()
                    .map(|(r, sm)| (r, AnyServerMessage::Tag(sm)))
                    .collect()
            }
            (AnyState::Tug(s), AnyClientMessage::Tug(m)) => {
                Tug::handle_message(s, sender, m)
                    .into_iter()
                    .map(|(r, sm)| (r, AnyServerMessage::Tug(sm)))
                    .collect()
            }
            (AnyState::Balloon(s), AnyClientMessage::Balloon(m)) => {
                BalloonMode::handle_message(s, sender, m)
                    .into_iter()
                    .map(|(r, sm)| (r, AnyServerMessage::Balloon(sm)))
                    .collect()
            }
            (AnyState::Paint(s), AnyClientMessage::Paint(m)) => {
                Paint::handle_message(s, sender, m)
                    .into_iter()
                    .map(|(r, sm)| (r, AnyServerMessage::Paint(sm)))
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    fn tick(state: &mut Self::State, dt: std::time::Duration) -> Vec<(Recipient, Self::ServerMessage)> {
        match state {
            AnyState::Arena(s) => Arena::tick(s, dt).into_iter().map(|(r, m)| (r, AnyServerMessage::Arena(m))).collect(),
            AnyState::Smash(s) => Smash::tick(s, dt).into_iter().map(|(r, m)| (r, AnyServerMessage::Smash(m))).collect(),
            AnyState::Race(s) => Race::tick(s, dt).into_iter().map(|(r, m)| (r, AnyServerMessage::Race(m))).collect(),
            AnyState::Flappy(s) => Flappy::tick(s, dt).into_iter().map(|(r, m)| (r, AnyServerMessage::Flappy(m))).collect(),
            AnyState::Tag(s) => Tag::tick(s, dt).into_iter().map(|(r, m)| (r, AnyServerMessage::Tag(m))).collect(),
            AnyState::Tug(s) => Tug::tick(s, dt).into_iter().map(|(r, m)| (r, AnyServerMessage::Tug(m))).collect(),
            AnyState::Balloon(s) => BalloonMode::tick(s, dt).into_iter().map(|(r, m)| (r, AnyServerMessage::Balloon(m))).collect(),
            AnyState::Paint(s) => Paint::tick(s, dt).into_iter().map(|(r, m)| (r, AnyServerMessage::Paint(m))).collect(),
        }
    }

    fn on_player_disconnect(
        state: &mut Self::State,
        player: PlayerId,
    ) -> Vec<(Recipient, Self::ServerMessage)> {
        match state {
            AnyState::Arena(s) => Arena::on_player_disconnect(s, player).into_iter().map(|(r, m)| (r, AnyServerMessage::Arena(m))).collect(),
            AnyState::Smash(s) => Smash::on_player_disconnect(s, player).into_iter().map(|(r, m)| (r, AnyServerMessage::Smash(m))).collect(),
            AnyState::Race(s) => Race::on_player_disconnect(s, player).into_iter().map(|(r, m)| (r, AnyServerMessage::Race(m))).collect(),
            AnyState::Flappy(s) => Flappy::on_player_disconnect(s, player).into_iter().map(|(r, m)| (r, AnyServerMessage::Flappy(m))).collect(),
            AnyState::Tag(s) => Tag::on_player_disconnect(s, player).into_iter().map(|(r, m)| (r, AnyServerMessage::Tag(m))).collect(),
            AnyState::Tug(s) => Tug::on_player_disconnect(s, player).into_iter().map(|(r, m)| (r, AnyServerMessage::Tug(m))).collect(),
            AnyState::Balloon(s) => BalloonMode::on_player_disconnect(s, player).into_iter().map(|(r, m)| (r, AnyServerMessage::Balloon(m))).collect(),
            AnyState::Paint(s) => Paint::on_player_disconnect(s, player).into_iter().map(|(r, m)| (r, AnyServerMessage::Paint(m))).collect(),
        }
    }

    fn round_outcome(state: &Self::State) -> Option<RoundOutcome> {
        match state {
            AnyState::Arena(s) => Arena::round_outcome(s),
            AnyState::Smash(s) => Smash::round_outcome(s),
            AnyState::Race(s) => Race::round_outcome(s),
            AnyState::Flappy(s) => Flappy::round_outcome(s),
            AnyState::Tag(s) => Tag::round_outcome(s),
            AnyState::Tug(s) => Tug::round_outcome(s),
            AnyState::Balloon(s) => BalloonMode::round_outcome(s),
            AnyState::Paint(s) => Paint::round_outcome(s),
        }
    }

    fn is_state_input(msg: &Self::ClientMessage) -> bool {
        match msg {
            AnyClientMessage::Arena(m) => Arena::is_state_input(m),
            AnyClientMessage::Smash(m) => Smash::is_state_input(m),
            AnyClientMessage::Race(m) => Race::is_state_input(m),
            AnyClientMessage::Flappy(m) => Flappy::is_state_input(m),
            AnyClientMessage::Tag(m) => Tag::is_state_input(m),
            AnyClientMessage::Tug(m) => Tug::is_state_input(m),
            AnyClientMessage::Balloon(m) => BalloonMode::is_state_input(m),
            AnyClientMessage::Paint(m) => Paint::is_state_input(m),
        }
    }

    fn binary_snapshot(state: &Self::State) -> Option<Vec<u8>> {
        match state {
            AnyState::Paint(s) => Paint::binary_snapshot(s),
            _ => None,
        }
    }

    fn room_config() -> RoomConfig {
        // Real per-mode room configs are supplied explicitly by the caller
        // via `default_config_for` at room-creation time; this default only
        // covers callers that construct an `AnyMode` room without going
        // through the lobby (e.g. tests).
        RoomConfig::default()
    }

    fn config_for_tag(tag: ModeTag) -> (Self::Config, RoomConfig) {
        default_config_for(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_dispatches_to_the_tagged_mode() {
        let players = vec![PlayerId(1), PlayerId(2)];
        let (config, _) = default_config_for(ModeTag::Smash);
        let state = AnyMode::init(&config, &players);
        assert!(matches!(state, AnyState::Smash(_)));
    }

    #[test]
    fn test_mismatched_message_is_silently_dropped() {
        let players = vec![PlayerId(1), PlayerId(2)];
        let (config, _) = default_config_for(ModeTag::Arena);
        let mut state = AnyMode::init(&config, &players);
        let wrong = AnyClientMessage::Race(RaceClientMessage::Tap(crate::race::Side::Left));
        let events = AnyMode::handle_message(&mut state, PlayerId(1), wrong);
        assert!(events.is_empty());
    }
}
