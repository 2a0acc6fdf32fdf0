//! Tag, you're it (spec §4.5.4). One participant carries "it"; tagging
//! transfers it and accrues penalty time on the former holder.

use std::collections::HashMap;
use std::time::Duration;

use partyforge_protocol::{PlayerId, Recipient};
use partyforge_room::{GameLogic, RoomConfig, RoundOutcome};
use serde::{Deserialize, Serialize};

use crate::common::{InputVector, Vec2};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagConfig {
    pub move_speed: f32,
    pub tag_radius: f32,
    pub tag_immunity_secs: f32,
    pub round_duration_secs: f32,
    pub arena_half_size: f32,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            move_speed: 4.0,
            tag_radius: 0.8,
            tag_immunity_secs: 1.5,
            round_duration_secs: 90.0,
            arena_half_size: 8.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagPlayer {
    pub id: PlayerId,
    pub position: Vec2,
    pub is_it: bool,
    pub penalty_secs: f32,
    pub immunity_timer: f32,
    pub connected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagState {
    pub players: HashMap<PlayerId, TagPlayer>,
    pub elapsed: f32,
    pub duration: f32,
    pub game_over: bool,
    pub winner: Option<PlayerId>,
    pub config: TagConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TagClientMessage {
    Input(InputVector),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagPlayerView {
    pub id: PlayerId,
    pub position: Vec2,
    pub is_it: bool,
    pub penalty_secs: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TagServerMessage {
    State { players: Vec<TagPlayerView> },
    Tagged { new_it: PlayerId, former_it: PlayerId },
    GameOver { winner: Option<PlayerId> },
}

pub struct Tag;

impl GameLogic for Tag {
    type Config = TagConfig;
    type State = TagState;
    type ClientMessage = TagClientMessage;
    type ServerMessage = TagServerMessage;

    fn init(config: &Self::Config, players: &[PlayerId]) -> Self::State {
        let n = players.len().max(1) as f32;
        let radius = config.arena_half_size * 0.6;
        let map = players
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let angle = (i as f32 / n) * std::f32::consts::TAU;
                let position = Vec2::from_angle(angle).scale(radius);
                (
                    *id,
                    TagPlayer {
                        id: *id,
                        position,
                        is_it: i == 0,
                        penalty_secs: 0.0,
                        immunity_timer: 0.0,
                        connected: true,
                    },
                )
            })
            .collect();
        TagState {
            players: map,
            elapsed: 0.0,
            duration: config.round_duration_secs,
            game_over: false,
            winner: None,
            config: config.clone(),
        }
    }

    fn handle_message(
        state: &mut Self::State,
        sender: PlayerId,
        msg: Self::ClientMessage,
    ) -> Vec<(Recipient, Self::ServerMessage)> {
        if state.game_over {
            return Vec::new();
        }
        let config = state.config.clone();
        let TagClientMessage::Input(input) = msg;
        if let Some(p) = state.players.get_mut(&sender) {
            let axis = input.movement_axis().normalized();
            p.position = p.position.add(axis.scale(config.move_speed * (1.0 / 60.0)));
            p.position.x = p.position.x.clamp(-config.arena_half_size, config.arena_half_size);
            p.position.y = p.position.y.clamp(-config.arena_half_size, config.arena_half_size);
        }
        Vec::new()
    }

    fn tick(state: &mut Self::State, dt: Duration) -> Vec<(Recipient, Self::ServerMessage)> {
        if state.game_over {
            return Vec::new();
        }
        let config = state.config.clone();
        let dt_secs = dt.as_secs_f32();
        let mut events = Vec::new();

        state.elapsed += dt_secs;
        for p in state.players.values_mut() {
            if p.is_it {
                p.penalty_secs += dt_secs;
            }
            if p.immunity_timer > 0.0 {
                p.immunity_timer -= dt_secs;
            }
        }

        if let Some(it_id) = state.players.values().find(|p| p.is_it).map(|p| p.id) {
            let it_pos = state.players[&it_id].position;
            let it_immune = state.players[&it_id].immunity_timer > 0.0;
            if !it_immune {
                let target = state
                    .players
                    .values()
                    .find(|p| p.id != it_id && !p.is_it && p.position.distance(it_pos) <= config.tag_radius)
                    .map(|p| p.id);
                if let Some(target_id) = target {
                    if let Some(p) = state.players.get_mut(&it_id) {
                        p.is_it = false;
                        p.immunity_timer = config.tag_immunity_secs;
                    }
                    if let Some(p) = state.players.get_mut(&target_id) {
                        p.is_it = true;
                    }
                    events.push((
                        Recipient::All,
                        TagServerMessage::Tagged {
                            new_it: target_id,
                            former_it: it_id,
                        },
                    ));
                }
            }
        }

        if state.elapsed >= state.duration && !state.game_over {
            state.game_over = true;
            state.winner = state
                .players
                .values()
                .min_by(|a, b| a.penalty_secs.total_cmp(&b.penalty_secs))
                .map(|p| p.id);
            events.push((
                Recipient::All,
                TagServerMessage::GameOver { winner: state.winner },
            ));
        }

        events.push((
            Recipient::All,
            TagServerMessage::State {
                players: state
                    .players
                    .values()
                    .map(|p| TagPlayerView {
                        id: p.id,
                        position: p.position,
                        is_it: p.is_it,
                        penalty_secs: p.penalty_secs,
                    })
                    .collect(),
            },
        ));
        events
    }

    fn on_player_disconnect(
        state: &mut Self::State,
        player: PlayerId,
    ) -> Vec<(Recipient, Self::ServerMessage)> {
        let was_it = state.players.get(&player).map(|p| p.is_it).unwrap_or(false);
        if let Some(p) = state.players.get_mut(&player) {
            p.connected = false;
        }
        let mut events = Vec::new();
        if was_it {
            if let Some(next) = state.players.values_mut().find(|p| p.connected && p.id != player) {
                next.is_it = true;
                let next_id = next.id;
                if let Some(p) = state.players.get_mut(&player) {
                    p.is_it = false;
                }
                events.push((
                    Recipient::All,
                    TagServerMessage::Tagged {
                        new_it: next_id,
                        former_it: player,
                    },
                ));
            }
        }
        events
    }

    fn round_outcome(state: &Self::State) -> Option<RoundOutcome> {
        if !state.game_over {
            return None;
        }
        Some(RoundOutcome {
            winner_id: state.winner,
            winner_name: None,
        })
    }

    fn is_state_input(_msg: &Self::ClientMessage) -> bool {
        true
    }

    fn room_config() -> RoomConfig {
        RoomConfig {
            min_players: 2,
            max_players: 8,
            ..RoomConfig::default()
        }
    }
}
