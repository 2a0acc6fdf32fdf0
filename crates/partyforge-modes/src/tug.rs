//! Tug-of-war (spec §4.5.5): two teams, a rhythmic pulse, and timing-based
//! pull quality.

use std::collections::HashMap;
use std::time::Duration;

use partyforge_protocol::{PlayerId, Recipient};
use partyforge_room::{GameLogic, RoomConfig, RoundOutcome};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Team {
    Left,
    Right,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TugConfig {
    pub pulse_interval_secs: f32,
    pub perfect_window_secs: f32,
    pub good_window_secs: f32,
    pub perfect_pull: f32,
    pub good_pull: f32,
    pub miss_pull: f32,
    pub stamina_cost: f32,
    pub stamina_regen_per_sec: f32,
    pub max_stamina: f32,
    pub victory_threshold: f32,
    pub round_duration_secs: f32,
}

impl Default for TugConfig {
    fn default() -> Self {
        Self {
            pulse_interval_secs: 1.2,
            perfect_window_secs: 0.12,
            good_window_secs: 0.3,
            perfect_pull: 3.0,
            good_pull: 1.5,
            miss_pull: 0.0,
            stamina_cost: 15.0,
            stamina_regen_per_sec: 10.0,
            max_stamina: 100.0,
            victory_threshold: 20.0,
            round_duration_secs: 60.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PullQuality {
    Perfect,
    Good,
    Miss,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TugPlayer {
    pub id: PlayerId,
    pub team: Team,
    pub stamina: f32,
    pub connected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TugState {
    pub players: HashMap<PlayerId, TugPlayer>,
    pub rope_offset: f32,
    pub time_since_pulse: f32,
    pub elapsed: f32,
    pub game_over: bool,
    pub winning_team: Option<Team>,
    pub config: TugConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TugClientMessage {
    Pull,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TugServerMessage {
    Pulse,
    PullResult { player_id: PlayerId, quality: PullQuality, rope_offset: f32 },
    State { rope_offset: f32 },
    GameOver { winning_team: Option<Team> },
}

pub struct Tug;

impl GameLogic for Tug {
    type Config = TugConfig;
    type State = TugState;
    type ClientMessage = TugClientMessage;
    type ServerMessage = TugServerMessage;

    fn init(config: &Self::Config, players: &[PlayerId]) -> Self::State {
        let players_map = players
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let team = if i % 2 == 0 { Team::Left } else { Team::Right };
                (
                    *id,
                    TugPlayer {
                        id: *id,
                        team,
                        stamina: config.max_stamina,
                        connected: true,
                    },
                )
            })
            .collect();
        TugState {
            players: players_map,
            rope_offset: 0.0,
            time_since_pulse: 0.0,
            elapsed: 0.0,
            game_over: false,
            winning_team: None,
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
        let TugClientMessage::Pull = msg;

        let Some(player) = state.players.get(&sender) else {
            return Vec::new();
        };
        if player.stamina < config.stamina_cost {
            return Vec::new();
        }
        let team = player.team;

        let phase_offset = (state.time_since_pulse - config.pulse_interval_secs).abs();
        let quality = if phase_offset <= config.perfect_window_secs {
            PullQuality::Perfect
        } else if phase_offset <= config.good_window_secs {
            PullQuality::Good
        } else {
            PullQuality::Miss
        };
        let pull = match quality {
            PullQuality::Perfect => config.perfect_pull,
            PullQuality::Good => config.good_pull,
            PullQuality::Miss => config.miss_pull,
        };

        if let Some(player) = state.players.get_mut(&sender) {
            player.stamina -= config.stamina_cost;
        }

        let signed_pull = match team {
            Team::Left => -pull,
            Team::Right => pull,
        };
        state.rope_offset = (state.rope_offset + signed_pull)
            .clamp(-config.victory_threshold, config.victory_threshold);

        vec![(
            Recipient::All,
            TugServerMessage::PullResult {
                player_id: sender,
                quality,
                rope_offset: state.rope_offset,
            },
        )]
    }

    fn tick(state: &mut Self::State, dt: Duration) -> Vec<(Recipient, Self::ServerMessage)> {
        if state.game_over {
            return Vec::new();
        }
        let config = state.config.clone();
        let dt_secs = dt.as_secs_f32();
        let mut events = Vec::new();

        state.elapsed += dt_secs;
        state.time_since_pulse += dt_secs;
        if state.time_since_pulse >= config.pulse_interval_secs {
            state.time_since_pulse = 0.0;
            events.push((Recipient::All, TugServerMessage::Pulse));
        }

        for p in state.players.values_mut() {
            p.stamina = (p.stamina + config.stamina_regen_per_sec * dt_secs).min(config.max_stamina);
        }

        if state.rope_offset.abs() >= config.victory_threshold {
            state.game_over = true;
            state.winning_team = Some(if state.rope_offset > 0.0 { Team::Right } else { Team::Left });
        } else if state.elapsed >= config.round_duration_secs {
            state.game_over = true;
            state.winning_team = Some(if state.rope_offset >= 0.0 { Team::Right } else { Team::Left });
        }
        if state.game_over {
            events.push((
                Recipient::All,
                TugServerMessage::GameOver {
                    winning_team: state.winning_team,
                },
            ));
        }

        events.push((
            Recipient::All,
            TugServerMessage::State {
                rope_offset: state.rope_offset,
            },
        ));
        events
    }

    fn on_player_disconnect(
        state: &mut Self::State,
        player: PlayerId,
    ) -> Vec<(Recipient, Self::ServerMessage)> {
        if let Some(p) = state.players.get_mut(&player) {
            p.connected = false;
        }
        Vec::new()
    }

    fn round_outcome(state: &Self::State) -> Option<RoundOutcome> {
        if !state.game_over {
            return None;
        }
        // Tug-of-war crowns a team, not an individual — the Tournament
        // Controller still wants a representative winner id for scoring,
        // so pick any connected member of the winning team (falling back
        // to any member at all if none are still connected).
        let winner_id = state.winning_team.and_then(|team| {
            state
                .players
                .values()
                .find(|p| p.team == team && p.connected)
                .or_else(|| state.players.values().find(|p| p.team == team))
                .map(|p| p.id)
        });
        Some(RoundOutcome {
            winner_id,
            winner_name: None,
        })
    }

    fn is_state_input(_msg: &Self::ClientMessage) -> bool {
        false
    }

    fn room_config() -> RoomConfig {
        RoomConfig {
            min_players: 2,
            max_players: 8,
            ..RoomConfig::default()
        }
    }
}
