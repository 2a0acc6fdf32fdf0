//! Alternating-tap footrace (spec §4.5.2).

use std::collections::HashMap;
use std::time::Duration;

use partyforge_protocol::{PlayerId, Recipient};
use partyforge_room::{GameLogic, RoomConfig, RoundOutcome};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceConfig {
    pub finish_distance: f32,
    pub tap_boost: f32,
    pub same_side_penalty: f32,
    pub decay_per_sec: f32,
    pub countdown_secs: f32,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            finish_distance: 100.0,
            tap_boost: 4.0,
            same_side_penalty: 0.3,
            decay_per_sec: 2.0,
            countdown_secs: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Racer {
    pub id: PlayerId,
    pub distance: f32,
    pub speed: f32,
    pub last_tap: Option<Side>,
    pub finished: bool,
    pub finish_order: Option<u32>,
    pub connected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceState {
    pub racers: HashMap<PlayerId, Racer>,
    pub countdown: f32,
    pub started: bool,
    pub next_finish_order: u32,
    pub game_over: bool,
    pub winner: Option<PlayerId>,
    pub config: RaceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RaceClientMessage {
    Tap(Side),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceRankingEntry {
    pub player_id: PlayerId,
    pub finish_order: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RaceServerMessage {
    Countdown { seconds_remaining: u32 },
    Start,
    Progress { player_id: PlayerId, distance: f32 },
    Finish { player_id: PlayerId, finish_order: u32 },
    Winner { ranking: Vec<RaceRankingEntry> },
}

pub struct Race;

impl GameLogic for Race {
    type Config = RaceConfig;
    type State = RaceState;
    type ClientMessage = RaceClientMessage;
    type ServerMessage = RaceServerMessage;

    fn init(config: &Self::Config, players: &[PlayerId]) -> Self::State {
        let racers = players
            .iter()
            .map(|id| {
                (
                    *id,
                    Racer {
                        id: *id,
                        distance: 0.0,
                        speed: 0.0,
                        last_tap: None,
                        finished: false,
                        finish_order: None,
                        connected: true,
                    },
                )
            })
            .collect();
        RaceState {
            racers,
            countdown: config.countdown_secs,
            started: false,
            next_finish_order: 1,
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
        if !state.started || state.game_over {
            return Vec::new();
        }
        let config = state.config.clone();
        let RaceClientMessage::Tap(side) = msg;
        let Some(racer) = state.racers.get_mut(&sender) else {
            return Vec::new();
        };
        if racer.finished {
            return Vec::new();
        }
        let boost = if racer.last_tap == Some(side) {
            config.tap_boost * (1.0 - config.same_side_penalty)
        } else {
            config.tap_boost
        };
        racer.speed += boost;
        racer.last_tap = Some(side);
        Vec::new()
    }

    fn tick(state: &mut Self::State, dt: Duration) -> Vec<(Recipient, Self::ServerMessage)> {
        let config = state.config.clone();
        let dt_secs = dt.as_secs_f32();
        let mut events = Vec::new();

        if !state.started {
            state.countdown -= dt_secs;
            if state.countdown <= 0.0 {
                state.started = true;
                events.push((Recipient::All, RaceServerMessage::Start));
            } else {
                events.push((
                    Recipient::All,
                    RaceServerMessage::Countdown {
                        seconds_remaining: state.countdown.ceil().max(0.0) as u32,
                    },
                ));
            }
            return events;
        }

        if state.game_over {
            return events;
        }

        let finishers: Vec<PlayerId> = {
            for racer in state.racers.values_mut() {
                if racer.finished {
                    continue;
                }
                racer.speed = (racer.speed - config.decay_per_sec * dt_secs).max(0.0);
                racer.distance += racer.speed * dt_secs;
                events.push((
                    Recipient::All,
                    RaceServerMessage::Progress {
                        player_id: racer.id,
                        distance: racer.distance,
                    },
                ));
            }
            state
                .racers
                .values()
                .filter(|r| !r.finished && r.distance >= config.finish_distance)
                .map(|r| r.id)
                .collect()
        };

        for id in finishers {
            let order = state.next_finish_order;
            state.next_finish_order += 1;
            if let Some(r) = state.racers.get_mut(&id) {
                r.finished = true;
                r.finish_order = Some(order);
            }
            events.push((
                Recipient::All,
                RaceServerMessage::Finish {
                    player_id: id,
                    finish_order: order,
                },
            ));
        }

        if !state.game_over && state.racers.values().all(|r| r.finished || !r.connected) {
            state.game_over = true;
            let mut ranking: Vec<RaceRankingEntry> = state
                .racers
                .values()
                .filter_map(|r| {
                    r.finish_order.map(|order| RaceRankingEntry {
                        player_id: r.id,
                        finish_order: order,
                    })
                })
                .collect();
            ranking.sort_by_key(|e| e.finish_order);
            state.winner = ranking.first().map(|e| e.player_id);
            events.push((Recipient::All, RaceServerMessage::Winner { ranking }));
        }

        events
    }

    fn on_player_disconnect(
        state: &mut Self::State,
        player: PlayerId,
    ) -> Vec<(Recipient, Self::ServerMessage)> {
        if let Some(r) = state.racers.get_mut(&player) {
            r.connected = false;
        }
        Vec::new()
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
