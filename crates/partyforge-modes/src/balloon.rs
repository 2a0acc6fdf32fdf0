//! Balloon inflate (spec §4.5.6): inflate against a hidden randomized burst
//! threshold; passive deflation keeps players from just camping.

use std::collections::HashMap;
use std::time::Duration;

use partyforge_protocol::{PlayerId, Recipient};
use partyforge_room::{GameLogic, RoomConfig, RoundOutcome};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalloonConfig {
    pub inflate_amount: f32,
    pub inflate_cooldown_secs: f32,
    pub deflate_per_sec: f32,
    pub burst_threshold_min: f32,
    pub burst_threshold_max: f32,
    pub round_duration_secs: f32,
}

impl Default for BalloonConfig {
    fn default() -> Self {
        Self {
            inflate_amount: 8.0,
            inflate_cooldown_secs: 0.4,
            deflate_per_sec: 1.5,
            burst_threshold_min: 70.0,
            burst_threshold_max: 100.0,
            round_duration_secs: 45.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balloon {
    pub id: PlayerId,
    pub size: f32,
    pub burst_threshold: f32,
    pub cooldown: f32,
    pub burst: bool,
    pub connected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalloonState {
    pub balloons: HashMap<PlayerId, Balloon>,
    pub elapsed: f32,
    pub duration: f32,
    pub game_over: bool,
    pub winner: Option<PlayerId>,
    pub config: BalloonConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BalloonClientMessage {
    Inflate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalloonView {
    pub id: PlayerId,
    pub size: f32,
    pub burst: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BalloonServerMessage {
    State { balloons: Vec<BalloonView> },
    Burst { player_id: PlayerId },
    GameOver { winner: Option<PlayerId> },
}

pub struct BalloonMode;

impl GameLogic for BalloonMode {
    type Config = BalloonConfig;
    type State = BalloonState;
    type ClientMessage = BalloonClientMessage;
    type ServerMessage = BalloonServerMessage;

    fn init(config: &Self::Config, players: &[PlayerId]) -> Self::State {
        let mut rng = StdRng::seed_from_u64(0xBA_11_00_01);
        let balloons = players
            .iter()
            .map(|id| {
                let threshold = rng.random_range(config.burst_threshold_min..config.burst_threshold_max);
                (
                    *id,
                    Balloon {
                        id: *id,
                        size: 0.0,
                        burst_threshold: threshold,
                        cooldown: 0.0,
                        burst: false,
                        connected: true,
                    },
                )
            })
            .collect();
        BalloonState {
            balloons,
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
        let BalloonClientMessage::Inflate = msg;

        let Some(b) = state.balloons.get_mut(&sender) else {
            return Vec::new();
        };
        if b.burst || b.cooldown > 0.0 {
            return Vec::new();
        }
        b.size += config.inflate_amount;
        b.cooldown = config.inflate_cooldown_secs;

        if b.size >= b.burst_threshold {
            b.burst = true;
            return vec![(Recipient::All, BalloonServerMessage::Burst { player_id: sender })];
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
        for b in state.balloons.values_mut() {
            if b.cooldown > 0.0 {
                b.cooldown = (b.cooldown - dt_secs).max(0.0);
            }
            if !b.burst {
                b.size = (b.size - config.deflate_per_sec * dt_secs).max(0.0);
            }
        }

        if state.elapsed >= state.duration && !state.game_over {
            state.game_over = true;
            state.winner = state
                .balloons
                .values()
                .filter(|b| !b.burst)
                .max_by(|a, b| a.size.total_cmp(&b.size))
                .map(|b| b.id);
            events.push((
                Recipient::All,
                BalloonServerMessage::GameOver { winner: state.winner },
            ));
        }

        events.push((
            Recipient::All,
            BalloonServerMessage::State {
                balloons: state
                    .balloons
                    .values()
                    .map(|b| BalloonView {
                        id: b.id,
                        size: b.size,
                        burst: b.burst,
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
        if let Some(b) = state.balloons.get_mut(&player) {
            b.connected = false;
            b.burst = true;
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

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(n: usize) -> BalloonState {
        let config = BalloonConfig::default();
        let players: Vec<PlayerId> = (1..=n as u64).map(PlayerId).collect();
        BalloonMode::init(&config, &players)
    }

    #[test]
    fn test_burst_thresholds_are_randomized_within_range() {
        let state = setup(4);
        let config = BalloonConfig::default();
        for b in state.balloons.values() {
            assert!(b.burst_threshold >= config.burst_threshold_min);
            assert!(b.burst_threshold <= config.burst_threshold_max);
        }
    }

    #[test]
    fn test_inflate_is_cooldown_limited() {
        let mut state = setup(1);
        let p1 = PlayerId(1);
        BalloonMode::handle_message(&mut state, p1, BalloonClientMessage::Inflate);
        let after_first = state.balloons[&p1].size;
        BalloonMode::handle_message(&mut state, p1, BalloonClientMessage::Inflate);
        assert_eq!(state.balloons[&p1].size, after_first);
    }

    #[test]
    fn test_exceeding_threshold_bursts_and_disqualifies() {
        let mut state = setup(1);
        let p1 = PlayerId(1);
        state.balloons.get_mut(&p1).unwrap().burst_threshold = 5.0;
        let events = BalloonMode::handle_message(&mut state, p1, BalloonClientMessage::Inflate);
        assert!(matches!(events[0].1, BalloonServerMessage::Burst { player_id } if player_id == p1));
        assert!(state.balloons[&p1].burst);
    }
}
