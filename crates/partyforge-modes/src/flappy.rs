//! Independent-bird survival mode (spec §4.5.3). Each player flies their
//! own bird against the same procedurally generated obstacle sequence.

use std::collections::HashMap;
use std::time::Duration;

use partyforge_protocol::{PlayerId, Recipient};
use partyforge_room::{GameLogic, RoomConfig, RoundOutcome};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Fixed so every room's birds see the identical obstacle sequence, and a
/// replayed tick stream reproduces the same run.
const OBSTACLE_SEED: u64 = 0x46_4c_41_50; // "FLAP"

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlappyConfig {
    pub gravity: f32,
    pub tap_impulse: f32,
    pub scroll_speed: f32,
    pub obstacle_spacing: f32,
    pub gap_height: f32,
    pub bird_radius: f32,
    pub world_height: f32,
}

impl Default for FlappyConfig {
    fn default() -> Self {
        Self {
            gravity: 20.0,
            tap_impulse: 6.0,
            scroll_speed: 3.0,
            obstacle_spacing: 6.0,
            gap_height: 3.5,
            bird_radius: 0.3,
            world_height: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obstacle {
    pub x: f32,
    pub gap_center_y: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bird {
    pub id: PlayerId,
    pub y: f32,
    pub vertical_velocity: f32,
    pub distance: f32,
    pub alive: bool,
    pub connected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlappyState {
    pub birds: HashMap<PlayerId, Bird>,
    pub obstacles: Vec<Obstacle>,
    pub next_obstacle_x: f32,
    pub scrolled: f32,
    pub game_over: bool,
    pub winner: Option<PlayerId>,
    pub config: FlappyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FlappyClientMessage {
    Tap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BirdView {
    pub id: PlayerId,
    pub y: f32,
    pub distance: f32,
    pub alive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FlappyServerMessage {
    State { birds: Vec<BirdView>, obstacles: Vec<Obstacle> },
    BirdDied { player_id: PlayerId, distance: f32 },
    GameOver { winner: Option<PlayerId> },
}

pub struct Flappy;

impl GameLogic for Flappy {
    type Config = FlappyConfig;
    type State = FlappyState;
    type ClientMessage = FlappyClientMessage;
    type ServerMessage = FlappyServerMessage;

    fn init(config: &Self::Config, players: &[PlayerId]) -> Self::State {
        let birds = players
            .iter()
            .map(|id| {
                (
                    *id,
                    Bird {
                        id: *id,
                        y: config.world_height / 2.0,
                        vertical_velocity: 0.0,
                        distance: 0.0,
                        alive: true,
                        connected: true,
                    },
                )
            })
            .collect();

        let mut rng = StdRng::seed_from_u64(OBSTACLE_SEED);
        let mut obstacles = Vec::new();
        let mut x = 8.0;
        for _ in 0..8 {
            let margin = config.gap_height / 2.0 + 1.0;
            let gap_center_y = rng.random_range(margin..(config.world_height - margin));
            obstacles.push(Obstacle { x, gap_center_y });
            x += config.obstacle_spacing;
        }

        FlappyState {
            birds,
            obstacles,
            next_obstacle_x: x,
            scrolled: 0.0,
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
        let FlappyClientMessage::Tap = msg;
        let config = state.config.clone();
        if let Some(bird) = state.birds.get_mut(&sender) {
            if bird.alive {
                bird.vertical_velocity = config.tap_impulse;
            }
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

        state.scrolled += config.scroll_speed * dt_secs;
        extend_obstacles(state, &config);

        let obstacles = state.obstacles.clone();
        let scrolled = state.scrolled;
        for bird in state.birds.values_mut() {
            if !bird.alive {
                continue;
            }
            bird.vertical_velocity -= config.gravity * dt_secs;
            bird.y += bird.vertical_velocity * dt_secs;
            bird.distance += config.scroll_speed * dt_secs;

            let bird_x = scrolled;
            let hit_wall = bird.y - config.bird_radius <= 0.0
                || bird.y + config.bird_radius >= config.world_height;
            let hit_obstacle = obstacles.iter().any(|o| {
                (o.x - bird_x).abs() < config.bird_radius + 0.3
                    && (bird.y - o.gap_center_y).abs() > config.gap_height / 2.0
            });
            if hit_wall || hit_obstacle {
                bird.alive = false;
            }
        }

        let died: Vec<(PlayerId, f32)> = state
            .birds
            .values()
            .filter(|b| !b.alive)
            .map(|b| (b.id, b.distance))
            .collect();
        for (id, distance) in &died {
            events.push((
                Recipient::All,
                FlappyServerMessage::BirdDied {
                    player_id: *id,
                    distance: *distance,
                },
            ));
        }

        let alive_count = state.birds.values().filter(|b| b.alive).count();
        if alive_count <= 1 && !state.game_over {
            state.game_over = true;
            state.winner = state.birds.values().find(|b| b.alive).map(|b| b.id);
            events.push((
                Recipient::All,
                FlappyServerMessage::GameOver { winner: state.winner },
            ));
        }

        events.push((
            Recipient::All,
            FlappyServerMessage::State {
                birds: state.birds.values().map(|b| BirdView {
                    id: b.id,
                    y: b.y,
                    distance: b.distance,
                    alive: b.alive,
                }).collect(),
                obstacles: state.obstacles.clone(),
            },
        ));
        events
    }

    fn on_player_disconnect(
        state: &mut Self::State,
        player: PlayerId,
    ) -> Vec<(Recipient, Self::ServerMessage)> {
        if let Some(b) = state.birds.get_mut(&player) {
            b.connected = false;
            b.alive = false;
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
            min_players: 1,
            max_players: 8,
            ..RoomConfig::default()
        }
    }
}

fn extend_obstacles(state: &mut FlappyState, config: &FlappyConfig) {
    let mut rng = StdRng::seed_from_u64(OBSTACLE_SEED ^ state.obstacles.len() as u64);
    while state.next_obstacle_x < state.scrolled + 40.0 {
        let margin = config.gap_height / 2.0 + 1.0;
        let gap_center_y = rng.random_range(margin..(config.world_height - margin));
        state.obstacles.push(Obstacle {
            x: state.next_obstacle_x,
            gap_center_y,
        });
        state.next_obstacle_x += config.obstacle_spacing;
    }
    state.obstacles.retain(|o| o.x > state.scrolled - 5.0);
}
