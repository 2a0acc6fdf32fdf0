//! Territory painting (spec §4.5.7, §9): a shared 60x60 grid broadcast as a
//! raw binary frame rather than JSON.

use std::time::Duration;

use partyforge_protocol::{PlayerId, Recipient};
use partyforge_room::{GameLogic, RoomConfig, RoundOutcome};
use serde::{Deserialize, Serialize};

use crate::common::{InputVector, Vec2};

pub const GRID_SIZE: usize = 60;
const CELL_SIZE: f32 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaintConfig {
    pub move_speed: f32,
    pub round_duration_secs: f32,
}

impl Default for PaintConfig {
    fn default() -> Self {
        Self {
            move_speed: 3.0,
            round_duration_secs: 60.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Painter {
    pub id: PlayerId,
    pub number: i8,
    pub position: Vec2,
    pub connected: bool,
}

/// Dense 60x60 grid, -1 unowned else the owning painter's 1-indexed number
/// (spec §3 Grid). Kept flat for a cheap, contiguous binary payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaintState {
    pub painters: Vec<Painter>,
    pub grid: Vec<i8>,
    pub elapsed: f32,
    pub duration: f32,
    pub game_over: bool,
    pub winner: Option<PlayerId>,
    pub config: PaintConfig,
}

impl PaintState {
    fn cell_index(x: usize, y: usize) -> usize {
        y * GRID_SIZE + x
    }

    fn world_to_cell(position: Vec2) -> Option<(usize, usize)> {
        let half = GRID_SIZE as f32 * CELL_SIZE / 2.0;
        let gx = ((position.x + half) / CELL_SIZE).floor();
        let gy = ((position.y + half) / CELL_SIZE).floor();
        if gx < 0.0 || gy < 0.0 || gx as usize >= GRID_SIZE || gy as usize >= GRID_SIZE {
            return None;
        }
        Some((gx as usize, gy as usize))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PaintClientMessage {
    Input(InputVector),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaintShare {
    pub player_id: PlayerId,
    pub percent: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PaintServerMessage {
    Shares { shares: Vec<PaintShare> },
    GameOver { winner: Option<PlayerId> },
}

pub struct Paint;

impl GameLogic for Paint {
    type Config = PaintConfig;
    type State = PaintState;
    type ClientMessage = PaintClientMessage;
    type ServerMessage = PaintServerMessage;

    fn init(config: &Self::Config, players: &[PlayerId]) -> Self::State {
        let n = players.len().max(1) as f32;
        let half = GRID_SIZE as f32 * CELL_SIZE / 2.0;
        let radius = half * 0.6;
        let painters = players
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let angle = (i as f32 / n) * std::f32::consts::TAU;
                Painter {
                    id: *id,
                    number: (i + 1) as i8,
                    position: Vec2::from_angle(angle).scale(radius),
                    connected: true,
                }
            })
            .collect();
        PaintState {
            painters,
            grid: vec![-1; GRID_SIZE * GRID_SIZE],
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
        let PaintClientMessage::Input(input) = msg;
        if let Some(p) = state.painters.iter_mut().find(|p| p.id == sender) {
            let axis = input.movement_axis().normalized();
            let half = GRID_SIZE as f32 * CELL_SIZE / 2.0;
            p.position = p
                .position
                .add(axis.scale(config.move_speed * (1.0 / 60.0)));
            p.position.x = p.position.x.clamp(-half, half - 0.01);
            p.position.y = p.position.y.clamp(-half, half - 0.01);
        }
        Vec::new()
    }

    fn tick(state: &mut Self::State, _dt: Duration) -> Vec<(Recipient, Self::ServerMessage)> {
        if state.game_over {
            return Vec::new();
        }
        let dt_secs = 1.0 / 60.0;
        state.elapsed += dt_secs;

        for painter in state.painters.clone() {
            if !painter.connected {
                continue;
            }
            if let Some((x, y)) = PaintState::world_to_cell(painter.position) {
                let idx = PaintState::cell_index(x, y);
                state.grid[idx] = painter.number;
            }
        }

        let mut events = Vec::new();
        if state.elapsed >= state.duration && !state.game_over {
            state.game_over = true;
            let shares = paint_shares(state);
            state.winner = shares
                .iter()
                .max_by(|a, b| a.percent.total_cmp(&b.percent))
                .map(|s| s.player_id);
            events.push((Recipient::All, PaintServerMessage::Shares { shares }));
            events.push((
                Recipient::All,
                PaintServerMessage::GameOver { winner: state.winner },
            ));
        }
        events
    }

    fn on_player_disconnect(
        state: &mut Self::State,
        player: PlayerId,
    ) -> Vec<(Recipient, Self::ServerMessage)> {
        if let Some(p) = state.painters.iter_mut().find(|p| p.id == player) {
            p.connected = false;
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
        true
    }

    /// Paint's live grid is far too large to justify per-tick JSON —
    /// broadcast as a raw binary frame instead (spec §9).
    fn binary_snapshot(state: &Self::State) -> Option<Vec<u8>> {
        Some(state.grid.iter().map(|&c| c as u8).collect())
    }

    fn room_config() -> RoomConfig {
        RoomConfig {
            min_players: 2,
            max_players: 8,
            ..RoomConfig::default()
        }
    }
}

fn paint_shares(state: &PaintState) -> Vec<PaintShare> {
    let total = state.grid.len() as f32;
    state
        .painters
        .iter()
        .map(|p| {
            let owned = state.grid.iter().filter(|&&c| c == p.number).count() as f32;
            PaintShare {
                player_id: p.id,
                percent: owned / total * 100.0,
            }
        })
        .collect()
}
