//! Platform fighter (spec §4.5.1): stocks, percent damage, knockback that
//! scales with accumulated damage instead of Arena's flat knockback.

use std::collections::HashMap;
use std::time::Duration;

use partyforge_protocol::{PlayerId, Recipient};
use partyforge_room::{GameLogic, RoomConfig, RoundOutcome};
use serde::{Deserialize, Serialize};

use crate::common::{scaled_knockback, InputVector, Vec2};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmashConfig {
    pub stage_width: f32,
    pub kill_plane_y: f32,
    pub gravity: f32,
    pub move_speed: f32,
    pub jump_speed: f32,
    pub attack_damage: f32,
    pub attack_range: f32,
    pub attack_windup_ticks: u32,
    pub attack_active_ticks: u32,
    pub attack_recovery_ticks: u32,
    pub knockback_base: f32,
    pub knockback_damage_scale: f32,
    /// Damage and knockback multiplier applied to a hit landed on a
    /// blocking fighter (spec §4.5.1/§6 `player-block`).
    pub block_factor: f32,
    pub starting_stocks: u32,
    pub respawn_delay_secs: f32,
    pub platform_y: f32,
    pub platform_half_width: f32,
    pub platform_offsets: [f32; 3],
}

impl Default for SmashConfig {
    fn default() -> Self {
        Self {
            stage_width: 20.0,
            kill_plane_y: -10.0,
            gravity: 18.0,
            move_speed: 5.0,
            jump_speed: 8.0,
            attack_damage: 8.0,
            attack_range: 1.5,
            attack_windup_ticks: 4,
            attack_active_ticks: 3,
            attack_recovery_ticks: 8,
            knockback_base: 2.0,
            knockback_damage_scale: 0.02,
            block_factor: 0.3,
            starting_stocks: 3,
            respawn_delay_secs: 1.0,
            platform_y: -3.0,
            platform_half_width: 2.0,
            platform_offsets: [-6.0, 0.0, 6.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SmashAttackPhase {
    Windup,
    Active,
    Recovery,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FighterPhase {
    Grounded,
    Airborne,
    Attacking { phase: SmashAttackPhase, frame: u32, strike_id: u64 },
    Blocking,
    Respawning { timer: f32 },
    Out,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmashFighter {
    pub id: PlayerId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub facing_right: bool,
    pub damage_percent: f32,
    pub stocks: u32,
    pub phase: FighterPhase,
    pub hit_targets: std::collections::HashSet<PlayerId>,
    pub input: InputVector,
    pub connected: bool,
}

impl SmashFighter {
    fn new(id: PlayerId, position: Vec2, config: &SmashConfig) -> Self {
        Self {
            id,
            position,
            velocity: Vec2::ZERO,
            facing_right: true,
            damage_percent: 0.0,
            stocks: config.starting_stocks,
            phase: FighterPhase::Airborne,
            hit_targets: std::collections::HashSet::new(),
            input: InputVector::default(),
            connected: true,
        }
    }

    fn is_alive(&self) -> bool {
        self.stocks > 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmashState {
    pub fighters: HashMap<PlayerId, SmashFighter>,
    pub next_strike_id: u64,
    pub winner: Option<PlayerId>,
    pub game_over: bool,
    pub config: SmashConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SmashClientMessage {
    Input(InputVector),
    Attack,
    Block(bool),
    Taunt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmashFighterView {
    pub id: PlayerId,
    pub position: Vec2,
    pub facing_right: bool,
    pub damage_percent: f32,
    pub stocks: u32,
    pub is_out: bool,
    pub is_blocking: bool,
}

impl From<&SmashFighter> for SmashFighterView {
    fn from(f: &SmashFighter) -> Self {
        Self {
            id: f.id,
            position: f.position,
            facing_right: f.facing_right,
            damage_percent: f.damage_percent,
            stocks: f.stocks,
            is_out: !f.is_alive(),
            is_blocking: matches!(f.phase, FighterPhase::Blocking),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SmashServerMessage {
    State { fighters: Vec<SmashFighterView> },
    AttackStarted { attacker_id: PlayerId },
    AttackHit { attacker_id: PlayerId, target_id: PlayerId, damage_percent: f32 },
    BlockState { player_id: PlayerId, is_blocking: bool },
    PlayerKo { player_id: PlayerId, stocks_remaining: u32 },
    PlayerTaunt { player_id: PlayerId },
    GameOver { winner: Option<PlayerId> },
}

pub struct Smash;

impl GameLogic for Smash {
    type Config = SmashConfig;
    type State = SmashState;
    type ClientMessage = SmashClientMessage;
    type ServerMessage = SmashServerMessage;

    fn init(config: &Self::Config, players: &[PlayerId]) -> Self::State {
        let mut fighters = HashMap::new();
        let n = players.len().max(1) as f32;
        let spacing = config.stage_width / (n + 1.0);
        for (i, id) in players.iter().enumerate() {
            let x = -config.stage_width / 2.0 + spacing * (i as f32 + 1.0);
            fighters.insert(*id, SmashFighter::new(*id, Vec2::new(x, 2.0), config));
        }
        SmashState {
            fighters,
            next_strike_id: 1,
            winner: None,
            game_over: false,
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
        match msg {
            SmashClientMessage::Input(input) => {
                if let Some(f) = state.fighters.get_mut(&sender) {
                    if matches!(f.phase, FighterPhase::Grounded | FighterPhase::Airborne) {
                        f.input = input;
                        if input.left {
                            f.facing_right = false;
                        } else if input.right {
                            f.facing_right = true;
                        }
                    }
                }
                Vec::new()
            }
            SmashClientMessage::Attack => {
                let strike_id = state.next_strike_id;
                let Some(f) = state.fighters.get_mut(&sender) else {
                    return Vec::new();
                };
                if !matches!(f.phase, FighterPhase::Grounded | FighterPhase::Airborne) {
                    return Vec::new();
                }
                f.phase = FighterPhase::Attacking {
                    phase: SmashAttackPhase::Windup,
                    frame: 0,
                    strike_id,
                };
                f.hit_targets.clear();
                state.next_strike_id += 1;
                vec![(Recipient::All, SmashServerMessage::AttackStarted { attacker_id: sender })]
            }
            SmashClientMessage::Block(pressed) => handle_smash_block(state, sender, pressed),
            SmashClientMessage::Taunt => {
                if state.fighters.contains_key(&sender) {
                    vec![(Recipient::All, SmashServerMessage::PlayerTaunt { player_id: sender })]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn tick(state: &mut Self::State, dt: Duration) -> Vec<(Recipient, Self::ServerMessage)> {
        if state.game_over {
            return Vec::new();
        }
        let config = state.config.clone();
        let dt_secs = dt.as_secs_f32();
        let mut events = Vec::new();

        apply_smash_movement(state, &config, dt_secs);
        advance_smash_attacks(state, &config);
        events.extend(resolve_smash_combat(state, &config));
        apply_smash_gravity_and_platforms(state, &config, dt_secs);
        events.extend(resolve_smash_kos(state, &config));
        apply_smash_respawns(state, &config, dt_secs);

        let living: Vec<PlayerId> = state
            .fighters
            .values()
            .filter(|f| f.is_alive())
            .map(|f| f.id)
            .collect();
        if !state.game_over && living.len() <= 1 {
            state.game_over = true;
            state.winner = living.first().copied();
            events.push((
                Recipient::All,
                SmashServerMessage::GameOver { winner: state.winner },
            ));
        }

        events.push((
            Recipient::All,
            SmashServerMessage::State {
                fighters: state.fighters.values().map(SmashFighterView::from).collect(),
            },
        ));
        events
    }

    fn on_player_disconnect(
        state: &mut Self::State,
        player: PlayerId,
    ) -> Vec<(Recipient, Self::ServerMessage)> {
        let Some(f) = state.fighters.get_mut(&player) else {
            return Vec::new();
        };
        f.connected = false;
        f.stocks = 0;
        f.phase = FighterPhase::Out;
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

    fn is_state_input(msg: &Self::ClientMessage) -> bool {
        matches!(msg, SmashClientMessage::Input(_))
    }

    fn room_config() -> RoomConfig {
        RoomConfig {
            min_players: 2,
            max_players: 4,
            ..RoomConfig::default()
        }
    }
}

fn handle_smash_block(
    state: &mut SmashState,
    sender: PlayerId,
    pressed: bool,
) -> Vec<(Recipient, SmashServerMessage)> {
    let Some(f) = state.fighters.get_mut(&sender) else {
        return Vec::new();
    };
    if pressed {
        if !matches!(f.phase, FighterPhase::Grounded | FighterPhase::Airborne) {
            return Vec::new();
        }
        f.phase = FighterPhase::Blocking;
    } else {
        if !matches!(f.phase, FighterPhase::Blocking) {
            return Vec::new();
        }
        f.phase = FighterPhase::Airborne;
    }
    vec![(
        Recipient::All,
        SmashServerMessage::BlockState { player_id: sender, is_blocking: pressed },
    )]
}

fn apply_smash_movement(state: &mut SmashState, config: &SmashConfig, dt: f32) {
    for f in state.fighters.values_mut() {
        if !matches!(f.phase, FighterPhase::Grounded | FighterPhase::Airborne) {
            continue;
        }
        let axis = f.input.movement_axis();
        f.velocity.x = axis.x * config.move_speed;
        if f.input.jump && matches!(f.phase, FighterPhase::Grounded) {
            f.velocity.y = config.jump_speed;
            f.phase = FighterPhase::Airborne;
        }
        f.position = f.position.add(Vec2::new(f.velocity.x * dt, 0.0));
    }
}

fn advance_smash_attacks(state: &mut SmashState, config: &SmashConfig) {
    for f in state.fighters.values_mut() {
        let FighterPhase::Attacking { phase, frame, strike_id } = f.phase else {
            continue;
        };
        let next_frame = frame + 1;
        let new_phase = match phase {
            SmashAttackPhase::Windup if next_frame >= config.attack_windup_ticks => {
                SmashAttackPhase::Active
            }
            SmashAttackPhase::Active
                if next_frame >= config.attack_windup_ticks + config.attack_active_ticks =>
            {
                SmashAttackPhase::Recovery
            }
            SmashAttackPhase::Recovery
                if next_frame
                    >= config.attack_windup_ticks
                        + config.attack_active_ticks
                        + config.attack_recovery_ticks =>
            {
                f.phase = FighterPhase::Airborne;
                continue;
            }
            other => other,
        };
        f.phase = FighterPhase::Attacking {
            phase: new_phase,
            frame: next_frame,
            strike_id,
        };
    }
}

fn resolve_smash_combat(
    state: &mut SmashState,
    config: &SmashConfig,
) -> Vec<(Recipient, SmashServerMessage)> {
    let snapshot: Vec<(PlayerId, Vec2, bool)> = state
        .fighters
        .values()
        .filter_map(|f| match f.phase {
            FighterPhase::Attacking { phase: SmashAttackPhase::Active, .. } => {
                Some((f.id, f.position, f.facing_right))
            }
            _ => None,
        })
        .collect();

    let mut events = Vec::new();
    for (attacker_id, attacker_pos, facing_right) in snapshot {
        let reach = if facing_right {
            Vec2::new(config.attack_range, 0.0)
        } else {
            Vec2::new(-config.attack_range, 0.0)
        };
        let hitbox_center = attacker_pos.add(reach.scale(0.5));

        let target_ids: Vec<PlayerId> = state
            .fighters
            .values()
            .filter(|f| f.id != attacker_id && f.is_alive() && !matches!(f.phase, FighterPhase::Respawning { .. } | FighterPhase::Out))
            .filter(|f| f.position.distance(hitbox_center) <= config.attack_range)
            .map(|f| f.id)
            .collect();

        for target_id in target_ids {
            let already_hit = state
                .fighters
                .get(&attacker_id)
                .map(|a| a.hit_targets.contains(&target_id))
                .unwrap_or(true);
            if already_hit {
                continue;
            }
            if let Some(a) = state.fighters.get_mut(&attacker_id) {
                a.hit_targets.insert(target_id);
            }
            let Some(target) = state.fighters.get_mut(&target_id) else {
                continue;
            };
            let is_blocking = matches!(target.phase, FighterPhase::Blocking);
            let damage = if is_blocking {
                config.attack_damage * config.block_factor
            } else {
                config.attack_damage
            };
            target.damage_percent += damage;
            let base = Vec2::new(if facing_right { 1.0 } else { -1.0 }, 0.4)
                .normalized()
                .scale(if is_blocking {
                    config.knockback_base * config.block_factor
                } else {
                    config.knockback_base
                });
            let knockback = scaled_knockback(base, target.damage_percent, config.knockback_damage_scale);
            target.velocity = target.velocity.add(knockback);
            if !is_blocking {
                target.phase = FighterPhase::Airborne;
            }

            events.push((
                Recipient::All,
                SmashServerMessage::AttackHit {
                    attacker_id,
                    target_id,
                    damage_percent: target.damage_percent,
                },
            ));
        }
    }
    events
}

fn apply_smash_gravity_and_platforms(state: &mut SmashState, config: &SmashConfig, dt: f32) {
    for f in state.fighters.values_mut() {
        if matches!(f.phase, FighterPhase::Respawning { .. } | FighterPhase::Out) {
            continue;
        }
        f.velocity.y -= config.gravity * dt;
        f.position = f.position.add(Vec2::new(0.0, f.velocity.y * dt));

        let mut landed = false;
        if f.velocity.y <= 0.0 {
            for offset in config.platform_offsets {
                let dx = (f.position.x - offset).abs();
                if dx <= config.platform_half_width
                    && f.position.y <= config.platform_y
                    && f.position.y >= config.platform_y - 0.5
                {
                    f.position.y = config.platform_y;
                    landed = true;
                    break;
                }
            }
        }
        if landed {
            f.velocity.y = 0.0;
            if !matches!(f.phase, FighterPhase::Attacking { .. } | FighterPhase::Blocking) {
                f.phase = FighterPhase::Grounded;
            }
        } else if matches!(f.phase, FighterPhase::Grounded) {
            f.phase = FighterPhase::Airborne;
        }
    }
}

fn resolve_smash_kos(
    state: &mut SmashState,
    config: &SmashConfig,
) -> Vec<(Recipient, SmashServerMessage)> {
    let offenders: Vec<PlayerId> = state
        .fighters
        .values()
        .filter(|f| {
            f.is_alive()
                && !matches!(f.phase, FighterPhase::Respawning { .. } | FighterPhase::Out)
                && (f.position.y < config.kill_plane_y || f.position.x.abs() > config.stage_width)
        })
        .map(|f| f.id)
        .collect();

    let mut events = Vec::new();
    for id in offenders {
        if let Some(f) = state.fighters.get_mut(&id) {
            f.stocks = f.stocks.saturating_sub(1);
            f.damage_percent = 0.0;
            if f.stocks == 0 {
                f.phase = FighterPhase::Out;
            } else {
                f.phase = FighterPhase::Respawning {
                    timer: config.respawn_delay_secs,
                };
            }
            events.push((
                Recipient::All,
                SmashServerMessage::PlayerKo {
                    player_id: id,
                    stocks_remaining: f.stocks,
                },
            ));
        }
    }
    events
}

fn apply_smash_respawns(state: &mut SmashState, config: &SmashConfig, dt: f32) {
    for f in state.fighters.values_mut() {
        if let FighterPhase::Respawning { timer } = f.phase {
            let remaining = timer - dt;
            if remaining <= 0.0 {
                f.position = Vec2::new(0.0, 2.0);
                f.velocity = Vec2::ZERO;
                f.phase = FighterPhase::Airborne;
            } else {
                f.phase = FighterPhase::Respawning { timer: remaining };
            }
        }
    }
    let _ = config;
}
