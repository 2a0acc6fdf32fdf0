//! Wrestling arena (spec §4.4) — the hardest mode: combat, grab/throw,
//! ring-out, elimination.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use partyforge_protocol::{PlayerId, Recipient};
use partyforge_room::{GameLogic, RoomConfig, RoundOutcome};
use serde::{Deserialize, Serialize};

use crate::common::{InputVector, Vec2};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaConfig {
    pub ring_size: f32,
    pub rope_rim: f32,
    pub ring_out_margin: f32,
    pub collider_radius: f32,
    pub move_speed: f32,
    pub run_multiplier: f32,
    pub max_health: f32,
    pub max_stamina: f32,
    pub stamina_drain_per_sec: f32,
    pub stamina_regen_per_sec: f32,
    pub punch_damage: f32,
    pub kick_damage: f32,
    pub punch_windup_ticks: u32,
    pub punch_active_ticks: u32,
    pub punch_recovery_ticks: u32,
    pub kick_windup_ticks: u32,
    pub kick_active_ticks: u32,
    pub kick_recovery_ticks: u32,
    pub attack_range: f32,
    pub block_angle_tolerance_deg: f32,
    pub block_factor: f32,
    pub grab_range: f32,
    pub grab_timeout_secs: f32,
    pub escape_threshold: u32,
    pub stun_duration_secs: f32,
    pub rope_bounce: f32,
    pub ring_out_damage: f32,
    pub throw_speed: f32,
    pub throw_upward_speed: f32,
    pub throw_damage: f32,
    pub gravity: f32,
    pub knockback_base: f32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            ring_size: 10.0,
            rope_rim: 0.3,
            ring_out_margin: 1.5,
            collider_radius: 0.5,
            move_speed: 3.0,
            run_multiplier: 1.8,
            max_health: 100.0,
            max_stamina: 100.0,
            stamina_drain_per_sec: 40.0,
            stamina_regen_per_sec: 20.0,
            punch_damage: 10.0,
            kick_damage: 15.0,
            punch_windup_ticks: 6,
            punch_active_ticks: 3,
            punch_recovery_ticks: 9,
            kick_windup_ticks: 10,
            kick_active_ticks: 4,
            kick_recovery_ticks: 14,
            attack_range: 1.5,
            block_angle_tolerance_deg: 90.0,
            block_factor: 0.3,
            grab_range: 1.2,
            grab_timeout_secs: 3.0,
            escape_threshold: 3,
            stun_duration_secs: 2.0,
            rope_bounce: 0.5,
            ring_out_damage: 30.0,
            throw_speed: 6.0,
            throw_upward_speed: 4.0,
            throw_damage: 8.0,
            gravity: 9.8,
            knockback_base: 2.5,
        }
    }
}

// ---------------------------------------------------------------------------
// Fighter state machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackKind {
    Punch,
    Kick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackPhase {
    Windup,
    Active,
    Recovery,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FighterPhase {
    Idle,
    Moving,
    Attacking {
        kind: AttackKind,
        phase: AttackPhase,
        frame: u32,
        strike_id: u64,
    },
    Blocking,
    Grabbing,
    Grabbed,
    Stunned,
    Thrown,
    Eliminated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fighter {
    pub id: PlayerId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub elevation: f32,
    pub vertical_velocity: f32,
    pub facing_angle: f32,
    pub grounded: bool,
    pub health: f32,
    pub stamina: f32,
    pub phase: FighterPhase,
    pub grabbed_player_id: Option<PlayerId>,
    pub grabbed_by_id: Option<PlayerId>,
    pub grab_timer: f32,
    pub escape_presses: u32,
    pub stun_timer: f32,
    pub last_hit_by: Option<PlayerId>,
    pub input: InputVector,
    pub hit_targets: HashSet<PlayerId>,
    pub connected: bool,
}

impl Fighter {
    fn new(id: PlayerId, spawn: Vec2, facing_angle: f32, config: &ArenaConfig) -> Self {
        Self {
            id,
            position: spawn,
            velocity: Vec2::ZERO,
            elevation: 0.0,
            vertical_velocity: 0.0,
            facing_angle,
            grounded: true,
            health: 0.0,
            stamina: config.max_stamina,
            phase: FighterPhase::Idle,
            grabbed_player_id: None,
            grabbed_by_id: None,
            grab_timer: 0.0,
            escape_presses: 0,
            stun_timer: 0.0,
            last_hit_by: None,
            input: InputVector::default(),
            hit_targets: HashSet::new(),
            connected: true,
        }
    }

    fn is_eliminated(&self) -> bool {
        matches!(self.phase, FighterPhase::Eliminated)
    }

    fn is_attackable(&self) -> bool {
        !matches!(
            self.phase,
            FighterPhase::Eliminated | FighterPhase::Thrown
        )
    }

    fn can_act(&self) -> bool {
        matches!(self.phase, FighterPhase::Idle | FighterPhase::Moving)
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaState {
    pub fighters: HashMap<PlayerId, Fighter>,
    pub turn_order: Vec<PlayerId>,
    pub next_strike_id: u64,
    pub winner: Option<PlayerId>,
    pub game_over: bool,
    pub config: ArenaConfig,
}

impl ArenaState {
    fn living(&self) -> impl Iterator<Item = &Fighter> {
        self.fighters.values().filter(|f| !f.is_eliminated())
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ArenaClientMessage {
    Input(InputVector),
    Attack(AttackKind),
    Grab,
    Throw { direction: Option<f32> },
    Block(bool),
    Escape,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackHit {
    pub target_id: PlayerId,
    pub damage: f32,
    pub blocked: bool,
    pub new_health: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ArenaServerMessage {
    State {
        fighters: Vec<FighterView>,
    },
    AttackStarted {
        attacker_id: PlayerId,
        attack_type: AttackKind,
    },
    AttackHitEvent {
        attacker_id: PlayerId,
        hits: Vec<AttackHit>,
    },
    Grab {
        grabber_id: PlayerId,
        target_id: PlayerId,
    },
    Throw {
        grabber_id: PlayerId,
        target_id: PlayerId,
        damage: f32,
    },
    GrabEscape {
        grabber_id: PlayerId,
        target_id: PlayerId,
    },
    BlockState {
        player_id: PlayerId,
        is_blocking: bool,
    },
    Elimination {
        player_id: PlayerId,
        reason: EliminationReason,
    },
    GameOver {
        winner: Option<PlayerId>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EliminationReason {
    Ringout,
    Ko,
}

/// The public fields of a fighter sent in a snapshot (spec §4.4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FighterView {
    pub id: PlayerId,
    pub position: Vec2,
    pub facing_angle: f32,
    pub health: f32,
    pub stamina: f32,
    pub is_attacking: bool,
    pub is_blocking: bool,
    pub is_grabbing: bool,
    pub is_grabbed: bool,
    pub is_eliminated: bool,
}

impl From<&Fighter> for FighterView {
    fn from(f: &Fighter) -> Self {
        Self {
            id: f.id,
            position: f.position,
            facing_angle: f.facing_angle,
            health: f.health,
            stamina: f.stamina,
            is_attacking: matches!(f.phase, FighterPhase::Attacking { .. }),
            is_blocking: matches!(f.phase, FighterPhase::Blocking),
            is_grabbing: matches!(f.phase, FighterPhase::Grabbing),
            is_grabbed: matches!(f.phase, FighterPhase::Grabbed),
            is_eliminated: f.is_eliminated(),
        }
    }
}

// ---------------------------------------------------------------------------
// GameLogic impl
// ---------------------------------------------------------------------------

pub struct Arena;

const SPAWN_RADIUS_FRACTION: f32 = 0.6;

impl GameLogic for Arena {
    type Config = ArenaConfig;
    type State = ArenaState;
    type ClientMessage = ArenaClientMessage;
    type ServerMessage = ArenaServerMessage;

    fn init(config: &Self::Config, players: &[PlayerId]) -> Self::State {
        let mut fighters = HashMap::new();
        let n = players.len().max(1) as f32;
        let radius = (config.ring_size / 2.0 - config.rope_rim) * SPAWN_RADIUS_FRACTION;
        for (i, id) in players.iter().enumerate() {
            let angle = (i as f32 / n) * std::f32::consts::TAU;
            let spawn = Vec2::from_angle(angle).scale(radius);
            // face the ring center
            let facing = angle + std::f32::consts::PI;
            fighters.insert(*id, Fighter::new(*id, spawn, facing, config));
        }
        ArenaState {
            fighters,
            turn_order: players.to_vec(),
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
            ArenaClientMessage::Input(input) => {
                if let Some(f) = state.fighters.get_mut(&sender) {
                    if f.can_act() {
                        f.input = input;
                        let axis = input.movement_axis();
                        if axis.length() > f32::EPSILON {
                            f.facing_angle = axis.y.atan2(axis.x);
                        }
                    }
                }
                Vec::new()
            }
            ArenaClientMessage::Attack(kind) => handle_attack(state, sender, kind),
            ArenaClientMessage::Grab => handle_grab(state, sender),
            ArenaClientMessage::Throw { direction } => handle_throw(state, sender, direction),
            ArenaClientMessage::Block(pressed) => handle_block(state, sender, pressed),
            ArenaClientMessage::Escape => handle_escape(state, sender),
        }
    }

    fn tick(state: &mut Self::State, dt: Duration) -> Vec<(Recipient, Self::ServerMessage)> {
        if state.game_over {
            return Vec::new();
        }
        let dt_secs = dt.as_secs_f32();
        let mut events = Vec::new();

        apply_movement(state, dt_secs);
        advance_attacks(state);
        let hits = resolve_combat(state);
        if !hits.is_empty() {
            for (attacker_id, attacker_hits) in hits {
                events.push((
                    Recipient::All,
                    ArenaServerMessage::AttackHitEvent {
                        attacker_id,
                        hits: attacker_hits,
                    },
                ));
            }
        }
        apply_stamina(state, dt_secs);
        apply_grab_timeouts(state, dt_secs);
        apply_stun_recovery(state, dt_secs);
        apply_gravity_and_throws(state, dt_secs);
        apply_fighter_collisions(state);
        apply_ring_boundary(state);

        events.extend(resolve_ring_outs(state));
        events.extend(resolve_eliminations(state));
        events.extend(resolve_game_over(state));

        events.push((
            Recipient::All,
            ArenaServerMessage::State {
                fighters: state.fighters.values().map(FighterView::from).collect(),
            },
        ));

        events
    }

    fn on_player_disconnect(
        state: &mut Self::State,
        player: PlayerId,
    ) -> Vec<(Recipient, Self::ServerMessage)> {
        // No ring-out damage on disconnect (spec §4.4.7) — go straight to
        // `ko` elimination.
        let Some(f) = state.fighters.get_mut(&player) else {
            return Vec::new();
        };
        if f.is_eliminated() {
            return Vec::new();
        }
        f.connected = false;
        release_any_grab(state, player);
        let Some(f) = state.fighters.get_mut(&player) else {
            return Vec::new();
        };
        f.phase = FighterPhase::Eliminated;

        let mut events = vec![(
            Recipient::All,
            ArenaServerMessage::Elimination {
                player_id: player,
                reason: EliminationReason::Ko,
            },
        )];
        events.extend(resolve_game_over(state));
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

    fn is_state_input(msg: &Self::ClientMessage) -> bool {
        matches!(msg, ArenaClientMessage::Input(_))
    }

    fn room_config() -> RoomConfig {
        RoomConfig {
            min_players: 2,
            max_players: 4,
            ..RoomConfig::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Message handlers
// ---------------------------------------------------------------------------

fn handle_attack(
    state: &mut ArenaState,
    sender: PlayerId,
    kind: AttackKind,
) -> Vec<(Recipient, ArenaServerMessage)> {
    let strike_id = state.next_strike_id;
    let Some(f) = state.fighters.get_mut(&sender) else {
        return Vec::new();
    };
    if !f.can_act() {
        return Vec::new();
    }
    f.phase = FighterPhase::Attacking {
        kind,
        phase: AttackPhase::Windup,
        frame: 0,
        strike_id,
    };
    f.hit_targets.clear();
    state.next_strike_id += 1;

    vec![(
        Recipient::All,
        ArenaServerMessage::AttackStarted {
            attacker_id: sender,
            attack_type: kind,
        },
    )]
}

fn handle_grab(
    state: &mut ArenaState,
    sender: PlayerId,
) -> Vec<(Recipient, ArenaServerMessage)> {
    let Some(grabber) = state.fighters.get(&sender) else {
        return Vec::new();
    };
    if !grabber.can_act() {
        return Vec::new();
    }
    let grabber_pos = grabber.position;
    let grabber_facing = grabber.facing_angle;
    let grab_range = state.config.grab_range;

    let mut best: Option<(PlayerId, f32)> = None;
    for f in state.fighters.values() {
        if f.id == sender || !f.is_attackable() {
            continue;
        }
        if matches!(f.phase, FighterPhase::Blocking | FighterPhase::Grabbed) {
            continue;
        }
        let to_target = f.position.sub(grabber_pos);
        let dist = to_target.length();
        if dist > grab_range {
            continue;
        }
        let angle_to_target = to_target.y.atan2(to_target.x);
        let angle_diff = angle_delta(grabber_facing, angle_to_target);
        if angle_diff.abs() > 60f32.to_radians() {
            continue;
        }
        if best.map(|(_, d)| dist < d).unwrap_or(true) {
            best = Some((f.id, dist));
        }
    }

    let Some((target_id, _)) = best else {
        return Vec::new();
    };

    if let Some(grabber) = state.fighters.get_mut(&sender) {
        grabber.phase = FighterPhase::Grabbing;
        grabber.grabbed_player_id = Some(target_id);
        grabber.grab_timer = 0.0;
    }
    if let Some(target) = state.fighters.get_mut(&target_id) {
        target.phase = FighterPhase::Grabbed;
        target.grabbed_by_id = Some(sender);
        target.velocity = Vec2::ZERO;
        target.escape_presses = 0;
    }

    vec![(
        Recipient::All,
        ArenaServerMessage::Grab {
            grabber_id: sender,
            target_id,
        },
    )]
}

fn handle_throw(
    state: &mut ArenaState,
    sender: PlayerId,
    direction: Option<f32>,
) -> Vec<(Recipient, ArenaServerMessage)> {
    let Some(grabber) = state.fighters.get(&sender) else {
        return Vec::new();
    };
    if !matches!(grabber.phase, FighterPhase::Grabbing) {
        return Vec::new();
    }
    let Some(target_id) = grabber.grabbed_player_id else {
        return Vec::new();
    };
    let throw_angle = direction.unwrap_or(grabber.facing_angle);
    let throw_speed = state.config.throw_speed;
    let throw_upward_speed = state.config.throw_upward_speed;
    let throw_damage = state.config.throw_damage;

    if let Some(grabber) = state.fighters.get_mut(&sender) {
        grabber.phase = FighterPhase::Idle;
        grabber.grabbed_player_id = None;
    }

    let Some(target) = state.fighters.get_mut(&target_id) else {
        return Vec::new();
    };
    target.grabbed_by_id = None;
    target.phase = FighterPhase::Thrown;
    target.velocity = Vec2::from_angle(throw_angle).scale(throw_speed);
    target.vertical_velocity = throw_upward_speed;
    target.grounded = false;
    target.health = (target.health + throw_damage).max(0.0);
    target.last_hit_by = Some(sender);

    vec![(
        Recipient::All,
        ArenaServerMessage::Throw {
            grabber_id: sender,
            target_id,
            damage: throw_damage,
        },
    )]
}

fn handle_block(
    state: &mut ArenaState,
    sender: PlayerId,
    pressed: bool,
) -> Vec<(Recipient, ArenaServerMessage)> {
    let Some(f) = state.fighters.get_mut(&sender) else {
        return Vec::new();
    };
    if pressed {
        if !f.can_act() || f.stamina <= 0.0 {
            return Vec::new();
        }
        f.phase = FighterPhase::Blocking;
    } else {
        if !matches!(f.phase, FighterPhase::Blocking) {
            return Vec::new();
        }
        f.phase = FighterPhase::Idle;
    }

    vec![(
        Recipient::All,
        ArenaServerMessage::BlockState {
            player_id: sender,
            is_blocking: pressed,
        },
    )]
}

fn handle_escape(
    state: &mut ArenaState,
    sender: PlayerId,
) -> Vec<(Recipient, ArenaServerMessage)> {
    let escape_threshold = state.config.escape_threshold;
    let stun_duration = state.config.stun_duration_secs;

    let Some(victim) = state.fighters.get_mut(&sender) else {
        return Vec::new();
    };
    if !matches!(victim.phase, FighterPhase::Grabbed) {
        return Vec::new();
    }
    victim.escape_presses += 1;
    if victim.escape_presses < escape_threshold {
        return Vec::new();
    }
    let Some(grabber_id) = victim.grabbed_by_id else {
        return Vec::new();
    };
    victim.phase = FighterPhase::Idle;
    victim.grabbed_by_id = None;
    victim.escape_presses = 0;

    if let Some(grabber) = state.fighters.get_mut(&grabber_id) {
        grabber.phase = FighterPhase::Stunned;
        grabber.stun_timer = stun_duration;
        grabber.grabbed_player_id = None;
    }

    vec![(
        Recipient::All,
        ArenaServerMessage::GrabEscape {
            grabber_id,
            target_id: sender,
        },
    )]
}

fn release_any_grab(state: &mut ArenaState, player: PlayerId) {
    let grabbed_by = state.fighters.get(&player).and_then(|f| f.grabbed_by_id);
    let grabbing = state.fighters.get(&player).and_then(|f| f.grabbed_player_id);
    if let Some(grabber_id) = grabbed_by {
        if let Some(grabber) = state.fighters.get_mut(&grabber_id) {
            if matches!(grabber.phase, FighterPhase::Grabbing) {
                grabber.phase = FighterPhase::Idle;
            }
            grabber.grabbed_player_id = None;
        }
    }
    if let Some(target_id) = grabbing {
        if let Some(target) = state.fighters.get_mut(&target_id) {
            if matches!(target.phase, FighterPhase::Grabbed) {
                target.phase = FighterPhase::Idle;
            }
            target.grabbed_by_id = None;
        }
    }
}

fn angle_delta(a: f32, b: f32) -> f32 {
    let mut d = b - a;
    while d > std::f32::consts::PI {
        d -= std::f32::consts::TAU;
    }
    while d < -std::f32::consts::PI {
        d += std::f32::consts::TAU;
    }
    d
}

// ---------------------------------------------------------------------------
// Per-tick simulation steps (ordered per spec §4.3/§4.4.4: inputs already
// applied via handle_message → physics → combat → collisions/boundaries →
// eliminations → snapshot)
// ---------------------------------------------------------------------------

fn apply_movement(state: &mut ArenaState, dt: f32) {
    let move_speed = state.config.move_speed;
    let run_multiplier = state.config.run_multiplier;
    for f in state.fighters.values_mut() {
        if !matches!(f.phase, FighterPhase::Idle | FighterPhase::Moving) {
            continue;
        }
        let axis = f.input.movement_axis().normalized();
        if axis.length() < f32::EPSILON {
            f.phase = FighterPhase::Idle;
            f.velocity = Vec2::ZERO;
            continue;
        }
        f.phase = FighterPhase::Moving;
        let speed = if f.input.run {
            move_speed * run_multiplier
        } else {
            move_speed
        };
        f.velocity = axis.scale(speed);
        f.position = f.position.add(f.velocity.scale(dt));
    }
}

fn advance_attacks(state: &mut ArenaState) {
    let config = state.config.clone();
    for f in state.fighters.values_mut() {
        let FighterPhase::Attacking {
            kind,
            phase,
            frame,
            strike_id,
        } = f.phase.clone()
        else {
            continue;
        };
        let (windup, active, recovery) = match kind {
            AttackKind::Punch => (
                config.punch_windup_ticks,
                config.punch_active_ticks,
                config.punch_recovery_ticks,
            ),
            AttackKind::Kick => (
                config.kick_windup_ticks,
                config.kick_active_ticks,
                config.kick_recovery_ticks,
            ),
        };
        let next_frame = frame + 1;
        let new_phase = match phase {
            AttackPhase::Windup if next_frame >= windup => AttackPhase::Active,
            AttackPhase::Active if next_frame >= windup + active => AttackPhase::Recovery,
            AttackPhase::Recovery if next_frame >= windup + active + recovery => {
                f.phase = FighterPhase::Idle;
                continue;
            }
            other => other,
        };
        f.phase = FighterPhase::Attacking {
            kind,
            phase: new_phase,
            frame: next_frame,
            strike_id,
        };
    }
}

fn resolve_combat(state: &mut ArenaState) -> Vec<(PlayerId, Vec<AttackHit>)> {
    let config = state.config.clone();
    let snapshot: Vec<(PlayerId, Vec2, f32, AttackKind)> = state
        .fighters
        .values()
        .filter_map(|f| match f.phase {
            FighterPhase::Attacking {
                kind,
                phase: AttackPhase::Active,
                ..
            } => Some((f.id, f.position, f.facing_angle, kind)),
            _ => None,
        })
        .collect();

    let mut results = Vec::new();
    for (attacker_id, attacker_pos, attacker_facing, kind) in snapshot {
        let damage = match kind {
            AttackKind::Punch => config.punch_damage,
            AttackKind::Kick => config.kick_damage,
        };

        let target_ids: Vec<PlayerId> = state
            .fighters
            .values()
            .filter(|f| f.id != attacker_id && f.is_attackable())
            .filter(|f| {
                let to_target = f.position.sub(attacker_pos);
                if to_target.length() > config.attack_range {
                    return false;
                }
                let angle_to_target = to_target.y.atan2(to_target.x);
                angle_delta(attacker_facing, angle_to_target).abs() < 70f32.to_radians()
            })
            .map(|f| f.id)
            .collect();

        let mut hits = Vec::new();
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

            let Some(target) = state.fighters.get(&target_id) else {
                continue;
            };
            let to_target = target.position.sub(attacker_pos);
            let facing_target = to_target.y.atan2(to_target.x);
            let is_blocking = matches!(target.phase, FighterPhase::Blocking)
                && angle_delta(target.facing_angle, facing_target + std::f32::consts::PI).abs()
                    < config.block_angle_tolerance_deg.to_radians();

            let applied_damage = if is_blocking {
                damage * config.block_factor
            } else {
                damage
            };
            let knockback_dir = to_target.normalized();
            let knockback = knockback_dir.scale(if is_blocking {
                config.knockback_base * config.block_factor
            } else {
                config.knockback_base
            });

            let Some(target) = state.fighters.get_mut(&target_id) else {
                continue;
            };
            target.health = (target.health + applied_damage).max(0.0);
            target.last_hit_by = Some(attacker_id);
            if !matches!(target.phase, FighterPhase::Grabbed) {
                target.velocity = target.velocity.add(knockback);
            }
            if is_blocking {
                target.stamina = (target.stamina - 15.0).max(0.0);
            }

            hits.push(AttackHit {
                target_id,
                damage: applied_damage,
                blocked: is_blocking,
                new_health: target.health,
            });
        }

        if !hits.is_empty() {
            results.push((attacker_id, hits));
        }
    }
    results
}

fn apply_stamina(state: &mut ArenaState, dt: f32) {
    let config = state.config.clone();
    for f in state.fighters.values_mut() {
        if matches!(f.phase, FighterPhase::Blocking) {
            f.stamina = (f.stamina - config.stamina_drain_per_sec * dt).max(0.0);
            if f.stamina <= 0.0 {
                f.phase = FighterPhase::Idle;
            }
        } else {
            f.stamina = (f.stamina + config.stamina_regen_per_sec * dt).min(config.max_stamina);
        }
    }
}

fn apply_grab_timeouts(state: &mut ArenaState, dt: f32) {
    let config = state.config.clone();
    let mut to_release = Vec::new();
    for f in state.fighters.values_mut() {
        if matches!(f.phase, FighterPhase::Grabbing) {
            f.grab_timer += dt;
            if f.grab_timer >= config.grab_timeout_secs {
                to_release.push(f.id);
            }
        }
    }
    for grabber_id in to_release {
        release_any_grab(state, grabber_id);
    }
}

fn apply_stun_recovery(state: &mut ArenaState, dt: f32) {
    for f in state.fighters.values_mut() {
        if matches!(f.phase, FighterPhase::Stunned) {
            f.stun_timer -= dt;
            if f.stun_timer <= 0.0 {
                f.phase = FighterPhase::Idle;
            }
        }
    }
}

fn apply_gravity_and_throws(state: &mut ArenaState, dt: f32) {
    let config = state.config.clone();
    for f in state.fighters.values_mut() {
        if matches!(f.phase, FighterPhase::Grabbed) {
            continue;
        }
        if f.elevation > 0.0 || f.vertical_velocity > 0.0 || matches!(f.phase, FighterPhase::Thrown)
        {
            f.vertical_velocity -= config.gravity * dt;
            f.elevation = (f.elevation + f.vertical_velocity * dt).max(0.0);
            f.position = f.position.add(f.velocity.scale(dt));
            if f.elevation <= 0.0 && f.vertical_velocity <= 0.0 {
                f.elevation = 0.0;
                f.vertical_velocity = 0.0;
                f.grounded = true;
                if matches!(f.phase, FighterPhase::Thrown) {
                    f.phase = FighterPhase::Idle;
                }
            }
        }
    }
    // Slave grabbed victims to their grabber's position (separate pass to
    // avoid a double mutable borrow on `state.fighters`).
    let carries: Vec<(PlayerId, Vec2, f32)> = state
        .fighters
        .values()
        .filter_map(|f| {
            f.grabbed_player_id
                .map(|victim_id| (victim_id, f.position, f.facing_angle))
        })
        .collect();
    for (victim_id, grabber_pos, grabber_facing) in carries {
        if let Some(victim) = state.fighters.get_mut(&victim_id) {
            let offset = Vec2::from_angle(grabber_facing).scale(0.7);
            victim.position = grabber_pos.add(offset);
        }
    }
}

fn apply_fighter_collisions(state: &mut ArenaState) {
    let config = state.config.clone();
    let ids: Vec<PlayerId> = state.fighters.keys().copied().collect();
    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            let (a_id, b_id) = (ids[i], ids[j]);
            let (Some(a), Some(b)) = (state.fighters.get(&a_id), state.fighters.get(&b_id))
            else {
                continue;
            };
            if a.grabbed_player_id == Some(b_id)
                || b.grabbed_player_id == Some(a_id)
                || !a.is_attackable()
                || !b.is_attackable()
            {
                continue;
            }
            let delta = b.position.sub(a.position);
            let dist = delta.length();
            let min_dist = config.collider_radius * 2.0;
            if dist < min_dist && dist > f32::EPSILON {
                let push = delta.normalized().scale((min_dist - dist) / 2.0);
                if let Some(a) = state.fighters.get_mut(&a_id) {
                    a.position = a.position.sub(push);
                }
                if let Some(b) = state.fighters.get_mut(&b_id) {
                    b.position = b.position.add(push);
                }
            }
        }
    }
}

fn apply_ring_boundary(state: &mut ArenaState) {
    let config = state.config.clone();
    let boundary = config.ring_size / 2.0 - config.rope_rim;
    for f in state.fighters.values_mut() {
        if matches!(f.phase, FighterPhase::Thrown) {
            continue; // ring-out check handles fighters in flight
        }
        if f.position.x.abs() > boundary {
            f.position.x = f.position.x.clamp(-boundary, boundary);
            f.velocity.x = -f.velocity.x * config.rope_bounce;
        }
        if f.position.y.abs() > boundary {
            f.position.y = f.position.y.clamp(-boundary, boundary);
            f.velocity.y = -f.velocity.y * config.rope_bounce;
        }
    }
}

fn resolve_ring_outs(state: &mut ArenaState) -> Vec<(Recipient, ArenaServerMessage)> {
    let config = state.config.clone();
    let limit = config.ring_size / 2.0 + config.ring_out_margin;
    let offenders: Vec<PlayerId> = state
        .fighters
        .values()
        .filter(|f| {
            !f.is_eliminated() && f.position.x.abs().max(f.position.y.abs()) > limit
        })
        .map(|f| f.id)
        .collect();

    let mut events = Vec::new();
    for id in offenders {
        if let Some(f) = state.fighters.get_mut(&id) {
            f.health = (f.health + config.ring_out_damage).max(0.0);
            f.phase = FighterPhase::Eliminated;
        }
        events.push((
            Recipient::All,
            ArenaServerMessage::Elimination {
                player_id: id,
                reason: EliminationReason::Ringout,
            },
        ));
    }
    events
}

fn resolve_eliminations(state: &mut ArenaState) -> Vec<(Recipient, ArenaServerMessage)> {
    let config = state.config.clone();
    let offenders: Vec<PlayerId> = state
        .fighters
        .values()
        .filter(|f| !f.is_eliminated() && f.health >= config.max_health)
        .map(|f| f.id)
        .collect();

    let mut events = Vec::new();
    for id in offenders {
        if let Some(f) = state.fighters.get_mut(&id) {
            f.phase = FighterPhase::Eliminated;
        }
        events.push((
            Recipient::All,
            ArenaServerMessage::Elimination {
                player_id: id,
                reason: EliminationReason::Ko,
            },
        ));
    }
    events
}

fn resolve_game_over(state: &mut ArenaState) -> Vec<(Recipient, ArenaServerMessage)> {
    if state.game_over {
        return Vec::new();
    }
    let living: Vec<PlayerId> = state.living().map(|f| f.id).collect();
    if living.len() > 1 {
        return Vec::new();
    }
    state.game_over = true;
    state.winner = living.first().copied();
    vec![(
        Recipient::All,
        ArenaServerMessage::GameOver {
            winner: state.winner,
        },
    )]
}
