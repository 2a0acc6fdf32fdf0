//! Room manager: creates, tracks, and routes players to rooms by their
//! 4-letter room code (spec §4.2).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use partyforge_protocol::{ModeTag, PlayerId, RoomCode, RoomId};

use crate::room::spawn_room;
use crate::{GameLogic, JoinedInfo, PlayerSender, RoomError, RoomHandle, RoomInfo};

/// Counter for generating unique internal room ids (the `HashMap` key;
/// [`RoomCode`] is the externally-visible identifier — spec §3).
static NEXT_ROOM_ID: AtomicU64 = AtomicU64::new(1);

/// Default command channel size for room actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// How many times to retry room-code generation on a collision before
/// giving up. With a 24-character alphabet and 4-letter codes there are
/// `24^4` ≈ 330K possible codes — collisions are rare even with
/// thousands of live rooms, so this only guards against pathological
/// bad luck.
const CODE_GENERATION_RETRIES: u32 = 32;

/// Manages all active rooms and tracks which player is in which room.
///
/// This is the entry point for room operations from higher layers
/// (session layer, server accept loop).
pub struct RoomManager<G: GameLogic> {
    /// Active rooms, keyed by the public room code.
    rooms: HashMap<RoomCode, RoomHandle<G>>,

    /// Maps each player to the room they're currently in.
    /// A player can be in at most ONE room at a time (key invariant).
    player_rooms: HashMap<PlayerId, RoomCode>,
}

impl<G: GameLogic> RoomManager<G> {
    /// Creates a new, empty room manager.
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
            player_rooms: HashMap::new(),
        }
    }

    /// Creates a new room for the given mode and returns its room code.
    ///
    /// Generates a unique 4-letter code, retrying on collision against the
    /// live room table (spec §4.2, testable property 1).
    ///
    /// `room_config` is supplied by the caller rather than taken from
    /// `G::room_config()` so that a single [`GameLogic`] implementation
    /// covering several mode tags (see `partyforge_modes::AnyMode`) can
    /// still hand back per-mode player counts.
    pub fn create_room(
        &mut self,
        mode_tag: ModeTag,
        room_config: crate::RoomConfig,
        game_config: G::Config,
        tournament_rounds: u32,
    ) -> RoomCode {
        let mut code = crate::code::generate();
        for _ in 0..CODE_GENERATION_RETRIES {
            if !self.rooms.contains_key(&code) {
                break;
            }
            code = crate::code::generate();
        }

        let room_id = RoomId(NEXT_ROOM_ID.fetch_add(1, Ordering::Relaxed));
        let handle = spawn_room::<G>(
            room_id,
            code,
            mode_tag,
            room_config,
            game_config,
            tournament_rounds,
            DEFAULT_CHANNEL_SIZE,
        );
        self.rooms.insert(code, handle);
        tracing::info!(room = %code, %mode_tag, "room created");
        code
    }

    /// Adds a player to a room by its code.
    ///
    /// Enforces the "one room at a time" invariant.
    pub async fn join_room(
        &mut self,
        player_id: PlayerId,
        code: RoomCode,
        display_name: String,
        sender: PlayerSender<G>,
    ) -> Result<JoinedInfo, RoomError> {
        if let Some(current) = self.player_rooms.get(&player_id) {
            if *current == code {
                return Err(RoomError::AlreadyInRoom(player_id, code));
            }
            return Err(RoomError::InvalidState(format!(
                "player {player_id} is already in room {current}"
            )));
        }

        let handle = self
            .rooms
            .get(&code)
            .ok_or(RoomError::NotFound(code))?;

        let info = handle.join(player_id, display_name, sender).await?;
        self.player_rooms.insert(player_id, code);
        Ok(info)
    }

    /// Removes a player from their current room. Idempotent: a player not
    /// in any room is simply reported as not-in-room; callers that want
    /// "leaving twice is a no-op" (spec §4.2) should treat that error as
    /// success, since the room-level leave is itself idempotent.
    pub async fn leave_room(&mut self, player_id: PlayerId) -> Result<(), RoomError> {
        let Some(code) = self.player_rooms.remove(&player_id) else {
            return Err(RoomError::InvalidState(format!(
                "player {player_id} is not in any room"
            )));
        };

        if let Some(handle) = self.rooms.get(&code) {
            handle.leave(player_id).await?;
        }

        Ok(())
    }

    pub async fn mark_disconnected(&self, player_id: PlayerId) {
        if let Some(code) = self.player_rooms.get(&player_id) {
            if let Some(handle) = self.rooms.get(code) {
                handle.mark_disconnected(player_id).await;
            }
        }
    }

    pub async fn mark_reconnected(
        &self,
        player_id: PlayerId,
        sender: PlayerSender<G>,
    ) -> Result<(), RoomError> {
        let code = self
            .player_rooms
            .get(&player_id)
            .copied()
            .ok_or(RoomError::InvalidState(format!(
                "player {player_id} is not in any room"
            )))?;
        let handle = self.rooms.get(&code).ok_or(RoomError::NotFound(code))?;
        handle.mark_reconnected(player_id, sender).await
    }

    pub async fn set_ready(
        &self,
        player_id: PlayerId,
        ready: bool,
    ) -> Result<(), RoomError> {
        let handle = self.handle_for(player_id)?;
        handle.set_ready(player_id, ready).await
    }

    pub async fn select_character(
        &self,
        player_id: PlayerId,
        character_id: String,
        character_name: String,
    ) -> Result<(), RoomError> {
        let handle = self.handle_for(player_id)?;
        handle
            .select_character(player_id, character_id, character_name)
            .await
    }

    pub async fn start_game(&self, player_id: PlayerId) -> Result<(), RoomError> {
        let handle = self.handle_for(player_id)?;
        handle.start_game(player_id).await
    }

    /// Routes a mode-specific message from a player to their current room.
    pub async fn route_message(
        &self,
        player_id: PlayerId,
        msg: G::ClientMessage,
    ) -> Result<(), RoomError> {
        let handle = self.handle_for(player_id)?;
        handle.send_message(player_id, msg).await
    }

    /// Returns info about a specific room.
    pub async fn get_room_info(&self, code: RoomCode) -> Result<RoomInfo, RoomError> {
        let handle = self.rooms.get(&code).ok_or(RoomError::NotFound(code))?;
        handle.get_info().await
    }

    /// Shuts down a room and removes all its players from the index.
    pub async fn destroy_room(&mut self, code: RoomCode) -> Result<(), RoomError> {
        let handle = self.rooms.remove(&code).ok_or(RoomError::NotFound(code))?;
        let _ = handle.shutdown().await;
        self.player_rooms.retain(|_, c| *c != code);
        tracing::info!(room = %code, "room destroyed");
        Ok(())
    }

    /// Returns the room code a player is currently in, if any.
    pub fn player_room(&self, player_id: &PlayerId) -> Option<RoomCode> {
        self.player_rooms.get(player_id).copied()
    }

    /// Lists all rooms that are currently joinable (in `lobby`).
    ///
    /// Queries each room actor for its current info. Rooms that fail to
    /// respond (e.g., mid-teardown) are silently skipped.
    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let mut infos = Vec::with_capacity(self.rooms.len());
        for handle in self.rooms.values() {
            if let Ok(info) = handle.get_info().await {
                if info.state.is_joinable() {
                    infos.push(info);
                }
            }
        }
        infos
    }

    /// Returns cloned handles to all active rooms.
    pub fn room_handles(&self) -> Vec<RoomHandle<G>> {
        self.rooms.values().cloned().collect()
    }

    /// Number of active rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Codes of all active rooms.
    pub fn room_codes(&self) -> Vec<RoomCode> {
        self.rooms.keys().copied().collect()
    }

    /// Sweeps orphaned player→room entries whose room no longer exists
    /// (spec §4.2: "internal inconsistencies are logged and reconciled by
    /// sweeping disconnected ids on every lobby mutation").
    pub fn sweep_orphans(&mut self) {
        let live = &self.rooms;
        self.player_rooms.retain(|player_id, code| {
            let keep = live.contains_key(code);
            if !keep {
                tracing::warn!(%player_id, room = %code, "sweeping orphaned player→room entry");
            }
            keep
        });
    }

    fn handle_for(&self, player_id: PlayerId) -> Result<&RoomHandle<G>, RoomError> {
        let code = self.player_rooms.get(&player_id).copied().ok_or_else(|| {
            RoomError::InvalidState(format!("player {player_id} is not in any room"))
        })?;
        self.rooms.get(&code).ok_or(RoomError::NotFound(code))
    }
}

impl<G: GameLogic> Default for RoomManager<G> {
    fn default() -> Self {
        Self::new()
    }
}
