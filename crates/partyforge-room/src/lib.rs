//! Room lifecycle management for PartyForge.
//!
//! Each room runs as an isolated Tokio task (actor model) with its own
//! lobby state, mode simulation, and tournament wrapper. This crate
//! implements spec §4.2 (Lobby Manager), the room half of §4.3 (Loop
//! Runtime), and the room state machine in §3/§4.6.
//!
//! ```text
//! RoomManager (registry, code → handle)
//!     └─ RoomHandle (cheap, cloneable) ──▶ RoomActor (one Tokio task per room)
//!                                              ├─ lobby state (Participants)
//!                                              ├─ G::State (the mode sim)
//!                                              └─ TournamentState (wraps it)
//! ```

mod code;
mod config;
mod error;
mod logic;
mod manager;
mod participant;
mod room;

pub use code::generate as generate_room_code;
pub use config::{RoomConfig, RoomState};
pub use error::RoomError;
pub use logic::{GameLogic, RoundOutcome};
pub use manager::RoomManager;
pub use participant::{Participant, Role};
pub use room::{JoinedInfo, PlayerSender, RoomHandle, RoomInfo, RoomOutbound};
