//! The eight game mode simulations (spec §4.4, §4.5), each a `GameLogic`
//! implementation plugged into the room actor in `partyforge-room`.

pub mod any;
pub mod arena;
pub mod balloon;
pub mod common;
pub mod flappy;
pub mod paint;
pub mod race;
pub mod smash;
pub mod tag;
pub mod tug;

pub use any::{default_config_for, AnyClientMessage, AnyConfig, AnyMode, AnyServerMessage, AnyState};
pub use arena::Arena;
pub use balloon::BalloonMode;
pub use flappy::Flappy;
pub use paint::Paint;
pub use race::Race;
pub use smash::Smash;
pub use tag::Tag;
pub use tug::Tug;
