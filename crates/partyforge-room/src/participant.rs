//! Participant bookkeeping for the Lobby Manager (spec §3, §4.2).

use partyforge_protocol::{ParticipantView, PlayerId};
use serde::{Deserialize, Serialize};

/// A fixed palette of accent colors, assigned round-robin by seat number.
pub const ACCENT_COLOR_COUNT: u8 = 8;

/// Whether a participant created the room or joined an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Guest,
}

/// A connected controller occupying a seat in a room.
///
/// Ownership: the Room exclusively owns its `Participant`s; the Transport
/// layer keeps only a back-reference (the outbound channel) from a
/// `PlayerId` to its delivery handle.
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: PlayerId,
    pub display_name: String,
    /// Stable 1..8 seat number, fixed for the lifetime of the room.
    pub number: u8,
    pub color: u8,
    pub ready: bool,
    /// Selected character id, unique within the room once set.
    pub character: Option<String>,
    pub character_name: Option<String>,
    pub role: Role,
    /// Set when the participant's connection drops; cleared on rejoin.
    /// The participant is swept from the room once the disconnect grace
    /// period elapses without a reconnect.
    pub connected: bool,
}

impl Participant {
    pub fn new(id: PlayerId, display_name: String, number: u8, role: Role) -> Self {
        Self {
            id,
            display_name,
            number,
            color: (number - 1) % ACCENT_COLOR_COUNT,
            ready: false,
            character: None,
            character_name: None,
            role,
            connected: true,
        }
    }

    pub fn to_view(&self) -> ParticipantView {
        ParticipantView {
            id: self.id,
            number: self.number,
            color: self.color,
            name: self.display_name.clone(),
            ready: self.ready,
            character: self.character.clone(),
            is_host: matches!(self.role, Role::Host),
        }
    }
}
