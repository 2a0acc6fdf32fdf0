//! # PartyForge
//!
//! Low-latency game backend framework for web games.
//!
//! PartyForge provides a server-authoritative architecture where game developers
//! implement a single [`GameLogic`] trait and the framework handles transport,
//! sessions, rooms, and state synchronization.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use partyforge::prelude::*;
//!
//! // Implement GameLogic for your game, then:
//! // let server = PartyForgeServer::builder()
//! //     .bind("0.0.0.0:8080")
//! //     .build::<MyGame>(my_auth)
//! //     .await?;
//! // server.run().await
//! ```

mod error;
mod handler;
mod server;

pub use error::PartyForgeError;
pub use server::{PartyForgeServer, PartyForgeServerBuilder, PROTOCOL_VERSION};

/// Re-exports of the types most consumers need to implement a
/// [`GameLogic`](partyforge_room::GameLogic) and stand up a server.
pub mod prelude {
    pub use crate::{PartyForgeError, PartyForgeServer, PartyForgeServerBuilder};
    pub use partyforge_protocol::{
        Channel, CharacterSelection, Codec, Envelope, JsonCodec, ModeTag,
        ParticipantView, Payload, PlayerId, ProtocolError, Recipient,
        RoomCode, RoomId, RoomListEntry, SystemMessage,
    };
    pub use partyforge_room::{
        GameLogic, JoinedInfo, Participant, PlayerSender, Role, RoomConfig,
        RoomError, RoomHandle, RoomInfo, RoomManager, RoomOutbound,
        RoomState, RoundOutcome,
    };
    pub use partyforge_session::{
        Authenticator, Session, SessionConfig, SessionError, SessionManager,
        SessionState,
    };
    pub use partyforge_transport::{
        Connection, ConnectionId, Transport, TransportError,
        WebSocketConnection, WebSocketTransport,
    };
}