//! Network Layer
//!
//! WebSocket edge for the crowd of participants. This layer is
//! **non-deterministic** - all game logic runs through `game/`, all session
//! mutation through `vote/`.

pub mod gateway;
pub mod protocol;
pub mod server;

pub use gateway::{BroadcastGateway, OutboundEvent};
pub use protocol::{
    ChatEntry, ClientEnvelope, ClientInfo, ClientMessage, LogEntry, ServerMessage, SyncPayload,
};
pub use server::{GameServer, GameServerError, ServerConfig};
