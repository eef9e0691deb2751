//! Network Layer
//!
//! WebSocket front end for live matches. Nothing here touches simulation
//! rules; sessions only buffer commands and forward world snapshots.

pub mod protocol;
pub mod session;
pub mod server;

pub use protocol::{ClientMessage, ErrorCode, ServerError, ServerMessage, WorldSnapshot};
pub use session::{
    run_session_loop, ConnectionState, MatchSession, Outbox, SessionConfig, SessionError, SessionId, SessionManager,
};
pub use server::{GameServer, GameServerError, ServerConfig};
