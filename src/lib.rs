//! # Crowd Quest Server
//!
//! Authoritative server for a crowd-steered grid adventure: any number of
//! participants jointly control one avatar by voting on a direction each
//! round.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    CROWD QUEST SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  game/           - World logic (deterministic, no I/O)       │
//! │  ├── types.rs    - Directions, coordinates, participant ids  │
//! │  ├── grid.rs     - Cells, blocking rules, maps               │
//! │  ├── effect.rs   - Data-only effect records                  │
//! │  ├── pipeline.rs - CHOOSE/RESOLVE/INTERACT/STAND dispatcher  │
//! │  ├── engine.rs   - Per-round transform                       │
//! │  └── content.rs  - The built-in apartment scenario           │
//! │                                                              │
//! │  vote/           - Round coordination (async, timers)        │
//! │  ├── ballot.rs   - Votes, choices, snapshots                 │
//! │  ├── tally.rs    - Counting and tie-breaking                 │
//! │  └── coordinator.rs - The session actor                      │
//! │                                                              │
//! │  network/        - WebSocket edge (non-deterministic)        │
//! │  ├── server.rs   - Accept loop, per-connection tasks         │
//! │  ├── protocol.rs - Tagged JSON message types                 │
//! │  └── gateway.rs  - Broadcast fanout                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency model
//!
//! All session state lives inside a single coordinator task driven by a
//! command channel; no locks guard the game. Countdown and next-round
//! timers are spawned sleep tasks that send commands back into the channel
//! and re-validate the vote id (or round) they were armed for, so a stale
//! timer is always a logged no-op. Broadcasts go out only after a mutation
//! completes.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod game;
pub mod network;
pub mod vote;

// Re-export commonly used types
pub use game::{Direction, GameConfig, GameEngine, GameState, ParticipantId};
pub use network::{BroadcastGateway, GameServer, ServerConfig};
pub use vote::{
    CoordinatorConfig, CoordinatorHandle, VoteCoordinator, VoteSnapshot, DEFAULT_VOTE_TIMEOUT_MS,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
