//! Vote Coordination
//!
//! The round loop: open a timed vote, collect ballots, tally, hand the
//! result to the game engine, schedule the next round. One coordinator task
//! owns everything; timers are spawned sleep tasks that message it back.

pub mod ballot;
pub mod coordinator;
pub mod tally;

pub use ballot::{Choice, Vote, VoteId, VoteKind, VoteSnapshot, VoteSpec, DEFAULT_VOTE_TIMEOUT_MS};
pub use coordinator::{Command, CoordinatorConfig, CoordinatorError, CoordinatorHandle, VoteCoordinator};
