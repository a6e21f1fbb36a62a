//! Game Logic Module
//!
//! Deterministic world logic: no I/O, no timers, no sockets. The vote layer
//! feeds tallied actions in; everything here is plain data plus pure
//! transforms.
//!
//! ## Module Structure
//!
//! - `types`: directions, participant ids, factions, coordinates
//! - `grid`: cells, blocking rules, bounds-checked maps
//! - `item`: carryable items and their attached effects
//! - `effect`: data-only effect records (triggers, conditions, lifetimes)
//! - `pipeline`: the four-stage effect dispatcher and handler registry
//! - `state`: the authoritative game state
//! - `engine`: the per-round transform
//! - `content`: the built-in apartment scenario

pub mod content;
pub mod effect;
pub mod engine;
pub mod grid;
pub mod item;
pub mod pipeline;
pub mod state;
pub mod types;

// Re-export key types
pub use effect::{EffectKind, EffectRecord, EffectTrigger, Lifetime, TargetSpec, TriggerStage};
pub use engine::{GameConfig, GameEngine};
pub use grid::{BlockRule, Cell, CellType, GridMap};
pub use item::Item;
pub use state::{GameEnd, GameState, PlayerState};
pub use types::{Coord, Direction, Faction, MapId, ParticipantId, Position};
