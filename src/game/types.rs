//! Shared Game Identifiers
//!
//! Small value types used across the game and vote modules.
//! Uses BTreeMap-friendly Ord impls for deterministic iteration.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// PARTICIPANT ID
// =============================================================================

/// Stable per-participant identifier supplied by the client on connect.
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    /// Create from any string-like id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// FACTION
// =============================================================================

/// A named partition of participants, used for group-targeted effects
/// and per-faction scoring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    Red,
    Blue,
}

impl Faction {
    /// All factions, in a fixed order.
    pub const ALL: [Faction; 2] = [Faction::Red, Faction::Blue];
}

// =============================================================================
// DIRECTION
// =============================================================================

/// One of the four directional choices offered each round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Up (row - 1)
    U,
    /// Left (col - 1)
    L,
    /// Down (row + 1)
    D,
    /// Right (col + 1)
    R,
}

impl Direction {
    /// All four directions, in vote-choice order.
    pub const ALL: [Direction; 4] = [Direction::U, Direction::L, Direction::D, Direction::R];

    /// Row/column delta for a single step.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::U => (-1, 0),
            Direction::L => (0, -1),
            Direction::D => (1, 0),
            Direction::R => (0, 1),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::U => "up",
            Direction::L => "left",
            Direction::D => "down",
            Direction::R => "right",
        };
        f.write_str(s)
    }
}

// =============================================================================
// MAP / COORDINATES
// =============================================================================

/// Identifier of a named grid in the game world.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapId(pub String);

impl MapId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The built-in apartment map.
    pub fn home() -> Self {
        Self("home".to_string())
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A grid coordinate. Signed so that stepping off an edge is representable;
/// out-of-range coordinates are always treated as blocking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub row: i32,
    pub col: i32,
}

impl Coord {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// The coordinate one step toward `direction`.
    pub fn toward(self, direction: Direction) -> Coord {
        let (dr, dc) = direction.delta();
        Coord::new(self.row + dr, self.col + dc)
    }
}

/// A fully qualified cell address: `(map, row, col)`.
///
/// Cells are addressed by tuple rather than held by reference, which keeps
/// game snapshots serializable and free of back-pointers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub map_id: MapId,
    pub coord: Coord,
}

impl Position {
    pub fn new(map_id: MapId, coord: Coord) -> Self {
        Self { map_id, coord }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_deltas() {
        assert_eq!(Coord::new(5, 5).toward(Direction::U), Coord::new(4, 5));
        assert_eq!(Coord::new(5, 5).toward(Direction::L), Coord::new(5, 4));
        assert_eq!(Coord::new(5, 5).toward(Direction::D), Coord::new(6, 5));
        assert_eq!(Coord::new(5, 5).toward(Direction::R), Coord::new(5, 6));
    }

    #[test]
    fn test_toward_can_leave_grid() {
        let edge = Coord::new(0, 0);
        assert_eq!(edge.toward(Direction::U), Coord::new(-1, 0));
        assert_eq!(edge.toward(Direction::L), Coord::new(0, -1));
    }

    #[test]
    fn test_participant_id_ordering() {
        let a = ParticipantId::new("alice");
        let b = ParticipantId::new("bob");
        assert!(a < b);
    }
}
