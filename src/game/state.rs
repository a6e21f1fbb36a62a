//! Game State
//!
//! The single authoritative snapshot of the shared world: maps, the avatar's
//! position stack, life/score, per-participant records, inventories, effect
//! buffers, and the per-round message log. Everything here is plain
//! serializable data; timers and sockets never touch this module.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::game::effect::EffectRecord;
use crate::game::grid::{Cell, GridMap};
use crate::game::item::Item;
use crate::game::types::{Faction, MapId, ParticipantId, Position};

// =============================================================================
// PLAYERS
// =============================================================================

/// Per-participant game record. Participants who disconnect mid-game keep
/// their record in `removed_players` and get it back on rejoin.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    pub faction: Faction,
    pub score: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
}

impl PlayerState {
    pub fn new(faction: Faction) -> Self {
        Self { faction, score: 0, items: Vec::new() }
    }
}

/// Terminal outcome of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameEnd {
    Success,
    Failed,
}

// =============================================================================
// GAME STATE
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub maps: BTreeMap<MapId, GridMap>,
    /// Avatar location history; the top entry is the current position.
    pub position_stack: Vec<Position>,
    pub life: i32,
    /// Shared crowd score. Targeted score effects hit `players` instead.
    pub score: i64,
    pub players: BTreeMap<ParticipantId, PlayerState>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub removed_players: BTreeMap<ParticipantId, PlayerState>,
    /// Shared avatar inventory.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
    /// Long-lived effects, evaluated by the CHOOSE/RESOLVE stages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<EffectRecord>,
    /// Round-scoped effects; cleared at the end of every transform pass.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ephemeral_effects: Vec<EffectRecord>,
    /// Narrative messages produced by the current round.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
    pub paused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended: Option<GameEnd>,
}

impl GameState {
    /// The avatar's current position (top of the stack).
    pub fn current_position(&self) -> Option<&Position> {
        let pos = self.position_stack.last();
        if pos.is_none() {
            error!("game state has an empty position stack");
        }
        pos
    }

    pub fn current_map(&self) -> Option<&GridMap> {
        let pos = self.current_position()?;
        self.maps.get(&pos.map_id)
    }

    /// Replace the current position's coordinate in place.
    pub fn set_current_position(&mut self, position: Position) {
        match self.position_stack.last_mut() {
            Some(top) => *top = position,
            None => error!("cannot move avatar: empty position stack"),
        }
    }

    pub fn cell_at(&self, position: &Position) -> Option<&Cell> {
        self.maps.get(&position.map_id)?.cell(position.coord)
    }

    pub fn cell_at_mut(&mut self, position: &Position) -> Option<&mut Cell> {
        self.maps.get_mut(&position.map_id)?.cell_mut(position.coord)
    }

    pub fn has_item(&self, item: Item) -> bool {
        self.items.contains(&item)
    }

    /// Remove one occurrence of `item` from the avatar inventory.
    pub fn take_item(&mut self, item: Item) -> Option<Item> {
        let idx = self.items.iter().position(|i| *i == item)?;
        Some(self.items.remove(idx))
    }

    pub fn push_message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Register a participant, restoring a previous record if one exists.
    /// Returns false when the participant was already present.
    pub fn add_player(&mut self, id: ParticipantId, fresh: PlayerState) -> bool {
        if self.players.contains_key(&id) {
            return false;
        }
        let record = self.removed_players.remove(&id).unwrap_or(fresh);
        self.players.insert(id, record);
        true
    }

    /// Park a departing participant's record for a possible rejoin.
    pub fn remove_player(&mut self, id: &ParticipantId) -> bool {
        match self.players.remove(id) {
            Some(record) => {
                self.removed_players.insert(id.clone(), record);
                true
            }
            None => false,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::grid::CellType;
    use crate::game::types::Coord;

    fn tiny_state() -> GameState {
        let map_id = MapId::new("t");
        let mut map = GridMap::new(map_id.clone(), 2, 2);
        map.set_cell(Coord::new(0, 1), Cell::of(CellType::Wall));
        GameState {
            maps: BTreeMap::from([(map_id.clone(), map)]),
            position_stack: vec![Position::new(map_id, Coord::new(0, 0))],
            life: 40,
            score: 0,
            players: BTreeMap::new(),
            removed_players: BTreeMap::new(),
            items: Vec::new(),
            effects: Vec::new(),
            ephemeral_effects: Vec::new(),
            messages: Vec::new(),
            paused: false,
            ended: None,
        }
    }

    #[test]
    fn test_cell_lookup_through_position() {
        let state = tiny_state();
        let pos = Position::new(MapId::new("t"), Coord::new(0, 1));
        assert_eq!(state.cell_at(&pos).map(|c| c.kind), Some(CellType::Wall));
        let off = Position::new(MapId::new("t"), Coord::new(5, 5));
        assert!(state.cell_at(&off).is_none());
    }

    #[test]
    fn test_rejoin_restores_player_record() {
        let mut state = tiny_state();
        let alice = ParticipantId::new("alice");
        assert!(state.add_player(alice.clone(), PlayerState::new(Faction::Red)));
        state.players.get_mut(&alice).unwrap().score = 7;

        assert!(state.remove_player(&alice));
        assert!(state.players.is_empty());

        // Rejoin gets the old record back, not the fresh one.
        assert!(state.add_player(alice.clone(), PlayerState::new(Faction::Blue)));
        let restored = &state.players[&alice];
        assert_eq!(restored.score, 7);
        assert_eq!(restored.faction, Faction::Red);
    }

    #[test]
    fn test_double_join_is_rejected() {
        let mut state = tiny_state();
        let alice = ParticipantId::new("alice");
        assert!(state.add_player(alice.clone(), PlayerState::new(Faction::Red)));
        assert!(!state.add_player(alice, PlayerState::new(Faction::Blue)));
    }

    #[test]
    fn test_inventory_take() {
        let mut state = tiny_state();
        state.items = vec![Item::Pot, Item::Shoes];
        assert_eq!(state.take_item(Item::Pot), Some(Item::Pot));
        assert!(!state.has_item(Item::Pot));
        assert!(state.has_item(Item::Shoes));
        assert_eq!(state.take_item(Item::Pot), None);
    }
}
