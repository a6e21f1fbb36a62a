//! Grid World
//!
//! Bounds-checked 2D cell grids. Each cell carries a type, optional blocking
//! overrides, attached effect records, and loose items. Blocking resolves in
//! priority order: per-cell override flag, then a state-dependent block rule,
//! then a per-map type override, then the cell-type default. Out-of-range
//! coordinates are always blocking.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::game::effect::EffectRecord;
use crate::game::item::Item;
use crate::game::types::{Coord, MapId};

/// Landmark name for the cell the goal item must reach.
pub const GOAL_LANDMARK: &str = "goal";
/// Landmark name for the cell that restocks the goal item.
pub const SUPPLY_LANDMARK: &str = "supply";

// =============================================================================
// CELL TYPES
// =============================================================================

/// The fixture occupying a cell. `Floor` is empty walkable space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellType {
    Floor,
    Wall,
    Fence,
    Pillar,
    Door,
    Table,
    TeaTable,
    Chair,
    Diary,
    Fridge,
    Closet,
    Bed,
    Sink,
    Stove,
    Platform,
    TrashCan,
    Bookshelf,
    ShoeRack,
    Flower,
    Tree,
    GoldCoin,
    SilverCoin,
}

impl CellType {
    /// Default walkability before any override or rule applies.
    pub fn blocks_by_default(self) -> bool {
        match self {
            CellType::Floor
            | CellType::Chair
            | CellType::ShoeRack
            | CellType::GoldCoin
            | CellType::SilverCoin => false,
            CellType::Wall
            | CellType::Fence
            | CellType::Pillar
            | CellType::Door
            | CellType::Table
            | CellType::TeaTable
            | CellType::Diary
            | CellType::Fridge
            | CellType::Closet
            | CellType::Bed
            | CellType::Sink
            | CellType::Stove
            | CellType::Platform
            | CellType::TrashCan
            | CellType::Bookshelf
            | CellType::Flower
            | CellType::Tree => true,
        }
    }
}

// =============================================================================
// BLOCKING
// =============================================================================

/// State-dependent blocking rule attached to a single cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockRule {
    /// Blocks unless the avatar inventory holds `item`; when it blocks, the
    /// hint is surfaced as a round message.
    WithoutItem { item: Item, hint: String },
}

impl BlockRule {
    fn verdict(&self, avatar_items: &[Item]) -> BlockVerdict {
        match self {
            BlockRule::WithoutItem { item, hint } => {
                if avatar_items.contains(item) {
                    BlockVerdict::open()
                } else {
                    BlockVerdict { blocked: true, hint: Some(hint.clone()) }
                }
            }
        }
    }
}

/// Outcome of a blocking query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockVerdict {
    pub blocked: bool,
    /// Hint message to surface when a block rule denied entry.
    pub hint: Option<String>,
}

impl BlockVerdict {
    fn open() -> Self {
        Self { blocked: false, hint: None }
    }

    fn closed() -> Self {
        Self { blocked: true, hint: None }
    }
}

// =============================================================================
// CELL
// =============================================================================

/// One grid cell. Effects and items attached here are gathered by the
/// INTERACT and STAND pipeline stages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub kind: CellType,
    /// Hard override of walkability; wins over rules and defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_override: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_rule: Option<BlockRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<EffectRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
}

impl Cell {
    pub fn of(kind: CellType) -> Self {
        Self { kind, block_override: None, block_rule: None, effects: Vec::new(), items: Vec::new() }
    }

    pub fn with_effects(mut self, effects: Vec<EffectRecord>) -> Self {
        self.effects = effects;
        self
    }

    pub fn with_items(mut self, items: Vec<Item>) -> Self {
        self.items = items;
        self
    }

    pub fn with_block_rule(mut self, rule: BlockRule) -> Self {
        self.block_rule = Some(rule);
        self
    }

    pub fn with_block_override(mut self, blocked: bool) -> Self {
        self.block_override = Some(blocked);
        self
    }

    /// Remove one occurrence of `item`, if present.
    pub fn take_item(&mut self, item: Item) -> Option<Item> {
        let idx = self.items.iter().position(|i| *i == item)?;
        Some(self.items.remove(idx))
    }
}

// =============================================================================
// GRID MAP
// =============================================================================

/// A named rectangular grid with landmark lookups and per-type blocking
/// overrides.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridMap {
    pub map_id: MapId,
    width: usize,
    height: usize,
    cells: Vec<Vec<Cell>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    landmarks: BTreeMap<String, Coord>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    type_overrides: BTreeMap<CellType, bool>,
}

impl GridMap {
    /// All-floor grid of `height` rows by `width` columns.
    pub fn new(map_id: MapId, height: usize, width: usize) -> Self {
        let cells = (0..height)
            .map(|_| (0..width).map(|_| Cell::of(CellType::Floor)).collect())
            .collect();
        Self {
            map_id,
            width,
            height,
            cells,
            landmarks: BTreeMap::new(),
            type_overrides: BTreeMap::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn in_bounds(&self, coord: Coord) -> bool {
        coord.row >= 0
            && coord.col >= 0
            && (coord.row as usize) < self.height
            && (coord.col as usize) < self.width
    }

    pub fn cell(&self, coord: Coord) -> Option<&Cell> {
        if !self.in_bounds(coord) {
            return None;
        }
        Some(&self.cells[coord.row as usize][coord.col as usize])
    }

    pub fn cell_mut(&mut self, coord: Coord) -> Option<&mut Cell> {
        if !self.in_bounds(coord) {
            return None;
        }
        Some(&mut self.cells[coord.row as usize][coord.col as usize])
    }

    pub fn set_cell(&mut self, coord: Coord, cell: Cell) {
        if let Some(slot) = self.cell_mut(coord) {
            *slot = cell;
        }
    }

    /// Resolve walkability for a step onto `coord`.
    ///
    /// Priority: out-of-bounds → per-cell override → block rule → per-map
    /// type override → cell-type default.
    pub fn blocking_verdict(&self, coord: Coord, avatar_items: &[Item]) -> BlockVerdict {
        let Some(cell) = self.cell(coord) else {
            return BlockVerdict::closed();
        };
        if let Some(blocked) = cell.block_override {
            return BlockVerdict { blocked, hint: None };
        }
        if let Some(rule) = &cell.block_rule {
            return rule.verdict(avatar_items);
        }
        if let Some(blocked) = self.type_overrides.get(&cell.kind) {
            return BlockVerdict { blocked: *blocked, hint: None };
        }
        if cell.kind.blocks_by_default() {
            BlockVerdict::closed()
        } else {
            BlockVerdict::open()
        }
    }

    /// Override the default walkability of every cell of `kind` on this map.
    /// Per-cell overrides and block rules still win.
    pub fn set_type_blocking(&mut self, kind: CellType, blocked: bool) {
        self.type_overrides.insert(kind, blocked);
    }

    pub fn set_landmark(&mut self, name: impl Into<String>, coord: Coord) {
        self.landmarks.insert(name.into(), coord);
    }

    pub fn landmark(&self, name: &str) -> Option<Coord> {
        self.landmarks.get(name).copied()
    }

    /// First cell satisfying the predicate, scanning row-major.
    pub fn find_cell(&self, mut predicate: impl FnMut(&Cell) -> bool) -> Option<Coord> {
        for (row, line) in self.cells.iter().enumerate() {
            for (col, cell) in line.iter().enumerate() {
                if predicate(cell) {
                    return Some(Coord::new(row as i32, col as i32));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_map() -> GridMap {
        let mut map = GridMap::new(MapId::new("test"), 3, 3);
        map.set_cell(Coord::new(0, 0), Cell::of(CellType::Wall));
        map.set_cell(Coord::new(1, 1), Cell::of(CellType::Chair));
        map
    }

    #[test]
    fn test_out_of_bounds_always_blocks() {
        let map = small_map();
        assert!(map.blocking_verdict(Coord::new(-1, 0), &[]).blocked);
        assert!(map.blocking_verdict(Coord::new(0, 3), &[]).blocked);
        assert!(map.cell(Coord::new(3, 0)).is_none());
    }

    #[test]
    fn test_type_defaults() {
        let map = small_map();
        assert!(map.blocking_verdict(Coord::new(0, 0), &[]).blocked, "wall blocks");
        assert!(!map.blocking_verdict(Coord::new(1, 1), &[]).blocked, "chair is walkable");
        assert!(!map.blocking_verdict(Coord::new(2, 2), &[]).blocked, "floor is walkable");
    }

    #[test]
    fn test_override_beats_default() {
        let mut map = small_map();
        map.set_cell(Coord::new(0, 0), Cell::of(CellType::Wall).with_block_override(false));
        assert!(!map.blocking_verdict(Coord::new(0, 0), &[]).blocked);
    }

    #[test]
    fn test_block_rule_checks_inventory_and_hints() {
        let mut map = small_map();
        map.set_cell(
            Coord::new(2, 0),
            Cell::of(CellType::Door).with_block_rule(BlockRule::WithoutItem {
                item: Item::Shoes,
                hint: "You need shoes first!".into(),
            }),
        );
        let denied = map.blocking_verdict(Coord::new(2, 0), &[]);
        assert!(denied.blocked);
        assert_eq!(denied.hint.as_deref(), Some("You need shoes first!"));

        let allowed = map.blocking_verdict(Coord::new(2, 0), &[Item::Shoes]);
        assert!(!allowed.blocked);
        assert!(allowed.hint.is_none());
    }

    #[test]
    fn test_type_override_applies_map_wide() {
        let mut map = small_map();
        map.set_cell(Coord::new(0, 1), Cell::of(CellType::Wall));
        map.set_type_blocking(CellType::Wall, false);
        assert!(!map.blocking_verdict(Coord::new(0, 0), &[]).blocked);
        assert!(!map.blocking_verdict(Coord::new(0, 1), &[]).blocked);
    }

    #[test]
    fn test_landmarks_and_find_cell() {
        let mut map = small_map();
        map.set_landmark(GOAL_LANDMARK, Coord::new(2, 2));
        assert_eq!(map.landmark(GOAL_LANDMARK), Some(Coord::new(2, 2)));
        assert_eq!(map.landmark(SUPPLY_LANDMARK), None);

        let wall = map.find_cell(|c| c.kind == CellType::Wall);
        assert_eq!(wall, Some(Coord::new(0, 0)));
    }

    #[test]
    fn test_take_item_removes_one_occurrence() {
        let mut cell = Cell::of(CellType::Table).with_items(vec![Item::Pot, Item::Pot]);
        assert_eq!(cell.take_item(Item::Pot), Some(Item::Pot));
        assert_eq!(cell.items.len(), 1);
        assert_eq!(cell.take_item(Item::Shoes), None);
    }
}
