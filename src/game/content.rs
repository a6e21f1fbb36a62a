//! Built-in Content
//!
//! The `home` apartment map and initial game state. The layout is authored
//! as a glyph grid with a legend, so the room reads at a glance; fixture
//! behavior comes from per-type default effect records.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::game::effect::{
    EffectCondition, EffectKind, EffectRecord, EffectTrigger, Lifetime, ScoreOp, TriggerStage,
};
use crate::game::engine::GameConfig;
use crate::game::grid::{
    BlockRule, Cell, CellType, GridMap, GOAL_LANDMARK, SUPPLY_LANDMARK,
};
use crate::game::item::Item;
use crate::game::state::{GameState, PlayerState};
use crate::game::types::{Coord, Faction, MapId, ParticipantId, Position};

/// The apartment, one glyph per cell. `@` marks the avatar start (floor).
const HOME_LAYOUT: &[&str] = &[
    "##############",
    "#F.K.S....P..#",
    "#............#",
    "#..t......d..#",
    "#..T......b..#",
    "#.c..........#",
    "#......@..g..#",
    "#.o........s.#",
    "#.....r......#",
    "#R........B..#",
    "#.........C..#",
    "#######D######",
];

fn cell_type_for(glyph: char) -> CellType {
    match glyph {
        '#' => CellType::Wall,
        'D' => CellType::Door,
        'F' => CellType::Fridge,
        'K' => CellType::Sink,
        'S' => CellType::Stove,
        'P' => CellType::Platform,
        't' => CellType::Table,
        'T' => CellType::TeaTable,
        'd' => CellType::Diary,
        'b' => CellType::Bookshelf,
        'c' => CellType::Chair,
        'o' => CellType::Flower,
        'r' => CellType::ShoeRack,
        'R' => CellType::TrashCan,
        'B' => CellType::Bed,
        'C' => CellType::Closet,
        'g' => CellType::GoldCoin,
        's' => CellType::SilverCoin,
        _ => CellType::Floor,
    }
}

/// Whether pots can be taken from / put onto this fixture.
fn is_pot_surface(kind: CellType) -> bool {
    matches!(
        kind,
        CellType::Table | CellType::TeaTable | CellType::Stove | CellType::Platform | CellType::Fridge
    )
}

fn pot_surface_effects() -> Vec<EffectRecord> {
    let mut effects = Vec::new();
    for pot in [Item::Pot, Item::FilledPot] {
        effects.push(
            EffectRecord::new(
                format!("take-{}", pot.display_name().replace(' ', "-")),
                EffectTrigger::at(TriggerStage::Interact),
                EffectKind::TakeItem {
                    item: pot,
                    message: Some(format!("The avatar picks up the {}.", pot.display_name())),
                },
            )
            .with_condition(EffectCondition::CellHasItem(pot)),
        );
        effects.push(
            EffectRecord::new(
                format!("put-{}", pot.display_name().replace(' ', "-")),
                EffectTrigger::at(TriggerStage::Interact),
                EffectKind::PutItem {
                    item: pot,
                    message: Some(format!("The avatar sets the {} down.", pot.display_name())),
                },
            )
            .with_condition(EffectCondition::AvatarHasItem(pot)),
        );
    }
    effects
}

/// Default effect records for each fixture type.
fn default_effects(kind: CellType) -> Vec<EffectRecord> {
    let mut effects = Vec::new();
    match kind {
        CellType::Wall | CellType::Fence | CellType::Pillar => {
            effects.push(EffectRecord::new(
                "hit-wall",
                EffectTrigger::at(TriggerStage::Interact),
                EffectKind::Damage {
                    amount: 4,
                    message: Some("Slammed into the wall for 4 damage.".into()),
                },
            ));
        }
        CellType::Diary => {
            effects.push(EffectRecord::new(
                "read-diary",
                EffectTrigger::at(TriggerStage::Interact),
                EffectKind::Message {
                    text: "Diary: Sunday is the big birthday dinner. Fetch the pot \
                           and set it on the tea table!"
                        .into(),
                },
            ));
        }
        CellType::Sink => {
            effects.push(
                EffectRecord::new(
                    "fill-pot",
                    EffectTrigger::at(TriggerStage::Interact),
                    EffectKind::ReplaceItem {
                        from: Item::Pot,
                        to: Item::FilledPot,
                        message: Some("The avatar fills the pot with water.".into()),
                    },
                )
                .with_condition(EffectCondition::AvatarHasItem(Item::Pot)),
            );
        }
        CellType::TrashCan => {
            effects.push(EffectRecord::new(
                "smelly-trash",
                EffectTrigger::at(TriggerStage::Interact),
                EffectKind::Message { text: "The trash can could use emptying.".into() },
            ));
        }
        CellType::Bookshelf => {
            effects.push(EffectRecord::new(
                "browse-books",
                EffectTrigger::at(TriggerStage::Interact),
                EffectKind::Message { text: "Rows of cookbooks. None about pots.".into() },
            ));
        }
        CellType::Flower => {
            effects.push(EffectRecord::new(
                "flower-pot",
                EffectTrigger::at(TriggerStage::Interact),
                EffectKind::Message { text: "Careful with the flowerpot!".into() },
            ));
        }
        CellType::ShoeRack => {
            effects.push(
                EffectRecord::new(
                    "wear-shoes",
                    EffectTrigger::at(TriggerStage::Stand),
                    EffectKind::TakeItem {
                        item: Item::Shoes,
                        message: Some("The avatar puts on the shoes.".into()),
                    },
                )
                .with_condition(EffectCondition::CellHasItem(Item::Shoes)),
            );
        }
        CellType::GoldCoin => {
            effects.push(
                EffectRecord::new(
                    "gold-coin",
                    EffectTrigger::at(TriggerStage::Stand),
                    EffectKind::AdjustScore {
                        op: ScoreOp::Add,
                        operand: 10,
                        message: Some("Picked up a gold coin (+10).".into()),
                    },
                )
                .with_lifetime(Lifetime::OneTrigger),
            );
        }
        CellType::SilverCoin => {
            effects.push(
                EffectRecord::new(
                    "silver-coin",
                    EffectTrigger::at(TriggerStage::Stand),
                    EffectKind::AdjustScore {
                        op: ScoreOp::Add,
                        operand: 5,
                        message: Some("Picked up a silver coin (+5).".into()),
                    },
                )
                .with_lifetime(Lifetime::OneTrigger),
            );
        }
        _ => {}
    }
    if is_pot_surface(kind) {
        effects.extend(pot_surface_effects());
    }
    effects
}

/// Build the apartment map. Returns the map and the avatar start coordinate.
pub fn build_home_map() -> (GridMap, Coord) {
    let height = HOME_LAYOUT.len();
    let width = HOME_LAYOUT[0].len();
    let mut map = GridMap::new(MapId::home(), height, width);
    let mut start = Coord::new(1, 1);

    for (row, line) in HOME_LAYOUT.iter().enumerate() {
        for (col, glyph) in line.chars().enumerate() {
            let coord = Coord::new(row as i32, col as i32);
            if glyph == '@' {
                start = coord;
                continue;
            }
            let kind = cell_type_for(glyph);
            if kind == CellType::Floor {
                continue;
            }
            let mut cell = Cell::of(kind).with_effects(default_effects(kind));
            match kind {
                CellType::Door => {
                    cell = cell.with_block_rule(BlockRule::WithoutItem {
                        item: Item::Shoes,
                        hint: "The front door is shut. You need shoes before going out!".into(),
                    });
                }
                CellType::Stove => cell.items.push(Item::Pot),
                CellType::ShoeRack => cell.items.push(Item::Shoes),
                _ => {}
            }
            map.set_cell(coord, cell);
        }
    }

    if let Some(goal) = map.find_cell(|c| c.kind == CellType::TeaTable) {
        map.set_landmark(GOAL_LANDMARK, goal);
    }
    if let Some(supply) = map.find_cell(|c| c.kind == CellType::Stove) {
        map.set_landmark(SUPPLY_LANDMARK, supply);
    }
    (map, start)
}

/// Seed a fresh game for the given roster. Each participant gets a random
/// faction.
pub fn new_game_state<R: Rng + ?Sized>(
    config: &GameConfig,
    roster: impl IntoIterator<Item = ParticipantId>,
    rng: &mut R,
) -> GameState {
    let (map, start) = build_home_map();
    let map_id = map.map_id.clone();
    let players: BTreeMap<ParticipantId, PlayerState> = roster
        .into_iter()
        .map(|id| {
            let faction = *Faction::ALL
                .choose(rng)
                .unwrap_or(&Faction::Red);
            (id, PlayerState::new(faction))
        })
        .collect();

    GameState {
        maps: BTreeMap::from([(map_id.clone(), map)]),
        position_stack: vec![Position::new(map_id, start)],
        life: config.initial_life,
        score: 0,
        players,
        removed_players: BTreeMap::new(),
        items: Vec::new(),
        effects: Vec::new(),
        ephemeral_effects: Vec::new(),
        messages: Vec::new(),
        paused: false,
        ended: None,
    }
}
