//! Effect Pipeline
//!
//! Runs the four trigger stages in fixed order each round:
//! CHOOSE → RESOLVE → INTERACT → STAND.
//!
//! CHOOSE and RESOLVE evaluate the game's long-lived and round-scoped effect
//! buffers; INTERACT and STAND evaluate the effects attached to their target
//! cell plus the effects of items lying on it. Every invocation commits
//! immediately, so later candidates in the same pass observe earlier
//! mutations. Handlers are pure functions keyed by the record's kind tag;
//! records stay plain data.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::game::effect::{EffectKind, EffectRecord, TargetSpec, TriggerStage};
use crate::game::state::GameState;
use crate::game::types::{Direction, ParticipantId, Position};

/// Inputs shared by one full pipeline pass.
pub struct RoundContext<'a> {
    /// The tallied action, `None` when no ballots were cast.
    pub action: Option<Direction>,
    /// Raw per-participant ballots, for CHOOSE matching.
    pub ballots: &'a BTreeMap<ParticipantId, Direction>,
    /// Cell the avatar tried and failed to enter.
    pub interact_pos: Option<&'a Position>,
    /// Cell the avatar occupies after movement.
    pub stand_pos: Option<&'a Position>,
}

/// Per-invocation handler inputs.
pub struct FireContext<'a> {
    /// Resolved participant for targeted effects.
    pub target: Option<&'a ParticipantId>,
    /// Cell hosting the record, for item-transfer handlers.
    pub host: Option<&'a Position>,
}

/// Run all four stages for one round.
pub fn run_round(state: &mut GameState, ctx: &RoundContext) {
    run_ballot_stage(state, TriggerStage::Choose, ctx);
    run_ballot_stage(state, TriggerStage::Resolve, ctx);
    run_cell_stage(state, TriggerStage::Interact, ctx.interact_pos);
    run_cell_stage(state, TriggerStage::Stand, ctx.stand_pos);
}

// =============================================================================
// STAGE RUNNERS
// =============================================================================

/// CHOOSE/RESOLVE: evaluate `state.effects` then `state.ephemeral_effects`.
fn run_ballot_stage(state: &mut GameState, stage: TriggerStage, ctx: &RoundContext) {
    // Detach the buffers so handlers can mutate the rest of the state while
    // we hold mutable references to the records (for one-shot disabling).
    let mut global = std::mem::take(&mut state.effects);
    let mut ephemeral = std::mem::take(&mut state.ephemeral_effects);

    for effect in global.iter_mut().chain(ephemeral.iter_mut()) {
        fire_ballot_effect(state, effect, stage, ctx);
    }

    // Handlers may have appended records while the buffers were detached;
    // keep those additions behind the originals.
    let accrued = std::mem::replace(&mut state.effects, global);
    state.effects.extend(accrued);
    let accrued = std::mem::replace(&mut state.ephemeral_effects, ephemeral);
    state.ephemeral_effects.extend(accrued);
}

fn fire_ballot_effect(
    state: &mut GameState,
    effect: &mut EffectRecord,
    stage: TriggerStage,
    ctx: &RoundContext,
) {
    if !effect.enabled {
        return;
    }
    let Some(trigger) = effect.trigger_at(stage) else {
        return;
    };
    // Ballot-stage triggers must declare a direction to match against.
    let Some(want) = trigger.direction else {
        debug!(effect = %effect.name, ?stage, "ballot-stage trigger without direction, skipping");
        return;
    };
    if let Some(cond) = &effect.condition {
        if !cond.holds(None, &state.items) {
            return;
        }
    }

    let fired = match stage {
        TriggerStage::Choose => {
            // Per participant: the raw ballot must equal the declared
            // direction. An untargeted record covers every participant.
            let targets = match &effect.target {
                Some(spec) => resolve_targets(state, spec),
                None => state.players.keys().cloned().collect(),
            };
            let mut fired = false;
            for pid in targets {
                if ctx.ballots.get(&pid).copied() != Some(want) {
                    continue;
                }
                invoke(state, effect, &FireContext { target: Some(&pid), host: None });
                fired = true;
            }
            fired
        }
        TriggerStage::Resolve => {
            if ctx.action != Some(want) {
                return;
            }
            fire_for_targets(state, effect, None)
        }
        TriggerStage::Interact | TriggerStage::Stand => return,
    };

    if fired {
        effect.after_fire();
    }
}

/// INTERACT/STAND: evaluate the target cell's records plus the records of
/// items lying on it.
fn run_cell_stage(state: &mut GameState, stage: TriggerStage, pos: Option<&Position>) {
    let Some(pos) = pos else {
        return;
    };
    let Some(cell) = state.cell_at(pos) else {
        // Normal when the avatar bumped the grid edge.
        debug!(row = pos.coord.row, col = pos.coord.col, ?stage, "stage target has no cell");
        return;
    };

    let mut cell_effects = cell.effects.clone();
    let mut item_effects: Vec<EffectRecord> =
        cell.items.iter().flat_map(|i| i.effects()).collect();

    for effect in cell_effects.iter_mut() {
        fire_cell_effect(state, effect, stage, pos);
    }
    for effect in item_effects.iter_mut() {
        fire_cell_effect(state, effect, stage, pos);
    }

    // Persist one-shot disables on the cell's own records. Item records are
    // re-derived from the item table every round, so theirs are not kept.
    if let Some(cell) = state.cell_at_mut(pos) {
        cell.effects = cell_effects;
    }
}

fn fire_cell_effect(
    state: &mut GameState,
    effect: &mut EffectRecord,
    stage: TriggerStage,
    host: &Position,
) {
    if !effect.enabled {
        return;
    }
    if effect.trigger_at(stage).is_none() {
        return;
    }
    // Re-read the cell: earlier candidates in this pass may have moved items.
    let holds = effect
        .condition
        .as_ref()
        .map_or(true, |c| c.holds(state.cell_at(host), &state.items));
    if !holds {
        return;
    }
    if fire_for_targets(state, effect, Some(host)) {
        effect.after_fire();
    }
}

// =============================================================================
// TARGET RESOLUTION
// =============================================================================

/// Participants covered by a target spec, in deterministic id order.
pub fn resolve_targets(state: &GameState, spec: &TargetSpec) -> Vec<ParticipantId> {
    match spec {
        TargetSpec::Participant(id) => {
            if state.players.contains_key(id) {
                vec![id.clone()]
            } else {
                Vec::new()
            }
        }
        TargetSpec::Faction(faction) => state
            .players
            .iter()
            .filter(|(_, p)| p.faction == *faction)
            .map(|(id, _)| id.clone())
            .collect(),
        TargetSpec::All => state.players.keys().cloned().collect(),
    }
}

/// Invoke once per resolved participant for targeted records, or exactly
/// once with no participant for untargeted ones. Returns whether any
/// invocation happened.
fn fire_for_targets(state: &mut GameState, effect: &EffectRecord, host: Option<&Position>) -> bool {
    match &effect.target {
        Some(spec) => {
            let targets = resolve_targets(state, spec);
            let mut fired = false;
            for pid in &targets {
                invoke(state, effect, &FireContext { target: Some(pid), host });
                fired = true;
            }
            fired
        }
        None => {
            invoke(state, effect, &FireContext { target: None, host });
            true
        }
    }
}

// =============================================================================
// HANDLER REGISTRY
// =============================================================================

/// Pure handler function for one effect kind.
pub type EffectHandler = fn(&mut GameState, &FireContext, &EffectKind);

/// Map a kind tag to its handler.
pub fn handler_for(kind: &EffectKind) -> EffectHandler {
    match kind {
        EffectKind::Message { .. } => apply_message,
        EffectKind::Damage { .. } => apply_damage,
        EffectKind::AdjustScore { .. } => apply_adjust_score,
        EffectKind::TakeItem { .. } => apply_take_item,
        EffectKind::PutItem { .. } => apply_put_item,
        EffectKind::ReplaceItem { .. } => apply_replace_item,
    }
}

fn invoke(state: &mut GameState, effect: &EffectRecord, ctx: &FireContext) {
    debug!(effect = %effect.name, "firing effect");
    handler_for(&effect.kind)(state, ctx, &effect.kind);
}

fn apply_message(state: &mut GameState, _ctx: &FireContext, kind: &EffectKind) {
    let EffectKind::Message { text } = kind else { return };
    state.push_message(text.clone());
}

fn apply_damage(state: &mut GameState, _ctx: &FireContext, kind: &EffectKind) {
    let EffectKind::Damage { amount, message } = kind else { return };
    state.life -= amount;
    if let Some(message) = message {
        state.push_message(message.clone());
    }
}

fn apply_adjust_score(state: &mut GameState, ctx: &FireContext, kind: &EffectKind) {
    let EffectKind::AdjustScore { op, operand, message } = kind else { return };
    match ctx.target {
        Some(pid) => match state.players.get_mut(pid) {
            Some(player) => player.score = op.apply(player.score, *operand),
            None => {
                warn!(participant = %pid, "score target is no longer in the game");
                return;
            }
        },
        None => state.score = op.apply(state.score, *operand),
    }
    if let Some(message) = message {
        state.push_message(message.clone());
    }
}

fn apply_take_item(state: &mut GameState, ctx: &FireContext, kind: &EffectKind) {
    let EffectKind::TakeItem { item, message } = kind else { return };
    let Some(host) = ctx.host else {
        warn!(item = ?item, "take_item effect fired without a hosting cell");
        return;
    };
    let taken = state.cell_at_mut(host).and_then(|cell| cell.take_item(*item));
    match taken {
        Some(taken) => {
            state.items.push(taken);
            if let Some(message) = message {
                state.push_message(message.clone());
            }
        }
        None => warn!(item = ?item, "take_item: item is not on the cell"),
    }
}

fn apply_put_item(state: &mut GameState, ctx: &FireContext, kind: &EffectKind) {
    let EffectKind::PutItem { item, message } = kind else { return };
    let Some(host) = ctx.host else {
        warn!(item = ?item, "put_item effect fired without a hosting cell");
        return;
    };
    let Some(carried) = state.take_item(*item) else {
        warn!(item = ?item, "put_item: avatar does not carry the item");
        return;
    };
    match state.cell_at_mut(host) {
        Some(cell) => {
            cell.items.push(carried);
            if let Some(message) = message {
                state.push_message(message.clone());
            }
        }
        None => {
            warn!(item = ?item, "put_item: hosting cell vanished, returning item");
            state.items.push(carried);
        }
    }
}

fn apply_replace_item(state: &mut GameState, _ctx: &FireContext, kind: &EffectKind) {
    let EffectKind::ReplaceItem { from, to, message } = kind else { return };
    if state.take_item(*from).is_none() {
        warn!(item = ?from, "replace_item: avatar does not carry the item");
        return;
    }
    state.items.push(*to);
    if let Some(message) = message {
        state.push_message(message.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::effect::{EffectCondition, EffectTrigger, Lifetime, ScoreOp};
    use crate::game::grid::{Cell, CellType, GridMap};
    use crate::game::item::Item;
    use crate::game::state::PlayerState;
    use crate::game::types::{Coord, Faction, MapId};

    fn base_state() -> GameState {
        let map_id = MapId::new("t");
        let map = GridMap::new(map_id.clone(), 4, 4);
        GameState {
            maps: BTreeMap::from([(map_id.clone(), map)]),
            position_stack: vec![Position::new(map_id, Coord::new(1, 1))],
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

    fn ctx_with<'a>(
        action: Option<Direction>,
        ballots: &'a BTreeMap<ParticipantId, Direction>,
        interact: Option<&'a Position>,
        stand: Option<&'a Position>,
    ) -> RoundContext<'a> {
        RoundContext { action, ballots, interact_pos: interact, stand_pos: stand }
    }

    #[test]
    fn test_choose_matches_raw_ballots_per_participant() {
        let mut state = base_state();
        state.players.insert(ParticipantId::new("a"), PlayerState::new(Faction::Red));
        state.players.insert(ParticipantId::new("b"), PlayerState::new(Faction::Blue));
        state.effects.push(
            EffectRecord::new(
                "reward-up-voters",
                EffectTrigger::at_direction(TriggerStage::Choose, Direction::U),
                EffectKind::AdjustScore { op: ScoreOp::Add, operand: 5, message: None },
            )
            .with_target(TargetSpec::All),
        );

        let ballots = BTreeMap::from([
            (ParticipantId::new("a"), Direction::U),
            (ParticipantId::new("b"), Direction::L),
        ]);
        let ctx = ctx_with(Some(Direction::L), &ballots, None, None);
        run_round(&mut state, &ctx);

        // Only the participant whose raw ballot matched the trigger scored,
        // even though the tallied action was L.
        assert_eq!(state.players[&ParticipantId::new("a")].score, 5);
        assert_eq!(state.players[&ParticipantId::new("b")].score, 0);
    }

    #[test]
    fn test_resolve_matches_tallied_action() {
        let mut state = base_state();
        state.effects.push(EffectRecord::new(
            "down-penalty",
            EffectTrigger::at_direction(TriggerStage::Resolve, Direction::D),
            EffectKind::Damage { amount: 1, message: None },
        ));

        let ballots = BTreeMap::new();
        run_round(&mut state, &ctx_with(Some(Direction::U), &ballots, None, None));
        assert_eq!(state.life, 40, "non-matching action does not fire");

        run_round(&mut state, &ctx_with(Some(Direction::D), &ballots, None, None));
        assert_eq!(state.life, 39);
    }

    #[test]
    fn test_interact_gathers_cell_effects() {
        let mut state = base_state();
        let pos = Position::new(MapId::new("t"), Coord::new(0, 0));
        let wall = Cell::of(CellType::Wall).with_effects(vec![EffectRecord::new(
            "hit-wall",
            EffectTrigger::at(TriggerStage::Interact),
            EffectKind::Damage { amount: 4, message: Some("Bumped the wall.".into()) },
        )]);
        state.maps.get_mut(&MapId::new("t")).unwrap().set_cell(pos.coord, wall);

        let ballots = BTreeMap::new();
        run_round(&mut state, &ctx_with(None, &ballots, Some(&pos), None));
        assert_eq!(state.life, 36);
        assert_eq!(state.messages, vec!["Bumped the wall.".to_string()]);
    }

    #[test]
    fn test_stand_gathers_item_effects() {
        let mut state = base_state();
        let pos = Position::new(MapId::new("t"), Coord::new(2, 2));
        state
            .maps
            .get_mut(&MapId::new("t"))
            .unwrap()
            .set_cell(pos.coord, Cell::of(CellType::Floor).with_items(vec![Item::Fire]));

        let ballots = BTreeMap::new();
        run_round(&mut state, &ctx_with(None, &ballots, None, Some(&pos)));
        assert_eq!(state.life, 38, "fire on the stand cell burns");
    }

    #[test]
    fn test_one_shot_cell_effect_fires_once_across_rounds() {
        let mut state = base_state();
        let pos = Position::new(MapId::new("t"), Coord::new(2, 2));
        let coin = Cell::of(CellType::GoldCoin).with_effects(vec![EffectRecord::new(
            "gold-coin",
            EffectTrigger::at(TriggerStage::Stand),
            EffectKind::AdjustScore { op: ScoreOp::Add, operand: 10, message: None },
        )
        .with_lifetime(Lifetime::OneTrigger)]);
        state.maps.get_mut(&MapId::new("t")).unwrap().set_cell(pos.coord, coin);

        let ballots = BTreeMap::new();
        for _ in 0..3 {
            run_round(&mut state, &ctx_with(None, &ballots, None, Some(&pos)));
        }
        assert_eq!(state.score, 10, "one-shot record must fire exactly once");
    }

    #[test]
    fn test_take_item_moves_cell_item_to_inventory() {
        let mut state = base_state();
        let pos = Position::new(MapId::new("t"), Coord::new(0, 1));
        let stove = Cell::of(CellType::Stove)
            .with_items(vec![Item::Pot])
            .with_effects(vec![EffectRecord::new(
                "take-pot",
                EffectTrigger::at(TriggerStage::Interact),
                EffectKind::TakeItem { item: Item::Pot, message: Some("Picked up the pot.".into()) },
            )
            .with_condition(EffectCondition::CellHasItem(Item::Pot))]);
        state.maps.get_mut(&MapId::new("t")).unwrap().set_cell(pos.coord, stove);

        let ballots = BTreeMap::new();
        run_round(&mut state, &ctx_with(None, &ballots, Some(&pos), None));
        assert!(state.has_item(Item::Pot));
        assert!(state.cell_at(&pos).unwrap().items.is_empty());

        // Second interaction: the condition no longer holds, nothing happens.
        state.messages.clear();
        run_round(&mut state, &ctx_with(None, &ballots, Some(&pos), None));
        assert!(state.messages.is_empty());
        assert_eq!(state.items, vec![Item::Pot]);
    }

    #[test]
    fn test_put_item_requires_carried_item() {
        let mut state = base_state();
        let pos = Position::new(MapId::new("t"), Coord::new(0, 1));
        let table = Cell::of(CellType::TeaTable).with_effects(vec![EffectRecord::new(
            "put-pot",
            EffectTrigger::at(TriggerStage::Interact),
            EffectKind::PutItem { item: Item::Pot, message: None },
        )
        .with_condition(EffectCondition::AvatarHasItem(Item::Pot))]);
        state.maps.get_mut(&MapId::new("t")).unwrap().set_cell(pos.coord, table);

        let ballots = BTreeMap::new();
        run_round(&mut state, &ctx_with(None, &ballots, Some(&pos), None));
        assert!(state.cell_at(&pos).unwrap().items.is_empty(), "nothing to put");

        state.items.push(Item::Pot);
        run_round(&mut state, &ctx_with(None, &ballots, Some(&pos), None));
        assert_eq!(state.cell_at(&pos).unwrap().items, vec![Item::Pot]);
        assert!(!state.has_item(Item::Pot));
    }

    #[test]
    fn test_out_of_bounds_stage_target_is_a_noop() {
        let mut state = base_state();
        let pos = Position::new(MapId::new("t"), Coord::new(-1, 0));
        let ballots = BTreeMap::new();
        run_round(&mut state, &ctx_with(None, &ballots, Some(&pos), None));
        assert_eq!(state.life, 40);
        assert!(state.messages.is_empty());
    }

    #[test]
    fn test_faction_targeting() {
        let mut state = base_state();
        state.players.insert(ParticipantId::new("r1"), PlayerState::new(Faction::Red));
        state.players.insert(ParticipantId::new("r2"), PlayerState::new(Faction::Red));
        state.players.insert(ParticipantId::new("b1"), PlayerState::new(Faction::Blue));
        state.ephemeral_effects.push(
            EffectRecord::new(
                "red-bonus",
                EffectTrigger::at_direction(TriggerStage::Resolve, Direction::R),
                EffectKind::AdjustScore { op: ScoreOp::Add, operand: 3, message: None },
            )
            .with_target(TargetSpec::Faction(Faction::Red)),
        );

        let ballots = BTreeMap::new();
        run_round(&mut state, &ctx_with(Some(Direction::R), &ballots, None, None));
        assert_eq!(state.players[&ParticipantId::new("r1")].score, 3);
        assert_eq!(state.players[&ParticipantId::new("r2")].score, 3);
        assert_eq!(state.players[&ParticipantId::new("b1")].score, 0);
    }
}
