//! Effect Records
//!
//! Effects are plain data: a record carries its trigger stages, an enabling
//! condition, a lifetime, an optional target group, and a handler-kind tag
//! with parameters. The actual mutation logic lives in the pipeline's
//! handler registry (`pipeline::handler_for`), which keeps every effect
//! definition serializable and testable in isolation.

use serde::{Deserialize, Serialize};

use crate::game::grid::CellType;
use crate::game::item::Item;
use crate::game::types::{Direction, Faction, ParticipantId};

// =============================================================================
// TRIGGERS
// =============================================================================

/// Evaluation points per round, in fixed pipeline order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStage {
    /// Matched against each participant's raw ballot, before the tally.
    Choose,
    /// Matched against the tallied action.
    Resolve,
    /// Fired for the cell the avatar attempted (and failed) to enter.
    Interact,
    /// Fired for the cell the avatar occupies at round end.
    Stand,
}

/// A single trigger declaration on an effect record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectTrigger {
    pub stage: TriggerStage,
    /// Direction constraint for Choose/Resolve triggers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

impl EffectTrigger {
    pub fn at(stage: TriggerStage) -> Self {
        Self { stage, direction: None }
    }

    pub fn at_direction(stage: TriggerStage, direction: Direction) -> Self {
        Self { stage, direction: Some(direction) }
    }
}

// =============================================================================
// LIFETIME / TARGET
// =============================================================================

/// Governs whether an effect stays enabled after firing once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifetime {
    /// Disabled immediately after the first successful fire; also cleared
    /// with the round's ephemeral buffer.
    OneVote,
    /// Disabled immediately after the first successful fire.
    OneTrigger,
    Permanent,
}

/// Who an effect applies to, as a closed tagged variant.
///
/// Faction tags and participant ids live in different arms, so the two
/// namespaces can never collide during resolution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSpec {
    Participant(ParticipantId),
    Faction(Faction),
    All,
}

// =============================================================================
// CONDITIONS
// =============================================================================

/// Data-only enabling predicate, evaluated against the hosting cell and the
/// avatar's inventory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectCondition {
    CellTypeIs(Vec<CellType>),
    CellHasItem(Item),
    AvatarHasItem(Item),
    AvatarMissingItem(Item),
    All(Vec<EffectCondition>),
    Any(Vec<EffectCondition>),
}

impl EffectCondition {
    /// Evaluate against the hosting cell (absent for round-scoped effects)
    /// and the avatar inventory.
    pub fn holds(&self, cell: Option<&crate::game::grid::Cell>, avatar_items: &[Item]) -> bool {
        match self {
            EffectCondition::CellTypeIs(kinds) => {
                cell.is_some_and(|c| kinds.contains(&c.kind))
            }
            EffectCondition::CellHasItem(item) => {
                cell.is_some_and(|c| c.items.contains(item))
            }
            EffectCondition::AvatarHasItem(item) => avatar_items.contains(item),
            EffectCondition::AvatarMissingItem(item) => !avatar_items.contains(item),
            EffectCondition::All(conds) => conds.iter().all(|c| c.holds(cell, avatar_items)),
            EffectCondition::Any(conds) => conds.iter().any(|c| c.holds(cell, avatar_items)),
        }
    }
}

// =============================================================================
// HANDLER KINDS
// =============================================================================

/// Arithmetic applied by score effects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ScoreOp {
    /// Apply the operation. Division by zero leaves the score untouched.
    pub fn apply(self, score: i64, operand: i64) -> i64 {
        match self {
            ScoreOp::Add => score.saturating_add(operand),
            ScoreOp::Sub => score.saturating_sub(operand),
            ScoreOp::Mul => score.saturating_mul(operand),
            ScoreOp::Div => {
                if operand == 0 {
                    score
                } else {
                    score / operand
                }
            }
        }
    }
}

/// Handler-kind tag plus parameters. The pipeline maps each tag to a pure
/// handler function; records themselves carry no executable code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EffectKind {
    /// Append a narrative message.
    Message { text: String },
    /// Reduce avatar life.
    Damage {
        amount: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Adjust the shared score, or a targeted participant's score when the
    /// record carries a target.
    AdjustScore {
        op: ScoreOp,
        operand: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Move one item from the hosting cell into the avatar inventory.
    TakeItem {
        item: Item,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Move one item from the avatar inventory onto the hosting cell.
    PutItem {
        item: Item,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Replace one avatar inventory item with another (e.g. filling the pot).
    ReplaceItem {
        from: Item,
        to: Item,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

// =============================================================================
// EFFECT RECORD
// =============================================================================

/// A complete effect definition, attachable to cells, items, the game state,
/// or a single round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectRecord {
    pub name: String,
    pub enabled: bool,
    pub triggers: Vec<EffectTrigger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<EffectCondition>,
    pub lifetime: Lifetime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetSpec>,
    #[serde(flatten)]
    pub kind: EffectKind,
}

impl EffectRecord {
    /// Permanent, untargeted, unconditional record with one trigger.
    pub fn new(name: impl Into<String>, trigger: EffectTrigger, kind: EffectKind) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            triggers: vec![trigger],
            condition: None,
            lifetime: Lifetime::Permanent,
            target: None,
            kind,
        }
    }

    pub fn with_condition(mut self, condition: EffectCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn with_target(mut self, target: TargetSpec) -> Self {
        self.target = Some(target);
        self
    }

    /// The trigger declared for `stage`, if any.
    pub fn trigger_at(&self, stage: TriggerStage) -> Option<&EffectTrigger> {
        self.triggers.iter().find(|t| t.stage == stage)
    }

    /// Disable one-shot records after a successful fire. Never re-enables.
    pub fn after_fire(&mut self) {
        match self.lifetime {
            Lifetime::OneVote | Lifetime::OneTrigger => self.enabled = false,
            Lifetime::Permanent => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::grid::Cell;

    #[test]
    fn test_score_ops() {
        assert_eq!(ScoreOp::Add.apply(10, 5), 15);
        assert_eq!(ScoreOp::Sub.apply(10, 5), 5);
        assert_eq!(ScoreOp::Mul.apply(10, 5), 50);
        assert_eq!(ScoreOp::Div.apply(10, 5), 2);
        assert_eq!(ScoreOp::Div.apply(10, 0), 10, "division by zero is a no-op");
    }

    #[test]
    fn test_one_shot_disables_once() {
        let mut effect = EffectRecord::new(
            "bonus",
            EffectTrigger::at(TriggerStage::Stand),
            EffectKind::AdjustScore { op: ScoreOp::Add, operand: 10, message: None },
        )
        .with_lifetime(Lifetime::OneVote);

        assert!(effect.enabled);
        effect.after_fire();
        assert!(!effect.enabled);

        // A second fire must not resurrect it.
        effect.after_fire();
        assert!(!effect.enabled);
    }

    #[test]
    fn test_permanent_stays_enabled() {
        let mut effect = EffectRecord::new(
            "hint",
            EffectTrigger::at(TriggerStage::Interact),
            EffectKind::Message { text: "hello".into() },
        );
        effect.after_fire();
        assert!(effect.enabled);
    }

    #[test]
    fn test_condition_cell_type() {
        let cond = EffectCondition::CellTypeIs(vec![CellType::Wall, CellType::Fence]);
        let wall = Cell::of(CellType::Wall);
        let floor = Cell::of(CellType::Floor);
        assert!(cond.holds(Some(&wall), &[]));
        assert!(!cond.holds(Some(&floor), &[]));
        assert!(!cond.holds(None, &[]), "round-scoped effects see no cell");
    }

    #[test]
    fn test_condition_inventory() {
        let has = EffectCondition::AvatarHasItem(Item::Pot);
        let missing = EffectCondition::AvatarMissingItem(Item::Shoes);
        let items = vec![Item::Pot];
        assert!(has.holds(None, &items));
        assert!(missing.holds(None, &items));
        assert!(!missing.holds(None, &[Item::Shoes]));
    }

    #[test]
    fn test_record_serializes_as_data() {
        let effect = EffectRecord::new(
            "hit-wall",
            EffectTrigger::at(TriggerStage::Interact),
            EffectKind::Damage { amount: 4, message: Some("ouch".into()) },
        );
        let json = serde_json::to_string(&effect).unwrap();
        assert!(json.contains("\"kind\":\"damage\""));
        let back: EffectRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, effect);
    }
}
