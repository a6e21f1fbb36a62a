//! Items
//!
//! Carryable objects. Items sit on cells or in the shared avatar inventory;
//! some carry their own effect records, gathered by the INTERACT/STAND
//! stages alongside the hosting cell's effects.

use serde::{Deserialize, Serialize};

use crate::game::effect::{EffectKind, EffectRecord, EffectTrigger, TriggerStage};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Item {
    /// Required to pass the front door.
    Shoes,
    /// The goal item; placing it on the tea table wins the game.
    Pot,
    /// A pot that has been filled at the sink.
    FilledPot,
    Gift,
    Trash,
    Fire,
}

impl Item {
    pub fn display_name(self) -> &'static str {
        match self {
            Item::Shoes => "shoes",
            Item::Pot => "pot",
            Item::FilledPot => "filled pot",
            Item::Gift => "gift",
            Item::Trash => "trash",
            Item::Fire => "fire",
        }
    }

    /// Effects contributed by this item when it lies on a stage's target
    /// cell. Item effects are re-derived every round, so only permanent
    /// records belong here.
    pub fn effects(self) -> Vec<EffectRecord> {
        match self {
            Item::Fire => vec![EffectRecord::new(
                "fire-burn",
                EffectTrigger::at(TriggerStage::Stand),
                EffectKind::Damage { amount: 2, message: Some("The fire scorches the avatar for 2 damage.".into()) },
            )],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fire_carries_a_stand_effect() {
        let effects = Item::Fire.effects();
        assert_eq!(effects.len(), 1);
        assert!(effects[0].trigger_at(TriggerStage::Stand).is_some());
    }

    #[test]
    fn test_plain_items_carry_none() {
        assert!(Item::Pot.effects().is_empty());
        assert!(Item::Shoes.effects().is_empty());
    }
}
