//! Game Engine
//!
//! The per-round state transform. Pure with respect to I/O: no timers, no
//! sockets, no randomness. One call applies one tallied action to the world
//! in a fixed step order:
//!
//! 1. clear the per-round message buffer
//! 2. attempt the move (blocked targets become the interact cell)
//! 3. run the effect pipeline (CHOOSE → RESOLVE → INTERACT → STAND)
//! 4. evaluate terminal conditions
//! 5. drop round-scoped effects

use std::collections::BTreeMap;

use tracing::{debug, error, info};

use crate::game::grid::GOAL_LANDMARK;
use crate::game::item::Item;
use crate::game::pipeline::{self, RoundContext};
use crate::game::state::{GameEnd, GameState};
use crate::game::types::{Direction, MapId, ParticipantId, Position};

/// Engine tunables. Defaults match the built-in apartment scenario.
#[derive(Clone, Debug)]
pub struct GameConfig {
    /// Avatar life at game start.
    pub initial_life: i32,
    /// Item that must reach the goal cell to win.
    pub goal_item: Item,
    /// Map holding the goal landmark.
    pub goal_map: MapId,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self { initial_life: 40, goal_item: Item::Pot, goal_map: MapId::home() }
    }
}

pub struct GameEngine {
    config: GameConfig,
}

impl GameEngine {
    pub fn new(config: GameConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Apply one round. `action` is the tallied direction (`None` when the
    /// vote produced no ballots); `ballots` are the raw per-participant
    /// choices for CHOOSE-stage effects.
    ///
    /// Calling on an ended game only re-evaluates the terminal conditions.
    pub fn transform(
        &self,
        state: &mut GameState,
        action: Option<Direction>,
        ballots: &BTreeMap<ParticipantId, Direction>,
    ) {
        if state.is_ended() {
            debug!("transform on ended game: terminal re-check only");
            self.check_terminal(state);
            return;
        }

        state.messages.clear();

        // --- movement ---------------------------------------------------
        let Some(position) = state.current_position().cloned() else {
            error!("transform aborted: no avatar position");
            return;
        };
        let Some(map) = state.maps.get(&position.map_id) else {
            error!(map = %position.map_id, "transform aborted: unknown map");
            return;
        };

        let mut interact_pos: Option<Position> = None;
        if let Some(direction) = action {
            let toward = position.coord.toward(direction);
            let verdict = map.blocking_verdict(toward, &state.items);
            if verdict.blocked {
                if let Some(hint) = verdict.hint {
                    state.push_message(hint);
                }
                interact_pos = Some(Position::new(position.map_id.clone(), toward));
            } else {
                state.set_current_position(Position::new(position.map_id.clone(), toward));
            }
        }
        let stand_pos = state
            .current_position()
            .cloned()
            .unwrap_or_else(|| position.clone());

        // --- effect pipeline --------------------------------------------
        let ctx = RoundContext {
            action,
            ballots,
            interact_pos: interact_pos.as_ref(),
            stand_pos: Some(&stand_pos),
        };
        pipeline::run_round(state, &ctx);

        // --- terminal conditions ----------------------------------------
        self.check_terminal(state);

        // --- round cleanup ----------------------------------------------
        state.ephemeral_effects.clear();
    }

    /// Whether a step toward `direction` would succeed, for vote-choice
    /// eligibility previews. `None` when the state is missing position data.
    pub fn can_go(&self, state: &GameState, direction: Direction) -> Option<bool> {
        let position = state.position_stack.last()?;
        let map = state.maps.get(&position.map_id)?;
        let toward = position.coord.toward(direction);
        Some(!map.blocking_verdict(toward, &state.items).blocked)
    }

    /// Win and loss checks. Appends exactly one terminal message, on the
    /// transition into the terminal state only.
    fn check_terminal(&self, state: &mut GameState) {
        if state.is_ended() {
            // Conditions stay satisfied once reached; nothing to append.
            return;
        }
        if self.goal_reached(state) {
            state.ended = Some(GameEnd::Success);
            state.push_message(format!(
                "The {} is on the tea table. Quest complete! Final score: {}",
                self.config.goal_item.display_name(),
                state.score
            ));
            info!(score = state.score, "game won");
        } else if state.life <= 0 {
            state.ended = Some(GameEnd::Failed);
            state.push_message("The avatar has collapsed. Game over.");
            info!(life = state.life, "game lost");
        }
    }

    fn goal_reached(&self, state: &GameState) -> bool {
        let Some(map) = state.maps.get(&self.config.goal_map) else {
            error!(map = %self.config.goal_map, "goal map missing from state");
            return false;
        };
        let Some(coord) = map.landmark(GOAL_LANDMARK) else {
            debug!(map = %self.config.goal_map, "no goal landmark on map");
            return false;
        };
        map.cell(coord)
            .is_some_and(|cell| cell.items.contains(&self.config.goal_item))
    }
}
