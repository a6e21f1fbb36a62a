//! Tally Resolution
//!
//! Pure ballot counting. Ties among the most-voted choices break by uniform
//! random pick; the RNG comes in as an argument so tests can seed it.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::game::types::{Direction, ParticipantId};
use crate::vote::ballot::Vote;

/// Ballot counts per direction. Directions with zero ballots are omitted.
pub fn counts(ballots: &BTreeMap<ParticipantId, Direction>) -> BTreeMap<Direction, usize> {
    let mut counts = BTreeMap::new();
    for direction in ballots.values() {
        *counts.entry(*direction).or_insert(0) += 1;
    }
    counts
}

/// The winning direction, or `None` when no ballots were cast.
pub fn resolve<R: Rng + ?Sized>(vote: &Vote, rng: &mut R) -> Option<Direction> {
    let counts = counts(&vote.ballots);
    let max = counts.values().copied().max().unwrap_or(0);
    if max == 0 {
        return None;
    }
    let leaders: Vec<Direction> = counts
        .iter()
        .filter(|(_, count)| **count == max)
        .map(|(direction, _)| *direction)
        .collect();
    leaders.choose(rng).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vote::ballot::Choice;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn vote_with(ballots: &[(&str, Direction)]) -> Vote {
        let choices = Direction::ALL.map(|d| Choice { id: d, can_go: Some(true) });
        let mut vote = Vote::new(1, choices, None);
        for (id, direction) in ballots {
            vote.ballots.insert(ParticipantId::new(*id), *direction);
        }
        vote
    }

    #[test]
    fn test_no_ballots_resolves_to_none() {
        let vote = vote_with(&[]);
        let mut rng = SmallRng::seed_from_u64(0);
        assert_eq!(resolve(&vote, &mut rng), None);
    }

    #[test]
    fn test_clear_majority_wins() {
        let vote = vote_with(&[
            ("a", Direction::U),
            ("b", Direction::U),
            ("c", Direction::D),
        ]);
        let mut rng = SmallRng::seed_from_u64(0);
        for _ in 0..20 {
            assert_eq!(resolve(&vote, &mut rng), Some(Direction::U));
        }
    }

    #[test]
    fn test_tie_break_never_picks_a_loser() {
        // U and L tie at 2; D trails with 1 and must never win.
        let vote = vote_with(&[
            ("a", Direction::U),
            ("b", Direction::U),
            ("c", Direction::L),
            ("d", Direction::L),
            ("e", Direction::D),
        ]);
        let mut rng = SmallRng::seed_from_u64(42);
        let mut saw_u = false;
        let mut saw_l = false;
        for _ in 0..200 {
            match resolve(&vote, &mut rng) {
                Some(Direction::U) => saw_u = true,
                Some(Direction::L) => saw_l = true,
                other => panic!("tie-break picked {other:?}"),
            }
        }
        // Uniformity in the loose, statistical sense: both leaders show up.
        assert!(saw_u && saw_l);
    }

    #[test]
    fn test_counts_skip_empty_directions() {
        let vote = vote_with(&[("a", Direction::R)]);
        let counts = counts(&vote.ballots);
        assert_eq!(counts.len(), 1);
        assert_eq!(counts.get(&Direction::R), Some(&1));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn direction_strategy() -> impl Strategy<Value = Direction> {
            prop::sample::select(Direction::ALL.to_vec())
        }

        proptest! {
            /// Whatever the ballots, the winner always holds a maximal count.
            #[test]
            fn winner_has_maximal_count(
                ballots in prop::collection::btree_map(
                    "[a-z]{1,8}",
                    direction_strategy(),
                    0..12,
                ),
                seed in any::<u64>(),
            ) {
                let mut vote = vote_with(&[]);
                for (id, direction) in &ballots {
                    vote.ballots.insert(ParticipantId::new(id.clone()), *direction);
                }
                let mut rng = SmallRng::seed_from_u64(seed);
                let tallied = counts(&vote.ballots);
                match resolve(&vote, &mut rng) {
                    None => prop_assert!(ballots.is_empty()),
                    Some(winner) => {
                        let max = tallied.values().copied().max().unwrap_or(0);
                        prop_assert_eq!(tallied.get(&winner).copied(), Some(max));
                    }
                }
            }
        }
    }
}
