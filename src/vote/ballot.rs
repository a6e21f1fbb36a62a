//! Votes and Ballots
//!
//! One `Vote` per round: four directional choices, last-write-wins ballots,
//! and an optional countdown. Internal deadline math uses the tokio clock
//! (testable when paused); wire snapshots carry epoch milliseconds and never
//! expose timer internals.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use crate::game::types::{Direction, ParticipantId};
use crate::vote::tally;

/// Countdown applied to votes whose spec does not name one.
pub const DEFAULT_VOTE_TIMEOUT_MS: u64 = 10_000;

pub type VoteId = Uuid;

/// What is being voted on. Only directional votes exist today; the tag keeps
/// the wire format open for other ballot kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteKind {
    Direction,
}

/// One selectable option, with its walkability preview.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: Direction,
    /// Whether stepping this way would currently succeed; `None` when the
    /// preview could not be computed.
    pub can_go: Option<bool>,
}

/// Parameters for opening a vote.
#[derive(Clone, Debug)]
pub struct VoteSpec {
    /// `None` opens an untimed vote that only ends on an explicit command.
    pub timeout_ms: Option<u64>,
    /// Round-scoped effects registered on the game state for this round.
    pub round_effects: Vec<crate::game::effect::EffectRecord>,
}

impl Default for VoteSpec {
    fn default() -> Self {
        Self { timeout_ms: Some(DEFAULT_VOTE_TIMEOUT_MS), round_effects: Vec::new() }
    }
}

/// A round's vote. At most one non-finished, non-canceled vote exists at a
/// time; the coordinator enforces that.
#[derive(Clone, Debug)]
pub struct Vote {
    pub id: VoteId,
    pub kind: VoteKind,
    pub round: u32,
    pub choices: [Choice; 4],
    pub ballots: BTreeMap<ParticipantId, Direction>,
    pub timeout_ms: Option<u64>,
    /// Armed deadline on the tokio clock; `None` while paused, untimed, or
    /// ended.
    deadline: Option<Instant>,
    /// Wall-clock mirror of the deadline, for snapshots.
    end_time_epoch_ms: Option<i64>,
    /// Countdown left when paused.
    remaining_ms: Option<u64>,
    pub paused: bool,
    pub finished: bool,
    pub canceled: bool,
}

impl Vote {
    pub fn new(round: u32, choices: [Choice; 4], timeout_ms: Option<u64>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: VoteKind::Direction,
            round,
            choices,
            ballots: BTreeMap::new(),
            timeout_ms,
            deadline: None,
            end_time_epoch_ms: None,
            remaining_ms: None,
            paused: false,
            finished: false,
            canceled: false,
        }
    }

    /// Still accepting ballots or lifecycle commands.
    pub fn is_active(&self) -> bool {
        !self.finished && !self.canceled
    }

    pub fn is_running(&self) -> bool {
        self.is_active() && !self.paused
    }

    pub fn accepts_choice(&self, direction: Direction) -> bool {
        self.choices.iter().any(|c| c.id == direction)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn remaining_ms(&self) -> Option<u64> {
        self.remaining_ms
    }

    /// Arm the countdown `ms` from `now`.
    pub fn arm(&mut self, now: Instant, ms: u64) {
        self.deadline = Some(now + std::time::Duration::from_millis(ms));
        self.end_time_epoch_ms =
            Some(chrono::Utc::now().timestamp_millis().saturating_add(ms as i64));
        self.remaining_ms = None;
    }

    /// Drop any countdown; the vote keeps running untimed.
    pub fn clear_countdown(&mut self) {
        self.deadline = None;
        self.end_time_epoch_ms = None;
        self.remaining_ms = None;
    }

    /// Freeze the countdown. Returns the stored remainder, if any.
    pub fn pause_countdown(&mut self, now: Instant) -> Option<u64> {
        if let Some(deadline) = self.deadline.take() {
            let left = deadline.saturating_duration_since(now).as_millis() as u64;
            self.remaining_ms = Some(left);
        }
        self.end_time_epoch_ms = None;
        self.paused = true;
        self.remaining_ms
    }

    /// Unfreeze; re-arms from the stored remainder. Returns the duration the
    /// caller must schedule, if a countdown was pending.
    pub fn resume_countdown(&mut self, now: Instant) -> Option<u64> {
        self.paused = false;
        let left = self.remaining_ms.take()?;
        self.arm(now, left);
        Some(left)
    }

    /// Replace the pending countdown without touching the paused flag.
    /// Returns the duration to schedule when the vote is running.
    pub fn set_timeout(&mut self, now: Instant, timeout_ms: Option<u64>) -> Option<u64> {
        self.timeout_ms = timeout_ms;
        match timeout_ms {
            None => {
                self.clear_countdown();
                None
            }
            Some(ms) => {
                if self.paused {
                    self.deadline = None;
                    self.end_time_epoch_ms = None;
                    self.remaining_ms = Some(ms);
                    None
                } else {
                    self.arm(now, ms);
                    Some(ms)
                }
            }
        }
    }

    pub fn finish(&mut self) {
        self.finished = true;
        self.clear_countdown();
    }

    pub fn cancel(&mut self) {
        self.canceled = true;
        self.clear_countdown();
    }

    pub fn snapshot(&self) -> VoteSnapshot {
        VoteSnapshot {
            id: self.id,
            kind: self.kind,
            round: self.round,
            choices: self.choices,
            ballots: self.ballots.clone(),
            tallies: tally::counts(&self.ballots),
            timeout_ms: self.timeout_ms,
            end_time_epoch_ms: self.end_time_epoch_ms,
            remaining_ms: self.remaining_ms,
            paused: self.paused,
            finished: self.finished,
            canceled: self.canceled,
            result: None,
        }
    }

    pub fn snapshot_with_result(&self, result: Option<Direction>) -> VoteSnapshot {
        let mut snapshot = self.snapshot();
        snapshot.result = result;
        snapshot
    }
}

/// Wire form of a vote. Clients derive their countdown display from
/// `end_time_epoch_ms` (running) or `remaining_ms` (paused).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSnapshot {
    pub id: VoteId,
    pub kind: VoteKind,
    pub round: u32,
    pub choices: [Choice; 4],
    pub ballots: BTreeMap<ParticipantId, Direction>,
    pub tallies: BTreeMap<Direction, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time_epoch_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_ms: Option<u64>,
    pub paused: bool,
    pub finished: bool,
    pub canceled: bool,
    /// The tallied direction, present on `vote_ended` only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Direction>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn open_choices() -> [Choice; 4] {
        Direction::ALL.map(|d| Choice { id: d, can_go: Some(true) })
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_preserves_remaining() {
        let mut vote = Vote::new(1, open_choices(), Some(5_000));
        let start = Instant::now();
        vote.arm(start, 5_000);

        tokio::time::advance(Duration::from_millis(1_000)).await;
        let left = vote.pause_countdown(Instant::now());
        assert_eq!(left, Some(4_000));
        assert!(vote.paused);
        assert!(vote.deadline().is_none());

        tokio::time::advance(Duration::from_millis(60_000)).await;
        let rearm = vote.resume_countdown(Instant::now());
        assert_eq!(rearm, Some(4_000));
        assert!(!vote.paused);
        let deadline = vote.deadline().expect("re-armed");
        assert_eq!(deadline.duration_since(Instant::now()), Duration::from_millis(4_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_timeout_preserves_paused_flag() {
        let mut vote = Vote::new(1, open_choices(), Some(5_000));
        vote.arm(Instant::now(), 5_000);
        vote.pause_countdown(Instant::now());

        assert_eq!(vote.set_timeout(Instant::now(), Some(8_000)), None, "paused: no scheduling");
        assert!(vote.paused);
        assert_eq!(vote.remaining_ms(), Some(8_000));

        vote.resume_countdown(Instant::now());
        assert_eq!(vote.set_timeout(Instant::now(), Some(2_000)), Some(2_000));
        assert!(!vote.paused);
        assert!(vote.deadline().is_some());

        assert_eq!(vote.set_timeout(Instant::now(), None), None);
        assert!(vote.deadline().is_none(), "cleared countdown runs untimed");
        assert!(vote.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_drops_timer_state() {
        let mut vote = Vote::new(1, open_choices(), Some(5_000));
        vote.arm(Instant::now(), 5_000);
        vote.finish();
        assert!(!vote.is_active());
        assert!(vote.deadline().is_none());
        assert!(vote.remaining_ms().is_none());
        let snapshot = vote.snapshot();
        assert!(snapshot.finished);
        assert!(snapshot.end_time_epoch_ms.is_none());
    }

    #[test]
    fn test_snapshot_tallies() {
        let mut vote = Vote::new(2, open_choices(), None);
        vote.ballots.insert(ParticipantId::new("a"), Direction::U);
        vote.ballots.insert(ParticipantId::new("b"), Direction::U);
        vote.ballots.insert(ParticipantId::new("c"), Direction::L);
        let snapshot = vote.snapshot_with_result(Some(Direction::U));
        assert_eq!(snapshot.tallies.get(&Direction::U), Some(&2));
        assert_eq!(snapshot.tallies.get(&Direction::L), Some(&1));
        assert_eq!(snapshot.result, Some(Direction::U));
    }
}
