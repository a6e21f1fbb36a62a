//! Vote Coordinator
//!
//! Single actor task owning the whole session: the current vote, the game
//! state, the participant roster, and the message log. All mutation flows
//! through one mpsc command channel, so no locks guard the state.
//!
//! Timers never mutate anything themselves. The deadline and next-round
//! timers are spawned sleep tasks that send a command back into the channel;
//! each captures the vote id (or round number) it was armed for and the
//! handler re-validates it, so a stale timer firing after a manual end or a
//! new round is a logged no-op. Canceling a timer aborts its task.

use std::collections::BTreeMap;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::game::content;
use crate::game::engine::{GameConfig, GameEngine};
use crate::game::state::PlayerState;
use crate::game::types::{Direction, Faction, ParticipantId};
use crate::network::gateway::{BroadcastGateway, OutboundEvent};
use crate::network::protocol::{ChatEntry, ClientInfo, LogEntry, SyncPayload};
use crate::vote::ballot::{Choice, Vote, VoteId, VoteSpec, DEFAULT_VOTE_TIMEOUT_MS};
use crate::vote::tally;

// =============================================================================
// CONFIG / ERRORS
// =============================================================================

#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    /// Countdown for auto-opened votes.
    pub default_timeout_ms: u64,
    /// Gap between a round ending and the next vote opening.
    pub next_round_delay: Duration,
    /// Command channel depth.
    pub command_buffer: usize,
    pub game: GameConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_VOTE_TIMEOUT_MS,
            next_round_delay: Duration::from_secs(3),
            command_buffer: 256,
            game: GameConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("coordinator is no longer running")]
    Closed,
}

// =============================================================================
// COMMANDS
// =============================================================================

type Ack = oneshot::Sender<bool>;

/// Everything the coordinator can be asked to do. Connection handlers and
/// timer tasks both speak this language.
#[derive(Debug)]
pub enum Command {
    StartGame { ack: Option<Ack> },
    StopGame { ack: Option<Ack> },
    PauseGame { ack: Option<Ack> },
    ResumeGame { ack: Option<Ack> },

    StartVote { spec: VoteSpec, ack: Option<Ack> },
    RecordChoice { participant: ParticipantId, vote_id: VoteId, choice: Direction },
    SetVoteTimeout { vote_id: VoteId, timeout_ms: Option<Option<u64>>, paused: Option<bool> },
    EndVote { vote_id: VoteId },
    CancelVote { vote_id: VoteId },

    Join { participant: ParticipantId, name: String },
    Leave { participant: ParticipantId },
    Rename { participant: ParticipantId, name: String },
    Chat { participant: ParticipantId, text: String },
    Sync { reply: oneshot::Sender<SyncPayload> },

    /// From the deadline timer task; carries the vote it was armed for.
    DeadlineElapsed { vote_id: VoteId },
    /// From the next-round timer task; carries the round it was armed after.
    NextRoundDue { round: u32 },
}

/// Cheap cloneable sender half, handed to connection handlers.
#[derive(Clone, Debug)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    pub async fn send(&self, command: Command) -> Result<(), CoordinatorError> {
        self.tx.send(command).await.map_err(|_| CoordinatorError::Closed)
    }

    /// Fetch the one-time catch-up payload for a fresh connection.
    pub async fn sync(&self) -> Result<SyncPayload, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Sync { reply }).await?;
        rx.await.map_err(|_| CoordinatorError::Closed)
    }
}

// =============================================================================
// ROSTER
// =============================================================================

#[derive(Clone, Debug)]
struct RosterEntry {
    name: String,
    connected: bool,
}

// =============================================================================
// COORDINATOR
// =============================================================================

pub struct VoteCoordinator {
    config: CoordinatorConfig,
    engine: GameEngine,
    rng: StdRng,
    gateway: BroadcastGateway,

    game: Option<crate::game::state::GameState>,
    vote: Option<Vote>,
    round: u32,
    roster: BTreeMap<ParticipantId, RosterEntry>,
    log: Vec<LogEntry>,

    cmd_tx: mpsc::Sender<Command>,
    cmd_rx: mpsc::Receiver<Command>,
    deadline_task: Option<JoinHandle<()>>,
    next_round_task: Option<JoinHandle<()>>,
}

impl VoteCoordinator {
    pub fn new(config: CoordinatorConfig, gateway: BroadcastGateway) -> (Self, CoordinatorHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
        let handle = CoordinatorHandle { tx: cmd_tx.clone() };
        let engine = GameEngine::new(config.game.clone());
        let coordinator = Self {
            config,
            engine,
            rng: StdRng::from_entropy(),
            gateway,
            game: None,
            vote: None,
            round: 0,
            roster: BTreeMap::new(),
            log: Vec::new(),
            cmd_tx,
            cmd_rx,
            deadline_task: None,
            next_round_task: None,
        };
        (coordinator, handle)
    }

    /// Drive the actor until every handle is dropped.
    pub async fn run(mut self) {
        info!("vote coordinator running");
        while let Some(command) = self.cmd_rx.recv().await {
            self.handle(command);
        }
        self.abort_deadline();
        self.abort_next_round();
        info!("vote coordinator stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::StartGame { ack } => send_ack(ack, self.start_game()),
            Command::StopGame { ack } => send_ack(ack, self.stop_game()),
            Command::PauseGame { ack } => send_ack(ack, self.pause_game()),
            Command::ResumeGame { ack } => send_ack(ack, self.resume_game()),
            Command::StartVote { spec, ack } => send_ack(ack, self.open_vote(spec)),
            Command::RecordChoice { participant, vote_id, choice } => {
                self.record_choice(participant, vote_id, choice)
            }
            Command::SetVoteTimeout { vote_id, timeout_ms, paused } => {
                self.set_vote_timeout(vote_id, timeout_ms, paused)
            }
            Command::EndVote { vote_id } => self.end_vote(vote_id),
            Command::CancelVote { vote_id } => self.cancel_vote(vote_id),
            Command::Join { participant, name } => self.join(participant, name),
            Command::Leave { participant } => self.leave(participant),
            Command::Rename { participant, name } => self.rename(participant, name),
            Command::Chat { participant, text } => self.chat(participant, text),
            Command::Sync { reply } => {
                let _ = reply.send(self.sync_payload());
            }
            Command::DeadlineElapsed { vote_id } => {
                debug!(vote = %vote_id, "vote deadline elapsed");
                self.end_vote(vote_id);
            }
            Command::NextRoundDue { round } => self.next_round_due(round),
        }
    }

    // -------------------------------------------------------------------------
    // game lifecycle
    // -------------------------------------------------------------------------

    fn start_game(&mut self) -> bool {
        if self.game.as_ref().is_some_and(|g| !g.is_ended()) {
            warn!("start_game rejected: a game is already in progress");
            return false;
        }
        self.drop_active_vote();
        let connected: Vec<ParticipantId> = self
            .roster
            .iter()
            .filter(|(_, entry)| entry.connected)
            .map(|(id, _)| id.clone())
            .collect();
        let state = content::new_game_state(&self.config.game, connected, &mut self.rng);
        info!(players = state.players.len(), "game started");
        self.round = 0;
        self.game = Some(state);
        self.broadcast_game_state();
        self.open_vote(self.default_vote_spec());
        true
    }

    fn stop_game(&mut self) -> bool {
        if self.game.is_none() {
            debug!("stop_game: no game in progress");
            return false;
        }
        self.drop_active_vote();
        self.abort_next_round();
        self.game = None;
        info!("game stopped");
        self.gateway.emit(OutboundEvent::GameState(None));
        true
    }

    fn pause_game(&mut self) -> bool {
        let Some(game) = self.game.as_mut() else {
            debug!("pause_game: no game in progress");
            return false;
        };
        game.paused = true;
        let mut vote_snapshot = None;
        if let Some(vote) = self.vote.as_mut() {
            if vote.is_running() {
                vote.pause_countdown(Instant::now());
                vote_snapshot = Some(vote.snapshot());
            }
        }
        if vote_snapshot.is_some() {
            self.abort_deadline();
        }
        info!("game paused");
        self.broadcast_game_state();
        if let Some(snapshot) = vote_snapshot {
            self.gateway.emit(OutboundEvent::VoteUpdated(snapshot));
        }
        true
    }

    fn resume_game(&mut self) -> bool {
        let Some(game) = self.game.as_mut() else {
            debug!("resume_game: no game in progress");
            return false;
        };
        game.paused = false;
        let ended = game.is_ended();
        let mut rearm = None;
        let mut vote_snapshot = None;
        if let Some(vote) = self.vote.as_mut() {
            if vote.is_active() && vote.paused {
                rearm = vote.resume_countdown(Instant::now()).map(|ms| (vote.id, ms));
                vote_snapshot = Some(vote.snapshot());
            }
        }
        info!("game resumed");
        self.broadcast_game_state();
        match vote_snapshot {
            Some(snapshot) => {
                if let Some((vote_id, ms)) = rearm {
                    self.arm_deadline(vote_id, ms);
                }
                self.gateway.emit(OutboundEvent::VoteUpdated(snapshot));
            }
            // Resumed between rounds: get the next vote going.
            None if !ended && !self.vote.as_ref().is_some_and(|v| v.is_active()) => {
                self.open_vote(self.default_vote_spec());
            }
            None => {}
        }
        true
    }

    // -------------------------------------------------------------------------
    // vote lifecycle
    // -------------------------------------------------------------------------

    fn default_vote_spec(&self) -> VoteSpec {
        VoteSpec { timeout_ms: Some(self.config.default_timeout_ms), round_effects: Vec::new() }
    }

    fn open_vote(&mut self, spec: VoteSpec) -> bool {
        if self.vote.as_ref().is_some_and(|v| v.is_active()) {
            warn!("start_vote rejected: a vote is already active");
            return false;
        }
        let Some(game) = self.game.as_mut() else {
            warn!("start_vote rejected: no game in progress");
            return false;
        };
        if game.is_ended() {
            debug!("start_vote rejected: game already ended");
            return false;
        }
        // A manual start preempts the pending auto-open.
        if let Some(task) = self.next_round_task.take() {
            task.abort();
        }

        game.ephemeral_effects.extend(spec.round_effects);
        self.round += 1;
        let choices =
            Direction::ALL.map(|d| Choice { id: d, can_go: self.engine.can_go(game, d) });
        let mut vote = Vote::new(self.round, choices, spec.timeout_ms);
        if let Some(ms) = spec.timeout_ms {
            vote.arm(Instant::now(), ms);
            self.arm_deadline(vote.id, ms);
        }
        info!(vote = %vote.id, round = vote.round, timeout_ms = ?spec.timeout_ms, "vote started");
        let snapshot = vote.snapshot();
        self.vote = Some(vote);
        self.gateway.emit(OutboundEvent::VoteStarted(snapshot));
        true
    }

    fn record_choice(&mut self, participant: ParticipantId, vote_id: VoteId, choice: Direction) {
        let Some(vote) = self.vote.as_mut() else {
            debug!(participant = %participant, "record_choice: no vote open");
            return;
        };
        if vote.id != vote_id {
            debug!(participant = %participant, got = %vote_id, "record_choice: stale vote id");
            return;
        }
        if !vote.is_active() || vote.paused {
            debug!(participant = %participant, "record_choice: vote not accepting ballots");
            return;
        }
        if !vote.accepts_choice(choice) {
            warn!(participant = %participant, ?choice, "record_choice: choice not offered");
            return;
        }
        // Last write wins.
        vote.ballots.insert(participant, choice);
        let snapshot = vote.snapshot();
        self.gateway.emit(OutboundEvent::VoteUpdated(snapshot));
    }

    fn set_vote_timeout(
        &mut self,
        vote_id: VoteId,
        timeout_ms: Option<Option<u64>>,
        paused: Option<bool>,
    ) {
        let now = Instant::now();
        let mut disarm = false;
        let mut rearm: Option<u64> = None;
        let snapshot = {
            let Some(vote) = self.vote.as_mut() else {
                debug!("set_vote_timeout: no vote open");
                return;
            };
            if vote.id != vote_id || !vote.is_active() {
                debug!(got = %vote_id, "set_vote_timeout: stale or ended vote");
                return;
            }
            match paused {
                Some(true) if !vote.paused => {
                    disarm = true;
                    vote.pause_countdown(now);
                }
                Some(false) if vote.paused => {
                    rearm = vote.resume_countdown(now);
                }
                _ => {}
            }
            if let Some(new_timeout) = timeout_ms {
                // Whatever deadline existed is obsolete now.
                disarm = true;
                rearm = vote.set_timeout(now, new_timeout);
            }
            vote.snapshot()
        };
        if disarm && rearm.is_none() {
            self.abort_deadline();
        }
        if let Some(ms) = rearm {
            self.arm_deadline(vote_id, ms);
        }
        self.gateway.emit(OutboundEvent::VoteUpdated(snapshot));
    }

    /// Close the vote, tally it, and run the round. Reached both from the
    /// explicit command and from the deadline timer; safe to hit twice.
    fn end_vote(&mut self, vote_id: VoteId) {
        let (action, ballots, snapshot) = {
            let Some(vote) = self.vote.as_mut() else {
                debug!(vote = %vote_id, "end_vote: no vote open");
                return;
            };
            if vote.id != vote_id {
                debug!(vote = %vote_id, "end_vote: stale vote id");
                return;
            }
            if !vote.is_active() {
                debug!(vote = %vote_id, "end_vote: already ended");
                return;
            }
            vote.finish();
            let action = tally::resolve(vote, &mut self.rng);
            (action, vote.ballots.clone(), vote.snapshot_with_result(action))
        };
        self.abort_deadline();
        info!(
            vote = %vote_id,
            round = snapshot.round,
            result = ?action,
            ballots = ballots.len(),
            "vote ended"
        );

        if let Some(game) = self.game.as_mut() {
            self.engine.transform(game, action, &ballots);
        } else {
            warn!(vote = %vote_id, "vote ended with no game in progress");
        }

        self.log.push(LogEntry::Vote { vote: snapshot.clone() });
        self.gateway.emit(OutboundEvent::VoteEnded(snapshot));
        self.broadcast_game_state();

        let game_over = self.game.as_ref().map_or(true, |g| g.is_ended());
        if game_over {
            self.abort_next_round();
        } else {
            self.schedule_next_round();
        }
    }

    fn cancel_vote(&mut self, vote_id: VoteId) {
        let snapshot = {
            let Some(vote) = self.vote.as_mut() else {
                debug!(vote = %vote_id, "cancel_vote: no vote open");
                return;
            };
            if vote.id != vote_id || !vote.is_active() {
                debug!(vote = %vote_id, "cancel_vote: stale or ended vote");
                return;
            }
            vote.cancel();
            vote.snapshot()
        };
        self.abort_deadline();
        info!(vote = %vote_id, "vote canceled");
        self.gateway.emit(OutboundEvent::VoteCancel(snapshot));
    }

    fn next_round_due(&mut self, round: u32) {
        if round != self.round {
            debug!(armed_for = round, current = self.round, "next-round timer is stale");
            return;
        }
        if self.vote.as_ref().is_some_and(|v| v.is_active()) {
            debug!("next-round timer: a vote is already active");
            return;
        }
        let Some(game) = self.game.as_ref() else {
            debug!("next-round timer: game is gone");
            return;
        };
        if game.is_ended() || game.paused {
            debug!("next-round timer: game ended or paused");
            return;
        }
        self.open_vote(self.default_vote_spec());
    }

    // -------------------------------------------------------------------------
    // participants / chat / sync
    // -------------------------------------------------------------------------

    fn join(&mut self, participant: ParticipantId, name: String) {
        let entry = self
            .roster
            .entry(participant.clone())
            .or_insert_with(|| RosterEntry { name: name.clone(), connected: true });
        entry.name = name;
        entry.connected = true;
        info!(participant = %participant, "participant joined");

        if let Some(game) = self.game.as_mut() {
            let faction = *Faction::ALL.choose(&mut self.rng).unwrap_or(&Faction::Red);
            if game.add_player(participant.clone(), PlayerState::new(faction)) {
                self.broadcast_game_state();
            }
        }
        self.emit_clients_update();
    }

    fn leave(&mut self, participant: ParticipantId) {
        let Some(entry) = self.roster.get_mut(&participant) else {
            debug!(participant = %participant, "leave: unknown participant");
            return;
        };
        entry.connected = false;
        info!(participant = %participant, "participant left");

        if let Some(game) = self.game.as_mut() {
            if game.remove_player(&participant) {
                self.broadcast_game_state();
            }
        }
        self.emit_clients_update();
    }

    fn rename(&mut self, participant: ParticipantId, name: String) {
        let Some(entry) = self.roster.get_mut(&participant) else {
            debug!(participant = %participant, "rename: unknown participant");
            return;
        };
        entry.name = name;
        self.emit_clients_update();
    }

    fn chat(&mut self, participant: ParticipantId, text: String) {
        let name = self
            .roster
            .get(&participant)
            .map(|e| e.name.clone())
            .unwrap_or_else(|| participant.to_string());
        let entry = ChatEntry {
            participant,
            name,
            text,
            at_epoch_ms: chrono::Utc::now().timestamp_millis(),
        };
        self.log.push(LogEntry::Chat { entry: entry.clone() });
        self.gateway.emit(OutboundEvent::Chat(entry));
    }

    fn sync_payload(&self) -> SyncPayload {
        SyncPayload {
            message_history: self.log.clone(),
            current_vote: self
                .vote
                .as_ref()
                .filter(|v| v.is_active())
                .map(|v| v.snapshot()),
            game_state: self.game.clone(),
            roster: self.clients_info(),
        }
    }

    // -------------------------------------------------------------------------
    // internals
    // -------------------------------------------------------------------------

    fn clients_info(&self) -> Vec<ClientInfo> {
        self.roster
            .iter()
            .map(|(participant, entry)| ClientInfo {
                participant: participant.clone(),
                name: entry.name.clone(),
                connected: entry.connected,
            })
            .collect()
    }

    fn emit_clients_update(&self) {
        self.gateway.emit(OutboundEvent::ClientsUpdate(self.clients_info()));
    }

    fn broadcast_game_state(&self) {
        self.gateway.emit(OutboundEvent::GameState(self.game.clone()));
    }

    /// Cancel whatever vote is active, with a broadcast. Used by the game
    /// lifecycle paths.
    fn drop_active_vote(&mut self) {
        let Some(vote) = self.vote.as_mut() else { return };
        if !vote.is_active() {
            return;
        }
        vote.cancel();
        let snapshot = vote.snapshot();
        self.abort_deadline();
        self.gateway.emit(OutboundEvent::VoteCancel(snapshot));
    }

    fn arm_deadline(&mut self, vote_id: VoteId, ms: u64) {
        self.abort_deadline();
        let tx = self.cmd_tx.clone();
        self.deadline_task = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            let _ = tx.send(Command::DeadlineElapsed { vote_id }).await;
        }));
    }

    fn schedule_next_round(&mut self) {
        self.abort_next_round();
        let round = self.round;
        let delay = self.config.next_round_delay;
        let tx = self.cmd_tx.clone();
        self.next_round_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Command::NextRoundDue { round }).await;
        }));
    }

    fn abort_deadline(&mut self) {
        if let Some(task) = self.deadline_task.take() {
            task.abort();
        }
    }

    fn abort_next_round(&mut self) {
        if let Some(task) = self.next_round_task.take() {
            task.abort();
        }
    }
}

fn send_ack(ack: Option<Ack>, ok: bool) {
    if let Some(ack) = ack {
        let _ = ack.send(ok);
    }
}
