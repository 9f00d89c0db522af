use crate::barrier::{Contribution, ScoreBarrier};
use crate::matrix::{Matrix, MatrixSource};
use crate::registry::{ConnectionId, PlayerRegistry};
use log::info;
use shared::{Message, MessageKind, ScoreEntry};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// Pre-round pause. No matrix, words are refused.
    Waiting,
    Active,
}

/// What a call to [`GameCore::advance`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    RoundStarted { round: u64 },
    RoundEnded { round: u64, players: usize },
}

/// The shared game state: phase, clock, current matrix, players and the
/// score barrier. Always accessed under the session lock.
#[derive(Debug)]
pub struct GameCore {
    phase: GamePhase,
    deadline: Instant,
    rounds_started: u64,
    matrix: Option<Matrix>,
    source: MatrixSource,
    round_duration: Duration,
    pause_duration: Duration,
    pub registry: PlayerRegistry,
    pub barrier: ScoreBarrier,
}

impl GameCore {
    /// Starts in the pre-round pause, with the first round due after
    /// `pause_duration`.
    pub fn new(
        source: MatrixSource,
        registry: PlayerRegistry,
        barrier: ScoreBarrier,
        round_duration: Duration,
        pause_duration: Duration,
        now: Instant,
    ) -> Self {
        Self {
            phase: GamePhase::Waiting,
            deadline: now + pause_duration,
            rounds_started: 0,
            matrix: None,
            source,
            round_duration,
            pause_duration,
            registry,
            barrier,
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Number of the current (or last finished) round, starting at 1.
    pub fn round(&self) -> u64 {
        self.rounds_started
    }

    /// Snapshot of the matrix, present only while a round is active.
    pub fn matrix(&self) -> Option<Matrix> {
        self.matrix
    }

    /// Whole seconds until the next phase change, rounded up.
    pub fn remaining_secs(&self, now: Instant) -> u64 {
        let left = self.deadline.saturating_duration_since(now);
        let secs = left.as_secs();
        if left.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }

    /// Time left in the round while active, or time to the next round while
    /// waiting.
    pub fn time_message(&self, now: Instant) -> Message {
        let kind = match self.phase {
            GamePhase::Active => MessageKind::TimeInRound,
            GamePhase::Waiting => MessageKind::TimeToNextRound,
        };
        Message::text(kind, &self.remaining_secs(now).to_string())
    }

    /// Flips the phase and re-arms the clock.
    pub fn advance(&mut self, now: Instant) -> Transition {
        match self.phase {
            GamePhase::Waiting => self.start_round(now),
            GamePhase::Active => self.end_round(now),
        }
    }

    fn start_round(&mut self, now: Instant) -> Transition {
        let matrix = self.source.next_matrix(self.rounds_started);
        self.rounds_started += 1;
        self.matrix = Some(matrix);
        self.phase = GamePhase::Active;
        self.deadline = now + self.round_duration;
        self.registry.reset_round();

        info!(
            "Round {} started with {} players",
            self.rounds_started,
            self.registry.len()
        );
        self.registry
            .broadcast(&Message::text(MessageKind::Matrix, &matrix.to_payload()));
        self.registry.broadcast(&self.time_message(now));

        Transition::RoundStarted {
            round: self.rounds_started,
        }
    }

    fn end_round(&mut self, now: Instant) -> Transition {
        self.matrix = None;
        self.phase = GamePhase::Waiting;
        self.deadline = now + self.pause_duration;

        let players = self.registry.len();
        info!("Round {} ended with {} players", self.rounds_started, players);
        self.registry.broadcast(&self.time_message(now));
        if players > 0 {
            self.barrier.open(self.registry.ids());
        }

        Transition::RoundEnded {
            round: self.rounds_started,
            players,
        }
    }

    /// Hands the player's current score to the barrier. `None` if the
    /// player is no longer registered.
    pub fn contribute(&mut self, id: ConnectionId, generation: u64) -> Option<Contribution> {
        let player = self.registry.find(id)?;
        let entry = ScoreEntry::new(player.nickname.clone(), player.score);
        Some(self.barrier.contribute(id, generation, entry))
    }

    /// Forgets a departed connection everywhere it may be referenced.
    pub fn remove_player(&mut self, id: ConnectionId) -> bool {
        let removed = self.registry.remove(id).is_some();
        if removed {
            self.barrier.withdraw(id);
        }
        removed
    }
}
