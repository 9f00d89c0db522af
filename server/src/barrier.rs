//! End-of-round score collection.
//!
//! When a round ends the game core opens a collection sized to the players
//! registered at that instant and raises the round-ended signal. Each
//! player's companion task contributes exactly once. The contribution that
//! completes the set hands it to the [`Scorer`], which ranks it and
//! publishes one shared [`RankedRound`] that every companion delivers.
//!
//! A player who leaves before contributing is withdrawn from the expected
//! set, so the collection can still complete without them.
//!
//! [`ScoreBarrier`] holds no lock; it lives inside the game core under the
//! session lock. Only the published result crosses task boundaries on its
//! own, through a `watch` channel.

use crate::registry::ConnectionId;
use log::{debug, info, warn};
use shared::{format_scoreboard, ScoreEntry};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Final scoreboard of one round, highest score first. Ties keep the order
/// in which scores arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundResult {
    entries: Vec<ScoreEntry>,
}

impl RoundResult {
    pub fn rank(mut entries: Vec<ScoreEntry>) -> Self {
        // sort_by is stable, which is what keeps arrival order on ties.
        entries.sort_by(|a, b| b.score.cmp(&a.score));
        Self { entries }
    }

    pub fn entries(&self) -> &[ScoreEntry] {
        &self.entries
    }

    pub fn to_payload(&self) -> String {
        format_scoreboard(&self.entries)
    }
}

/// A ranked result tagged with the collection it belongs to.
#[derive(Debug, Clone)]
pub struct RankedRound {
    pub generation: u64,
    pub result: Arc<RoundResult>,
}

/// What happened to one contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contribution {
    Accepted { remaining: usize },
    /// This contribution completed the set; it went to the scorer.
    Completed,
    /// The player was not registered when the collection opened.
    NotExpected,
    AlreadyContributed,
    /// No open collection for that generation.
    Closed,
}

#[derive(Debug)]
struct Collection {
    generation: u64,
    expected: HashSet<ConnectionId>,
    arrived: HashSet<ConnectionId>,
    entries: Vec<ScoreEntry>,
}

impl Collection {
    fn is_complete(&self) -> bool {
        self.arrived.len() == self.expected.len()
    }
}

/// A complete set of contributions on its way to the scorer.
#[derive(Debug)]
pub struct Collected {
    generation: u64,
    entries: Vec<ScoreEntry>,
}

#[derive(Debug)]
pub struct ScoreBarrier {
    generation: u64,
    collection: Option<Collection>,
    round_ended: watch::Sender<u64>,
    scorer: mpsc::UnboundedSender<Collected>,
}

/// Creates a barrier, its scorer, and the receiver companions use to wait
/// for published results.
pub fn score_barrier() -> (ScoreBarrier, Scorer, watch::Receiver<Option<RankedRound>>) {
    let (round_ended, _) = watch::channel(0);
    let (scorer_tx, scorer_rx) = mpsc::unbounded_channel();
    let (results_tx, results_rx) = watch::channel(None);

    let barrier = ScoreBarrier {
        generation: 0,
        collection: None,
        round_ended,
        scorer: scorer_tx,
    };
    let scorer = Scorer {
        inbox: scorer_rx,
        results: results_tx,
    };
    (barrier, scorer, results_rx)
}

impl ScoreBarrier {
    /// Receiver for the round-ended signal. The current generation counts
    /// as already seen, so a fresh subscriber waits for the next round.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.round_ended.subscribe()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_collecting(&self) -> bool {
        self.collection.is_some()
    }

    /// Opens a collection expecting one contribution from each of `players`
    /// and raises the round-ended signal. Returns the new generation.
    ///
    /// A collection still open from the previous round end is dropped
    /// unranked; its contributors see the new signal and contribute again.
    pub fn open(&mut self, players: impl IntoIterator<Item = ConnectionId>) -> u64 {
        if let Some(stale) = self.collection.take() {
            warn!(
                "Abandoning collection {} with {}/{} scores",
                stale.generation,
                stale.arrived.len(),
                stale.expected.len()
            );
        }

        self.generation += 1;
        let expected: HashSet<ConnectionId> = players.into_iter().collect();
        info!(
            "Collecting scores for round end {} from {} players",
            self.generation,
            expected.len()
        );
        self.collection = Some(Collection {
            generation: self.generation,
            entries: Vec::with_capacity(expected.len()),
            arrived: HashSet::with_capacity(expected.len()),
            expected,
        });
        self.round_ended.send_replace(self.generation);
        self.finish_if_complete();
        self.generation
    }

    pub fn contribute(
        &mut self,
        id: ConnectionId,
        generation: u64,
        entry: ScoreEntry,
    ) -> Contribution {
        let Some(collection) = self.collection.as_mut() else {
            return Contribution::Closed;
        };
        if collection.generation != generation {
            return Contribution::Closed;
        }
        if !collection.expected.contains(&id) {
            return Contribution::NotExpected;
        }
        if !collection.arrived.insert(id) {
            return Contribution::AlreadyContributed;
        }

        debug!("{} contributes {}", entry.nickname, entry.score);
        collection.entries.push(entry);
        let remaining = collection.expected.len() - collection.arrived.len();
        if self.finish_if_complete() {
            Contribution::Completed
        } else {
            Contribution::Accepted { remaining }
        }
    }

    /// Drops a departing player from the expected set. A score that already
    /// arrived stays in the result.
    pub fn withdraw(&mut self, id: ConnectionId) {
        let Some(collection) = self.collection.as_mut() else {
            return;
        };
        if collection.arrived.contains(&id) || !collection.expected.remove(&id) {
            return;
        }

        debug!(
            "Connection {} withdrawn from collection {}",
            id, collection.generation
        );
        self.finish_if_complete();
    }

    fn finish_if_complete(&mut self) -> bool {
        if !self.collection.as_ref().is_some_and(Collection::is_complete) {
            return false;
        }
        let Some(collection) = self.collection.take() else {
            return false;
        };

        if collection.entries.is_empty() {
            info!(
                "Collection {} closed with no players left",
                collection.generation
            );
            return true;
        }

        let collected = Collected {
            generation: collection.generation,
            entries: collection.entries,
        };
        if self.scorer.send(collected).is_err() {
            warn!("Scorer is gone; round {} will not be ranked", self.generation);
        }
        true
    }
}

/// Ranks completed collections and publishes the results.
#[derive(Debug)]
pub struct Scorer {
    inbox: mpsc::UnboundedReceiver<Collected>,
    results: watch::Sender<Option<RankedRound>>,
}

impl Scorer {
    /// Runs until the barrier is dropped. Returns how many rounds were
    /// ranked.
    pub async fn run(mut self) -> u64 {
        let mut ranked = 0;
        while let Some(collected) = self.inbox.recv().await {
            let result = RoundResult::rank(collected.entries);
            info!(
                "Final results for collection {}: {}",
                collected.generation,
                result.to_payload()
            );
            // The result is complete before anyone can observe it.
            self.results.send_replace(Some(RankedRound {
                generation: collected.generation,
                result: Arc::new(result),
            }));
            ranked += 1;
        }
        ranked
    }
}
