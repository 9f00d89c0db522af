//! Per-request game logic shared by every connection.
//!
//! A [`Session`] owns the game core behind a single async mutex. Connection
//! handlers call [`Session::handle_message`] for each decoded frame and
//! [`Session::disconnect`] once the peer is gone. The round clock and the
//! score companions go through the same lock.

use crate::barrier::{Contribution, RankedRound};
use crate::dictionary::Dictionary;
use crate::game::{GameCore, GamePhase};
use crate::registry::{ConnectionId, RegistrationError};
use log::{debug, info, warn};
use shared::{Message, MessageKind};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::Instant;

/// Why a submitted word earned no reply score. The display text is sent to
/// the client.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WordRejection {
    #[error("You're not registered yet")]
    NotRegistered,
    #[error("Waiting for match to start")]
    NotActive,
    #[error("Invalid word")]
    Invalid,
}

/// Handle a connection task passes to the session on every request.
///
/// Dropping it tells the player's companion task that the connection is
/// gone.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    outbound: mpsc::UnboundedSender<Message>,
    alive: watch::Sender<()>,
}

impl Connection {
    pub fn new(id: ConnectionId, outbound: mpsc::UnboundedSender<Message>) -> Self {
        let (alive, _) = watch::channel(());
        Self {
            id,
            outbound,
            alive,
        }
    }

    pub fn send(&self, message: Message) {
        if self.outbound.send(message).is_err() {
            debug!("Writer for connection {} already closed", self.id);
        }
    }

    fn closed(&self) -> watch::Receiver<()> {
        self.alive.subscribe()
    }
}

pub struct Session {
    core: Mutex<GameCore>,
    dictionary: Dictionary,
    results: watch::Receiver<Option<RankedRound>>,
}

impl Session {
    pub fn new(
        core: GameCore,
        dictionary: Dictionary,
        results: watch::Receiver<Option<RankedRound>>,
    ) -> Self {
        Self {
            core: Mutex::new(core),
            dictionary,
            results,
        }
    }

    pub fn core(&self) -> &Mutex<GameCore> {
        &self.core
    }

    pub async fn handle_message(self: &Arc<Self>, connection: &Connection, message: Message) {
        match message.kind {
            MessageKind::RegisterUser => match std::str::from_utf8(&message.payload) {
                Ok(nickname) => self.register(connection, nickname.trim()).await,
                Err(_) => {
                    info!("Connection {} sent a nickname that is not UTF-8", connection.id);
                    let error = RegistrationError::InvalidNickname;
                    connection.send(Message::text(MessageKind::Error, &error.to_string()));
                }
            },
            MessageKind::Matrix => self.send_matrix(connection).await,
            MessageKind::SubmitWord => {
                let reply = match self.submit_word(connection.id, &message.payload_text()).await {
                    Ok(points) => Message::text(MessageKind::WordScore, &points.to_string()),
                    Err(rejection) => Message::text(MessageKind::Error, &rejection.to_string()),
                };
                connection.send(reply);
            }
            other => {
                warn!(
                    "Unexpected {:?} message from connection {}",
                    other, connection.id
                );
                connection.send(Message::text(MessageKind::Error, "Unexpected message type"));
            }
        }
    }

    async fn register(self: &Arc<Self>, connection: &Connection, nickname: &str) {
        let mut core = self.core.lock().await;
        if let Err(error) = core
            .registry
            .register(connection.id, nickname, connection.outbound.clone())
        {
            info!(
                "Registration of {:?} on connection {} refused: {}",
                nickname, connection.id, error
            );
            connection.send(Message::text(MessageKind::Error, &error.to_string()));
            return;
        }

        connection.send(Message::text(MessageKind::Ok, "Game joined"));
        send_round_state(&core, connection);

        // Subscribed under the lock, so a round that ends after this
        // registration is always observed.
        let round_ended = core.barrier.subscribe();
        drop(core);

        tokio::spawn(run_score_companion(
            Arc::clone(self),
            connection.id,
            round_ended,
            connection.closed(),
        ));
    }

    async fn send_matrix(&self, connection: &Connection) {
        let core = self.core.lock().await;
        if core.registry.find(connection.id).is_none() {
            connection.send(Message::text(
                MessageKind::Error,
                &WordRejection::NotRegistered.to_string(),
            ));
            return;
        }
        send_round_state(&core, connection);
    }

    /// Validates and scores one word. Returns the points credited, zero for
    /// a word this player already scored this round.
    ///
    /// Tracing and dictionary lookup run on a matrix snapshot without the
    /// lock held; the round is re-checked before crediting.
    pub async fn submit_word(&self, id: ConnectionId, word: &str) -> Result<u32, WordRejection> {
        let word = word.trim().to_lowercase();

        let (matrix, round) = {
            let core = self.core.lock().await;
            if core.registry.find(id).is_none() {
                return Err(WordRejection::NotRegistered);
            }
            match (core.phase(), core.matrix()) {
                (GamePhase::Active, Some(matrix)) => (matrix, core.round()),
                _ => return Err(WordRejection::NotActive),
            }
        };

        if !matrix.contains_word(&word) || !self.dictionary.contains(&word) {
            return Err(WordRejection::Invalid);
        }

        let mut core = self.core.lock().await;
        if core.registry.find(id).is_none() {
            return Err(WordRejection::NotRegistered);
        }
        if core.phase() != GamePhase::Active {
            return Err(WordRejection::NotActive);
        }
        if core.round() != round {
            return Err(WordRejection::Invalid);
        }
        if !core.registry.record_word(id, &word) {
            return Ok(0);
        }

        let points = word.chars().count() as u32;
        core.registry.add_score(id, points);
        Ok(points)
    }

    /// Removes a departed connection from the registry and any open score
    /// collection.
    pub async fn disconnect(&self, id: ConnectionId) {
        let mut core = self.core.lock().await;
        if !core.remove_player(id) {
            debug!("Unregistered connection {} closed", id);
        }
    }

    /// Advances the game whenever its deadline passes. Never returns.
    pub async fn run_clock(self: Arc<Self>) {
        loop {
            let deadline = self.core.lock().await.deadline();
            tokio::time::sleep_until(deadline).await;

            let mut core = self.core.lock().await;
            let now = Instant::now();
            if now >= core.deadline() {
                let transition = core.advance(now);
                debug!("{:?}", transition);
            }
        }
    }
}

fn send_round_state(core: &GameCore, connection: &Connection) {
    if let Some(matrix) = core.matrix() {
        connection.send(Message::text(MessageKind::Matrix, &matrix.to_payload()));
    }
    connection.send(core.time_message(Instant::now()));
}

/// Contributes a player's score at the end of every round and delivers the
/// ranked scoreboard back to them. Exits when the connection closes or the
/// player is no longer registered.
pub async fn run_score_companion(
    session: Arc<Session>,
    id: ConnectionId,
    mut round_ended: watch::Receiver<u64>,
    mut closed: watch::Receiver<()>,
) {
    let mut results = session.results.clone();
    // Set when a newer collection opened while this one was still pending.
    let mut superseded_by: Option<u64> = None;

    loop {
        let generation = match superseded_by.take() {
            Some(generation) => generation,
            None => tokio::select! {
                biased;
                _ = closed.changed() => break,
                changed = round_ended.changed() => match changed {
                    Ok(()) => *round_ended.borrow_and_update(),
                    Err(_) => break,
                },
            },
        };

        let contribution = session.core.lock().await.contribute(id, generation);
        match contribution {
            None => break,
            Some(Contribution::Accepted { .. } | Contribution::Completed) => {}
            Some(other) => {
                debug!("Connection {} skips collection {}: {:?}", id, generation, other);
                continue;
            }
        }

        let ranked = tokio::select! {
            biased;
            _ = closed.changed() => break,
            ranked = results.wait_for(|r| r.as_ref().is_some_and(|r| r.generation >= generation)) => {
                match ranked {
                    Ok(ranked) => ranked.clone(),
                    Err(_) => break,
                }
            }
            changed = round_ended.changed() => match changed {
                Ok(()) => {
                    let newer = *round_ended.borrow_and_update();
                    debug!(
                        "Collection {} superseded by {} before ranking, connection {} moves on",
                        generation, newer, id
                    );
                    superseded_by = Some(newer);
                    continue;
                }
                Err(_) => break,
            },
        };
        let Some(ranked) = ranked else {
            break;
        };
        if ranked.generation != generation {
            debug!("Collection {} was superseded before ranking", generation);
            continue;
        }

        let core = session.core.lock().await;
        let Some(player) = core.registry.find(id) else {
            break;
        };
        player.send(Message::text(
            MessageKind::FinalScores,
            &ranked.result.to_payload(),
        ));
    }

    debug!("Score companion for connection {} finished", id);
}
