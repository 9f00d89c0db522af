//! Registered players and their per-round bookkeeping
//!
//! This module tracks every connection that has successfully registered a
//! nickname, including:
//! - Nickname uniqueness and capacity enforcement
//! - Per-round score and the set of words already credited
//! - The outbound queue used to reach the player's connection
//!
//! The registry holds no lock of its own. It lives inside the game core and
//! is only touched while the session lock is held.

use log::{debug, info};
use shared::{Message, MAX_NICKNAME_LEN};
use std::collections::HashSet;
use thiserror::Error;
use tokio::sync::mpsc;

/// Identity of one accepted connection. Never reused within a process.
pub type ConnectionId = u32;

/// Why a registration was refused. The display text is sent to the client.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Already registered")]
    AlreadyRegistered,
    #[error("Nickname invalid")]
    InvalidNickname,
    #[error("Nickname already taken")]
    NicknameTaken,
    #[error("Server is full")]
    Full,
}

/// A registered player
///
/// Each player carries:
/// - The connection it belongs to and its chosen nickname
/// - The score accumulated in the current round
/// - The words already credited this round, so repeats score nothing
#[derive(Debug)]
pub struct Player {
    pub id: ConnectionId,
    pub nickname: String,
    pub score: u32,
    words: HashSet<String>,
    outbound: mpsc::UnboundedSender<Message>,
}

impl Player {
    pub fn new(id: ConnectionId, nickname: String, outbound: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id,
            nickname,
            score: 0,
            words: HashSet::new(),
            outbound,
        }
    }

    /// Queues a message for the player's connection. Returns false if the
    /// connection's writer is already gone.
    pub fn send(&self, message: Message) -> bool {
        self.outbound.send(message).is_ok()
    }

    /// Clears score and credited words for a new round.
    pub fn reset_round(&mut self) {
        self.score = 0;
        self.words.clear();
    }
}

/// Checks a nickname is printable, comma-free and short enough to sit in a
/// scoreboard line.
pub fn is_valid_nickname(nickname: &str) -> bool {
    let length = nickname.chars().count();
    (1..=MAX_NICKNAME_LEN).contains(&length)
        && nickname
            .chars()
            .all(|c| !c.is_whitespace() && !c.is_control() && c != ',')
}

/// All currently registered players
///
/// Enforces the invariants the rest of the server relies on: no two
/// entries share a connection or a nickname, and the number of entries
/// never exceeds the configured maximum.
#[derive(Debug)]
pub struct PlayerRegistry {
    players: Vec<Player>,
    max_players: usize,
}

impl PlayerRegistry {
    pub fn new(max_players: usize) -> Self {
        Self {
            players: Vec::new(),
            max_players,
        }
    }

    /// Registers a nickname for a connection
    ///
    /// Leaves the registry unchanged on any error.
    pub fn register(
        &mut self,
        id: ConnectionId,
        nickname: &str,
        outbound: mpsc::UnboundedSender<Message>,
    ) -> Result<&Player, RegistrationError> {
        if self.find(id).is_some() {
            return Err(RegistrationError::AlreadyRegistered);
        }
        if !is_valid_nickname(nickname) {
            return Err(RegistrationError::InvalidNickname);
        }
        if self.players.iter().any(|p| p.nickname == nickname) {
            return Err(RegistrationError::NicknameTaken);
        }
        if self.players.len() >= self.max_players {
            return Err(RegistrationError::Full);
        }

        info!("Player {} registered on connection {}", nickname, id);
        self.players
            .push(Player::new(id, nickname.to_string(), outbound));
        Ok(&self.players[self.players.len() - 1])
    }

    pub fn find(&self, id: ConnectionId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    fn find_mut(&mut self, id: ConnectionId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    /// Removes a player. Returns the entry if it was registered.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Player> {
        let index = self.players.iter().position(|p| p.id == id)?;
        let player = self.players.remove(index);
        info!("Player {} left (connection {})", player.nickname, id);
        Some(player)
    }

    pub fn score_of(&self, id: ConnectionId) -> Option<u32> {
        self.find(id).map(|p| p.score)
    }

    /// Adds points and returns the new total.
    pub fn add_score(&mut self, id: ConnectionId, points: u32) -> Option<u32> {
        let player = self.find_mut(id)?;
        player.score += points;
        debug!("{} +{} = {}", player.nickname, points, player.score);
        Some(player.score)
    }

    pub fn has_used_word(&self, id: ConnectionId, word: &str) -> bool {
        self.find(id).is_some_and(|p| p.words.contains(word))
    }

    /// Marks a word as credited. Returns false if it already was, or the
    /// player is unknown.
    pub fn record_word(&mut self, id: ConnectionId, word: &str) -> bool {
        match self.find_mut(id) {
            Some(player) => player.words.insert(word.to_string()),
            None => false,
        }
    }

    /// Resets every player's score and word set at the start of a round.
    pub fn reset_round(&mut self) {
        for player in &mut self.players {
            player.reset_round();
        }
    }

    /// Sends a message to every registered player.
    pub fn broadcast(&self, message: &Message) {
        for player in &self.players {
            if !player.send(message.clone()) {
                debug!("Dropping broadcast to departed {}", player.nickname);
            }
        }
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.players.iter().map(|p| p.id).collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::MessageKind;

    fn outbound() -> mpsc::UnboundedSender<Message> {
        mpsc::unbounded_channel().0
    }

    #[test]
    fn test_register_player() {
        let mut registry = PlayerRegistry::new(4);
        let player = registry.register(1, "ana", outbound()).unwrap();

        assert_eq!(player.id, 1);
        assert_eq!(player.nickname, "ana");
        assert_eq!(player.score, 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_nickname_leaves_registry_unchanged() {
        let mut registry = PlayerRegistry::new(4);
        registry.register(1, "ana", outbound()).unwrap();

        let result = registry.register(2, "ana", outbound());
        assert_eq!(result.unwrap_err(), RegistrationError::NicknameTaken);
        assert_eq!(registry.len(), 1);
        assert!(registry.find(2).is_none());
    }

    #[test]
    fn test_connection_registers_once() {
        let mut registry = PlayerRegistry::new(4);
        registry.register(1, "ana", outbound()).unwrap();

        let result = registry.register(1, "bob", outbound());
        assert_eq!(result.unwrap_err(), RegistrationError::AlreadyRegistered);
        assert_eq!(registry.ids(), vec![1]);
    }

    #[test]
    fn test_capacity() {
        let mut registry = PlayerRegistry::new(1);
        registry.register(1, "ana", outbound()).unwrap();

        let result = registry.register(2, "bob", outbound());
        assert_eq!(result.unwrap_err(), RegistrationError::Full);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invalid_nicknames() {
        let mut registry = PlayerRegistry::new(4);
        for nickname in ["", "two words", "a,b", "abcdefghijk", "tab\t"] {
            assert_eq!(
                registry.register(1, nickname, outbound()).unwrap_err(),
                RegistrationError::InvalidNickname,
                "{:?} should be rejected",
                nickname
            );
        }
        assert!(registry.is_empty());
        assert!(is_valid_nickname("abcdefghij"));
    }

    #[test]
    fn test_nickname_free_after_remove() {
        let mut registry = PlayerRegistry::new(4);
        registry.register(1, "ana", outbound()).unwrap();

        let removed = registry.remove(1).unwrap();
        assert_eq!(removed.nickname, "ana");
        assert!(registry.remove(1).is_none());

        assert!(registry.register(2, "ana", outbound()).is_ok());
    }

    #[test]
    fn test_scores_and_words() {
        let mut registry = PlayerRegistry::new(4);
        registry.register(1, "ana", outbound()).unwrap();
        registry.register(2, "bob", outbound()).unwrap();

        assert!(!registry.has_used_word(1, "piano"));
        assert!(registry.record_word(1, "piano"));
        assert!(!registry.record_word(1, "piano"));
        assert_eq!(registry.add_score(1, 5), Some(5));

        // Word sets are per player.
        assert!(registry.has_used_word(1, "piano"));
        assert!(!registry.has_used_word(2, "piano"));
        assert_eq!(registry.score_of(2), Some(0));

        assert_eq!(registry.add_score(9, 5), None);
        assert!(!registry.record_word(9, "piano"));
    }

    #[test]
    fn test_reset_round() {
        let mut registry = PlayerRegistry::new(4);
        registry.register(1, "ana", outbound()).unwrap();
        registry.record_word(1, "piano");
        registry.add_score(1, 5);

        registry.reset_round();

        assert_eq!(registry.score_of(1), Some(0));
        assert!(!registry.has_used_word(1, "piano"));
        assert_eq!(registry.find(1).unwrap().nickname, "ana");
    }

    #[test]
    fn test_broadcast_reaches_every_player() {
        let mut registry = PlayerRegistry::new(4);
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.register(1, "ana", tx1).unwrap();
        registry.register(2, "bob", tx2).unwrap();

        registry.broadcast(&Message::text(MessageKind::TimeInRound, "60"));

        assert_eq!(rx1.try_recv().unwrap().payload_text(), "60");
        assert_eq!(rx2.try_recv().unwrap().kind, MessageKind::TimeInRound);
    }

    #[test]
    fn test_send_to_departed_connection() {
        let (tx, rx) = mpsc::unbounded_channel();
        let player = Player::new(1, "ana".to_string(), tx);
        drop(rx);
        assert!(!player.send(Message::empty(MessageKind::Ok)));
    }
}
