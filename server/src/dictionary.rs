//! Prefix-tree word index.
//!
//! Built once at startup and never mutated afterwards, so lookups need no
//! lock and the trie can be shared behind an `Arc`.

use crate::alphabet::{symbols, symbols_lossy, Symbol, ALPHABET_LEN};
use log::info;
use std::path::Path;

#[derive(Debug, Default)]
struct Node {
    children: [Option<Box<Node>>; ALPHABET_LEN],
    terminal: bool,
}

impl Node {
    fn child(&self, symbol: Symbol) -> Option<&Node> {
        self.children[symbol.index()].as_deref()
    }

    fn child_or_insert(&mut self, symbol: Symbol) -> &mut Node {
        self.children[symbol.index()].get_or_insert_with(Box::default)
    }
}

#[derive(Debug, Default)]
pub struct Dictionary {
    root: Node,
    words: usize,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut dictionary = Self::new();
        for word in words {
            dictionary.insert(word.as_ref());
        }
        dictionary
    }

    /// Loads a word list with one word per line.
    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let dictionary = Self::build(text.lines());
        info!(
            "Dictionary loaded from {}: {} words",
            path.display(),
            dictionary.len()
        );
        Ok(dictionary)
    }

    /// Inserts a word, skipping characters outside the alphabet. Returns
    /// false when nothing was left to insert.
    pub fn insert(&mut self, word: &str) -> bool {
        let path = symbols_lossy(word.trim());
        if path.is_empty() {
            return false;
        }

        let mut node = &mut self.root;
        for symbol in path {
            node = node.child_or_insert(symbol);
        }
        if !node.terminal {
            node.terminal = true;
            self.words += 1;
        }
        true
    }

    pub fn contains(&self, word: &str) -> bool {
        let Some(path) = symbols(word) else {
            return false;
        };

        let mut node = &self.root;
        for symbol in path {
            match node.child(symbol) {
                Some(next) => node = next,
                None => return false,
            }
        }
        node.terminal
    }

    /// Number of distinct words stored.
    pub fn len(&self) -> usize {
        self.words
    }

    pub fn is_empty(&self) -> bool {
        self.words == 0
    }
}
