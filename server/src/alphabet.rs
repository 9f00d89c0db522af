//! Letter symbols shared by the dictionary trie and the letter matrix.
//!
//! Both sides map text to symbols through [`symbols`], so a path traced in
//! the grid and a trie walk always agree on what one step means. The only
//! multi-character symbol is the `Qu` digraph.

use std::fmt;

/// Number of distinct symbols: 26 Latin letters plus `Qu`.
pub const ALPHABET_LEN: usize = 27;

const QU_INDEX: u8 = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u8);

impl Symbol {
    pub const QU: Symbol = Symbol(QU_INDEX);

    /// Maps an ASCII letter, either case, to its symbol.
    pub fn from_letter(letter: char) -> Option<Self> {
        if letter.is_ascii_alphabetic() {
            Some(Symbol(letter.to_ascii_lowercase() as u8 - b'a'))
        } else {
            None
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Number of word characters this symbol stands for.
    pub fn char_len(self) -> usize {
        if self == Symbol::QU {
            2
        } else {
            1
        }
    }

    /// Parses a matrix token: a single letter or `Qu`, case-insensitive.
    pub fn from_token(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("qu") {
            return Some(Symbol::QU);
        }
        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) => Symbol::from_letter(letter),
            _ => None,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Symbol::QU {
            f.write_str("Qu")
        } else {
            write!(f, "{}", (b'A' + self.0) as char)
        }
    }
}

/// Splits a word into symbols, folding case and reading `qu` as one step.
///
/// Returns `None` if the word holds a character outside the alphabet.
pub fn symbols(word: &str) -> Option<Vec<Symbol>> {
    let mut out = Vec::with_capacity(word.len());
    let mut chars = word.chars().map(|c| c.to_ascii_lowercase()).peekable();
    while let Some(c) = chars.next() {
        if c == 'q' && chars.peek() == Some(&'u') {
            chars.next();
            out.push(Symbol::QU);
        } else {
            out.push(Symbol::from_letter(c)?);
        }
    }
    Some(out)
}

/// Like [`symbols`], but drops unsupported characters instead of failing.
/// Used when loading word lists that may carry accents or punctuation.
pub fn symbols_lossy(word: &str) -> Vec<Symbol> {
    let kept: String = word.chars().filter(char::is_ascii_alphabetic).collect();
    symbols(&kept).unwrap_or_default()
}
