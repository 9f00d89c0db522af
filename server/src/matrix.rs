//! Letter matrix generation and word tracing.

use crate::alphabet::{symbols, Symbol, ALPHABET_LEN};
use crate::error::ServerError;
use log::{debug, info};
use rand::distributions::{WeightedError, WeightedIndex};
use rand::prelude::*;
use shared::{MATRIX_SIZE, MAX_WORD_LEN, MIN_WORD_LEN};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub const CELL_COUNT: usize = MATRIX_SIZE * MATRIX_SIZE;

// Visited cells are tracked in a u32 bitmask.
const _: () = assert!(CELL_COUNT <= 32);

/// Italian letter frequencies in hundredths of a percent. `Qu` stands in
/// for the plain Q, which practically never appears alone.
const ITALIAN_WEIGHTS: [(&str, u32); 21] = [
    ("A", 1174),
    ("B", 92),
    ("C", 450),
    ("D", 373),
    ("E", 1179),
    ("F", 95),
    ("G", 164),
    ("H", 154),
    ("I", 1128),
    ("L", 651),
    ("M", 251),
    ("N", 688),
    ("O", 983),
    ("P", 305),
    ("Qu", 51),
    ("R", 637),
    ("S", 498),
    ("T", 562),
    ("U", 301),
    ("V", 210),
    ("Z", 49),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LetterWeightsError {
    #[error("unknown letter {0:?} in weight table")]
    UnknownLetter(String),
    #[error("unusable letter weights: {0}")]
    Weights(#[from] WeightedError),
}

/// Weighted letter distribution for random grids, built once per source.
#[derive(Debug, Clone)]
pub struct LetterBag {
    letters: Vec<Symbol>,
    weights: WeightedIndex<u32>,
}

impl LetterBag {
    pub fn new(table: &[(&str, u32)]) -> Result<Self, LetterWeightsError> {
        let letters = table
            .iter()
            .map(|(token, _)| {
                Symbol::from_token(token)
                    .ok_or_else(|| LetterWeightsError::UnknownLetter(token.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let weights = WeightedIndex::new(table.iter().map(|(_, weight)| *weight))?;
        Ok(Self { letters, weights })
    }

    pub fn italian() -> Result<Self, LetterWeightsError> {
        Self::new(&ITALIAN_WEIGHTS)
    }

    fn draw<R: Rng>(&self, rng: &mut R) -> Symbol {
        self.letters[self.weights.sample(rng)]
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatrixParseError {
    #[error("expected {CELL_COUNT} cells, found {0}")]
    CellCount(usize),
    #[error("invalid cell token {0:?}")]
    InvalidToken(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    fn index(self) -> usize {
        self.row * MATRIX_SIZE + self.col
    }

    /// Horizontal or vertical neighbours only.
    fn is_adjacent(self, other: Position) -> bool {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col) == 1
    }
}

/// A fully populated grid. Cheap to copy, so readers take a snapshot
/// rather than holding the game lock while tracing words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Matrix {
    cells: [Symbol; CELL_COUNT],
}

impl Matrix {
    pub fn get(&self, row: usize, col: usize) -> Symbol {
        self.cells[row * MATRIX_SIZE + col]
    }

    pub fn random<R: Rng>(rng: &mut R, letters: &LetterBag) -> Self {
        let mut cells = [Symbol::QU; CELL_COUNT];
        for cell in cells.iter_mut() {
            *cell = letters.draw(rng);
        }
        Self { cells }
    }

    /// Wire and file form: row-major tokens separated by single spaces.
    pub fn to_payload(&self) -> String {
        self.to_string()
    }

    /// Whether `word` can be traced as a path of 4-adjacent, distinct cells.
    ///
    /// Each call keeps its own visited set, so concurrent calls on the same
    /// matrix never interfere.
    pub fn contains_word(&self, word: &str) -> bool {
        let length = word.chars().count();
        if !(MIN_WORD_LEN..=MAX_WORD_LEN).contains(&length) {
            return false;
        }
        let Some(path) = symbols(word) else {
            return false;
        };

        let mut positions: [Vec<Position>; ALPHABET_LEN] = Default::default();
        for row in 0..MATRIX_SIZE {
            for col in 0..MATRIX_SIZE {
                positions[self.get(row, col).index()].push(Position { row, col });
            }
        }

        if path.iter().any(|symbol| positions[symbol.index()].is_empty()) {
            return false;
        }

        positions[path[0].index()]
            .iter()
            .any(|&start| trace(&path[1..], start, 1 << start.index(), &positions))
    }
}

fn trace(
    rest: &[Symbol],
    current: Position,
    visited: u32,
    positions: &[Vec<Position>; ALPHABET_LEN],
) -> bool {
    let Some((next, rest)) = rest.split_first() else {
        return true;
    };

    positions[next.index()].iter().any(|&candidate| {
        let bit = 1 << candidate.index();
        visited & bit == 0
            && current.is_adjacent(candidate)
            && trace(rest, candidate, visited | bit, positions)
    })
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cell) in self.cells.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", cell)?;
        }
        Ok(())
    }
}

impl FromStr for Matrix {
    type Err = MatrixParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != CELL_COUNT {
            return Err(MatrixParseError::CellCount(tokens.len()));
        }

        let mut cells = [Symbol::QU; CELL_COUNT];
        for (cell, token) in cells.iter_mut().zip(tokens) {
            *cell = Symbol::from_token(token)
                .ok_or_else(|| MatrixParseError::InvalidToken(token.to_string()))?;
        }
        Ok(Self { cells })
    }
}

/// Where each round's matrix comes from.
#[derive(Debug)]
pub enum MatrixSource {
    /// Pre-authored grids, one per round, wrapping around when exhausted.
    File { grids: Vec<Matrix> },
    Random { rng: StdRng, letters: LetterBag },
}

impl MatrixSource {
    pub fn random(seed: u64) -> Result<Self, LetterWeightsError> {
        Ok(MatrixSource::Random {
            rng: StdRng::seed_from_u64(seed),
            letters: LetterBag::italian()?,
        })
    }

    /// Parses every non-empty line of a matrix file up front.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ServerError::MatrixFile {
            path: path.to_path_buf(),
            source,
        })?;
        let source = Self::from_lines(&text).map_err(|(line, source)| ServerError::MatrixLine {
            path: path.to_path_buf(),
            line,
            source,
        })?;
        info!("Loaded matrices from {}", path.display());
        Ok(source)
    }

    /// Builds a file source from text; errors carry the 1-based line number.
    pub fn from_lines(text: &str) -> Result<Self, (usize, MatrixParseError)> {
        let mut grids = Vec::new();
        for (number, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            grids.push(line.parse::<Matrix>().map_err(|e| (number + 1, e))?);
        }
        if grids.is_empty() {
            return Err((0, MatrixParseError::CellCount(0)));
        }
        Ok(MatrixSource::File { grids })
    }

    /// Matrix for the given 0-based round.
    pub fn next_matrix(&mut self, round: u64) -> Matrix {
        let matrix = match self {
            MatrixSource::File { grids } => grids[(round % grids.len() as u64) as usize],
            MatrixSource::Random { rng, letters } => Matrix::random(rng, letters),
        };
        debug!("Round {} matrix: {}", round, matrix);
        matrix
    }
}
