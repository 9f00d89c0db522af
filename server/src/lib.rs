//! # Paroliere Server Library
//!
//! This library implements the session server for paroliere, a multiplayer
//! word game. Players connect over TCP, register a nickname and race to
//! trace dictionary words through a shared 4x4 letter matrix. The server
//! alternates timed rounds with short pauses and hands every player the
//! same ranked scoreboard after each round.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Game State
//! The server owns the phase clock, the current matrix and every player's
//! score. Clients never compute scores; they submit words and receive the
//! points credited.
//!
//! ### Player Management
//! Handles the complete lifecycle of a player:
//! - Connection acceptance with a capacity limit
//! - Nickname registration and uniqueness
//! - Per-round word bookkeeping so a word scores once per player
//! - Removal on disconnect, including from an in-progress score collection
//!
//! ### Round Results
//! At the end of each round every registered player's score is collected
//! exactly once, ranked by a single scorer task and published as one shared
//! result that each player's connection delivers.
//!
//! ## Architecture Design
//!
//! ### Task Layout
//! The server runs on the tokio runtime with:
//! - **Accept loop**: admits connections and spawns their tasks
//! - **Connection reader**: decodes frames and dispatches them to the session
//! - **Connection writer**: drains the connection's outbound queue in order
//! - **Round clock**: flips between the waiting and active phases
//! - **Score companion**: one per player, contributes its score and
//!   delivers the scoreboard
//! - **Scorer**: ranks each complete collection
//!
//! ### Single Session Lock
//! All mutable game state lives in one `GameCore` behind one async mutex.
//! Word tracing and dictionary lookups run on a copied matrix outside the
//! lock, so slow validation never stalls other players.
//!
//! ## Module Organization
//!
//! ### Alphabet and Dictionary (`alphabet`, `dictionary`)
//! The 27-symbol alphabet, where `Qu` is one symbol, and the trie used for
//! word lookups.
//!
//! ### Matrix Module (`matrix`)
//! Grid parsing, weighted random generation and path tracing.
//!
//! ### Registry Module (`registry`)
//! Registered players, their scores and their outbound queues.
//!
//! ### Game and Barrier Modules (`game`, `barrier`)
//! The phase state machine and the end-of-round score collection.
//!
//! ### Session Module (`session`)
//! Request handling: registration, matrix requests, word submission.
//!
//! ### Network Module (`network`)
//! Listener startup, connection tasks and the frame I/O loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         round_duration: Duration::from_secs(120),
//!         matrix_file: Some("matrices.txt".into()),
//!         ..ServerConfig::default()
//!     };
//!
//!     // Loads the dictionary and matrices, then binds the listener.
//!     let server = Server::bind(config).await?;
//!     println!("Listening on {}", server.local_addr()?);
//!
//!     // Starts the round clock and scorer, then accepts players forever.
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod alphabet;
pub mod barrier;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod game;
pub mod matrix;
pub mod network;
pub mod registry;
pub mod session;

pub use config::ServerConfig;
pub use error::ServerError;
pub use network::{run_server, Server};
