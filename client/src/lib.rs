//! # Paroliere Client Library
//!
//! This library provides the client side of the paroliere word game: a TCP
//! connection that speaks the framed wire protocol, and a small command
//! shell that turns typed lines into requests and server replies into
//! readable text.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! Manages the connection to the server:
//! - Connection establishment
//! - Typed helpers for each request kind
//! - Blocking receive for scripted exchanges, or a background listener
//!   task for interactive use
//!
//! ### Shell Module (`shell`)
//! Parses shell commands (Italian names with English aliases) and renders
//! server messages: the matrix as a 4x4 grid, the final scores as a ranked
//! list.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::GameClient;
//! use shared::MessageKind;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = GameClient::connect("127.0.0.1:8080").await?;
//!
//!     client.register("ana").await?;
//!     let reply = client.recv().await?;
//!     println!("{}", client::shell::render(&reply));
//!
//!     client.submit_word("piano").await?;
//!     let score = client
//!         .recv_kind(&[MessageKind::WordScore, MessageKind::Error])
//!         .await?;
//!     println!("{}", client::shell::render(&score));
//!
//!     Ok(())
//! }
//! ```

pub mod network;
pub mod shell;

pub use network::{ClientError, GameClient, RequestSender};
pub use shell::Command;
