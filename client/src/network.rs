//! Client network layer: one TCP connection to the game server

use log::{debug, info, warn};
use shared::{read_message, write_message, FrameError, Message, MessageKind};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("server closed the connection")]
    Closed,
}

/// Write half of a connection, with one method per request kind
#[derive(Debug)]
pub struct RequestSender {
    writer: OwnedWriteHalf,
}

impl RequestSender {
    pub async fn send(&mut self, message: &Message) -> Result<(), ClientError> {
        debug!("Sending {:?} ({} bytes)", message.kind, message.payload.len());
        write_message(&mut self.writer, message).await?;
        Ok(())
    }

    pub async fn register(&mut self, nickname: &str) -> Result<(), ClientError> {
        self.send(&Message::text(MessageKind::RegisterUser, nickname))
            .await
    }

    pub async fn request_matrix(&mut self) -> Result<(), ClientError> {
        self.send(&Message::empty(MessageKind::Matrix)).await
    }

    pub async fn submit_word(&mut self, word: &str) -> Result<(), ClientError> {
        self.send(&Message::text(MessageKind::SubmitWord, word)).await
    }
}

/// A connected game client
///
/// Requests and replies share one stream. Use [`GameClient::recv`] for
/// scripted exchanges, or [`GameClient::spawn_listener`] to receive in the
/// background while requests are sent from elsewhere.
#[derive(Debug)]
pub struct GameClient {
    reader: OwnedReadHalf,
    sender: RequestSender,
    server_addr: SocketAddr,
}

impl GameClient {
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        let server_addr = stream.peer_addr().map_err(FrameError::from)?;
        info!("Connected to {}", server_addr);

        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader,
            sender: RequestSender { writer },
            server_addr,
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    pub async fn send(&mut self, message: &Message) -> Result<(), ClientError> {
        self.sender.send(message).await
    }

    pub async fn register(&mut self, nickname: &str) -> Result<(), ClientError> {
        self.sender.register(nickname).await
    }

    pub async fn request_matrix(&mut self) -> Result<(), ClientError> {
        self.sender.request_matrix().await
    }

    pub async fn submit_word(&mut self, word: &str) -> Result<(), ClientError> {
        self.sender.submit_word(word).await
    }

    /// Next message from the server. Not cancel safe: dropping the future
    /// mid-frame loses that frame.
    pub async fn recv(&mut self) -> Result<Message, ClientError> {
        match read_message(&mut self.reader).await? {
            Some(message) => Ok(message),
            None => Err(ClientError::Closed),
        }
    }

    /// Reads until a message of one of `kinds` arrives, discarding others.
    pub async fn recv_kind(&mut self, kinds: &[MessageKind]) -> Result<Message, ClientError> {
        loop {
            let message = self.recv().await?;
            if kinds.contains(&message.kind) {
                return Ok(message);
            }
            debug!("Skipping {:?} while waiting for {:?}", message.kind, kinds);
        }
    }

    /// Moves reading onto a background task. Messages arrive on the
    /// returned channel, which closes when the server disconnects.
    pub fn spawn_listener(self) -> (mpsc::UnboundedReceiver<Message>, RequestSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut reader = self.reader;

        tokio::spawn(async move {
            loop {
                match read_message(&mut reader).await {
                    Ok(Some(message)) => {
                        if tx.send(message).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        info!("Server closed the connection");
                        break;
                    }
                    Err(e) => {
                        warn!("Error reading from server: {}", e);
                        break;
                    }
                }
            }
        });

        (rx, self.sender)
    }
}
