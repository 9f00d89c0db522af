//! Server network layer: TCP accept loop, per-connection tasks and startup

use crate::barrier::{score_barrier, Scorer};
use crate::config::ServerConfig;
use crate::dictionary::Dictionary;
use crate::error::ServerError;
use crate::game::GameCore;
use crate::matrix::MatrixSource;
use crate::registry::{ConnectionId, PlayerRegistry};
use crate::session::{Connection, Session};
use log::{debug, error, info, warn};
use shared::{read_message, write_message, Message, MessageKind};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;

/// Game server: owns the listener and the shared session
pub struct Server {
    listener: TcpListener,
    session: Arc<Session>,
    scorer: Scorer,
    connection_slots: Arc<Semaphore>,
    next_connection_id: ConnectionId,
}

impl Server {
    /// Loads the dictionary and matrix source, then binds the listener.
    /// Nothing is accepted until [`Server::run`].
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let dictionary_path = config.dictionary_path();
        let dictionary =
            Dictionary::load(&dictionary_path).map_err(|source| ServerError::Dictionary {
                path: dictionary_path.clone(),
                source,
            })?;

        let source = match &config.matrix_file {
            Some(path) => MatrixSource::from_file(path)?,
            None => {
                info!("Generating random matrices with seed {}", config.seed);
                MatrixSource::random(config.seed)?
            }
        };

        let addr = config.bind_addr();
        let listener = TcpListener::bind(addr.as_str())
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        info!("Server listening on {}", listener.local_addr()?);

        let (barrier, scorer, results) = score_barrier();
        let core = GameCore::new(
            source,
            PlayerRegistry::new(config.max_players),
            barrier,
            config.round_duration,
            config.pause_duration,
            Instant::now(),
        );

        Ok(Server {
            listener,
            session: Arc::new(Session::new(core, dictionary, results)),
            scorer,
            connection_slots: Arc::new(Semaphore::new(config.max_players)),
            next_connection_id: 1,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Spawns the task that ranks completed score collections
    fn spawn_scorer(scorer: Scorer) {
        tokio::spawn(async move {
            let rounds = scorer.run().await;
            info!("Scorer stopped after {} rounds", rounds);
        });
    }

    /// Spawns the task that flips between waiting and active rounds
    fn spawn_round_clock(session: Arc<Session>) {
        tokio::spawn(session.run_clock());
    }

    /// Runs the round clock and scorer, then accepts connections forever
    pub async fn run(mut self) -> Result<(), ServerError> {
        Self::spawn_scorer(self.scorer);
        Self::spawn_round_clock(Arc::clone(&self.session));

        info!("Server started successfully");

        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    continue;
                }
            };

            let id = self.next_connection_id;
            self.next_connection_id = self.next_connection_id.wrapping_add(1);

            let Ok(slot) = Arc::clone(&self.connection_slots).try_acquire_owned() else {
                warn!("Refusing connection from {}: server full", addr);
                tokio::spawn(refuse_connection(stream));
                continue;
            };

            info!("Connection {} accepted from {}", id, addr);
            let session = Arc::clone(&self.session);
            tokio::spawn(async move {
                handle_connection(stream, id, session).await;
                drop(slot);
            });
        }
    }
}

async fn refuse_connection(mut stream: TcpStream) {
    let message = Message::text(MessageKind::Error, "Server is full");
    if let Err(e) = write_message(&mut stream, &message).await {
        debug!("Failed to notify refused connection: {}", e);
    }
}

/// Reads frames until the peer leaves or sends garbage, then unregisters it
async fn handle_connection(stream: TcpStream, id: ConnectionId, session: Arc<Session>) {
    let (mut reader, writer) = stream.into_split();
    let (outbound, inbound) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(run_writer(writer, inbound, id));
    let connection = Connection::new(id, outbound);

    loop {
        match read_message(&mut reader).await {
            Ok(Some(message)) => session.handle_message(&connection, message).await,
            Ok(None) => {
                info!("Connection {} closed by peer", id);
                break;
            }
            Err(e) => {
                warn!("Dropping connection {}: {}", id, e);
                break;
            }
        }
    }

    session.disconnect(id).await;
    drop(connection);
    // The writer drains whatever is still queued, then closes its half.
    if let Err(e) = writer_task.await {
        error!("Writer for connection {} panicked: {}", id, e);
    }
}

/// Drains a connection's outbound queue onto the socket, in order
async fn run_writer(
    mut writer: OwnedWriteHalf,
    mut inbound: mpsc::UnboundedReceiver<Message>,
    id: ConnectionId,
) {
    while let Some(message) = inbound.recv().await {
        if let Err(e) = write_message(&mut writer, &message).await {
            warn!("Failed to write to connection {}: {}", id, e);
            break;
        }
    }
}

/// Binds and runs a server with the given configuration.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    Server::bind(config).await?.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::time::timeout;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "paroliere-network-{}-{}",
            std::process::id(),
            name
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn config(test: &str, max_players: usize) -> ServerConfig {
        ServerConfig {
            port: 0,
            dictionary_file: Some(write_temp(&format!("{}-words.txt", test), "piano\nquota\n")),
            max_players,
            ..ServerConfig::default()
        }
    }

    async fn recv(stream: &mut TcpStream) -> Message {
        timeout(Duration::from_secs(5), read_message(stream))
            .await
            .expect("timed out")
            .unwrap()
            .expect("connection closed")
    }

    #[tokio::test]
    async fn test_bind_fails_without_dictionary() {
        let config = ServerConfig {
            port: 0,
            dictionary_file: Some(PathBuf::from("/nonexistent/paroliere/words.txt")),
            ..ServerConfig::default()
        };
        assert!(matches!(
            Server::bind(config).await,
            Err(ServerError::Dictionary { .. })
        ));
    }

    #[tokio::test]
    async fn test_bind_fails_on_bad_matrix_file() {
        let config = ServerConfig {
            matrix_file: Some(write_temp("bad-matrices.txt", "A B C\n")),
            ..config("bad-matrix", 4)
        };
        assert!(matches!(
            Server::bind(config).await,
            Err(ServerError::MatrixLine { line: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_connection_over_capacity_is_refused() {
        let server = Server::bind(config("capacity", 1)).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());

        let mut first = TcpStream::connect(addr).await.unwrap();
        write_message(&mut first, &Message::text(MessageKind::RegisterUser, "ana"))
            .await
            .unwrap();
        assert_eq!(recv(&mut first).await, Message::text(MessageKind::Ok, "Game joined"));

        let mut second = TcpStream::connect(addr).await.unwrap();
        assert_eq!(
            recv(&mut second).await,
            Message::text(MessageKind::Error, "Server is full")
        );
    }

    #[tokio::test]
    async fn test_malformed_frame_closes_connection() {
        let server = Server::bind(config("malformed", 4)).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(&[b'Z', 0, 0, 0, 0]).await.unwrap();

        let result = timeout(Duration::from_secs(5), read_message(&mut stream))
            .await
            .expect("timed out");
        assert!(matches!(result, Ok(None) | Err(_)));
    }
}
