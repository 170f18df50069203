//! Server network layer handling TCP connections and game loop coordination

use crate::client_manager::{ClientManager, OUTBOUND_CAPACITY};
use crate::config::Settings;
use crate::game::GameState;
use crate::session::{Phase, Session};
use log::{debug, error, info, warn};
use shared::LineBuffer;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};

pub type ServerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

const READ_CHUNK: usize = 4096;

/// A socket write that makes no progress for this long closes the connection
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Main server coordinating connections and the simulation
pub struct Server {
    listener: TcpListener,
    clients: Arc<RwLock<ClientManager>>,
    game: Arc<Mutex<GameState>>,
    tick_duration: Duration,
}

impl Server {
    pub async fn new(addr: &str, settings: Settings) -> ServerResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let tick_duration = Duration::from_millis(settings.ms_per_frame);
        Ok(Server {
            listener,
            clients: Arc::new(RwLock::new(ClientManager::new())),
            game: Arc::new(Mutex::new(GameState::new(settings))),
            tick_duration,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn game(&self) -> Arc<Mutex<GameState>> {
        Arc::clone(&self.game)
    }

    pub fn clients(&self) -> Arc<RwLock<ClientManager>> {
        Arc::clone(&self.clients)
    }

    /// Spawns task that advances the simulation and broadcasts each tick
    fn spawn_tick_loop(&self) {
        let game = Arc::clone(&self.game);
        let clients = Arc::clone(&self.clients);
        let tick_duration = self.tick_duration;

        tokio::spawn(async move {
            let mut ticker = interval(tick_duration);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                // Render under the game lock, send after releasing it
                let payload = {
                    let mut game = game.lock().await;
                    let report = game.tick();
                    if game.tick % 300 == 0 {
                        debug!(
                            "Tick {}: {} snakes, {} food",
                            game.tick,
                            report.snakes.len(),
                            report.food.len()
                        );
                    }
                    if report.is_empty() {
                        continue;
                    }
                    report.to_wire()
                };

                let payload = match payload {
                    Ok(payload) => payload,
                    Err(e) => {
                        error!("Failed to encode tick report: {}", e);
                        continue;
                    }
                };

                let failed = clients.read().await.broadcast(&payload);
                if !failed.is_empty() {
                    let pruned = clients.write().await.prune(&failed);
                    debug!("Pruned {} unreachable clients", pruned);
                }
            }
        });
    }

    /// Spawns task that tops up food, faster with more snakes on the board
    fn spawn_food_loop(&self) {
        let game = Arc::clone(&self.game);

        tokio::spawn(async move {
            loop {
                let period = game.lock().await.food_spawn_period();
                sleep(period).await;
                game.lock().await.spawn_food();
            }
        });
    }

    /// Spawns the reader and writer tasks of one connection
    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let game = Arc::clone(&self.game);
        let clients = Arc::clone(&self.clients);

        tokio::spawn(async move {
            if let Err(e) = stream.set_nodelay(true) {
                debug!("Could not disable Nagle for {}: {}", addr, e);
            }
            let (reader, writer) = stream.into_split();
            let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
            let client_id = clients.write().await.add_client(addr, tx.clone());

            tokio::spawn(write_outbound(client_id, writer, rx));
            read_inbound(client_id, reader, tx, game, Arc::clone(&clients)).await;

            clients.write().await.remove_client(&client_id);
        });
    }

    /// Accepts connections until the listener fails for good
    pub async fn run(self) -> ServerResult<()> {
        self.spawn_tick_loop();
        self.spawn_food_loop();

        info!("Server started successfully");

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => self.spawn_connection(stream, addr),
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

/// Drains a connection's outbound queue into its socket
async fn write_outbound(
    client_id: u64,
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::Receiver<String>,
) {
    while let Some(payload) = rx.recv().await {
        match timeout(WRITE_TIMEOUT, writer.write_all(payload.as_bytes())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Write to client {} failed: {}", client_id, e);
                break;
            }
            Err(_) => {
                warn!("Write to client {} stalled, closing", client_id);
                break;
            }
        }
    }
    // Closing the queue stops the reader as well
    drop(rx);
    if let Err(e) = writer.shutdown().await {
        debug!("Shutdown of client {} failed: {}", client_id, e);
    }
}

/// Frames incoming bytes and feeds each message to the connection's session
async fn read_inbound(
    client_id: u64,
    mut reader: OwnedReadHalf,
    tx: mpsc::Sender<String>,
    game: Arc<Mutex<GameState>>,
    clients: Arc<RwLock<ClientManager>>,
) {
    let mut session = Session::new();
    let mut frames = LineBuffer::new();
    let mut chunk = [0u8; READ_CHUNK];

    'connection: loop {
        let read = tokio::select! {
            read = reader.read(&mut chunk) => read,
            _ = tx.closed() => {
                debug!("Writer for client {} has stopped", client_id);
                break;
            }
        };

        let n = match read {
            Ok(0) => {
                debug!("Client {} closed the connection", client_id);
                break;
            }
            Ok(n) => n,
            Err(e) => {
                warn!("Read from client {} failed: {}", client_id, e);
                break;
            }
        };

        let messages = match frames.push(&chunk[..n]) {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Dropping client {}: {}", client_id, e);
                break;
            }
        };

        for message in messages {
            let before = session.phase();
            let reply = {
                let mut game = game.lock().await;
                session.on_message(&message, &mut game)
            };

            // The startup reply is queued before the client joins broadcasts
            if let Some(reply) = reply {
                if tx.try_send(reply).is_err() {
                    session.on_transport_error();
                }
            }

            match (before, session.phase()) {
                (Phase::AwaitingName, Phase::AwaitingDirection(player_id)) => {
                    clients.write().await.set_player(client_id, player_id);
                }
                (_, Phase::Disconnected) => break 'connection,
                _ => {}
            }
        }
    }

    session.on_transport_error();
    clients.write().await.mark_disconnected(client_id);
}
