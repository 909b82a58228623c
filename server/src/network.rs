//! Server network layer handling WebSocket connections and the tick loop
//!
//! Every connection gets a reader (the connection task itself) and a writer
//! task. Neither touches game state: readers decode frames into
//! [`ServerEvent`]s for the main loop, writers drain the connection's outbound
//! queue. The main loop owns the [`Lobby`] and the [`ClientManager`] and
//! interleaves events with fixed-rate ticks.

use crate::client_manager::ClientManager;
use crate::level_store::{LevelStore, DEFAULT_LEVEL_DIRECTORIES, DEFAULT_LEVEL_FILE};
use crate::lobby::Lobby;
use crate::utils::get_timestamp;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{
    decode_binary, decode_text, ClientId, ClientMessage, CodecError, ServerMessage,
    TetherLimits, WireFormat, TICK_RATE,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Runtime settings for [`Server`]
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to, e.g. `127.0.0.1:3000`
    pub bind_addr: String,
    /// Simulation steps per second
    pub tick_rate: u32,
    /// Maximum number of concurrent connections
    pub max_connections: usize,
    /// Level directories, searched in order
    pub level_directories: Vec<PathBuf>,
    /// Level used when a create request names none
    pub default_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            tick_rate: TICK_RATE,
            max_connections: 256,
            level_directories: DEFAULT_LEVEL_DIRECTORIES.iter().map(PathBuf::from).collect(),
            default_level: DEFAULT_LEVEL_FILE.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn tick_rate(&self) -> u32 {
        self.tick_rate.max(1)
    }

    /// Fixed simulation step in seconds
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_rate() as f32
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate() as f64)
    }

    pub fn level_store(&self) -> LevelStore {
        LevelStore::new(self.level_directories.clone(), &self.default_level)
    }
}

/// Events sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerEvent {
    /// A WebSocket handshake completed; the loop answers with the new ID, or
    /// `None` when the server is full
    Connected {
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Message>,
        reply: oneshot::Sender<Option<ClientId>>,
    },
    Message {
        client_id: ClientId,
        message: ClientMessage,
        format: WireFormat,
    },
    Disconnected {
        client_id: ClientId,
    },
}

/// Main server coordinating connections and room simulation
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    clients: ClientManager,
    lobby: Lobby,
    config: ServerConfig,
    tick: u64,

    // Communication channels
    event_tx: mpsc::UnboundedSender<ServerEvent>,
    event_rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on ws://{}", local_addr);

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            clients: ClientManager::new(config.max_connections),
            lobby: Lobby::new(config.level_store()),
            config,
            tick: 0,
            event_tx,
            event_rx,
        })
    }

    /// Address actually bound, useful when binding port 0
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn lobby(&self) -> &Lobby {
        &self.lobby
    }

    pub fn clients(&self) -> &ClientManager {
        &self.clients
    }

    /// Spawns task that accepts TCP connections and upgrades them
    fn spawn_acceptor(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        tokio::spawn(handle_connection(stream, addr, event_tx.clone()));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Applies one connection event to the lobby and delivers the results
    pub fn handle_event(&mut self, event: ServerEvent) {
        let now_ms = get_timestamp();

        match event {
            ServerEvent::Connected {
                addr,
                sender,
                reply,
            } => {
                let client_id = self.clients.add_client(addr, sender);
                match client_id {
                    Some(id) => {
                        self.clients.send_to(
                            id,
                            &ServerMessage::Welcome {
                                id,
                                limits: TetherLimits::default(),
                            },
                        );
                    }
                    None => warn!("Rejected connection from {}: server full", addr),
                }
                if reply.send(client_id).is_err() {
                    debug!("Connection from {} went away during setup", addr);
                    if let Some(id) = client_id {
                        self.clients.remove_client(id);
                    }
                }
            }
            ServerEvent::Message {
                client_id,
                message,
                format,
            } => {
                let Some(client) = self.clients.get_mut(client_id) else {
                    return;
                };
                client.format = format;
                let dispatches = self.lobby.handle_message(client, message, now_ms);
                self.clients.deliver(&dispatches);
            }
            ServerEvent::Disconnected { client_id } => {
                if let Some(mut client) = self.clients.remove_client(client_id) {
                    let dispatches = self.lobby.disconnect(&mut client, now_ms);
                    self.clients.deliver(&dispatches);
                }
            }
        }
    }

    /// Runs one simulation step for every room and broadcasts the results
    pub fn tick(&mut self) {
        self.tick += 1;
        let report = self.lobby.tick(self.config.dt(), get_timestamp());
        self.clients.deliver(&report.dispatches);
        for closed in &report.closed {
            self.clients.clear_room(&closed.code);
        }

        // Periodic load report, once a second
        if self.tick % self.config.tick_rate() as u64 == 0 && !self.clients.is_empty() {
            debug!(
                "Tick {}: {} clients, {} rooms",
                self.tick,
                self.clients.len(),
                self.lobby.room_count()
            );
        }
    }

    /// Main server loop coordinating connections and ticks
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_acceptor();

        let mut tick_interval = interval(self.config.tick_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server started at {} Hz", self.config.tick_rate());

        loop {
            tokio::select! {
                event = self.event_rx.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    self.tick();
                },
            }
        }

        Ok(())
    }
}

fn decode_frame(frame: &Message) -> Option<Result<(ClientMessage, WireFormat), CodecError>> {
    match frame {
        Message::Text(text) => Some(decode_text(text).map(|message| (message, WireFormat::Json))),
        Message::Binary(bytes) => {
            Some(decode_binary(bytes).map(|message| (message, WireFormat::Bincode)))
        }
        _ => None,
    }
}

/// Drives one WebSocket connection until either side closes it
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    events: mpsc::UnboundedSender<ServerEvent>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };
    let (mut write, mut read) = ws_stream.split();

    let (sender, mut outbound) = mpsc::unbounded_channel();
    let (reply_tx, reply_rx) = oneshot::channel();
    if events
        .send(ServerEvent::Connected {
            addr,
            sender,
            reply: reply_tx,
        })
        .is_err()
    {
        return;
    }

    let client_id = match reply_rx.await {
        Ok(Some(id)) => id,
        _ => {
            let frame = CloseFrame {
                code: CloseCode::Again,
                reason: "Server full".into(),
            };
            let _ = write.send(Message::Close(Some(frame))).await;
            return;
        }
    };

    // The queue closes when the session is dropped, which ends this task
    tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if let Err(e) = write.send(frame).await {
                debug!("Failed to write to client {}: {}", client_id, e);
                break;
            }
        }
        let _ = write.close().await;
    });

    while let Some(frame) = read.next().await {
        let frame = match frame {
            Ok(Message::Close(_)) => break,
            Ok(frame) => frame,
            Err(e) => {
                debug!("Connection error from client {}: {}", client_id, e);
                break;
            }
        };

        match decode_frame(&frame) {
            Some(Ok((message, format))) => {
                let event = ServerEvent::Message {
                    client_id,
                    message,
                    format,
                };
                if events.send(event).is_err() {
                    error!("Main loop is gone, dropping client {}", client_id);
                    return;
                }
            }
            Some(Err(e)) => warn!("Dropping undecodable frame from client {}: {}", client_id, e),
            None => {}
        }
    }

    let _ = events.send(ServerEvent::Disconnected { client_id });
}
