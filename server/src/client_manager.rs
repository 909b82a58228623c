//! Per-connection session records and outbound message routing
//!
//! This module owns everything the server remembers about a connection:
//! - Connection metadata (ID, address) and the outbound frame queue
//! - The wire format the connection last spoke, so replies match it
//! - Room membership (room code and seat), torn down on disconnect
//!
//! Game state never lives here; the lobby reads and updates the session
//! while it applies a request.

use crate::lobby::Dispatch;
use log::{debug, info, warn};
use shared::{encode, ClientId, EncodedFrame, ServerMessage, WireFormat};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Session state for one WebSocket connection
///
/// Each client maintains:
/// - Connection metadata (ID, address)
/// - The sender half of its writer task's queue
/// - Its current room membership, if any
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: ClientId,
    /// Remote address, for logging
    pub addr: SocketAddr,
    /// Frames queued here are written to the socket by the writer task
    pub sender: mpsc::UnboundedSender<Message>,
    /// Format of the last frame received from this client
    pub format: WireFormat,
    /// Room the client currently belongs to
    pub room_code: Option<String>,
    /// Seat inside that room, `None` for spectators
    pub slot: Option<usize>,
}

impl Client {
    /// Creates a session that is not in any room yet
    pub fn new(id: ClientId, addr: SocketAddr, sender: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id,
            addr,
            sender,
            format: WireFormat::default(),
            room_code: None,
            slot: None,
        }
    }

    /// Records membership after a successful create or join
    pub fn enter_room(&mut self, room_code: &str, slot: Option<usize>) {
        self.room_code = Some(room_code.to_string());
        self.slot = slot;
    }

    /// Clears membership and returns the room the client was in
    pub fn leave_room(&mut self) -> Option<String> {
        self.slot = None;
        self.room_code.take()
    }

    /// Encodes `message` in the client's wire format and queues it
    ///
    /// Returns false when encoding fails or the writer task is gone, which
    /// happens briefly between a socket closing and the disconnect event.
    pub fn send(&self, message: &ServerMessage) -> bool {
        let frame = match encode(message, self.format) {
            Ok(EncodedFrame::Text(text)) => Message::Text(text),
            Ok(EncodedFrame::Binary(bytes)) => Message::Binary(bytes),
            Err(e) => {
                warn!("Failed to encode message for client {}: {}", self.id, e);
                return false;
            }
        };

        if self.sender.send(frame).is_err() {
            debug!("Client {} writer closed, dropping message", self.id);
            return false;
        }
        true
    }
}

/// Owns every live session
///
/// The ClientManager enforces the connection limit, hands out IDs and fans
/// lobby dispatches out to the right connections.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<ClientId, Client>,
    /// Next available client ID for new connections
    next_client_id: ClientId,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    /// Creates an empty client manager; IDs start from 1
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a new connection
    ///
    /// Returns None if the server is at capacity.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Message>,
    ) -> Option<ClientId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, sender));
        Some(client_id)
    }

    /// Drops a session and returns it so its room membership can be torn down
    pub fn remove_client(&mut self, client_id: ClientId) -> Option<Client> {
        let client = self.clients.remove(&client_id)?;
        info!("Client {} disconnected", client.id);
        Some(client)
    }

    pub fn get(&self, client_id: ClientId) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    pub fn get_mut(&mut self, client_id: ClientId) -> Option<&mut Client> {
        self.clients.get_mut(&client_id)
    }

    /// Sends one message to one client, ignoring unknown IDs
    pub fn send_to(&self, client_id: ClientId, message: &ServerMessage) -> bool {
        self.clients
            .get(&client_id)
            .map(|client| client.send(message))
            .unwrap_or(false)
    }

    /// Delivers lobby output; each recipient gets the message in its own format
    pub fn deliver(&self, dispatches: &[Dispatch]) {
        for dispatch in dispatches {
            for client_id in &dispatch.recipients {
                self.send_to(*client_id, &dispatch.message);
            }
        }
    }

    /// Forgets room membership for every client still pointing at `room_code`
    pub fn clear_room(&mut self, room_code: &str) {
        for client in self.clients.values_mut() {
            if client.room_code.as_deref() == Some(room_code) {
                client.leave_room();
            }
        }
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
