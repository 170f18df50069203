//! Connection registry for the snake server
//!
//! This module tracks every open TCP connection, including:
//! - Connection lifecycle (accept, handshake, disconnect)
//! - The player id bound to a connection once its name arrives
//! - The outbound channel feeding the connection's writer task
//!
//! Broadcasts only reach connections that finished the handshake. Sends that
//! fail are reported back so the caller can prune dead connections once the
//! broadcast loop is over. A connection whose outbound queue is full counts
//! as failed, so a peer that stops reading is dropped instead of buffered.

use crate::session::Phase;
use log::{debug, info};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;

/// Payloads a connection may have queued before it is treated as stalled
pub const OUTBOUND_CAPACITY: usize = 1000;

/// Represents one open connection
///
/// Each client holds:
/// - Connection metadata (connection id, peer address)
/// - The protocol phase and, after the handshake, the player id
/// - The sending half of its outbound queue
#[derive(Debug)]
pub struct Client {
    /// Connection identifier assigned by the registry
    pub id: u64,
    /// Peer address, kept for logging
    pub addr: SocketAddr,
    /// Snake id assigned during the handshake
    pub player_id: Option<i32>,
    /// Protocol phase mirrored from the connection's session
    pub phase: Phase,
    outbound: Sender<String>,
}

impl Client {
    /// Creates a client that has not yet sent its name
    pub fn new(id: u64, addr: SocketAddr, outbound: Sender<String>) -> Self {
        Self {
            id,
            addr,
            player_id: None,
            phase: Phase::AwaitingName,
            outbound,
        }
    }

    /// Queues a payload for the writer task
    ///
    /// Returns false once the writer has gone away or has fallen
    /// [`OUTBOUND_CAPACITY`] payloads behind.
    pub fn send(&self, payload: String) -> bool {
        match self.outbound.try_send(payload) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Outbound queue of client {} is full", self.id);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// True once the handshake completed and the connection has not failed
    pub fn is_playing(&self) -> bool {
        matches!(self.phase, Phase::AwaitingDirection(_))
    }
}

/// Manages all open connections
///
/// The ClientManager owns the per-connection state shared between the
/// accept loop, the reader tasks and the broadcast loop. It never touches a
/// socket directly; all output goes through each client's outbound channel.
#[derive(Debug)]
pub struct ClientManager {
    /// Open connections indexed by connection id
    clients: HashMap<u64, Client>,
    /// Next connection id to hand out
    next_client_id: u64,
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientManager {
    /// Creates an empty registry. Connection ids start from 1.
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
        }
    }

    /// Registers a freshly accepted connection and returns its id
    pub fn add_client(&mut self, addr: SocketAddr, outbound: Sender<String>) -> u64 {
        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, outbound));

        client_id
    }

    /// Removes a connection from the registry
    ///
    /// Returns true if the client was found and removed, false if it was
    /// already gone (for example pruned by a failed broadcast).
    pub fn remove_client(&mut self, client_id: &u64) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} ({}) disconnected", client.id, client.addr);
            true
        } else {
            false
        }
    }

    pub fn get(&self, client_id: &u64) -> Option<&Client> {
        self.clients.get(client_id)
    }

    /// Binds a player id to a connection after a successful handshake
    pub fn set_player(&mut self, client_id: u64, player_id: i32) -> bool {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.player_id = Some(player_id);
            client.phase = Phase::AwaitingDirection(player_id);
            true
        } else {
            false
        }
    }

    /// Records that a connection left the protocol, so broadcasts skip it
    pub fn mark_disconnected(&mut self, client_id: u64) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.phase = Phase::Disconnected;
        }
    }

    /// Queues a payload for a single connection
    pub fn send_to(&self, client_id: u64, payload: String) -> bool {
        self.clients
            .get(&client_id)
            .is_some_and(|client| client.send(payload))
    }

    /// Queues the payload on every connection past the handshake
    ///
    /// The registry is not modified here. Returns the ids of connections
    /// whose outbound queue is closed or full, or that already left the
    /// protocol;
    /// the caller removes them with [`ClientManager::prune`].
    pub fn broadcast(&self, payload: &str) -> Vec<u64> {
        let mut failed = Vec::new();

        for (client_id, client) in &self.clients {
            match client.phase {
                Phase::AwaitingName => {}
                Phase::Disconnected => failed.push(*client_id),
                Phase::AwaitingDirection(_) => {
                    if !client.send(payload.to_string()) {
                        debug!("Broadcast to client {} failed", client_id);
                        failed.push(*client_id);
                    }
                }
            }
        }

        failed
    }

    /// Removes every listed connection, returning how many were still present
    pub fn prune(&mut self, client_ids: &[u64]) -> usize {
        client_ids
            .iter()
            .filter(|client_id| self.remove_client(*client_id))
            .count()
    }

    /// Number of connections that own a snake
    pub fn player_count(&self) -> usize {
        self.clients.values().filter(|client| client.is_playing()).count()
    }

    /// Returns the number of open connections
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no connections are open
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
