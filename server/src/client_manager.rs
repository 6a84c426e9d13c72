//! Participant slots and connection lifecycle on the simulator side.
//!
//! This module tracks which observers hold a participant identifier:
//! - Identifier assignment on connect (lowest free slot in `[0, PLAYER_COUNT)`)
//! - Handshake state per connection (`Unauthenticated` until `Initialize` is sent)
//! - Inactivity timeouts and removal
//!
//! Identifiers are slot indices, so one is never handed out twice while the
//! connection holding it is alive.

use log::info;
use shared::PLAYER_COUNT;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Handshake progress of a connected observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, `Initialize` not yet sent.
    Unauthenticated,
    /// `Initialize` sent; receives replication pushes.
    Initialized,
}

/// A connected observer holding a participant slot.
#[derive(Debug)]
pub struct Client {
    /// Participant identifier, equal to the slot index
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    pub state: ConnectionState,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            state: ConnectionState::Unauthenticated,
        }
    }

    /// Checks if the client has exceeded the connection timeout
    ///
    /// Returns true if no packets have been received from this client
    /// within the specified timeout duration, indicating a likely disconnect.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Fixed-capacity roster of participants.
pub struct ClientManager {
    slots: [Option<Client>; PLAYER_COUNT],
}

impl ClientManager {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns the lowest unused identifier, or None if every slot is taken.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<u32> {
        let (index, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.is_none())?;

        let client_id = index as u32;
        *slot = Some(Client::new(client_id, addr));
        info!("Client {} connected from {}", client_id, addr);

        Some(client_id)
    }

    /// Frees the client's slot. Returns false if it was already free.
    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        match self.slots.get_mut(*client_id as usize).and_then(Option::take) {
            Some(client) => {
                info!("Client {} disconnected", client.id);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, client_id: u32) -> Option<&Client> {
        self.slots.get(client_id as usize).and_then(Option::as_ref)
    }

    /// Finds a client ID by their network address
    ///
    /// Used to associate incoming packets with existing client connections.
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients()
            .find(|client| client.addr == addr)
            .map(|client| client.id)
    }

    /// Records activity from a client.
    pub fn touch(&mut self, client_id: u32) {
        if let Some(client) = self.slots.get_mut(client_id as usize).and_then(Option::as_mut) {
            client.last_seen = Instant::now();
        }
    }

    /// Moves a client to `Initialized`. Returns false if the slot is empty or
    /// now held by a different address.
    pub fn mark_initialized(&mut self, client_id: u32, addr: SocketAddr) -> bool {
        match self.slots.get_mut(client_id as usize).and_then(Option::as_mut) {
            Some(client) if client.addr == addr => {
                client.state = ConnectionState::Initialized;
                true
            }
            _ => false,
        }
    }

    /// Addresses of every client that should receive replication pushes.
    pub fn initialized_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients()
            .filter(|client| client.state == ConnectionState::Initialized)
            .map(|client| (client.id, client.addr))
            .collect()
    }

    /// Gets all client IDs and their network addresses
    pub fn get_client_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients().map(|client| (client.id, client.addr)).collect()
    }

    /// Checks for and removes timed-out clients
    ///
    /// Returns the removed identifiers so other systems can release the
    /// state tied to them.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<u32> {
        let timed_out: Vec<u32> = self
            .clients()
            .filter(|client| client.is_timed_out(timeout))
            .map(|client| client.id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    fn clients(&self) -> impl Iterator<Item = &Client> {
        self.slots.iter().flatten()
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == PLAYER_COUNT
    }
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn test_addr3() -> SocketAddr {
        "127.0.0.1:8082".parse().unwrap()
    }

    #[test]
    fn test_client_creation() {
        let addr = test_addr();
        let client = Client::new(1, addr);

        assert_eq!(client.id, 1);
        assert_eq!(client.addr, addr);
        assert_eq!(client.state, ConnectionState::Unauthenticated);
    }

    #[test]
    fn test_client_timeout() {
        let mut client = Client::new(0, test_addr());

        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);

        assert!(client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_ids_start_at_zero() {
        let mut manager = ClientManager::new();
        assert!(manager.is_empty());

        assert_eq!(manager.add_client(test_addr()), Some(0));
        assert_eq!(manager.add_client(test_addr2()), Some(1));
        assert_eq!(manager.len(), 2);
        assert!(manager.is_full());
    }

    #[test]
    fn test_third_client_rejected() {
        let mut manager = ClientManager::new();
        manager.add_client(test_addr());
        manager.add_client(test_addr2());

        assert_eq!(manager.add_client(test_addr3()), None);
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.find_client_by_addr(test_addr3()), None);
    }

    #[test]
    fn test_lowest_free_id_reused_after_disconnect() {
        let mut manager = ClientManager::new();
        manager.add_client(test_addr());
        manager.add_client(test_addr2());

        assert!(manager.remove_client(&0));
        assert_eq!(manager.add_client(test_addr3()), Some(0));
        assert_eq!(manager.find_client_by_addr(test_addr2()), Some(1));
    }

    #[test]
    fn test_remove_nonexistent_client() {
        let mut manager = ClientManager::new();

        assert!(!manager.remove_client(&0));
        assert!(!manager.remove_client(&999));
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_find_client_by_addr() {
        let mut manager = ClientManager::new();
        let client_id1 = manager.add_client(test_addr()).unwrap();

        assert_eq!(manager.find_client_by_addr(test_addr()), Some(client_id1));

        let unknown_addr: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_client_by_addr(unknown_addr), None);
    }

    #[test]
    fn test_only_initialized_clients_receive_pushes() {
        let mut manager = ClientManager::new();
        let first = manager.add_client(test_addr()).unwrap();
        manager.add_client(test_addr2()).unwrap();

        assert!(manager.initialized_addrs().is_empty());

        assert!(manager.mark_initialized(first, test_addr()));
        assert_eq!(manager.initialized_addrs(), vec![(first, test_addr())]);
        assert_eq!(manager.get_client_addrs().len(), 2);
        assert!(!manager.mark_initialized(5, test_addr()));
    }

    #[test]
    fn test_stale_initialize_ignored_after_slot_reuse() {
        let mut manager = ClientManager::new();
        let slot = manager.add_client(test_addr()).unwrap();
        manager.remove_client(&slot);
        assert_eq!(manager.add_client(test_addr2()), Some(slot));

        assert!(!manager.mark_initialized(slot, test_addr()));
        assert_eq!(manager.get(slot).unwrap().state, ConnectionState::Unauthenticated);
        assert!(manager.initialized_addrs().is_empty());

        assert!(manager.mark_initialized(slot, test_addr2()));
        assert_eq!(manager.initialized_addrs(), vec![(slot, test_addr2())]);
    }

    #[test]
    fn test_check_timeouts() {
        let mut manager = ClientManager::new();
        let stale = manager.add_client(test_addr()).unwrap();
        let fresh = manager.add_client(test_addr2()).unwrap();

        if let Some(Some(client)) = manager.slots.get_mut(stale as usize) {
            client.last_seen = Instant::now() - Duration::from_secs(10);
        }

        assert_eq!(manager.check_timeouts(Duration::from_secs(5)), vec![stale]);
        assert!(manager.get(stale).is_none());
        assert!(manager.get(fresh).is_some());
    }

    #[test]
    fn test_touch_refreshes_last_seen() {
        let mut manager = ClientManager::new();
        let id = manager.add_client(test_addr()).unwrap();

        if let Some(Some(client)) = manager.slots.get_mut(id as usize) {
            client.last_seen = Instant::now() - Duration::from_secs(10);
        }
        manager.touch(id);

        assert!(manager.check_timeouts(Duration::from_secs(5)).is_empty());
    }
}
