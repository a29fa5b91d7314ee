// chain/src/network/peer.rs

//! Peer bookkeeping: connection state, message/byte counters, and a
//! reputation score that bans a peer once it misbehaves too often.
//!
//! Grounded on `original_source/blockchain/network/peer.py`. As elsewhere
//! in this crate, timestamps are caller-supplied `f64` rather than a
//! wall-clock read.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerStatus {
    Connected,
    Disconnected,
    Connecting,
    Banned,
}

impl PeerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeerStatus::Connected => "connected",
            PeerStatus::Disconnected => "disconnected",
            PeerStatus::Connecting => "connecting",
            PeerStatus::Banned => "banned",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peer {
    pub peer_id: String,
    pub address: String,
    pub port: u16,
    pub is_validator: bool,
    pub status: PeerStatus,
    pub last_seen: f64,
    pub connected_at: Option<f64>,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub reputation_score: i64,
    pub misbehavior_count: u64,
}

impl Peer {
    pub fn new(peer_id: impl Into<String>, address: impl Into<String>, port: u16, is_validator: bool, now: f64) -> Self {
        Peer {
            peer_id: peer_id.into(),
            address: address.into(),
            port,
            is_validator,
            status: PeerStatus::Disconnected,
            last_seen: now,
            connected_at: None,
            messages_sent: 0,
            messages_received: 0,
            bytes_sent: 0,
            bytes_received: 0,
            reputation_score: 100,
            misbehavior_count: 0,
        }
    }

    pub fn connect(&mut self, now: f64) {
        self.status = PeerStatus::Connected;
        self.connected_at = Some(now);
        self.last_seen = now;
    }

    pub fn disconnect(&mut self) {
        self.status = PeerStatus::Disconnected;
        self.connected_at = None;
    }

    pub fn ban(&mut self) {
        self.status = PeerStatus::Banned;
    }

    pub fn update_last_seen(&mut self, now: f64) {
        self.last_seen = now;
    }

    pub fn record_message_sent(&mut self, size: u64) {
        self.messages_sent += 1;
        self.bytes_sent += size;
    }

    pub fn record_message_received(&mut self, size: u64, now: f64) {
        self.messages_received += 1;
        self.bytes_received += size;
        self.update_last_seen(now);
    }

    pub fn report_misbehavior(&mut self) {
        self.misbehavior_count += 1;
        self.reputation_score = (self.reputation_score - 10).max(0);
        if self.reputation_score < 20 {
            self.ban();
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

pub struct PeerManager {
    max_peers: usize,
    peers: BTreeMap<String, Peer>,
    validator_peers: BTreeSet<String>,
}

impl PeerManager {
    pub fn new(max_peers: usize) -> Self {
        PeerManager { max_peers, peers: BTreeMap::new(), validator_peers: BTreeSet::new() }
    }

    pub fn add_peer(&mut self, peer: Peer) -> bool {
        if self.peers.len() >= self.max_peers || self.peers.contains_key(&peer.peer_id) {
            return false;
        }
        if peer.is_validator {
            self.validator_peers.insert(peer.peer_id.clone());
        }
        self.peers.insert(peer.peer_id.clone(), peer);
        true
    }

    pub fn remove_peer(&mut self, peer_id: &str) -> bool {
        let Some(peer) = self.peers.remove(peer_id) else {
            return false;
        };
        if peer.is_validator {
            self.validator_peers.remove(peer_id);
        }
        true
    }

    pub fn get_peer(&self, peer_id: &str) -> Option<&Peer> {
        self.peers.get(peer_id)
    }

    pub fn connected_peers(&self) -> Vec<&Peer> {
        self.peers.values().filter(|p| p.status == PeerStatus::Connected).collect()
    }

    pub fn validator_peers(&self) -> Vec<&Peer> {
        self.peers
            .iter()
            .filter(|(id, _)| self.validator_peers.contains(*id))
            .map(|(_, peer)| peer)
            .collect()
    }

    /// Records an outbound message against every connected peer and
    /// returns how many peers it was sent to.
    pub fn broadcast_message(&mut self, message_size: u64) -> usize {
        let ids: Vec<String> = self.connected_peers().into_iter().map(|p| p.peer_id.clone()).collect();
        for id in &ids {
            if let Some(peer) = self.peers.get_mut(id) {
                peer.record_message_sent(message_size);
            }
        }
        ids.len()
    }

    pub fn peer_count_by_status(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for status in [PeerStatus::Connected, PeerStatus::Disconnected, PeerStatus::Connecting, PeerStatus::Banned] {
            counts.insert(status.as_str(), 0);
        }
        for peer in self.peers.values() {
            *counts.entry(peer.status.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reputation_drops_and_bans_below_threshold() {
        let mut peer = Peer::new("p1", "127.0.0.1", 9000, false, 0.0);
        for _ in 0..9 {
            peer.report_misbehavior();
        }
        assert_eq!(peer.reputation_score, 10);
        assert_eq!(peer.status, PeerStatus::Banned);
    }

    #[test]
    fn manager_enforces_max_peers() {
        let mut manager = PeerManager::new(1);
        assert!(manager.add_peer(Peer::new("p1", "a", 1, false, 0.0)));
        assert!(!manager.add_peer(Peer::new("p2", "b", 2, false, 0.0)));
    }

    #[test]
    fn validator_peers_are_tracked_separately() {
        let mut manager = PeerManager::new(10);
        manager.add_peer(Peer::new("p1", "a", 1, true, 0.0));
        manager.add_peer(Peer::new("p2", "b", 2, false, 0.0));
        assert_eq!(manager.validator_peers().len(), 1);
    }
}
