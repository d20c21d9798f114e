//! Keyed broadcast channel the replication bridge talks to
//!
//! `MemoryHub` is the in-process store: every connected `MemoryChannel`
//! shares it, so several arena instances in one process observe each other
//! exactly like clients of a hosted key-value backend would.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::{debug, info};

/// One change observed under a keyspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Created { key: String, value: Vec<u8> },
    Updated { key: String, value: Vec<u8> },
    Deleted { key: String },
}

impl ChannelEvent {
    pub fn key(&self) -> &str {
        match self {
            ChannelEvent::Created { key, .. }
            | ChannelEvent::Updated { key, .. }
            | ChannelEvent::Deleted { key } => key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel is disconnected")]
    Disconnected,
    #[error("Write rejected by store: {0}")]
    Rejected(String),
    #[error("Empty key")]
    EmptyKey,
}

/// A connection bound to one keyspace
pub trait ReplicationChannel: Send + Sync {
    /// Upsert; observers (this writer included) see Created or Updated
    fn publish(&self, key: &str, value: Vec<u8>) -> Result<(), ChannelError>;

    /// Delete; a missing key is not an error
    fn remove(&self, key: &str) -> Result<(), ChannelError>;

    /// Event stream for the keyspace. Starts with a `Created` burst for
    /// every key already present.
    fn subscribe(&self) -> Result<Receiver<ChannelEvent>, ChannelError>;

    /// The store deletes `key` itself when this connection goes away
    fn remove_on_disconnect(&self, key: &str) -> Result<(), ChannelError>;

    fn disconnect(&self);

    fn is_connected(&self) -> bool;
}

struct Subscriber {
    connection: u64,
    sender: Sender<ChannelEvent>,
}

#[derive(Default)]
struct Keyspace {
    records: BTreeMap<String, Vec<u8>>,
    subscribers: Vec<Subscriber>,
}

impl Keyspace {
    /// Drops subscribers whose receiver is gone
    fn broadcast(&mut self, event: ChannelEvent) {
        self.subscribers
            .retain(|sub| sub.sender.send(event.clone()).is_ok());
    }
}

#[derive(Default)]
struct HubState {
    keyspaces: HashMap<String, Keyspace>,
    /// connection id -> (keyspace, key) deleted on disconnect
    last_wills: HashMap<u64, Vec<(String, String)>>,
}

struct HubInner {
    state: Mutex<HubState>,
    next_connection: AtomicU64,
    reject_writes: AtomicBool,
}

/// Shared in-process store
#[derive(Clone)]
pub struct MemoryHub {
    inner: Arc<HubInner>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                state: Mutex::new(HubState::default()),
                next_connection: AtomicU64::new(1),
                reject_writes: AtomicBool::new(false),
            }),
        }
    }

    /// Opens a connection scoped to `keyspace`
    pub fn connect(&self, keyspace: &str) -> MemoryChannel {
        let connection = self.inner.next_connection.fetch_add(1, Ordering::Relaxed);
        debug!("Connection {} opened on '{}'", connection, keyspace);
        MemoryChannel {
            hub: Arc::clone(&self.inner),
            connection,
            keyspace: keyspace.to_string(),
            connected: AtomicBool::new(true),
        }
    }

    /// Makes every publish/remove fail until cleared (outage simulation)
    pub fn set_reject_writes(&self, reject: bool) {
        self.inner.reject_writes.store(reject, Ordering::Relaxed);
    }

    pub fn get(&self, keyspace: &str, key: &str) -> Option<Vec<u8>> {
        let state = self.inner.state.lock();
        state
            .keyspaces
            .get(keyspace)
            .and_then(|ks| ks.records.get(key).cloned())
    }

    pub fn keys(&self, keyspace: &str) -> Vec<String> {
        let state = self.inner.state.lock();
        state
            .keyspaces
            .get(keyspace)
            .map(|ks| ks.records.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One client's connection to a `MemoryHub`. Dropping it disconnects.
pub struct MemoryChannel {
    hub: Arc<HubInner>,
    connection: u64,
    keyspace: String,
    connected: AtomicBool,
}

impl MemoryChannel {
    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    fn check_write(&self, key: &str) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::Disconnected);
        }
        if key.is_empty() {
            return Err(ChannelError::EmptyKey);
        }
        if self.hub.reject_writes.load(Ordering::Relaxed) {
            return Err(ChannelError::Rejected("store unavailable".to_string()));
        }
        Ok(())
    }
}

impl ReplicationChannel for MemoryChannel {
    fn publish(&self, key: &str, value: Vec<u8>) -> Result<(), ChannelError> {
        self.check_write(key)?;

        let mut state = self.hub.state.lock();
        let ks = state.keyspaces.entry(self.keyspace.clone()).or_default();
        let event = match ks.records.insert(key.to_string(), value.clone()) {
            None => ChannelEvent::Created {
                key: key.to_string(),
                value,
            },
            Some(previous) if previous == value => return Ok(()),
            Some(_) => ChannelEvent::Updated {
                key: key.to_string(),
                value,
            },
        };
        ks.broadcast(event);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ChannelError> {
        self.check_write(key)?;

        let mut state = self.hub.state.lock();
        if let Some(ks) = state.keyspaces.get_mut(&self.keyspace) {
            if ks.records.remove(key).is_some() {
                ks.broadcast(ChannelEvent::Deleted {
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }

    fn subscribe(&self) -> Result<Receiver<ChannelEvent>, ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::Disconnected);
        }

        let (sender, receiver) = unbounded();
        let mut state = self.hub.state.lock();
        let ks = state.keyspaces.entry(self.keyspace.clone()).or_default();
        for (key, value) in &ks.records {
            // Receiver is held right here, send cannot fail
            let _ = sender.send(ChannelEvent::Created {
                key: key.clone(),
                value: value.clone(),
            });
        }
        ks.subscribers.push(Subscriber {
            connection: self.connection,
            sender,
        });
        Ok(receiver)
    }

    fn remove_on_disconnect(&self, key: &str) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::Disconnected);
        }
        if key.is_empty() {
            return Err(ChannelError::EmptyKey);
        }
        let mut state = self.hub.state.lock();
        let wills = state.last_wills.entry(self.connection).or_default();
        let entry = (self.keyspace.clone(), key.to_string());
        if !wills.contains(&entry) {
            wills.push(entry);
        }
        Ok(())
    }

    fn disconnect(&self) {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return;
        }

        let mut state = self.hub.state.lock();
        for ks in state.keyspaces.values_mut() {
            ks.subscribers.retain(|sub| sub.connection != self.connection);
        }

        let wills = state.last_wills.remove(&self.connection).unwrap_or_default();
        for (keyspace, key) in wills {
            if let Some(ks) = state.keyspaces.get_mut(&keyspace) {
                if ks.records.remove(&key).is_some() {
                    ks.broadcast(ChannelEvent::Deleted { key });
                }
            }
        }
        info!("Connection {} on '{}' closed", self.connection, self.keyspace);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}
