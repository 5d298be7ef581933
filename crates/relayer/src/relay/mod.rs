//! Broadcast gateway: validates location updates, writes them to the store
//! and fans the stored record out to every subscribed push channel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use shared::LocationRecord;
use tokio::sync::watch;

use crate::error::ValidationError;
use crate::store::{LocationCandidate, LocationStore};

/// Transport an update arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Persistent WebSocket connection.
    Push,
    /// Stateless HTTP call.
    Request,
}

/// Where an update came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub channel_id: String,
    pub transport: Transport,
}

impl Origin {
    pub fn push(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            transport: Transport::Push,
        }
    }

    pub fn request(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            transport: Transport::Request,
        }
    }
}

/// Who receives the fan-out of a push-channel update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BroadcastPolicy {
    /// Every subscriber, the sender included.
    #[default]
    All,
    /// Every subscriber except the push channel that sent the update.
    /// Request-transport updates still reach everyone.
    ExcludeSender,
}

/// Receiving half of a channel's delivery slot.
///
/// The slot holds only the newest record sent to the channel, so a slow
/// reader skips straight to the latest value instead of replaying history.
#[derive(Debug)]
pub struct Subscription {
    channel_id: String,
    rx: watch::Receiver<LocationRecord>,
}

impl Subscription {
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Next record delivered to this channel. `None` once the channel is unsubscribed.
    pub async fn recv(&mut self) -> Option<LocationRecord> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    pub fn try_recv(&mut self) -> Option<LocationRecord> {
        match self.rx.has_changed() {
            Ok(true) => Some(self.rx.borrow_and_update().clone()),
            _ => None,
        }
    }
}

type Registry = HashMap<String, watch::Sender<LocationRecord>>;

/// Single entry point for location updates from every transport.
///
/// Every delivery to a channel, broadcast or direct reply, happens under the
/// registry lock and carries the store's value at that moment, so a channel
/// never observes an older record after a newer one.
pub struct BroadcastGateway {
    store: Arc<LocationStore>,
    policy: BroadcastPolicy,
    subscribers: Mutex<Registry>,
}

impl BroadcastGateway {
    pub fn new(store: Arc<LocationStore>, policy: BroadcastPolicy) -> Self {
        Self {
            store,
            policy,
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> BroadcastPolicy {
        self.policy
    }

    /// Register `channel_id` for fan-out. Subscribing again replaces the previous slot.
    ///
    /// Nothing is pending on a fresh subscription; use [`Self::send_current`] to greet it.
    pub fn subscribe(&self, channel_id: &str) -> Subscription {
        let mut subscribers = self.lock_subscribers();
        let (tx, rx) = watch::channel(self.store.read());
        subscribers.insert(channel_id.to_string(), tx);
        tracing::debug!(channel_id, total = subscribers.len(), "Channel subscribed");
        Subscription {
            channel_id: channel_id.to_string(),
            rx,
        }
    }

    /// Remove `channel_id` from fan-out. Unknown ids are ignored.
    pub fn unsubscribe(&self, channel_id: &str) {
        let mut subscribers = self.lock_subscribers();
        if subscribers.remove(channel_id).is_some() {
            tracing::debug!(channel_id, total = subscribers.len(), "Channel unsubscribed");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    pub fn current_location(&self) -> LocationRecord {
        self.store.read()
    }

    /// Deliver the current record to `channel_id` alone.
    ///
    /// Returns `false` when the channel is not subscribed.
    pub fn send_current(&self, channel_id: &str) -> bool {
        let subscribers = self.lock_subscribers();
        match subscribers.get(channel_id) {
            Some(tx) => {
                tx.send_replace(self.store.read());
                true
            }
            None => false,
        }
    }

    /// Validate `raw`, write it and broadcast the stored record.
    ///
    /// The registry lock is held across the write and the fan-out so every
    /// subscriber sees updates in store order. Delivery never waits on a reader.
    pub fn submit(&self, raw: &Value, origin: &Origin) -> Result<LocationRecord, ValidationError> {
        let candidate = validate(raw, origin)?;
        let mut subscribers = self.lock_subscribers();
        let record = self.store.write(candidate);
        tracing::info!(
            latitude = record.latitude,
            longitude = record.longitude,
            id = %record.id,
            transport = ?origin.transport,
            "Location updated"
        );
        self.fan_out(&mut subscribers, &record, origin);
        Ok(record)
    }

    fn fan_out(&self, subscribers: &mut Registry, record: &LocationRecord, origin: &Origin) {
        let skip_sender =
            self.policy == BroadcastPolicy::ExcludeSender && origin.transport == Transport::Push;
        let mut closed = Vec::new();
        for (channel_id, tx) in subscribers.iter() {
            if skip_sender && *channel_id == origin.channel_id {
                continue;
            }
            if tx.send(record.clone()).is_err() {
                closed.push(channel_id.clone());
            }
        }
        for channel_id in closed {
            subscribers.remove(&channel_id);
            tracing::debug!(channel_id = %channel_id, "Pruned closed subscriber");
        }
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Registry> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Check the shape of a raw update and resolve its source id.
///
/// Push updates without an `id` are attributed to their channel; request
/// updates fall through to the store's default.
pub fn validate(raw: &Value, origin: &Origin) -> Result<LocationCandidate, ValidationError> {
    let latitude = coordinate(raw, "latitude")?;
    let longitude = coordinate(raw, "longitude")?;
    let source_id = raw
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .or_else(|| match origin.transport {
            Transport::Push => Some(origin.channel_id.clone()),
            Transport::Request => None,
        });
    Ok(LocationCandidate {
        latitude,
        longitude,
        source_id,
    })
}

fn coordinate(raw: &Value, key: &str) -> Result<f64, ValidationError> {
    raw.get(key)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .ok_or(ValidationError::InvalidCoordinates)
}
