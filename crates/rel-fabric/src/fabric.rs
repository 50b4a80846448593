use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use rel_store::EventRecord;
use rel_types::EntityType;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::{FabricError, Result};
use crate::event::{ChangeEvent, CommittedEvent, EventName};

/// Subscription filter. `None` fields accept everything.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    pub names: Option<Vec<EventName>>,
    pub entity_types: Option<Vec<EntityType>>,
    pub entity_id: Option<String>,
}

impl EventFilter {
    pub fn matches(&self, committed: &CommittedEvent) -> bool {
        let event = &committed.event;
        self.names.as_ref().map_or(true, |n| n.contains(&event.event_type))
            && self
                .entity_types
                .as_ref()
                .map_or(true, |t| t.contains(&event.entity_type))
            && self.entity_id.as_ref().map_or(true, |id| *id == event.entity_id)
    }
}

/// A broadcast channel receiver for committed events.
pub type EventStream = broadcast::Receiver<CommittedEvent>;

struct Subscriber {
    filter: EventFilter,
    sender: broadcast::Sender<CommittedEvent>,
}

struct EventRouter {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl EventRouter {
    fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    fn subscribe(&self, filter: EventFilter, capacity: usize) -> EventStream {
        let (sender, rx) = broadcast::channel(capacity);
        self.subscribers
            .write()
            .expect("router lock poisoned")
            .push(Subscriber { filter, sender });
        rx
    }

    /// Route an event to all matching subscribers, pruning closed channels.
    fn route(&self, event: &CommittedEvent) -> usize {
        let mut delivered = 0;
        let mut subs = self.subscribers.write().expect("router lock poisoned");
        subs.retain(|sub| {
            if sub.filter.matches(event) {
                let ok = sub.sender.send(event.clone()).is_ok();
                if ok {
                    delivered += 1;
                }
                ok
            } else {
                sub.sender.receiver_count() > 0
            }
        });
        delivered
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers.read().expect("router lock poisoned").len()
    }

    fn clear(&self) {
        self.subscribers.write().expect("router lock poisoned").clear();
    }
}

/// `[events]` table of the engine configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FabricConfig {
    /// Buffered events per subscriber before it starts lagging.
    pub channel_capacity: usize,
    /// Largest accepted encoded event payload, in bytes.
    pub max_payload_bytes: usize,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            max_payload_bytes: 64 * 1024,
        }
    }
}

/// The change channel between the ledger and its subscribers.
///
/// Admission checks staged events before the store commit; delivery fans
/// them out after the commit succeeded. Delivery cannot fail: a lagging or
/// dropped subscriber only loses its own copy.
pub struct EventFabric {
    router: EventRouter,
    config: FabricConfig,
    shut_down: AtomicBool,
    delivered: AtomicU64,
}

impl EventFabric {
    pub fn new(config: FabricConfig) -> Self {
        info!(
            channel_capacity = config.channel_capacity,
            max_payload_bytes = config.max_payload_bytes,
            "event fabric started"
        );
        Self {
            router: EventRouter::new(),
            config,
            shut_down: AtomicBool::new(false),
            delivered: AtomicU64::new(0),
        }
    }

    /// Check that every staged event can be published.
    ///
    /// Rejects when the fabric is shut down, when a payload exceeds the size
    /// limit, or when a record does not decode into a well-formed event.
    pub fn admit(&self, records: &[EventRecord]) -> Result<()> {
        if self.is_shut_down() {
            return Err(FabricError::Shutdown);
        }
        for record in records {
            if record.payload.len() > self.config.max_payload_bytes {
                return Err(FabricError::PayloadTooLarge {
                    name: record.name.clone(),
                    size: record.payload.len(),
                    max: self.config.max_payload_bytes,
                });
            }
            ChangeEvent::from_record(record)?;
        }
        Ok(())
    }

    /// Fan out the events of a committed unit of work. Returns the number of
    /// subscriber deliveries.
    pub fn deliver(&self, commit_seq: u64, tx_id: &str, records: &[EventRecord]) -> usize {
        let mut deliveries = 0;
        for record in records {
            let event = match ChangeEvent::from_record(record) {
                Ok(event) => event,
                Err(e) => {
                    warn!(commit_seq, name = %record.name, error = %e, "undeliverable event");
                    continue;
                }
            };
            let committed = CommittedEvent {
                commit_seq,
                tx_id: tx_id.to_string(),
                event,
            };
            deliveries += self.router.route(&committed);
            self.delivered.fetch_add(1, Ordering::Relaxed);
        }
        debug!(commit_seq, tx_id, events = records.len(), deliveries, "events delivered");
        deliveries
    }

    /// Subscribe to committed events matching the given filter.
    pub fn subscribe(&self, filter: EventFilter) -> EventStream {
        self.router.subscribe(filter, self.config.channel_capacity)
    }

    /// Stop admitting events and drop every subscriber channel.
    pub fn shutdown(&self) {
        if !self.shut_down.swap(true, Ordering::SeqCst) {
            self.router.clear();
            info!("event fabric shut down");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.router.subscriber_count()
    }

    /// Events delivered since the fabric started.
    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &FabricConfig {
        &self.config
    }
}

impl Default for EventFabric {
    fn default() -> Self {
        Self::new(FabricConfig::default())
    }
}
