//! # Capacity Event Dispatcher
//!
//! Every subscriber gets its own unbounded MPSC channel. A published event is
//! wrapped in an `Arc` once and each subscriber receives a clone of the
//! pointer, so the payload is never copied per client.
//!
//! Each handle tracks how many events are waiting in its queue. A subscriber
//! whose backlog passes `max_backlog` is evicted on the next publish, which
//! keeps one stalled WebSocket from growing memory without bound.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::models::{CapacityAdjustment, CapacityAlert, WeatherReading};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    WeatherUpdate,
    WeatherAlert,
    CapacityAdjustment,
    CapacityAlert,
}

/// Wire payload pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherReading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<CapacityAlert>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<CapacityAdjustment>,
    pub timestamp: DateTime<Utc>,
}

impl CapacityEvent {
    fn bare(kind: EventKind, destination_id: &str) -> Self {
        Self {
            kind,
            destination_id: Some(destination_id.to_string()),
            weather: None,
            alert: None,
            adjustment: None,
            timestamp: Utc::now(),
        }
    }

    pub fn weather_update(reading: WeatherReading) -> Self {
        let mut event = Self::bare(EventKind::WeatherUpdate, &reading.site_id);
        event.weather = Some(reading);
        event
    }

    pub fn weather_alert(reading: WeatherReading) -> Self {
        let mut event = Self::bare(EventKind::WeatherAlert, &reading.site_id);
        event.weather = Some(reading);
        event
    }

    pub fn capacity_adjustment(adjustment: CapacityAdjustment) -> Self {
        let mut event = Self::bare(EventKind::CapacityAdjustment, &adjustment.site_id);
        event.adjustment = Some(adjustment);
        event
    }

    pub fn capacity_alert(alert: CapacityAlert) -> Self {
        let mut event = Self::bare(EventKind::CapacityAlert, &alert.site_id);
        event.alert = Some(alert);
        event
    }
}

struct SubscriberHandle {
    id: u64,
    label: String,
    sender: mpsc::UnboundedSender<Arc<CapacityEvent>>,
    pending: Arc<AtomicUsize>,
}

/// Receiving half handed to a subscriber. Dropping it unsubscribes.
pub struct EventSubscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<Arc<CapacityEvent>>,
    pending: Arc<AtomicUsize>,
}

impl EventSubscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn recv(&mut self) -> Option<Arc<CapacityEvent>> {
        let event = self.receiver.recv().await?;
        self.pending.fetch_sub(1, Ordering::Relaxed);
        Some(event)
    }

    pub fn try_recv(&mut self) -> Option<Arc<CapacityEvent>> {
        let event = self.receiver.try_recv().ok()?;
        self.pending.fetch_sub(1, Ordering::Relaxed);
        Some(event)
    }
}

pub const DEFAULT_MAX_BACKLOG: usize = 1024;

pub struct Dispatcher {
    subscribers: Mutex<Vec<SubscriberHandle>>,
    next_id: AtomicU64,
    max_backlog: usize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BACKLOG)
    }
}

impl Dispatcher {
    pub fn new(max_backlog: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            max_backlog: max_backlog.max(1),
        }
    }

    pub fn subscribe(&self, label: &str) -> EventSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let pending = Arc::new(AtomicUsize::new(0));
        let handle = SubscriberHandle {
            id,
            label: label.to_string(),
            sender: tx,
            pending: Arc::clone(&pending),
        };
        match self.subscribers.lock() {
            Ok(mut subs) => subs.push(handle),
            Err(_) => warn!(label, "Dispatcher lock poisoned; subscriber not registered"),
        }
        info!(subscriber_id = id, label, "Event subscriber registered");
        EventSubscription { id, receiver: rx, pending }
    }

    pub fn unsubscribe(&self, id: u64) {
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.retain(|s| s.id != id);
        }
        info!(subscriber_id = id, "Event subscriber removed");
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Fans `event` out to every live subscriber. Returns how many received it.
    pub fn publish(&self, event: CapacityEvent) -> usize {
        let frame = Arc::new(event);
        let mut subs = match self.subscribers.lock() {
            Ok(subs) => subs,
            Err(_) => {
                warn!("Dispatcher lock poisoned; event dropped");
                return 0;
            }
        };
        let max_backlog = self.max_backlog;
        subs.retain(|sub| {
            if sub.pending.load(Ordering::Relaxed) >= max_backlog {
                warn!(subscriber_id = sub.id, label = %sub.label, "Evicting slow event subscriber");
                return false;
            }
            match sub.sender.send(Arc::clone(&frame)) {
                Ok(()) => {
                    sub.pending.fetch_add(1, Ordering::Relaxed);
                    true
                }
                Err(_) => {
                    debug!(subscriber_id = sub.id, label = %sub.label, "Subscriber disconnected");
                    false
                }
            }
        });
        subs.len()
    }
}
