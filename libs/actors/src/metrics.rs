//! Node-level runtime counters and metrics recorded by processes

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use types::NodeId;

/// Atomic counters shared by every process on a node
#[derive(Debug, Default)]
pub struct RuntimeMetrics {
    pub processes_spawned: AtomicU64,
    pub processes_exited: AtomicU64,
    pub abnormal_exits: AtomicU64,

    pub messages_sent: AtomicU64,
    pub messages_received: AtomicU64,
    pub messages_dropped: AtomicU64,

    pub link_deaths_as_messages: AtomicU64,
    pub timers_fired: AtomicU64,
    pub timers_cancelled: AtomicU64,
}

impl RuntimeMetrics {
    pub fn record_spawn(&self) {
        self.processes_spawned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_exit(&self, abnormal: bool) {
        self.processes_exited.fetch_add(1, Ordering::Relaxed);
        if abnormal {
            self.abnormal_exits.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a delivery attempt; `false` means the target was gone
    pub fn record_send(&self, delivered: bool) {
        if delivered {
            self.messages_sent.fetch_add(1, Ordering::Relaxed);
        } else {
            self.messages_dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_receive(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_link_death_message(&self) {
        self.link_deaths_as_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timer(&self, fired: bool) {
        if fired {
            self.timers_fired.fetch_add(1, Ordering::Relaxed);
        } else {
            self.timers_cancelled.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let spawned = self.processes_spawned.load(Ordering::Relaxed);
        let exited = self.processes_exited.load(Ordering::Relaxed);
        MetricsSnapshot {
            processes_spawned: spawned,
            processes_exited: exited,
            processes_alive: spawned.saturating_sub(exited),
            abnormal_exits: self.abnormal_exits.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            link_deaths_as_messages: self.link_deaths_as_messages.load(Ordering::Relaxed),
            timers_fired: self.timers_fired.load(Ordering::Relaxed),
            timers_cancelled: self.timers_cancelled.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RuntimeMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub processes_spawned: u64,
    pub processes_exited: u64,
    pub processes_alive: u64,
    pub abnormal_exits: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub messages_dropped: u64,
    pub link_deaths_as_messages: u64,
    pub timers_fired: u64,
    pub timers_cancelled: u64,
}

/// Running summary of a guest histogram
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HistogramSummary {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl HistogramSummary {
    fn record(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[derive(Debug, Default)]
struct GuestValues {
    counters: HashMap<String, u64>,
    gauges: HashMap<String, f64>,
    histograms: HashMap<String, HistogramSummary>,
}

/// Metrics processes record under names of their choosing.
///
/// Every update goes to the installed `metrics` recorder with a `node_id`
/// label. The latest values are also kept here so the node can report them
/// without a recorder.
#[derive(Debug)]
pub struct GuestMetrics {
    node_label: String,
    values: Mutex<GuestValues>,
}

impl GuestMetrics {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_label: node_id.to_string(),
            values: Mutex::new(GuestValues::default()),
        }
    }

    /// Set a counter to an absolute value
    pub fn set_counter(&self, name: &str, value: u64) {
        ::metrics::counter!(name.to_string(), "node_id" => self.node_label.clone()).absolute(value);
        self.values.lock().counters.insert(name.to_string(), value);
    }

    pub fn increment_counter(&self, name: &str) {
        ::metrics::counter!(name.to_string(), "node_id" => self.node_label.clone()).increment(1);
        *self
            .values
            .lock()
            .counters
            .entry(name.to_string())
            .or_default() += 1;
    }

    pub fn set_gauge(&self, name: &str, value: f64) {
        ::metrics::gauge!(name.to_string(), "node_id" => self.node_label.clone()).set(value);
        self.values.lock().gauges.insert(name.to_string(), value);
    }

    pub fn increment_gauge(&self, name: &str, delta: f64) {
        ::metrics::gauge!(name.to_string(), "node_id" => self.node_label.clone()).increment(delta);
        *self.values.lock().gauges.entry(name.to_string()).or_default() += delta;
    }

    pub fn decrement_gauge(&self, name: &str, delta: f64) {
        ::metrics::gauge!(name.to_string(), "node_id" => self.node_label.clone()).decrement(delta);
        *self.values.lock().gauges.entry(name.to_string()).or_default() -= delta;
    }

    pub fn record_histogram(&self, name: &str, value: f64) {
        ::metrics::histogram!(name.to_string(), "node_id" => self.node_label.clone()).record(value);
        self.values
            .lock()
            .histograms
            .entry(name.to_string())
            .or_default()
            .record(value);
    }

    pub fn counter(&self, name: &str) -> Option<u64> {
        self.values.lock().counters.get(name).copied()
    }

    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.values.lock().gauges.get(name).copied()
    }

    pub fn histogram(&self, name: &str) -> Option<HistogramSummary> {
        self.values.lock().histograms.get(name).copied()
    }
}
