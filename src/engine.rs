//! # Window Engine
//! Routes call events to their cell's count window and decides emission.
//!
//! `KeyedWindowEngine` is plain, synchronous state: one accumulator per
//! `cell_id`, mutated through `&mut self`, so it must be owned by a single
//! worker. `WindowShards` provides those workers: `n` tokio tasks, each owning
//! an engine and fed by its own channel. A cell always hashes to the same
//! shard, which keeps per-cell processing strictly FIFO while different cells
//! proceed in parallel.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use anyhow::{anyhow, Result};
use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::alert::AlertRecord;
use crate::notify::AlertSink;
use crate::record::CallEvent;
use crate::window::{DropCounts, WindowAccumulator, WINDOW_SIZE};

#[derive(Debug)]
pub struct KeyedWindowEngine {
    window_size: usize,
    windows: HashMap<String, WindowAccumulator>,
}

impl Default for KeyedWindowEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyedWindowEngine {
    pub fn new() -> Self {
        Self::with_window_size(WINDOW_SIZE)
    }

    pub fn with_window_size(window_size: usize) -> Self {
        Self {
            window_size: window_size.max(1),
            windows: HashMap::new(),
        }
    }

    /// Apply one event. Returns an alert once the cell's window is full,
    /// and on every event after that.
    pub fn ingest(&mut self, event: &CallEvent) -> Option<AlertRecord> {
        let size = self.window_size;
        let acc = self
            .windows
            .entry(event.cell_id.clone())
            .or_insert_with(|| WindowAccumulator::with_size(size));
        acc.add(event);

        if !acc.is_full() {
            return None;
        }
        AlertRecord::from_counts(&event.cell_id, acc.counts())
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.windows.keys().map(String::as_str)
    }

    pub fn counts_for(&self, cell_id: &str) -> Option<DropCounts> {
        self.windows.get(cell_id).map(WindowAccumulator::counts)
    }

    /// Current counts of every cell merged into one.
    pub fn merged_counts(&self) -> DropCounts {
        self.windows
            .values()
            .map(WindowAccumulator::counts)
            .fold(DropCounts::default(), DropCounts::merge)
    }
}

/// Key-sharded window workers.
pub struct WindowShards {
    shards: usize,
    // emptied by `shutdown`
    senders: RwLock<Vec<mpsc::UnboundedSender<CallEvent>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WindowShards {
    /// Spawn `shards` workers (at least one), each publishing to `sink`.
    pub fn spawn(shards: usize, window_size: usize, sink: Arc<dyn AlertSink>) -> Self {
        let shards = shards.max(1);
        let mut senders = Vec::with_capacity(shards);
        let mut handles = Vec::with_capacity(shards);

        for shard in 0..shards {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.push(tx);
            handles.push(tokio::spawn(run_shard(
                shard,
                KeyedWindowEngine::with_window_size(window_size),
                rx,
                sink.clone(),
            )));
        }

        Self {
            shards,
            senders: RwLock::new(senders),
            handles: Mutex::new(handles),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards
    }

    pub fn shard_for(&self, cell_id: &str) -> usize {
        let mut h = DefaultHasher::new();
        cell_id.hash(&mut h);
        (h.finish() % self.shards as u64) as usize
    }

    /// Enqueue an event on its cell's shard. Never blocks; fails once the
    /// shards were shut down.
    pub fn dispatch(&self, event: CallEvent) -> Result<()> {
        let shard = self.shard_for(&event.cell_id);
        let senders = self.senders.read().unwrap_or_else(PoisonError::into_inner);
        let tx = senders
            .get(shard)
            .ok_or_else(|| anyhow!("window shards shut down"))?;
        tx.send(event)
            .map_err(|_| anyhow!("window shard {shard} stopped"))
    }

    /// Close the inputs and wait until every queued event was processed.
    /// Later calls return immediately.
    pub async fn shutdown(&self) {
        self.senders
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        for h in handles {
            if let Err(e) = h.await {
                tracing::error!(target: "window", "window shard panicked: {e}");
            }
        }
    }
}

async fn run_shard(
    shard: usize,
    mut engine: KeyedWindowEngine,
    mut rx: mpsc::UnboundedReceiver<CallEvent>,
    sink: Arc<dyn AlertSink>,
) {
    tracing::debug!(target: "window", shard, "window shard started");
    while let Some(event) = rx.recv().await {
        let Some(alert) = engine.ingest(&event) else {
            continue;
        };
        counter!("alerts_emitted_total").increment(1);
        if let Err(e) = sink.publish(&alert).await {
            tracing::warn!(target: "window", shard, cell_id = %alert.cell_id, "alert publish failed: {e:#}");
        }
    }
    tracing::debug!(target: "window", shard, cells = engine.keys().count(), "window shard stopped");
}
