// src/pipeline.rs
//! In-process routing of emitted call events.
//!
//! Every event is (1) published on the records topic, (2) queued on its cell's
//! window shard and (3) submitted to the bounded forwarder. Only step 3 can
//! wait, and only while the forwarder is at capacity.

use std::sync::Arc;
use std::time::Duration;

use crate::config::SimulatorConfig;
use crate::engine::WindowShards;
use crate::forwarder::{BoundedForwarder, NullStore, RestStore, SecondaryStore};
use crate::notify::{AlertMux, AlertSink, LogAlertSink, WebhookAlertSink};
use crate::record::CallEvent;
use crate::transport::{LogPublisher, RecordPublisher};
use crate::window::WINDOW_SIZE;

pub struct Pipeline {
    publisher: Arc<dyn RecordPublisher>,
    windows: WindowShards,
    forwarder: Arc<BoundedForwarder>,
}

impl Pipeline {
    pub fn new(
        publisher: Arc<dyn RecordPublisher>,
        windows: WindowShards,
        forwarder: Arc<BoundedForwarder>,
    ) -> Self {
        Self {
            publisher,
            windows,
            forwarder,
        }
    }

    /// Wire the default collaborators from configuration. Spawns the window
    /// shards, so it must run inside a tokio runtime.
    pub fn from_config(cfg: &SimulatorConfig) -> Self {
        let publisher: Arc<dyn RecordPublisher> = Arc::new(LogPublisher::new(
            cfg.bootstrap_servers.clone(),
            cfg.records_topic.clone(),
        ));

        let mut alerts = AlertMux::new().with_sink(Arc::new(LogAlertSink::new(cfg.alerts_topic.clone())));
        if let Some(url) = &cfg.alert_webhook_url {
            let webhook = WebhookAlertSink::new(url.clone())
                .with_timeout(cfg.alert_webhook_timeout_secs)
                .with_retries(cfg.alert_webhook_retries);
            alerts = alerts.with_sink(Arc::new(webhook));
        }
        let windows = WindowShards::spawn(cfg.window_shards, WINDOW_SIZE, Arc::new(alerts));

        let store: Arc<dyn SecondaryStore> = match &cfg.store_url {
            Some(url) => Arc::new(RestStore::new(url, &cfg.store_table, cfg.store_api_key.clone())),
            None => Arc::new(NullStore),
        };
        let forwarder = Arc::new(BoundedForwarder::new(
            store,
            cfg.forward_max_in_flight,
            cfg.forward_timeout(),
        ));

        Self::new(publisher, windows, forwarder)
    }

    /// Build with explicit sinks, using the log publisher.
    pub fn with_sinks(
        alert_sink: Arc<dyn AlertSink>,
        store: Arc<dyn SecondaryStore>,
        max_in_flight: usize,
        forward_timeout: Duration,
    ) -> Self {
        let publisher: Arc<dyn RecordPublisher> =
            Arc::new(LogPublisher::new("in-process", "call-records"));
        let windows = WindowShards::spawn(1, WINDOW_SIZE, alert_sink);
        let forwarder = Arc::new(BoundedForwarder::new(store, max_in_flight, forward_timeout));
        Self::new(publisher, windows, forwarder)
    }

    pub fn forwarder(&self) -> &Arc<BoundedForwarder> {
        &self.forwarder
    }

    pub async fn dispatch(&self, event: CallEvent) {
        match event.to_json() {
            Ok(line) => {
                if let Err(e) = self.publisher.publish(&line).await {
                    tracing::warn!(target: "emitter", cell_id = %event.cell_id, "record publish failed: {e:#}");
                }
            }
            Err(e) => tracing::warn!(target: "emitter", "record encode failed: {e:#}"),
        }

        if let Err(e) = self.windows.dispatch(event.clone()) {
            tracing::error!(target: "window", "{e:#}");
        }

        self.forwarder.submit(event).await;
    }

    /// Flush the window shards and wait for outstanding forwards. Events
    /// dispatched afterwards still reach the publisher and forwarder but no
    /// longer produce alerts.
    pub async fn shutdown(&self) {
        self.windows.shutdown().await;
        self.forwarder.drain().await;
    }
}
