//! Downstream delivery of drop-rate alerts.
//!
//! Window workers hand every `AlertRecord` to an `AlertSink`. Sinks are
//! best-effort: a failing sink is logged and the worker keeps going.

pub mod webhook;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::alert::AlertRecord;

pub use webhook::WebhookAlertSink;

#[async_trait]
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &'static str;
    async fn publish(&self, alert: &AlertRecord) -> Result<()>;
}

/// Logs each alert line under the alerts topic.
pub struct LogAlertSink {
    topic: String,
}

impl LogAlertSink {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl AlertSink for LogAlertSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn publish(&self, alert: &AlertRecord) -> Result<()> {
        tracing::info!(
            target: "window",
            topic = %self.topic,
            cell_id = %alert.cell_id,
            drop_rate = alert.rounded_drop_rate(),
            "{}",
            alert.to_json_line()
        );
        Ok(())
    }
}

/// Forwards alerts into an mpsc channel for in-process consumers.
pub struct ChannelAlertSink {
    tx: mpsc::UnboundedSender<AlertRecord>,
}

impl ChannelAlertSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AlertRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl AlertSink for ChannelAlertSink {
    fn name(&self) -> &'static str {
        "channel"
    }

    async fn publish(&self, alert: &AlertRecord) -> Result<()> {
        self.tx
            .send(alert.clone())
            .map_err(|_| anyhow!("alert receiver dropped"))
    }
}

/// Fan-out over several sinks. One failing sink does not stop the others.
#[derive(Clone, Default)]
pub struct AlertMux {
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl AlertMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl AlertSink for AlertMux {
    fn name(&self) -> &'static str {
        "mux"
    }

    async fn publish(&self, alert: &AlertRecord) -> Result<()> {
        let mut failed = 0usize;
        for sink in &self.sinks {
            if let Err(e) = sink.publish(alert).await {
                failed += 1;
                tracing::warn!(sink = sink.name(), cell_id = %alert.cell_id, "alert sink failed: {e:#}");
            }
        }
        if failed > 0 && failed == self.sinks.len() {
            return Err(anyhow!("all {failed} alert sinks failed"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::DropCounts;

    struct FailingSink;

    #[async_trait]
    impl AlertSink for FailingSink {
        fn name(&self) -> &'static str {
            "failing"
        }
        async fn publish(&self, _alert: &AlertRecord) -> Result<()> {
            Err(anyhow!("boom"))
        }
    }

    #[tokio::test]
    async fn mux_delivers_despite_one_failing_sink() {
        let (chan, mut rx) = ChannelAlertSink::new();
        let mux = AlertMux::new()
            .with_sink(Arc::new(FailingSink))
            .with_sink(Arc::new(chan));
        let alert = AlertRecord::from_counts("ATX", DropCounts::new(30, 6)).unwrap();

        mux.publish(&alert).await.expect("one sink succeeded");
        assert_eq!(rx.recv().await.unwrap(), alert);
    }

    #[tokio::test]
    async fn mux_errors_when_every_sink_fails() {
        let mux = AlertMux::new().with_sink(Arc::new(FailingSink));
        let alert = AlertRecord::from_counts("ATX", DropCounts::new(30, 6)).unwrap();
        assert!(mux.publish(&alert).await.is_err());
    }
}
