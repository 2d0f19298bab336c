//! Outbound publishing of raw call records onto the records topic.
//!
//! The broker client lives outside this crate; `RecordPublisher` is the seam it
//! plugs into. `LogPublisher` stands in when no broker is wired.

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait RecordPublisher: Send + Sync {
    /// Publish one serialized call record.
    async fn publish(&self, record_json: &str) -> Result<()>;
}

pub struct LogPublisher {
    bootstrap_servers: String,
    topic: String,
}

impl LogPublisher {
    pub fn new(bootstrap_servers: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl RecordPublisher for LogPublisher {
    async fn publish(&self, record_json: &str) -> Result<()> {
        tracing::debug!(
            target: "emitter",
            servers = %self.bootstrap_servers,
            topic = %self.topic,
            record = record_json,
            "published call record"
        );
        Ok(())
    }
}
