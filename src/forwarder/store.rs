// src/forwarder/store.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use crate::record::CallEvent;

/// Secondary store receiving every raw call record.
#[async_trait]
pub trait SecondaryStore: Send + Sync {
    fn name(&self) -> &'static str;
    async fn store(&self, event: &CallEvent) -> Result<()>;
}

/// Inserts rows through a PostgREST-style endpoint (`/rest/v1/<table>`).
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl RestStore {
    pub fn new(base_url: &str, table: &str, api_key: Option<String>) -> Self {
        let endpoint = format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), table);
        Self {
            client: Client::new(),
            endpoint,
            api_key,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SecondaryStore for RestStore {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn store(&self, event: &CallEvent) -> Result<()> {
        let mut req = self
            .client
            .post(&self.endpoint)
            .header("Prefer", "return=minimal")
            .json(event);
        if let Some(key) = &self.api_key {
            req = req
                .header("apikey", key)
                .header("Authorization", format!("Bearer {key}"));
        }
        let rsp = req.send().await.context("secondary store request")?;
        rsp.error_for_status()
            .with_context(|| format!("secondary store rejected {}", event.cell_id))?;
        Ok(())
    }
}

/// Used when no store is configured; accepts everything.
pub struct NullStore;

#[async_trait]
impl SecondaryStore for NullStore {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn store(&self, event: &CallEvent) -> Result<()> {
        tracing::trace!(target: "forwarder", cell_id = %event.cell_id, "no secondary store configured");
        Ok(())
    }
}
