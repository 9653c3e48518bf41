// Saved WiFi connections of the local NetworkManager as a network store

use async_trait::async_trait;
use chrono::Utc;
use log::debug;

use super::{KeyMgmt, NMClient};
use crate::error::{Result, StoreError};
use crate::merge::MergePolicy;
use crate::record::NetworkRecord;
use crate::store::Backend;

pub struct NmBackend {
    client: Option<NMClient>,
    source: String,
    label: String,
}

impl NmBackend {
    /// `source` is the origin label given to loaded records, usually the
    /// host name. The D-Bus connection is opened on first use.
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let label = format!("{source}:nm");
        Self {
            client: None,
            source,
            label,
        }
    }

    async fn client(&mut self) -> Result<&NMClient> {
        let client = match self.client.take() {
            Some(client) => client,
            None => NMClient::new().await?,
        };
        Ok(self.client.insert(client))
    }
}

#[async_trait]
impl Backend for NmBackend {
    fn label(&self) -> &str {
        &self.label
    }

    fn merge_policy(&self) -> MergePolicy {
        MergePolicy::Strict
    }

    async fn load(&mut self) -> Result<Vec<NetworkRecord>> {
        let source = self.source.clone();
        let connections = self.client().await?.get_wifi_connections().await?;
        let now = Utc::now();

        let mut records = Vec::with_capacity(connections.len());
        for conn in &connections {
            if let KeyMgmt::Unsupported(kind) = &conn.key_mgmt {
                debug!("Skipping {} ({kind})", conn.ssid);
                continue;
            }
            if let Some(record) = conn.to_record(&source, now) {
                records.push(record?);
            }
        }
        Ok(records)
    }

    async fn apply_remove(&mut self, record: &NetworkRecord) -> Result<()> {
        let uuid = record
            .backend_id()
            .ok_or_else(|| StoreError::Ambiguous {
                field: "connection uuid",
                value: record.ssid().to_string(),
                found: 0,
            })?
            .to_string();

        let client = self.client().await?;
        let path = client.get_connection_by_uuid(&uuid).await?;
        client.delete_connection(path.as_str()).await
    }

    async fn apply_insert(&mut self, record: &NetworkRecord) -> Result<()> {
        let path = self.client().await?.add_wifi_connection(record).await?;
        debug!("Created {} for {}", path.as_str(), record.ssid());
        Ok(())
    }
}
