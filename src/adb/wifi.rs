// Saved WiFi networks of an Android device as a network store

use async_trait::async_trait;
use chrono::Utc;
use log::debug;

use super::config_store::{SavedNetwork, parse_config_store};
use super::{AdbClient, CONFIG_STORE_PATH, shell_line};
use crate::error::{Result, StoreError};
use crate::merge::MergePolicy;
use crate::record::{NetworkRecord, SecurityType};
use crate::store::Backend;

/// Stands in for a passphrase in logs and errors.
const REDACTED: &str = "<psk>";

/// One row of `cmd wifi list-networks`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedNetwork {
    pub id: String,
    pub ssid: String,
    pub security: String,
}

impl ListedNetwork {
    fn security_type(&self) -> Option<SecurityType> {
        match self.security.as_str() {
            "open" => Some(SecurityType::Open),
            s if s.ends_with("psk") => Some(SecurityType::Wpa),
            _ => None,
        }
    }
}

/// Parse `cmd wifi list-networks`: a header, then `<id> <ssid> <security>`
/// rows. The SSID may contain spaces, the other columns can not.
pub fn parse_network_list(output: &str) -> Result<Vec<ListedNetwork>, String> {
    let mut networks = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("Network Id") || line == "No networks" {
            continue;
        }

        let parsed = line.split_once(char::is_whitespace).and_then(|(id, rest)| {
            let (ssid, security) = rest.trim().rsplit_once(char::is_whitespace)?;
            id.parse::<u32>().ok()?;
            Some(ListedNetwork {
                id: id.to_string(),
                ssid: ssid.trim().to_string(),
                security: security.to_string(),
            })
        });

        match parsed {
            Some(network) => networks.push(network),
            None => return Err(format!("unexpected line {line:?}")),
        }
    }
    Ok(networks)
}

/// Pair each saved network with its network id.
///
/// Unsupported kinds are skipped. Every remaining network must match exactly
/// one listed row with the same SSID and security.
pub fn match_network_ids(
    saved: &[SavedNetwork],
    listed: &[ListedNetwork],
    source: &str,
) -> Result<Vec<NetworkRecord>> {
    let now = Utc::now();
    let mut records = Vec::new();

    for network in saved {
        let Some(security) = network.security() else {
            debug!("Skipping {} (unsupported security)", network.config_key);
            continue;
        };
        let Some(ssid) = network.ssid() else {
            debug!("Skipping {} (SSID is not text)", network.config_key);
            continue;
        };

        let ids: Vec<&ListedNetwork> = listed
            .iter()
            .filter(|l| l.ssid == ssid && l.security_type() == Some(security))
            .collect();
        let [listed] = ids.as_slice() else {
            return Err(StoreError::Ambiguous {
                field: "network id",
                value: ssid,
                found: ids.len(),
            });
        };

        let credential = match security {
            SecurityType::Open => None,
            SecurityType::Wpa => network.psk(),
        };

        let record = NetworkRecord::builder(ssid, source)
            .backend_id(listed.id.clone())
            .security(security)
            .credential(credential)
            .autoconnect(network.auto_join)
            .created_at(now)
            .build()?;
        records.push(record);
    }
    Ok(records)
}

pub struct AdbBackend {
    client: AdbClient,
    label: String,
}

impl AdbBackend {
    pub fn new(client: AdbClient) -> Self {
        let label = match client.serial() {
            Some(serial) => format!("adb:{serial}"),
            None => "adb".to_string(),
        };
        Self { client, label }
    }

    fn parse_error(&self, message: String) -> StoreError {
        StoreError::Parse {
            source_label: self.label.clone(),
            message,
        }
    }

    async fn device_source(&self) -> Result<String> {
        let model = self.client.shell("getprop ro.product.model").await?;
        let model = model.trim();
        Ok(if model.is_empty() {
            "android".to_string()
        } else {
            format!("android:{model}")
        })
    }
}

#[async_trait]
impl Backend for AdbBackend {
    fn label(&self) -> &str {
        &self.label
    }

    fn merge_policy(&self) -> MergePolicy {
        MergePolicy::Strict
    }

    async fn load(&mut self) -> Result<Vec<NetworkRecord>> {
        let source = self.device_source().await?;

        let xml = self
            .client
            .root_shell(&shell_line(&["cat", CONFIG_STORE_PATH]))
            .await?;
        let saved = parse_config_store(&xml).map_err(|e| self.parse_error(e))?;

        let list = self.client.shell("cmd wifi list-networks").await?;
        let listed = parse_network_list(&list).map_err(|e| self.parse_error(e))?;

        match_network_ids(&saved, &listed, &source)
    }

    async fn apply_remove(&mut self, record: &NetworkRecord) -> Result<()> {
        let id = record.backend_id().ok_or_else(|| StoreError::Ambiguous {
            field: "network id",
            value: record.ssid().to_string(),
            found: 0,
        })?;
        self.client
            .shell(&shell_line(&["cmd", "wifi", "forget-network", id]))
            .await?;
        Ok(())
    }

    async fn apply_insert(&mut self, record: &NetworkRecord) -> Result<()> {
        let mut args = vec!["cmd", "wifi", "add-network", record.ssid()];
        let mut shown = args.clone();
        match (record.security(), record.credential()) {
            (SecurityType::Open, _) => {
                args.push("open");
                shown.push("open");
            }
            (SecurityType::Wpa, Some(psk)) => {
                args.extend(["wpa2", psk]);
                shown.extend(["wpa2", REDACTED]);
            }
            (SecurityType::Wpa, None) => {
                return Err(StoreError::Unsupported {
                    source_label: self.label.clone(),
                    ssid: record.ssid().to_string(),
                    reason: "WPA network without a password",
                });
            }
        }
        if !record.autoconnect() {
            args.push("-d");
            shown.push("-d");
        }

        self.client
            .shell_described(&shell_line(&args), &shell_line(&shown))
            .await?;
        Ok(())
    }
}
