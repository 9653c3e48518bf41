// JSON file store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{RecordError, Result, StoreError};
use crate::merge::MergePolicy;
use crate::record::{NetworkRecord, SecurityType, timestamp_from_secs};
use crate::store::Backend;

const READABLE_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

fn default_true() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

/// On-disk form of one network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredNetwork {
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub sync: bool,
    /// Falls back to the SSID when missing or empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub ssid: String,
    pub pswd_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pswd: Option<String>,
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub autoconnect: bool,
    pub source: String,
    pub created_at: i64,
    /// Derived; ignored on load.
    #[serde(default, skip_deserializing)]
    pub readable_created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none", skip_deserializing)]
    pub readable_last_seen_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

fn readable(at: DateTime<Utc>) -> String {
    at.format(READABLE_FORMAT).to_string()
}

impl From<&NetworkRecord> for StoredNetwork {
    fn from(record: &NetworkRecord) -> Self {
        Self {
            sync: record.sync(),
            name: Some(record.name().to_string()),
            ssid: record.ssid().to_string(),
            pswd_type: record.security().to_string(),
            pswd: record.credential().map(str::to_string),
            autoconnect: record.autoconnect(),
            source: record.source().to_string(),
            created_at: record.created_at().timestamp(),
            readable_created_at: readable(record.created_at()),
            last_seen_at: record.last_seen_at().map(|at| at.timestamp()),
            readable_last_seen_at: record.last_seen_at().map(readable),
            comment: record.comment().map(str::to_string),
        }
    }
}

impl TryFrom<StoredNetwork> for NetworkRecord {
    type Error = RecordError;

    fn try_from(stored: StoredNetwork) -> Result<Self, Self::Error> {
        let last_seen_at = stored
            .last_seen_at
            .map(|secs| timestamp_from_secs("last_seen_at", secs))
            .transpose()?;

        let mut builder = NetworkRecord::builder(stored.ssid, stored.source);
        if let Some(name) = stored.name {
            builder = builder.name(name);
        }

        builder
            .sync(stored.sync)
            .security(SecurityType::parse(&stored.pswd_type)?)
            .credential(stored.pswd)
            .autoconnect(stored.autoconnect)
            .created_at(timestamp_from_secs("created_at", stored.created_at)?)
            .last_seen_at(last_seen_at)
            .comment(stored.comment)
            .build()
    }
}

/// Parse the store file contents.
pub fn parse_networks(path: &Path, text: &str) -> Result<Vec<NetworkRecord>> {
    let entries: Vec<serde_json::Value> =
        serde_json::from_str(text).map_err(|source| StoreError::Json {
            path: path.display().to_string(),
            source,
        })?;

    let mut records = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let stored: StoredNetwork = serde_json::from_value(entry)
            .map_err(|source| RecordError::Malformed { index, source })?;
        records.push(NetworkRecord::try_from(stored)?);
    }
    Ok(records)
}

/// Render records in file order: ascending creation time.
pub fn render_networks(path: &Path, records: &[NetworkRecord]) -> Result<String> {
    let mut stored: Vec<StoredNetwork> = records.iter().map(StoredNetwork::from).collect();
    stored.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.ssid.cmp(&b.ssid))
    });

    let mut text = serde_json::to_string_pretty(&stored).map_err(|source| StoreError::Json {
        path: path.display().to_string(),
        source,
    })?;
    text.push('\n');
    Ok(text)
}

/// Networks kept in a JSON file.
///
/// Changes are applied to an in-memory copy and written out in one go when
/// the commit flushes.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    label: String,
    records: Vec<NetworkRecord>,
}

impl FileBackend {
    pub fn new(path: PathBuf) -> Self {
        let label = format!("file:{}", path.display());
        Self {
            path,
            label,
            records: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn write_atomic(&self, contents: &str) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| self.io_error(e))?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "networks.json".to_string());
        let tmp = dir.join(format!(".{file_name}.tmp"));

        let mut file = std::fs::File::create(&tmp).map_err(|e| self.io_error(e))?;
        file.write_all(contents.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        Ok(())
    }
}

#[async_trait]
impl Backend for FileBackend {
    fn label(&self) -> &str {
        &self.label
    }

    fn merge_policy(&self) -> MergePolicy {
        MergePolicy::Tolerant
    }

    async fn load(&mut self) -> Result<Vec<NetworkRecord>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("{} does not exist yet, starting empty", self.path.display());
                String::from("[]")
            }
            Err(e) => return Err(self.io_error(e)),
        };

        self.records = parse_networks(&self.path, &text)?;
        Ok(self.records.clone())
    }

    async fn apply_remove(&mut self, record: &NetworkRecord) -> Result<()> {
        match self.records.iter().position(|r| r == record) {
            Some(idx) => {
                self.records.remove(idx);
                Ok(())
            }
            None => Err(StoreError::Ambiguous {
                field: "stored network",
                value: record.ssid().to_string(),
                found: 0,
            }),
        }
    }

    async fn apply_insert(&mut self, record: &NetworkRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        let text = render_networks(&self.path, &self.records)?;
        self.write_atomic(&text)?;
        debug!("Wrote {} networks to {}", self.records.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn defaults_are_omitted() {
        let record = NetworkRecord::builder("home", "laptop")
            .created_at(at(1_600_000_000))
            .build()
            .unwrap();
        let value = serde_json::to_value(StoredNetwork::from(&record)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "name": "home",
                "ssid": "home",
                "pswd_type": "open",
                "source": "laptop",
                "created_at": 1_600_000_000,
                "readable_created_at": "2020-09-13 12:26:40 UTC"
            })
        );
    }

    #[test]
    fn non_defaults_are_written() {
        let record = NetworkRecord::builder("home", "laptop")
            .sync(false)
            .autoconnect(false)
            .wpa("hunter22")
            .created_at(at(1_600_000_000))
            .last_seen_at(Some(at(1_600_000_060)))
            .comment(Some("upstairs".into()))
            .build()
            .unwrap();
        let value = serde_json::to_value(StoredNetwork::from(&record)).unwrap();
        assert_eq!(value["sync"], false);
        assert_eq!(value["autoconnect"], false);
        assert_eq!(value["pswd_type"], "wpa");
        assert_eq!(value["pswd"], "hunter22");
        assert_eq!(value["last_seen_at"], 1_600_000_060);
        assert_eq!(value["readable_last_seen_at"], "2020-09-13 12:27:40 UTC");
        assert_eq!(value["comment"], "upstairs");
    }

    #[test]
    fn round_trip_preserves_record() {
        let records = vec![
            NetworkRecord::builder("home", "laptop")
                .name("Home")
                .wpa("hunter22")
                .autoconnect(false)
                .created_at(at(2000))
                .last_seen_at(Some(at(3000)))
                .comment(Some("router in hall".into()))
                .build()
                .unwrap(),
            NetworkRecord::builder("cafe", "phone")
                .sync(false)
                .created_at(at(1000))
                .build()
                .unwrap(),
        ];

        let text = render_networks(Path::new("test.json"), &records).unwrap();
        let mut parsed = parse_networks(Path::new("test.json"), &text).unwrap();
        // Saved in creation order.
        assert_eq!(parsed[0].ssid(), "cafe");
        parsed.reverse();
        assert_eq!(parsed, records);
    }

    #[test]
    fn derived_fields_are_ignored_on_load() {
        let text = r#"[{"name": "x", "ssid": "x", "pswd_type": "open", "source": "s",
            "created_at": 10, "readable_created_at": "nonsense"}]"#;
        let parsed = parse_networks(Path::new("t.json"), text).unwrap();
        assert_eq!(parsed[0].created_at(), at(10));
        assert!(parsed[0].sync());
        assert!(parsed[0].autoconnect());
    }

    #[test]
    fn invalid_entries_are_validation_errors() {
        let cases = [
            (r#"[{"name": "x", "ssid": "x", "pswd_type": "wep", "source": "s", "created_at": 1}]"#, "wep"),
            (r#"[{"name": "x", "ssid": "x", "pswd_type": "open", "pswd": "p", "source": "s", "created_at": 1}]"#, "open"),
            (r#"[{"name": "x", "ssid": "x", "pswd_type": "open", "source": "s", "created_at": -1}]"#, "range"),
            (r#"[{"name": "x", "ssid": "x", "pswd_type": "open", "source": "s", "created_at": "1"}]"#, "type"),
            (r#"[{"name": "x", "pswd_type": "open", "source": "s", "created_at": 1}]"#, "no ssid"),
        ];
        for (text, case) in cases {
            let err = parse_networks(Path::new("t.json"), text).unwrap_err();
            assert!(matches!(err, StoreError::Record(_)), "{case}: {err}");
        }
    }

    #[test]
    fn missing_name_falls_back_to_ssid() {
        let text = r#"[{"ssid": "x", "pswd_type": "open", "source": "s", "created_at": 10},
            {"name": "", "ssid": "y", "pswd_type": "open", "source": "s", "created_at": 20}]"#;
        let parsed = parse_networks(Path::new("t.json"), text).unwrap();
        assert_eq!(parsed[0].name(), parsed[0].ssid());
        assert_eq!(parsed[1].name(), "y");

        let value = serde_json::to_value(StoredNetwork::from(&parsed[0])).unwrap();
        assert_eq!(value["name"], "x");
    }

    #[test]
    fn broken_json_is_reported() {
        let err = parse_networks(Path::new("t.json"), "[{").unwrap_err();
        assert!(matches!(err, StoreError::Json { .. }));
    }
}
