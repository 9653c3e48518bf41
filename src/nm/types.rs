// NetworkManager types and conversions

use chrono::{DateTime, Utc};

use crate::error::RecordError;
use crate::record::{NetworkRecord, SecurityType, timestamp_from_secs};

/// Key management of a saved WiFi connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMgmt {
    /// No 802-11-wireless-security section at all
    Open,
    WpaPsk,
    /// WEP ("none"), enterprise ("wpa-eap"), SAE, OWE, ...
    Unsupported(String),
}

impl From<Option<&str>> for KeyMgmt {
    fn from(value: Option<&str>) -> Self {
        match value {
            None => KeyMgmt::Open,
            Some("wpa-psk") => KeyMgmt::WpaPsk,
            Some(other) => KeyMgmt::Unsupported(other.to_string()),
        }
    }
}

/// Saved connection profile information
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub path: String,
    pub id: String,
    pub uuid: String,
    pub ssid: String,
    pub autoconnect: bool,
    /// Unix time the connection was last activated, 0 if never
    pub timestamp: u64,
    pub key_mgmt: KeyMgmt,
    pub psk: Option<String>,
}

impl ConnectionInfo {
    /// Map to a record, or `None` for connections we do not sync.
    pub fn to_record(
        &self,
        source: &str,
        now: DateTime<Utc>,
    ) -> Option<Result<NetworkRecord, RecordError>> {
        let security = match &self.key_mgmt {
            KeyMgmt::Open => SecurityType::Open,
            KeyMgmt::WpaPsk => SecurityType::Wpa,
            KeyMgmt::Unsupported(_) => return None,
        };
        let credential = match security {
            SecurityType::Open => None,
            SecurityType::Wpa => self.psk.clone(),
        };

        let last_seen_at = match self.timestamp {
            0 => None,
            secs => match i64::try_from(secs) {
                Ok(secs) => match timestamp_from_secs("last_seen_at", secs) {
                    Ok(at) => Some(at),
                    Err(e) => return Some(Err(e)),
                },
                Err(_) => {
                    return Some(Err(RecordError::TimestampOutOfRange {
                        field: "last_seen_at",
                        value: i64::MAX,
                    }));
                }
            },
        };

        Some(
            NetworkRecord::builder(self.ssid.clone(), source)
                .name(self.id.clone())
                .backend_id(self.uuid.clone())
                .security(security)
                .credential(credential)
                .autoconnect(self.autoconnect)
                .created_at(now)
                .last_seen_at(last_seen_at)
                .build(),
        )
    }
}
