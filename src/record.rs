// Network record: one saved WiFi credential as seen by one source

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumString};

use crate::error::RecordError;

/// First second past the valid timestamp range (3000-01-01T00:00:00Z).
///
/// Anything at or above it is almost certainly a millisecond value read as
/// seconds, or a broken clock.
pub const MAX_TIMESTAMP_SECS: i64 = 32_503_680_000;

/// Security of a saved network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum SecurityType {
    #[default]
    Open,
    Wpa,
}

impl SecurityType {
    pub fn parse(value: &str) -> Result<Self, RecordError> {
        SecurityType::from_str(value).map_err(|_| RecordError::UnknownSecurity(value.to_string()))
    }
}

/// Check that a timestamp lies in the valid range.
pub fn check_timestamp(
    field: &'static str,
    value: DateTime<Utc>,
) -> Result<DateTime<Utc>, RecordError> {
    let secs = value.timestamp();
    if (0..MAX_TIMESTAMP_SECS).contains(&secs) {
        Ok(value)
    } else {
        Err(RecordError::TimestampOutOfRange { field, value: secs })
    }
}

/// Convert unix seconds into a validated timestamp.
pub fn timestamp_from_secs(field: &'static str, secs: i64) -> Result<DateTime<Utc>, RecordError> {
    let value = DateTime::from_timestamp(secs, 0)
        .ok_or(RecordError::TimestampOutOfRange { field, value: secs })?;
    check_timestamp(field, value)
}

/// One saved wireless network.
///
/// Records are only built through [`RecordBuilder`], which enforces the
/// invariants: the SSID is not empty, the name falls back to the SSID, open
/// networks carry no credential and timestamps are in range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRecord {
    sync: bool,
    name: String,
    ssid: String,
    backend_id: Option<String>,
    security: SecurityType,
    credential: Option<String>,
    autoconnect: bool,
    source: String,
    created_at: DateTime<Utc>,
    last_seen_at: Option<DateTime<Utc>>,
    comment: Option<String>,
}

impl NetworkRecord {
    pub fn builder(ssid: impl Into<String>, source: impl Into<String>) -> RecordBuilder {
        RecordBuilder::new(ssid, source)
    }

    pub fn sync(&self) -> bool {
        self.sync
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    /// Identifier issued by the source this record was loaded from.
    pub fn backend_id(&self) -> Option<&str> {
        self.backend_id.as_deref()
    }

    pub fn security(&self) -> SecurityType {
        self.security
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn autoconnect(&self) -> bool {
        self.autoconnect
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_seen_at(&self) -> Option<DateTime<Utc>> {
        self.last_seen_at
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Records describe the same network when their SSIDs are equal.
    pub fn same_network(&self, other: &NetworkRecord) -> bool {
        self.ssid == other.ssid
    }

    // The merge policies only ever move these fields between two records
    // that were both validated, so the invariants keep holding.
    pub(crate) fn set_created_at(&mut self, value: DateTime<Utc>) {
        self.created_at = value;
    }

    pub(crate) fn set_last_seen_at(&mut self, value: Option<DateTime<Utc>>) {
        self.last_seen_at = value;
    }

    pub(crate) fn set_sync(&mut self, value: bool) {
        self.sync = value;
    }

    pub(crate) fn set_comment(&mut self, value: Option<String>) {
        self.comment = value;
    }
}

impl fmt::Display for NetworkRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}", self.ssid, self.security)?;
        if !self.autoconnect {
            write!(f, ", no autoconnect")?;
        }
        if !self.sync {
            write!(f, ", not synced")?;
        }
        write!(
            f,
            ") from {} created {}",
            self.source,
            self.created_at.format("%Y-%m-%d %H:%M:%S")
        )?;
        if self.name != self.ssid {
            write!(f, " as {:?}", self.name)?;
        }
        Ok(())
    }
}

/// Builder for [`NetworkRecord`].
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    sync: bool,
    name: Option<String>,
    ssid: String,
    backend_id: Option<String>,
    security: SecurityType,
    credential: Option<String>,
    autoconnect: bool,
    source: String,
    created_at: Option<DateTime<Utc>>,
    last_seen_at: Option<DateTime<Utc>>,
    comment: Option<String>,
}

impl RecordBuilder {
    fn new(ssid: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            sync: true,
            name: None,
            ssid: ssid.into(),
            backend_id: None,
            security: SecurityType::Open,
            credential: None,
            autoconnect: true,
            source: source.into(),
            created_at: None,
            last_seen_at: None,
            comment: None,
        }
    }

    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn backend_id(mut self, id: impl Into<String>) -> Self {
        self.backend_id = Some(id.into());
        self
    }

    pub fn security(mut self, security: SecurityType) -> Self {
        self.security = security;
        self
    }

    /// WPA network with the given pre-shared key.
    pub fn wpa(mut self, psk: impl Into<String>) -> Self {
        self.security = SecurityType::Wpa;
        self.credential = Some(psk.into());
        self
    }

    pub fn credential(mut self, credential: Option<String>) -> Self {
        self.credential = credential;
        self
    }

    pub fn autoconnect(mut self, autoconnect: bool) -> Self {
        self.autoconnect = autoconnect;
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    pub fn last_seen_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.last_seen_at = at;
        self
    }

    pub fn comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment;
        self
    }

    pub fn build(self) -> Result<NetworkRecord, RecordError> {
        if self.ssid.is_empty() {
            return Err(RecordError::EmptySsid);
        }
        if self.security == SecurityType::Open && self.credential.is_some() {
            return Err(RecordError::CredentialOnOpen { ssid: self.ssid });
        }

        let created_at = check_timestamp("created_at", self.created_at.unwrap_or_else(Utc::now))?;
        let last_seen_at = self
            .last_seen_at
            .map(|at| check_timestamp("last_seen_at", at))
            .transpose()?;

        let name = match self.name {
            Some(name) if !name.is_empty() => name,
            _ => self.ssid.clone(),
        };

        Ok(NetworkRecord {
            sync: self.sync,
            name,
            ssid: self.ssid,
            backend_id: self.backend_id,
            security: self.security,
            credential: self.credential,
            autoconnect: self.autoconnect,
            source: self.source,
            created_at,
            last_seen_at,
            comment: self.comment,
        })
    }
}
