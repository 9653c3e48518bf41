// NetworkManager D-Bus abstraction layer

use log::debug;
use std::collections::HashMap;
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};
use zbus::{Connection, Proxy};

use crate::error::{Result, StoreError};
use crate::record::{NetworkRecord, SecurityType};

pub mod types;
pub mod wifi;

pub use types::*;
pub use wifi::NmBackend;

const NM_BUS_NAME: &str = "org.freedesktop.NetworkManager";
const NM_PATH: &str = "/org/freedesktop/NetworkManager";
const NM_SETTINGS_PATH: &str = "/org/freedesktop/NetworkManager/Settings";
const NM_SETTINGS_IFACE: &str = "org.freedesktop.NetworkManager.Settings";
const NM_CONNECTION_IFACE: &str = "org.freedesktop.NetworkManager.Settings.Connection";

const WIRELESS: &str = "802-11-wireless";
const WIRELESS_SECURITY: &str = "802-11-wireless-security";

type Settings = HashMap<String, HashMap<String, OwnedValue>>;

/// Read one value out of a settings section.
fn setting<T>(settings: &Settings, section: &str, key: &str) -> Option<T>
where
    T: TryFrom<OwnedValue>,
{
    settings
        .get(section)?
        .get(key)
        .and_then(|v| v.try_clone().ok())
        .and_then(|v| T::try_from(v).ok())
}

/// Read the profile out of one connection's settings, without secrets.
///
/// `None` for non-WiFi connections and SSIDs that are not UTF-8 text.
fn wifi_connection_info(path: &str, settings: &Settings) -> Result<Option<ConnectionInfo>> {
    let conn_type: Option<String> = setting(settings, "connection", "type");
    if conn_type.as_deref() != Some(WIRELESS) {
        return Ok(None);
    }

    let id: String = setting(settings, "connection", "id").unwrap_or_default();
    let uuid = setting::<String>(settings, "connection", "uuid")
        .filter(|uuid| !uuid.is_empty())
        .ok_or_else(|| StoreError::Ambiguous {
            field: "connection uuid",
            value: id.clone(),
            found: 0,
        })?;
    let autoconnect: bool = setting(settings, "connection", "autoconnect").unwrap_or(true);
    let timestamp: u64 = setting(settings, "connection", "timestamp").unwrap_or(0);

    let ssid = match setting::<Vec<u8>>(settings, WIRELESS, "ssid") {
        Some(bytes) => match String::from_utf8(bytes) {
            Ok(ssid) => ssid,
            Err(_) => {
                debug!("Skipping {id} (SSID is not text)");
                return Ok(None);
            }
        },
        None => id.clone(),
    };

    let key_mgmt_setting: Option<String> = if settings.contains_key(WIRELESS_SECURITY) {
        Some(setting(settings, WIRELESS_SECURITY, "key-mgmt").unwrap_or_default())
    } else {
        None
    };

    Ok(Some(ConnectionInfo {
        path: path.to_string(),
        id,
        uuid,
        ssid,
        autoconnect,
        timestamp,
        key_mgmt: KeyMgmt::from(key_mgmt_setting.as_deref()),
        psk: None,
    }))
}

/// Main NetworkManager client
#[derive(Clone, Debug)]
pub struct NMClient {
    connection: Connection,
}

impl NMClient {
    /// Connect to the system bus and make sure NetworkManager answers.
    pub async fn new() -> Result<Self> {
        let connection = Connection::system().await?;

        let proxy = Proxy::new(&connection, NM_BUS_NAME, NM_PATH, NM_BUS_NAME).await?;
        let version: String = proxy.get_property("Version").await?;
        debug!("Connected to NetworkManager {version}");

        Ok(Self { connection })
    }

    async fn settings_proxy(&self) -> Result<Proxy<'_>> {
        Ok(Proxy::new(
            &self.connection,
            NM_BUS_NAME,
            NM_SETTINGS_PATH,
            NM_SETTINGS_IFACE,
        )
        .await?)
    }

    async fn connection_proxy(&self, connection_path: &str) -> Result<Proxy<'_>> {
        Ok(Proxy::new(
            &self.connection,
            NM_BUS_NAME,
            connection_path.to_string(),
            NM_CONNECTION_IFACE,
        )
        .await?)
    }

    /// Get all saved connections
    pub async fn get_connections(&self) -> Result<Vec<OwnedObjectPath>> {
        let proxy = self.settings_proxy().await?;
        Ok(proxy.call("ListConnections", &()).await?)
    }

    /// Get connection settings (without secrets)
    pub async fn get_connection_settings(&self, connection_path: &str) -> Result<Settings> {
        let proxy = self.connection_proxy(connection_path).await?;
        Ok(proxy.call("GetSettings", &()).await?)
    }

    /// Get the secrets of one settings section
    pub async fn get_connection_secrets(
        &self,
        connection_path: &str,
        section: &str,
    ) -> Result<Settings> {
        let proxy = self.connection_proxy(connection_path).await?;
        Ok(proxy.call("GetSecrets", &(section,)).await?)
    }

    /// Get WiFi connection profiles, with the PSK of WPA-PSK connections
    pub async fn get_wifi_connections(&self) -> Result<Vec<ConnectionInfo>> {
        let mut wifi_connections = Vec::new();

        for conn_path in self.get_connections().await? {
            let path = conn_path.as_str();
            let settings = self.get_connection_settings(path).await?;

            let Some(mut info) = wifi_connection_info(path, &settings)? else {
                continue;
            };
            if info.key_mgmt == KeyMgmt::WpaPsk {
                let secrets = self.get_connection_secrets(path, WIRELESS_SECURITY).await?;
                info.psk = setting::<String>(&secrets, WIRELESS_SECURITY, "psk");
            }
            wifi_connections.push(info);
        }

        Ok(wifi_connections)
    }

    /// Find the object path of a connection by its UUID
    pub async fn get_connection_by_uuid(&self, uuid: &str) -> Result<OwnedObjectPath> {
        let proxy = self.settings_proxy().await?;
        Ok(proxy.call("GetConnectionByUuid", &(uuid,)).await?)
    }

    /// Delete a saved connection
    pub async fn delete_connection(&self, connection_path: &str) -> Result<()> {
        let proxy = self.connection_proxy(connection_path).await?;
        let _: () = proxy.call("Delete", &()).await?;
        Ok(())
    }

    /// Save a new WiFi connection profile without activating it
    pub async fn add_wifi_connection(&self, record: &NetworkRecord) -> Result<OwnedObjectPath> {
        let proxy = self.settings_proxy().await?;

        let mut connection_settings: HashMap<&str, HashMap<&str, Value>> = HashMap::new();

        // Connection section
        let mut conn: HashMap<&str, Value> = HashMap::new();
        conn.insert("type", Value::from(WIRELESS));
        conn.insert("id", Value::from(record.name()));
        conn.insert("autoconnect", Value::from(record.autoconnect()));
        if let Some(last_seen) = record.last_seen_at() {
            conn.insert("timestamp", Value::from(last_seen.timestamp().max(0) as u64));
        }
        connection_settings.insert("connection", conn);

        // Wireless section
        let mut wireless: HashMap<&str, Value> = HashMap::new();
        wireless.insert("ssid", Value::from(record.ssid().as_bytes().to_vec()));
        wireless.insert("mode", Value::from("infrastructure"));
        connection_settings.insert(WIRELESS, wireless);

        // Security section (if needed)
        if record.security() == SecurityType::Wpa {
            let mut security: HashMap<&str, Value> = HashMap::new();
            security.insert("key-mgmt", Value::from("wpa-psk"));
            if let Some(psk) = record.credential() {
                security.insert("psk", Value::from(psk));
            }
            connection_settings.insert(WIRELESS_SECURITY, security);
        }

        // IPv4 section (auto)
        let mut ipv4: HashMap<&str, Value> = HashMap::new();
        ipv4.insert("method", Value::from("auto"));
        connection_settings.insert("ipv4", ipv4);

        // IPv6 section (auto)
        let mut ipv6: HashMap<&str, Value> = HashMap::new();
        ipv6.insert("method", Value::from("auto"));
        connection_settings.insert("ipv6", ipv6);

        Ok(proxy.call("AddConnection", &(connection_settings,)).await?)
    }
}
