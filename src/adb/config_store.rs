// Android WifiConfigStore.xml reader

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;

use crate::record::SecurityType;

/// One `<WifiConfiguration>` block, reduced to what we sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedNetwork {
    pub config_key: String,
    /// Raw `SSID` value: quoted text, or bare hex for non-text names.
    pub raw_ssid: String,
    /// Raw `PreSharedKey` value: quoted passphrase or a 64 digit hex key.
    pub raw_psk: Option<String>,
    pub auto_join: bool,
}

impl SavedNetwork {
    /// Open or WPA-PSK; anything else (WEP, EAP, SAE, OWE, ...) is `None`.
    pub fn security(&self) -> Option<SecurityType> {
        if self.config_key.ends_with("WPA_PSK") {
            Some(SecurityType::Wpa)
        } else if self.config_key.ends_with("NONE") {
            Some(SecurityType::Open)
        } else {
            None
        }
    }

    /// SSID as text, `None` when the hex form is not valid UTF-8.
    pub fn ssid(&self) -> Option<String> {
        match unquote(&self.raw_ssid) {
            Some(ssid) => Some(ssid.to_string()),
            None => hex::decode(&self.raw_ssid)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok()),
        }
    }

    pub fn psk(&self) -> Option<String> {
        self.raw_psk
            .as_deref()
            .map(|psk| unquote(psk).unwrap_or(psk).to_string())
    }
}

fn unquote(value: &str) -> Option<&str> {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
}

/// Resolve the predefined XML entities and character references in `s`.
fn unescape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        match after.find(';').and_then(|end| Some((resolve_entity(&after[..end])?, end))) {
            Some((resolved, end)) => {
                out.push(resolved);
                rest = &after[end + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn resolve_entity(name: &str) -> Option<char> {
    match name {
        "quot" => Some('"'),
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "apos" => Some('\''),
        _ => {
            let code = match name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => name.strip_prefix('#')?.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

fn attr(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| unescape_xml(&String::from_utf8_lossy(&a.value)))
}

#[derive(Default)]
struct RawConfiguration {
    strings: HashMap<String, String>,
    booleans: HashMap<String, bool>,
}

impl RawConfiguration {
    fn finish(mut self) -> Option<SavedNetwork> {
        Some(SavedNetwork {
            config_key: self.strings.remove("ConfigKey")?,
            raw_ssid: self.strings.remove("SSID")?,
            raw_psk: self.strings.remove("PreSharedKey"),
            auto_join: self.booleans.get("AutoJoinEnabled").copied().unwrap_or(true),
        })
    }
}

/// Parse the saved networks out of `WifiConfigStore.xml`.
///
/// Blocks without a `ConfigKey` or `SSID` (passpoint, suggestions) are
/// dropped. Malformed XML is an error.
pub fn parse_config_store(xml: &str) -> Result<Vec<SavedNetwork>, String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut networks = Vec::new();
    let mut config: Option<RawConfiguration> = None;
    let mut field: Option<String> = None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"WifiConfiguration" => {
                config = Some(RawConfiguration::default());
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"WifiConfiguration" => {
                if let Some(network) = config.take().and_then(RawConfiguration::finish) {
                    networks.push(network);
                }
            }
            Ok(Event::Start(ref e)) if config.is_some() && e.name().as_ref() == b"string" => {
                field = attr(e, b"name");
                text.clear();
            }
            Ok(Event::Text(ref e)) if field.is_some() => {
                text.push_str(&unescape_xml(&String::from_utf8_lossy(e)));
            }
            Ok(Event::GeneralRef(ref e)) if field.is_some() => {
                let name = String::from_utf8_lossy(e);
                match resolve_entity(&name) {
                    Some(c) => text.push(c),
                    None => return Err(format!("unknown entity &{name};")),
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"string" => {
                if let (Some(name), Some(config)) = (field.take(), config.as_mut()) {
                    config.strings.insert(name, std::mem::take(&mut text));
                }
            }
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"boolean" => {
                if let (Some(config), Some(name), Some(value)) =
                    (config.as_mut(), attr(e, b"name"), attr(e, b"value"))
                {
                    config.booleans.insert(name, value == "true");
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "invalid XML at byte {}: {e}",
                    reader.buffer_position()
                ));
            }
            _ => {}
        }
        buf.clear();
    }

    if config.is_some() {
        return Err("unterminated <WifiConfiguration>".to_string());
    }
    Ok(networks)
}
