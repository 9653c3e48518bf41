use async_trait::async_trait;
use chrono::DateTime;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::{Arc, Mutex};

use wlsync::error::Result;
use wlsync::file::FileBackend;
use wlsync::merge::MergePolicy;
use wlsync::reconcile::{Reconciler, Side};
use wlsync::{Backend, NetworkRecord, NetworkStore};

type Networks = Arc<Mutex<Vec<NetworkRecord>>>;

/// In-memory live source that remembers what was applied to it.
struct MemorySystem {
    networks: Networks,
    applied: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Backend for MemorySystem {
    fn label(&self) -> &str {
        "memory"
    }

    fn merge_policy(&self) -> MergePolicy {
        MergePolicy::Strict
    }

    async fn load(&mut self) -> Result<Vec<NetworkRecord>> {
        Ok(self.networks.lock().unwrap().clone())
    }

    async fn apply_remove(&mut self, record: &NetworkRecord) -> Result<()> {
        self.networks.lock().unwrap().retain(|r| r != record);
        self.applied.lock().unwrap().push(format!("-{}", record.ssid()));
        Ok(())
    }

    async fn apply_insert(&mut self, record: &NetworkRecord) -> Result<()> {
        self.networks.lock().unwrap().push(record.clone());
        self.applied.lock().unwrap().push(format!("+{}", record.ssid()));
        Ok(())
    }
}

struct Setup {
    reconciler: Reconciler<Vec<u8>>,
    networks: Networks,
    applied: Arc<Mutex<Vec<String>>>,
}

fn setup(path: &Path, system: Vec<NetworkRecord>) -> Setup {
    let networks = Arc::new(Mutex::new(system));
    let applied = Arc::new(Mutex::new(Vec::new()));
    let backend = MemorySystem {
        networks: networks.clone(),
        applied: applied.clone(),
    };
    let file = NetworkStore::new(Box::new(FileBackend::new(path.to_path_buf())));
    let reconciler = Reconciler::new(file, NetworkStore::new(Box::new(backend)), Vec::new());
    Setup {
        reconciler,
        networks,
        applied,
    }
}

fn network(ssid: &str, created: i64, psk: Option<&str>) -> NetworkRecord {
    let builder = NetworkRecord::builder(ssid, "laptop")
        .created_at(DateTime::from_timestamp(created, 0).unwrap());
    match psk {
        Some(psk) => builder.wpa(psk),
        None => builder,
    }
    .build()
    .unwrap()
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn ssids(networks: &Networks) -> Vec<String> {
    networks
        .lock()
        .unwrap()
        .iter()
        .map(|r| r.ssid().to_string())
        .collect()
}

#[tokio::test]
async fn export_creates_the_store_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/networks.json");
    let mut s = setup(
        &path,
        vec![network("home", 2000, Some("hunter22")), network("cafe", 1000, None)],
    );

    s.reconciler.export().await.unwrap();

    assert_eq!(
        read_json(&path),
        json!([
            {
                "name": "cafe",
                "ssid": "cafe",
                "pswd_type": "open",
                "source": "laptop",
                "created_at": 1000,
                "readable_created_at": "1970-01-01 00:16:40 UTC"
            },
            {
                "name": "home",
                "ssid": "home",
                "pswd_type": "wpa",
                "pswd": "hunter22",
                "source": "laptop",
                "created_at": 2000,
                "readable_created_at": "1970-01-01 00:33:20 UTC"
            }
        ])
    );
    assert!(s.applied.lock().unwrap().is_empty());
}

#[tokio::test]
async fn import_adds_missing_networks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("networks.json");
    std::fs::write(
        &path,
        r#"[
  {"name": "home", "ssid": "home", "pswd_type": "wpa", "pswd": "new", "source": "phone", "created_at": 1000},
  {"name": "office", "ssid": "office", "pswd_type": "open", "source": "phone", "created_at": 1500},
  {"sync": false, "name": "private", "ssid": "private", "pswd_type": "open", "source": "phone", "created_at": 1600}
]"#,
    )
    .unwrap();
    let before = std::fs::read_to_string(&path).unwrap();
    let mut s = setup(&path, vec![network("home", 1205, Some("old"))]);

    s.reconciler.import().await.unwrap();

    assert_eq!(*s.applied.lock().unwrap(), vec!["-home", "+home", "+office"]);
    assert_eq!(ssids(&s.networks), vec!["home", "office"]);
    assert_eq!(s.networks.lock().unwrap()[0].credential(), Some("new"));
    // The file side is only read.
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);

    let out = String::from_utf8(s.reconciler.into_output()).unwrap();
    assert!(out.starts_with("Changes for memory:\n"), "{out}");
    assert!(out.contains("  - home (wpa)"), "{out}");
    assert!(out.contains("  + office (open)"), "{out}");
}

#[tokio::test]
async fn update_keeps_stored_history_and_fills_the_system() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("networks.json");
    std::fs::write(
        &path,
        r#"[
  {"name": "home", "ssid": "home", "pswd_type": "wpa", "pswd": "old", "source": "store",
   "created_at": 1000, "comment": "router in hall"},
  {"name": "cafe", "ssid": "cafe", "pswd_type": "open", "source": "store", "created_at": 1100}
]"#,
    )
    .unwrap();
    let mut s = setup(&path, vec![network("home", 900_000, Some("new"))]);

    s.reconciler.update().await.unwrap();

    let stored = read_json(&path);
    let home = &stored[0];
    assert_eq!(home["ssid"], "home");
    assert_eq!(home["pswd"], "new");
    assert_eq!(home["created_at"], 1000);
    assert_eq!(home["comment"], "router in hall");
    assert_eq!(stored[1]["ssid"], "cafe");
    assert_eq!(stored.as_array().unwrap().len(), 2);

    // Only the network the system lacked is sent back.
    assert_eq!(*s.applied.lock().unwrap(), vec!["+cafe"]);
    assert_eq!(ssids(&s.networks), vec!["home", "cafe"]);
}

#[tokio::test]
async fn update_twice_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("networks.json");
    let mut s = setup(
        &path,
        vec![network("home", 2000, Some("pw")), network("cafe", 1000, None)],
    );

    s.reconciler.update().await.unwrap();
    let first = std::fs::read_to_string(&path).unwrap();
    s.reconciler.update().await.unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), first);
    assert!(s.applied.lock().unwrap().is_empty());
}

#[tokio::test]
async fn dedup_file_keeps_oldest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("networks.json");
    std::fs::write(
        &path,
        r#"[
  {"name": "dup", "ssid": "dup", "pswd_type": "open", "source": "a", "created_at": 20},
  {"name": "dup", "ssid": "dup", "pswd_type": "open", "source": "b", "created_at": 10},
  {"name": "solo", "ssid": "solo", "pswd_type": "open", "source": "c", "created_at": 15},
  {"name": "dup", "ssid": "dup", "pswd_type": "open", "source": "d", "created_at": 30}
]"#,
    )
    .unwrap();
    let mut s = setup(&path, vec![]);

    s.reconciler.dedup(Side::File).await.unwrap();

    let stored = read_json(&path);
    let kept: Vec<(&str, i64)> = stored
        .as_array()
        .unwrap()
        .iter()
        .map(|v| (v["source"].as_str().unwrap(), v["created_at"].as_i64().unwrap()))
        .collect();
    assert_eq!(kept, vec![("b", 10), ("c", 15)]);
}

#[tokio::test]
async fn dedup_system_removes_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("networks.json");
    let mut s = setup(
        &path,
        vec![network("dup", 30, None), network("dup", 10, Some("pw")), network("x", 5, None)],
    );

    s.reconciler.dedup(Side::System).await.unwrap();

    assert_eq!(*s.applied.lock().unwrap(), vec!["-dup"]);
    assert_eq!(ssids(&s.networks), vec!["dup", "x"]);
    assert_eq!(s.networks.lock().unwrap()[0].credential(), Some("pw"));
    assert!(!path.exists());
}

#[tokio::test]
async fn broken_store_file_aborts_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("networks.json");
    let broken = r#"[{"name": "x", "ssid": "x", "pswd_type": "wep", "source": "s", "created_at": 1}]"#;
    std::fs::write(&path, broken).unwrap();
    let mut s = setup(&path, vec![network("home", 10, None)]);

    let err = s.reconciler.export().await.unwrap_err();

    assert!(format!("{err:#}").contains("wep"), "{err:#}");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), broken);
    assert!(s.applied.lock().unwrap().is_empty());
}
