// Import, export, update, show and dedup between the file and a live source

use anyhow::{Context, Result};
use log::info;
use std::io::Write;
use strum::{Display, EnumString};

use crate::store::NetworkStore;

/// Which store a single-store command works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Side {
    File,
    System,
}

/// Print what `store` would add and remove on commit.
pub fn write_preview(out: &mut impl Write, store: &NetworkStore) -> std::io::Result<()> {
    if !store.has_pending() {
        return writeln!(out, "No changes for {}", store.label());
    }

    writeln!(out, "Changes for {}:", store.label())?;
    for record in store.pending_remove() {
        writeln!(out, "  - {record}")?;
    }
    for record in store.pending_add() {
        writeln!(out, "  + {record}")?;
    }
    Ok(())
}

async fn ensure_loaded(store: &mut NetworkStore) -> Result<()> {
    let label = store.label().to_string();
    store
        .ensure_loaded()
        .await
        .with_context(|| format!("Can not load networks from {label}"))
}

async fn commit(store: &mut NetworkStore) -> Result<()> {
    let label = store.label().to_string();
    store
        .commit()
        .await
        .with_context(|| format!("Can not apply changes to {label}"))
}

/// Moves records between the persisted file and the live system.
pub struct Reconciler<W: Write> {
    file: NetworkStore,
    system: NetworkStore,
    out: W,
}

impl<W: Write> Reconciler<W> {
    /// Previews are written to `out`.
    pub fn new(file: NetworkStore, system: NetworkStore, out: W) -> Self {
        Self { file, system, out }
    }

    pub fn file(&self) -> &NetworkStore {
        &self.file
    }

    pub fn system(&self) -> &NetworkStore {
        &self.system
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Add what the file knows to the live system.
    pub async fn import(&mut self) -> Result<()> {
        ensure_loaded(&mut self.file).await?;
        ensure_loaded(&mut self.system).await?;

        let records = self.file.current()?.to_vec();
        self.system.queue_all(records)?;
        write_preview(&mut self.out, &self.system)?;
        commit(&mut self.system).await
    }

    /// Add what the live system knows to the file.
    pub async fn export(&mut self) -> Result<()> {
        ensure_loaded(&mut self.file).await?;
        ensure_loaded(&mut self.system).await?;

        let records = self.system.current()?.to_vec();
        self.file.queue_all(records)?;
        write_preview(&mut self.out, &self.file)?;
        commit(&mut self.file).await
    }

    /// Export, then import from the freshly written file, so values the file
    /// settled on reach the system too.
    pub async fn update(&mut self) -> Result<()> {
        self.export().await?;
        info!("Reloading {}", self.file.label());
        self.file.load().await.with_context(|| {
            format!("Can not reload networks from {}", self.file.label())
        })?;
        self.import().await
    }

    /// Preview import and export without changing anything.
    pub async fn show(&mut self) -> Result<()> {
        ensure_loaded(&mut self.file).await?;
        ensure_loaded(&mut self.system).await?;

        let from_system = self.system.current()?.to_vec();
        let from_file = self.file.current()?.to_vec();
        self.file.queue_all(from_system)?;
        self.system.queue_all(from_file)?;

        write_preview(&mut self.out, &self.file)?;
        write_preview(&mut self.out, &self.system)?;

        self.file.discard_pending();
        self.system.discard_pending();
        Ok(())
    }

    /// Remove same-SSID duplicates from one side, keeping the oldest.
    pub async fn dedup(&mut self, side: Side) -> Result<()> {
        let store = match side {
            Side::File => &mut self.file,
            Side::System => &mut self.system,
        };
        ensure_loaded(store).await?;

        let staged = store.dedup()?;
        info!("{}: {staged} duplicates", store.label());
        write_preview(&mut self.out, store)?;
        commit(store).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as StoreResult;
    use crate::merge::MergePolicy;
    use crate::record::NetworkRecord;
    use crate::store::Backend;
    use async_trait::async_trait;
    use chrono::DateTime;
    use pretty_assertions::assert_eq;

    struct Fixed {
        label: &'static str,
        records: Vec<NetworkRecord>,
    }

    #[async_trait]
    impl Backend for Fixed {
        fn label(&self) -> &str {
            self.label
        }

        fn merge_policy(&self) -> MergePolicy {
            MergePolicy::Strict
        }

        async fn load(&mut self) -> StoreResult<Vec<NetworkRecord>> {
            Ok(self.records.clone())
        }

        async fn apply_remove(&mut self, _: &NetworkRecord) -> StoreResult<()> {
            panic!("read-only")
        }

        async fn apply_insert(&mut self, _: &NetworkRecord) -> StoreResult<()> {
            panic!("read-only")
        }
    }

    fn record(ssid: &str, created: i64) -> NetworkRecord {
        NetworkRecord::builder(ssid, "test")
            .created_at(DateTime::from_timestamp(created, 0).unwrap())
            .build()
            .unwrap()
    }

    fn store(label: &'static str, records: Vec<NetworkRecord>) -> NetworkStore {
        NetworkStore::new(Box::new(Fixed { label, records }))
    }

    #[test]
    fn side_names() {
        assert_eq!("file".parse::<Side>().unwrap(), Side::File);
        assert_eq!("system".parse::<Side>().unwrap(), Side::System);
        assert!("phone".parse::<Side>().is_err());
    }

    #[tokio::test]
    async fn preview_lists_removals_then_additions() {
        let mut store = store("fake", vec![record("home", 0)]);
        store.load().await.unwrap();
        store
            .queue_record(
                NetworkRecord::builder("home", "test")
                    .created_at(DateTime::from_timestamp(0, 0).unwrap())
                    .wpa("pw")
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let mut out = Vec::new();
        write_preview(&mut out, &store).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Changes for fake:\n\
             \x20 - home (open) from test created 1970-01-01 00:00:00\n\
             \x20 + home (wpa) from test created 1970-01-01 00:00:00\n"
        );
    }

    #[tokio::test]
    async fn show_changes_nothing() {
        let file = store("file", vec![record("home", 10)]);
        let system = store("system", vec![record("cafe", 20)]);
        let mut reconciler = Reconciler::new(file, system, Vec::new());

        reconciler.show().await.unwrap();

        assert!(!reconciler.file().has_pending());
        assert!(!reconciler.system().has_pending());
        let out = String::from_utf8(reconciler.into_output()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Changes for file:",
                "  + cafe (open) from test created 1970-01-01 00:00:20",
                "Changes for system:",
                "  + home (open) from test created 1970-01-01 00:00:10",
            ]
        );
    }

    #[tokio::test]
    async fn show_in_sync() {
        let file = store("file", vec![record("home", 10)]);
        let system = store("system", vec![record("home", 10)]);
        let mut reconciler = Reconciler::new(file, system, Vec::new());

        reconciler.show().await.unwrap();
        let out = String::from_utf8(reconciler.into_output()).unwrap();
        assert_eq!(out, "No changes for file\nNo changes for system\n");
    }
}
