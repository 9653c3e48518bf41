// Staged store: load, queue, commit

use async_trait::async_trait;
use log::{debug, info};
use strum::Display;

use crate::dedup::find_duplicates;
use crate::error::{Result, StoreError};
use crate::merge::MergePolicy;
use crate::record::NetworkRecord;

/// Where a network source keeps its records.
///
/// Implementations perform blocking work (D-Bus calls, child processes, file
/// I/O); the store awaits each call to completion before issuing the next.
#[async_trait]
pub trait Backend: Send {
    /// Human readable source label, used in previews and logs.
    fn label(&self) -> &str;

    fn merge_policy(&self) -> MergePolicy;

    /// Read every supported network from the source.
    ///
    /// Must fail instead of returning a partial list when the source output
    /// can not be mapped unambiguously.
    async fn load(&mut self) -> Result<Vec<NetworkRecord>>;

    /// Remove one record previously returned by [`Backend::load`].
    async fn apply_remove(&mut self, record: &NetworkRecord) -> Result<()>;

    async fn apply_insert(&mut self, record: &NetworkRecord) -> Result<()>;

    /// Called once after all removals and insertions of a commit.
    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[strum(serialize_all = "lowercase")]
pub enum StoreState {
    #[default]
    Unloaded,
    Loaded,
    Committing,
}

pub struct NetworkStore {
    backend: Box<dyn Backend>,
    state: StoreState,
    current: Vec<NetworkRecord>,
    pending_add: Vec<NetworkRecord>,
    /// Indices into `current`, in staging order.
    pending_remove: Vec<usize>,
}

impl NetworkStore {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            state: StoreState::Unloaded,
            current: Vec::new(),
            pending_add: Vec::new(),
            pending_remove: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        self.backend.label()
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    fn require_loaded(&self, operation: &'static str) -> Result<()> {
        if self.state == StoreState::Loaded {
            Ok(())
        } else {
            Err(StoreError::State {
                operation,
                state: self.state,
            })
        }
    }

    /// Populate `current` from the backend, discarding anything staged.
    pub async fn load(&mut self) -> Result<()> {
        if self.state == StoreState::Committing {
            return Err(StoreError::State {
                operation: "load",
                state: self.state,
            });
        }

        self.reset();
        let records = self.backend.load().await?;
        info!("Loaded {} networks from {}", records.len(), self.label());

        self.current = records;
        self.state = StoreState::Loaded;
        Ok(())
    }

    /// Load unless already loaded.
    pub async fn ensure_loaded(&mut self) -> Result<()> {
        if self.state == StoreState::Loaded {
            return Ok(());
        }
        self.load().await
    }

    pub fn current(&self) -> Result<&[NetworkRecord]> {
        self.require_loaded("reading networks")?;
        Ok(&self.current)
    }

    pub fn pending_add(&self) -> &[NetworkRecord] {
        &self.pending_add
    }

    pub fn pending_remove(&self) -> impl Iterator<Item = &NetworkRecord> {
        self.pending_remove.iter().map(|&idx| &self.current[idx])
    }

    pub fn has_pending(&self) -> bool {
        !self.pending_add.is_empty() || !self.pending_remove.is_empty()
    }

    /// Stage `new` against what the source already has.
    ///
    /// Same-SSID entries of `current` (not yet staged for removal) and of
    /// `pending_add` are visited in that order. Each one the merge policy
    /// reports as different is dropped and the merge result becomes the
    /// candidate for the next entry. The final candidate is staged unless
    /// some entry already matches it.
    pub fn queue_record(&mut self, new: NetworkRecord) -> Result<()> {
        self.require_loaded("queue")?;

        if !new.sync() {
            debug!("{}: skipping {} (sync disabled)", self.label(), new.ssid());
            return Ok(());
        }

        let policy = self.backend.merge_policy();
        let mut candidate = new;
        let mut represented = false;

        let current_matches: Vec<usize> = self
            .current
            .iter()
            .enumerate()
            .filter(|(idx, known)| known.same_network(&candidate) && !self.pending_remove.contains(idx))
            .map(|(idx, _)| idx)
            .collect();

        for idx in current_matches {
            match policy.with_update_applied(&self.current[idx], &candidate) {
                None => represented = true,
                Some(merged) => {
                    debug!("{}: replacing {}", self.label(), self.current[idx]);
                    self.pending_remove.push(idx);
                    candidate = merged;
                }
            }
        }

        let mut superseded = Vec::new();
        for (idx, staged) in self.pending_add.iter().enumerate() {
            if !staged.same_network(&candidate) {
                continue;
            }
            match policy.with_update_applied(staged, &candidate) {
                None => represented = true,
                Some(merged) => {
                    superseded.push(idx);
                    candidate = merged;
                }
            }
        }
        for idx in superseded.into_iter().rev() {
            self.pending_add.remove(idx);
        }

        if !represented {
            debug!("{}: staging {}", self.label(), candidate);
            self.pending_add.push(candidate);
        }
        Ok(())
    }

    pub fn queue_all<I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = NetworkRecord>,
    {
        for record in records {
            self.queue_record(record)?;
        }
        Ok(())
    }

    /// Stage every same-SSID duplicate in `current` for removal, keeping the
    /// oldest. Returns how many records were newly staged.
    pub fn dedup(&mut self) -> Result<usize> {
        self.require_loaded("dedup")?;

        let mut staged = 0;
        for idx in find_duplicates(&self.current) {
            if !self.pending_remove.contains(&idx) {
                self.pending_remove.push(idx);
                staged += 1;
            }
        }
        Ok(staged)
    }

    /// Drop staged changes, keeping what was loaded.
    pub fn discard_pending(&mut self) {
        self.pending_add.clear();
        self.pending_remove.clear();
    }

    /// Apply staged removals, then staged insertions, then flush.
    ///
    /// Stops at the first failing operation; operations already applied stay
    /// applied. Either way the store ends up unloaded.
    pub async fn commit(&mut self) -> Result<()> {
        self.require_loaded("commit")?;
        self.state = StoreState::Committing;

        let result = self.apply_pending().await;
        self.reset();
        result
    }

    async fn apply_pending(&mut self) -> Result<()> {
        for &idx in &self.pending_remove {
            let record = &self.current[idx];
            info!("{}: removing {}", self.backend.label(), record.ssid());
            self.backend.apply_remove(record).await?;
        }
        for record in &self.pending_add {
            info!("{}: adding {}", self.backend.label(), record.ssid());
            self.backend.apply_insert(record).await?;
        }
        self.backend.flush().await
    }

    fn reset(&mut self) {
        self.current.clear();
        self.pending_add.clear();
        self.pending_remove.clear();
        self.state = StoreState::Unloaded;
    }
}
