pub mod adb;

pub mod cli;

pub mod config;

pub mod dedup;

pub mod error;

pub mod file;

pub mod merge;

pub mod nm;

pub mod reconcile;

pub mod record;

pub mod store;

pub use error::{RecordError, StoreError};
pub use record::{NetworkRecord, SecurityType};
pub use store::{Backend, NetworkStore, StoreState};
