//! azrefresh - targeted inventory refresh for Azure Resource Manager
//!
//! A batch of targets (manager, association, natural key) is resolved into
//! a bounded fetch scope, collected from ARM, parsed into a canonical entity
//! graph and reconciled into an inventory store. Dependencies the pass did
//! not collect are queued as follow-up targets.
//!
//! # Module Structure
//!
//! - [`target`] - Targets and the supported associations
//! - [`identity`] - ARM ids, composite VM keys and natural keys
//! - [`resource`] - Raw kinds, the relations table and the collector
//! - [`refresh`] - Resolver, graph builder, persister, cascade and the [`Refresher`]
//! - [`inventory`] - Canonical model, store, queue and snapshots
//! - [`azure`] - ARM HTTPS client and region catalogue
//! - [`worker`] - Follow-up queue draining
//! - [`config`] - Configuration loading

pub mod azure;
pub mod cancel;
pub mod config;
pub mod error;
pub mod identity;
pub mod inventory;
pub mod refresh;
pub mod resource;
pub mod target;
pub mod worker;

pub use cancel::CancellationToken;
pub use error::{ProviderError, RefreshError, StoreError};
pub use refresh::{RefreshReport, RefreshSettings, Refresher};
pub use target::{Association, Target};

/// Version injected at compile time via AZREFRESH_VERSION env var (set by
/// CI/CD), or "dev" for local builds.
pub const VERSION: &str = match option_env!("AZREFRESH_VERSION") {
    Some(v) => v,
    None => "dev",
};
