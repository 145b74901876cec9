//! Targeted refresh pipeline
//!
//! One invocation takes a batch of targets, groups them by manager and runs
//! each group through resolve, collect, parse, persist and cascade. Groups
//! for different managers run concurrently. Persistence for one manager is
//! serialized through a per-manager lock; the other phases never lock.
//!
//! # Architecture
//!
//! - [`resolver`] - Targets to scope entries, plus relation expansion
//! - [`parser`] - Raw payloads to the canonical [`EntityGraph`]
//! - [`persister`] - Graph to store as one atomic change set
//! - [`cascade`] - Follow-up queue items for uncollected dependencies

pub mod cascade;
pub mod parser;
pub mod persister;
pub mod resolver;

pub use persister::{PersistResult, Persister};
pub use resolver::{Resolver, ScopeDescriptor};

use crate::cancel::CancellationToken;
use crate::error::RefreshError;
use crate::inventory::{EntityGraph, InventoryStore, ManagerId, ManagerPair, WorkQueue};
use crate::resource::{Collector, ProviderApi, RetryPolicy};
use crate::target::{RejectedTarget, Target};
use futures::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Tunables for one refresher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSettings {
    pub retry: RetryPolicy,
    /// Concurrent provider requests per collector wave
    pub collector_concurrency: usize,
    /// Relation hops followed from a named target
    pub max_expansion_depth: u32,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            collector_concurrency: 8,
            max_expansion_depth: 8,
        }
    }
}

/// Per-manager reconciliation locks
#[derive(Debug, Default)]
pub struct ManagerLocks {
    locks: Mutex<HashMap<ManagerId, Arc<tokio::sync::Mutex<()>>>>,
}

impl ManagerLocks {
    pub fn for_manager(&self, id: ManagerId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(id).or_default().clone()
    }
}

/// Outcome of one manager's pass
#[derive(Debug, Default)]
pub struct ManagerReport {
    pub accepted: Vec<Target>,
    pub fetched: usize,
    pub not_found: usize,
    pub persisted: PersistResult,
    pub followups: usize,
    /// Malformed resources dropped from the graph
    pub warnings: Vec<RefreshError>,
}

#[derive(Debug)]
pub struct ManagerOutcome {
    pub manager: ManagerId,
    pub result: Result<ManagerReport, RefreshError>,
}

/// Outcome of one refresh invocation
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub rejected: Vec<RejectedTarget>,
    pub managers: Vec<ManagerOutcome>,
}

impl RefreshReport {
    /// True when every manager pass committed
    pub fn is_success(&self) -> bool {
        self.managers.iter().all(|m| m.result.is_ok())
    }

    pub fn errors(&self) -> impl Iterator<Item = &RefreshError> {
        self.managers.iter().filter_map(|m| m.result.as_ref().err())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &RefreshError> {
        self.managers
            .iter()
            .filter_map(|m| m.result.as_ref().ok())
            .flat_map(|r| r.warnings.iter())
    }
}

/// Entry point for targeted refreshes
pub struct Refresher {
    provider: Arc<dyn ProviderApi>,
    store: Arc<dyn InventoryStore>,
    queue: Arc<dyn WorkQueue>,
    settings: RefreshSettings,
    locks: Arc<ManagerLocks>,
}

impl Refresher {
    pub fn new(
        provider: Arc<dyn ProviderApi>,
        store: Arc<dyn InventoryStore>,
        queue: Arc<dyn WorkQueue>,
        settings: RefreshSettings,
    ) -> Self {
        Self {
            provider,
            store,
            queue,
            settings,
            locks: Arc::new(ManagerLocks::default()),
        }
    }

    /// Share reconciliation locks with another refresher over the same store
    pub fn with_locks(mut self, locks: Arc<ManagerLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn store(&self) -> &Arc<dyn InventoryStore> {
        &self.store
    }

    pub fn queue(&self) -> &Arc<dyn WorkQueue> {
        &self.queue
    }

    pub async fn refresh_many(&self, targets: &[Target]) -> RefreshReport {
        self.refresh_many_with_cancel(targets, &CancellationToken::new()).await
    }

    /// Refresh a batch of targets. Input errors reject single targets;
    /// a failed manager pass commits nothing for that manager.
    pub async fn refresh_many_with_cancel(
        &self,
        targets: &[Target],
        cancel: &CancellationToken,
    ) -> RefreshReport {
        let mut report = RefreshReport::default();
        let mut groups: BTreeMap<ManagerId, (ManagerPair, Vec<Target>)> = BTreeMap::new();

        for target in targets {
            match self.store.manager_pair(target.manager) {
                Ok(Some(pair)) => {
                    groups
                        .entry(pair.cloud.id)
                        .or_insert_with(|| (pair.clone(), Vec::new()))
                        .1
                        .push(target.clone());
                }
                Ok(None) => report.rejected.push(RejectedTarget {
                    target: target.clone(),
                    error: RefreshError::UnknownManager(target.manager.0),
                }),
                Err(e) => report.rejected.push(RejectedTarget {
                    target: target.clone(),
                    error: e.into(),
                }),
            }
        }

        tracing::info!(
            "Refreshing {} targets across {} managers",
            targets.len(),
            groups.len()
        );

        let runs = groups
            .into_values()
            .map(|(pair, targets)| self.refresh_manager(pair, targets, cancel));
        for (manager, rejected, result) in join_all(runs).await {
            if let Err(e) = &result {
                tracing::error!("Refresh for manager {} failed: {}", manager, e);
            }
            report.rejected.extend(rejected);
            report.managers.push(ManagerOutcome { manager, result });
        }
        report
    }

    async fn refresh_manager(
        &self,
        pair: ManagerPair,
        targets: Vec<Target>,
        cancel: &CancellationToken,
    ) -> (ManagerId, Vec<RejectedTarget>, Result<ManagerReport, RefreshError>) {
        let manager = pair.cloud.id;
        let mut scope = Resolver::new(self.store.as_ref()).resolve(&pair, &targets);
        let rejected = std::mem::take(&mut scope.rejected);
        let result = self.run(scope, cancel).await;
        (manager, rejected, result)
    }

    async fn run(&self, scope: ScopeDescriptor, cancel: &CancellationToken) -> Result<ManagerReport, RefreshError> {
        let mut report = ManagerReport {
            accepted: scope.accepted.clone(),
            ..ManagerReport::default()
        };
        if scope.is_empty() {
            return Ok(report);
        }

        let collector = Collector::new(
            self.provider.as_ref(),
            self.settings.retry,
            self.settings.collector_concurrency,
            self.settings.max_expansion_depth,
            cancel,
        );
        let raw = collector.collect(scope.entries.values().cloned()).await?;
        report.fetched = raw.resources.len();
        report.not_found = raw.not_found.len();

        let mut graph: EntityGraph = parser::parse(&raw, &scope.pair);
        if cancel.is_cancelled() {
            tracing::info!("Refresh for manager {} cancelled before persistence", scope.pair.cloud.id);
            return Err(RefreshError::Cancelled);
        }

        {
            let lock = self.locks.for_manager(scope.pair.cloud.id);
            let _guard = lock.lock().await;
            report.persisted = Persister::new(self.store.as_ref()).persist(&graph, &scope.pair)?;
        }

        let items = cascade::schedule_followups(&graph, &scope);
        report.followups = cascade::enqueue(self.queue.as_ref(), items);
        report.warnings = std::mem::take(&mut graph.warnings);

        tracing::info!(
            "Manager {} refreshed: {} fetched, {} not found, {} follow-ups",
            scope.pair.cloud.id,
            report.fetched,
            report.not_found,
            report.followups
        );
        Ok(report)
    }
}
