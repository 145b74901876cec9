//! Resource Fetcher
//!
//! The collector issues provider calls for a resolved scope in waves. Each
//! wave lists the collections it needs once, fetches single resources
//! concurrently, then expands what came back through the declared relations
//! into the next wave.

use super::path::extract_string;
use super::{
    CollectionScope, FetchPlan, ProviderApi, RawInventory, RawResource, ScopeEntry, ScopeKey,
};
use crate::cancel::CancellationToken;
use crate::error::{ProviderError, RefreshError};
use crate::refresh::resolver;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::time::Duration;

/// Bounded exponential backoff for transient provider failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Ceiling for a single backoff sleep
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Upper bound on attempts accepted from configuration
    pub const MAX_ATTEMPTS: u32 = 10;

    /// Sleep before the attempt following `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Wave-based collector over a provider
pub struct Collector<'a> {
    provider: &'a dyn ProviderApi,
    retry: RetryPolicy,
    concurrency: usize,
    max_depth: u32,
    cancel: &'a CancellationToken,
}

impl<'a> Collector<'a> {
    pub fn new(
        provider: &'a dyn ProviderApi,
        retry: RetryPolicy,
        concurrency: usize,
        max_depth: u32,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            provider,
            retry,
            concurrency: concurrency.max(1),
            max_depth,
            cancel,
        }
    }

    /// Collect every entry and its declared-relation closure.
    ///
    /// Any request that still fails after retries aborts the whole pass and
    /// nothing collected so far is returned.
    pub async fn collect(
        &self,
        entries: impl IntoIterator<Item = ScopeEntry>,
    ) -> Result<RawInventory, RefreshError> {
        let mut inventory = RawInventory::default();
        let mut lists: HashMap<CollectionScope, Vec<Value>> = HashMap::new();

        let mut pending: Vec<ScopeEntry> = Vec::new();
        for entry in entries {
            if !inventory.entries.contains_key(&entry.key) {
                inventory.entries.insert(entry.key.clone(), entry.clone());
                pending.push(entry);
            }
        }

        let mut wave = 0;
        while !pending.is_empty() {
            if self.cancel.is_cancelled() {
                tracing::info!("Collection cancelled before wave {}", wave + 1);
                return Err(RefreshError::Cancelled);
            }
            wave += 1;
            tracing::debug!("Collector wave {}: {} entries", wave, pending.len());

            self.list_collections(&pending, &mut lists).await?;
            let mut outcomes = self.fetch_by_id(&pending).await?;

            for entry in &pending {
                if let FetchPlan::ListAndFilter { scope, path, value } = &entry.plan {
                    let found = lists.get(scope).and_then(|items| {
                        items.iter().find(|item| {
                            extract_string(item, path).is_some_and(|v| v.eq_ignore_ascii_case(value))
                        })
                    });
                    outcomes.insert(entry.key.clone(), found.cloned());
                }
            }

            let mut next = Vec::new();
            for entry in &pending {
                let Some(payload) = outcomes.remove(&entry.key).flatten() else {
                    tracing::debug!("{} not found", entry.key);
                    inventory.not_found.insert(entry.key.clone());
                    continue;
                };

                let resource = RawResource {
                    kind: entry.key.kind,
                    payload,
                };
                for child in resolver::expand(entry, &resource) {
                    if inventory.entries.contains_key(&child.key) {
                        continue;
                    }
                    if child.depth > self.max_depth {
                        tracing::debug!(
                            "Not expanding {} beyond depth {}",
                            child.key,
                            self.max_depth
                        );
                        continue;
                    }
                    inventory.entries.insert(child.key.clone(), child.clone());
                    next.push(child);
                }
                inventory.resources.insert(entry.key.clone(), resource);
            }

            pending = next;
        }

        tracing::info!(
            "Collected {} resources in {} waves ({} not found)",
            inventory.resources.len(),
            wave,
            inventory.not_found.len()
        );
        Ok(inventory)
    }

    /// List each collection needed by this wave once
    async fn list_collections(
        &self,
        pending: &[ScopeEntry],
        lists: &mut HashMap<CollectionScope, Vec<Value>>,
    ) -> Result<(), RefreshError> {
        let mut users: BTreeMap<CollectionScope, ScopeKey> = BTreeMap::new();
        for entry in pending {
            if let FetchPlan::ListAndFilter { scope, .. } = &entry.plan {
                if !lists.contains_key(scope) {
                    users.entry(scope.clone()).or_insert_with(|| entry.key.clone());
                }
            }
        }
        if users.is_empty() {
            return Ok(());
        }

        let listed: Vec<_> = stream::iter(users.keys().cloned())
            .map(|scope| async move {
                let label = scope.to_string();
                let result = self
                    .with_retry(&label, || self.provider.list_collection(&scope))
                    .await;
                (scope, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (scope, result) in listed {
            match result {
                Ok(items) => {
                    tracing::debug!("Listed {} items from {}", items.len(), scope);
                    lists.insert(scope, items);
                }
                Err(source) => {
                    let entry = users
                        .get(&scope)
                        .cloned()
                        .unwrap_or_else(|| ScopeKey::new(scope_kind(&scope), scope.to_string()));
                    return Err(RefreshError::CollectionFailed { entry, source });
                }
            }
        }
        Ok(())
    }

    /// Fetch every direct-lookup entry of this wave
    async fn fetch_by_id(
        &self,
        pending: &[ScopeEntry],
    ) -> Result<BTreeMap<ScopeKey, Option<Value>>, RefreshError> {
        let fetched: Vec<_> = stream::iter(pending.iter().filter_map(|entry| match &entry.plan {
            FetchPlan::ById(id) => Some((entry, id)),
            FetchPlan::ListAndFilter { .. } => None,
        }))
        .map(|(entry, id)| async move {
            let label = entry.key.to_string();
            let result = self
                .with_retry(&label, || self.provider.fetch_by_id(entry.key.kind, id))
                .await;
            (entry.key.clone(), result)
        })
        .buffer_unordered(self.concurrency)
        .collect()
        .await;

        let mut outcomes = BTreeMap::new();
        let mut failed = BTreeSet::new();
        let mut first_error = None;
        for (key, result) in fetched {
            match result {
                Ok(payload) => {
                    outcomes.insert(key, payload);
                }
                Err(source) => {
                    failed.insert(key.clone());
                    if first_error.is_none() {
                        first_error = Some((key, source));
                    }
                }
            }
        }

        if let Some((entry, source)) = first_error {
            tracing::error!(
                "Collection failed for {} ({} entries failed): {}",
                entry,
                failed.len(),
                source
            );
            return Err(RefreshError::CollectionFailed { entry, source });
        }
        Ok(outcomes)
    }

    /// Run `op`, retrying transient failures with exponential backoff
    async fn with_retry<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    tracing::warn!(
                        "Transient failure for {} (attempt {}/{}): {}",
                        label,
                        attempt,
                        max_attempts,
                        e
                    );
                    tokio::time::sleep(self.retry.delay_after(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(ProviderError::Transient(format!(
            "{} failed after {} attempts",
            label, max_attempts
        )))
    }
}

fn scope_kind(scope: &CollectionScope) -> super::RawKind {
    match scope {
        CollectionScope::VmSizes { .. } => super::RawKind::VmSize,
        CollectionScope::Images { .. } => super::RawKind::Image,
    }
}
