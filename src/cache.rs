//! A keyed, version gated cache for aggregate ledger queries.
//!
//! Every cached value is stored under a key that encodes the user, the metric,
//! and the *full* set of query parameters, serialized with `serde_json` so a
//! parameter can never be left out of the key by manual enumeration. Entries
//! are only served while their recorded ledger version matches the user's
//! current one; there is no time based expiry. Mutations additionally remove
//! the affected metrics outright, across all parameter variants.

use std::{collections::HashMap, sync::Mutex};

use serde::{Serialize, de::DeserializeOwned};

use crate::{Error, database_id::UserId};

/// How many times an invalidation is retried before the owning operation is
/// failed with [Error::ConsistencyFailure].
const INVALIDATION_ATTEMPTS: u32 = 3;

/// The cacheable aggregate metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Income, expense, and balance totals for the dashboard.
    DashboardSummary,
    /// Expense totals grouped by category over a trailing window.
    CategoryBreakdown,
    /// Per month income/expense series over a trailing window.
    MonthlyTrends,
    /// The most recent transactions list.
    RecentTransactions,
    /// Per category spending predictions.
    Predictions,
    /// The budget list with derived spent totals.
    Budgets,
    /// The savings goal list with derived current amounts.
    Goals,
}

impl Metric {
    fn as_str(&self) -> &'static str {
        match self {
            Metric::DashboardSummary => "dashboard_summary",
            Metric::CategoryBreakdown => "category_breakdown",
            Metric::MonthlyTrends => "monthly_trends",
            Metric::RecentTransactions => "recent_transactions",
            Metric::Predictions => "predictions",
            Metric::Budgets => "budgets",
            Metric::Goals => "goals",
        }
    }
}

/// A deterministic encoding of a user, a metric, and every parameter of the
/// query the cached value answers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    user_id: UserId,
    metric: Metric,
    parameters: String,
}

impl CacheKey {
    /// Build a key from the handler's full parameter struct.
    ///
    /// The parameters are serialized as JSON, so two queries that differ in
    /// any field get distinct keys by construction.
    ///
    /// # Errors
    /// Returns [Error::JsonSerializationError] if the parameters cannot be
    /// serialized.
    pub fn new<P: Serialize>(user_id: UserId, metric: Metric, parameters: &P) -> Result<Self, Error> {
        let parameters = serde_json::to_string(parameters)
            .map_err(|error| Error::JsonSerializationError(error.to_string()))?;

        Ok(Self {
            user_id,
            metric,
            parameters,
        })
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    computed_at_version: i64,
}

/// The aggregate cache that sits between the query handlers and the ledger.
///
/// Values are held as `serde_json::Value` so the cache stays agnostic of the
/// metric result types.
#[derive(Debug, Default)]
pub struct AnalyticsCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl AnalyticsCache {
    /// Return the cached value for `key` if it was computed at `version`,
    /// otherwise run `compute`, store its result at `version`, and return it.
    ///
    /// If the cache lock cannot be taken the result is served uncached rather
    /// than failing the read.
    ///
    /// # Errors
    /// Propagates any error from `compute`, and returns
    /// [Error::JsonSerializationError] if the computed value cannot be
    /// serialized for storage.
    pub fn get_or_compute<T, F>(&self, key: CacheKey, version: i64, compute: F) -> Result<T, Error>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, Error>,
    {
        if let Ok(entries) = self.entries.lock()
            && let Some(entry) = entries.get(&key)
            && entry.computed_at_version == version
            && let Ok(value) = serde_json::from_value(entry.value.clone())
        {
            tracing::debug!(
                metric = key.metric.as_str(),
                user_id = key.user_id,
                "cache hit"
            );
            return Ok(value);
        }

        let value = compute()?;
        let stored = serde_json::to_value(&value)
            .map_err(|error| Error::JsonSerializationError(error.to_string()))?;

        match self.entries.lock() {
            Ok(mut entries) => {
                entries.insert(
                    key,
                    CacheEntry {
                        value: stored,
                        computed_at_version: version,
                    },
                );
            }
            Err(_) => {
                tracing::warn!("analytics cache lock poisoned, serving uncached result");
            }
        }

        Ok(value)
    }

    /// Remove every entry for `user_id` whose metric is in `metrics`,
    /// regardless of its parameter suffix.
    ///
    /// # Errors
    /// Returns [Error::ConsistencyFailure] if the cache lock could not be
    /// taken after bounded retries. Callers treat this as a failure of the
    /// whole mutation, since leaving stale entries behind a successful ledger
    /// write would corrupt subsequent reads.
    pub fn invalidate(&self, user_id: UserId, metrics: &[Metric]) -> Result<(), Error> {
        for attempt in 1..=INVALIDATION_ATTEMPTS {
            match self.entries.lock() {
                Ok(mut entries) => {
                    entries
                        .retain(|key, _| key.user_id != user_id || !metrics.contains(&key.metric));
                    return Ok(());
                }
                Err(_) => {
                    tracing::warn!(attempt, user_id, "analytics cache lock failed, retrying");
                }
            }
        }

        tracing::error!(user_id, "giving up on cache invalidation");
        Err(Error::ConsistencyFailure)
    }

    /// The number of live entries, used by tests to observe invalidation.
    #[cfg(test)]
    pub(crate) fn entry_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::{AnalyticsCache, CacheKey, Metric};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct WindowParams {
        months: u32,
    }

    fn key(user_id: i64, metric: Metric, months: u32) -> CacheKey {
        CacheKey::new(user_id, metric, &WindowParams { months }).unwrap()
    }

    #[test]
    fn second_read_at_same_version_is_served_from_cache() {
        let cache = AnalyticsCache::default();
        let mut computes = 0;

        for _ in 0..2 {
            let value: u32 = cache
                .get_or_compute(key(1, Metric::MonthlyTrends, 6), 1, || {
                    computes += 1;
                    Ok(42)
                })
                .unwrap();
            assert_eq!(value, 42);
        }

        assert_eq!(computes, 1);
    }

    #[test]
    fn version_mismatch_forces_recompute() {
        let cache = AnalyticsCache::default();

        let stale: u32 = cache
            .get_or_compute(key(1, Metric::DashboardSummary, 0), 1, || Ok(1))
            .unwrap();
        let fresh: u32 = cache
            .get_or_compute(key(1, Metric::DashboardSummary, 0), 2, || Ok(2))
            .unwrap();

        assert_eq!(stale, 1);
        assert_eq!(fresh, 2);
    }

    #[test]
    fn different_parameters_get_different_entries() {
        let cache = AnalyticsCache::default();

        let three: u32 = cache
            .get_or_compute(key(1, Metric::MonthlyTrends, 3), 1, || Ok(3))
            .unwrap();
        let six: u32 = cache
            .get_or_compute(key(1, Metric::MonthlyTrends, 6), 1, || Ok(6))
            .unwrap();

        assert_eq!(three, 3);
        assert_eq!(six, 6);
        assert_eq!(cache.entry_count(), 2);
    }

    #[test]
    fn invalidate_removes_all_parameter_variants_of_a_metric() {
        let cache = AnalyticsCache::default();
        for months in [1, 3, 6, 12] {
            let _: u32 = cache
                .get_or_compute(key(1, Metric::MonthlyTrends, months), 1, || Ok(months))
                .unwrap();
        }
        let _: u32 = cache
            .get_or_compute(key(1, Metric::Budgets, 0), 1, || Ok(0))
            .unwrap();

        cache.invalidate(1, &[Metric::MonthlyTrends]).unwrap();

        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn invalidate_leaves_other_users_entries_alone() {
        let cache = AnalyticsCache::default();
        let _: u32 = cache
            .get_or_compute(key(1, Metric::DashboardSummary, 0), 1, || Ok(1))
            .unwrap();
        let _: u32 = cache
            .get_or_compute(key(2, Metric::DashboardSummary, 0), 1, || Ok(2))
            .unwrap();

        cache.invalidate(1, &[Metric::DashboardSummary]).unwrap();

        assert_eq!(cache.entry_count(), 1);
        let survivor: u32 = cache
            .get_or_compute(key(2, Metric::DashboardSummary, 0), 1, || Ok(99))
            .unwrap();
        assert_eq!(survivor, 2, "user 2's entry should have survived");
    }

    #[test]
    fn compute_errors_are_propagated_and_not_cached() {
        let cache = AnalyticsCache::default();

        let result: Result<u32, _> =
            cache.get_or_compute(key(1, Metric::Predictions, 0), 1, || {
                Err(crate::Error::NotFound)
            });

        assert!(result.is_err());
        assert_eq!(cache.entry_count(), 0);
    }
}
