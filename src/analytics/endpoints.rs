//! HTTP handlers for the dashboard and analytics reads.
//!
//! Every handler here reads through the analytics cache: it looks up the
//! user's current ledger version, then either serves the entry computed at
//! that version or recomputes and stores it. The cache key always encodes the
//! resolved query parameters, so `months=3` and `months=6` can never share an
//! entry.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    auth::CurrentUser,
    cache::{CacheKey, Metric},
    ledger,
};

use super::{
    engine::{
        CategoryBreakdownRow, DashboardSummary, MonthlyTrend, category_breakdown,
        dashboard_summary, monthly_trends,
    },
    predictions::{Prediction, predictions},
};

/// The window size used when a request does not name one.
const DEFAULT_WINDOW_MONTHS: u32 = 6;

/// The query parameters for the windowed analytics reads.
#[derive(Debug, Clone, Deserialize)]
pub struct WindowQuery {
    /// How many trailing calendar months to cover. Defaults to 6.
    #[serde(default)]
    pub months: Option<u32>,
}

impl WindowQuery {
    /// The window size with the default applied; zero falls back to the
    /// default as well.
    fn resolve(&self) -> u32 {
        match self.months {
            Some(months) if months > 0 => months,
            _ => DEFAULT_WINDOW_MONTHS,
        }
    }
}

/// The full parameter set the windowed cache keys encode.
#[derive(Debug, Clone, Serialize)]
struct WindowKey {
    months: u32,
}

/// A route handler for the dashboard's income/expense/balance totals.
pub async fn dashboard_summary_endpoint(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<DashboardSummary>, Error> {
    let version = {
        let connection = state.connection()?;
        ledger::current_version(user_id, &connection)?
    };

    let key = CacheKey::new(user_id, Metric::DashboardSummary, &())?;
    let summary = state.cache.get_or_compute(key, version, || {
        let connection = state.connection()?;
        dashboard_summary(user_id, &connection)
    })?;

    Ok(Json(summary))
}

/// A route handler for expense totals grouped by category over a trailing
/// window.
pub async fn category_breakdown_endpoint(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Vec<CategoryBreakdownRow>>, Error> {
    let months = query.resolve();
    let today = OffsetDateTime::now_utc().date();

    let version = {
        let connection = state.connection()?;
        ledger::current_version(user_id, &connection)?
    };

    let key = CacheKey::new(user_id, Metric::CategoryBreakdown, &WindowKey { months })?;
    let breakdown = state.cache.get_or_compute(key, version, || {
        let connection = state.connection()?;
        category_breakdown(user_id, months, today, &connection)
    })?;

    Ok(Json(breakdown))
}

/// A route handler for the per month income/expense series.
///
/// The response always has exactly as many entries as the resolved window
/// size.
pub async fn monthly_trends_endpoint(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Vec<MonthlyTrend>>, Error> {
    let months = query.resolve();
    let today = OffsetDateTime::now_utc().date();

    let version = {
        let connection = state.connection()?;
        ledger::current_version(user_id, &connection)?
    };

    let key = CacheKey::new(user_id, Metric::MonthlyTrends, &WindowKey { months })?;
    let trends = state.cache.get_or_compute(key, version, || {
        let connection = state.connection()?;
        monthly_trends(user_id, months, today, &connection)
    })?;

    Ok(Json(trends))
}

/// A route handler for per category spending predictions.
pub async fn predictions_endpoint(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<Prediction>>, Error> {
    let today = OffsetDateTime::now_utc().date();

    let version = {
        let connection = state.connection()?;
        ledger::current_version(user_id, &connection)?
    };

    let key = CacheKey::new(user_id, Metric::Predictions, &())?;
    let results = state.cache.get_or_compute(key, version, || {
        let connection = state.connection()?;
        predictions(user_id, today, &connection)
    })?;

    Ok(Json(results))
}
