//! Aggregate views over the ledger: dashboard totals, category breakdowns,
//! monthly trends, and per category spending predictions.

mod endpoints;
mod engine;
mod predictions;
mod window;

pub use endpoints::{
    WindowQuery, category_breakdown_endpoint, dashboard_summary_endpoint,
    monthly_trends_endpoint, predictions_endpoint,
};
pub use engine::{
    CategoryBreakdownRow, DashboardSummary, MonthlyTrend, category_breakdown, dashboard_summary,
    monthly_trends,
};
pub use predictions::{LOOKBACK_MONTHS, Prediction, Trend, predictions};
