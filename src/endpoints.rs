//! The API endpoint URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/goals/{goal_id}', use
//! [format_endpoint].

/// The route to create a transaction.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route to retract a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";
/// The route for the most recent transactions.
pub const RECENT_TRANSACTIONS: &str = "/api/transactions/recent";
/// The route for the dashboard's income/expense/balance totals.
pub const DASHBOARD_SUMMARY: &str = "/api/dashboard/summary";
/// The route for expense totals grouped by category.
pub const CATEGORY_BREAKDOWN: &str = "/api/dashboard/category-breakdown";
/// The route for the per month income/expense series.
pub const MONTHLY_TRENDS: &str = "/api/dashboard/monthly-trends";
/// The route for per category spending predictions.
pub const PREDICTIONS: &str = "/api/analytics/predictions";
/// The route to create and list budgets.
pub const BUDGETS: &str = "/api/budgets";
/// The route to contribute to a budget.
pub const BUDGET_CONTRIBUTIONS: &str = "/api/budgets/{budget_id}/contributions";
/// The route to create and list savings goals.
pub const GOALS: &str = "/api/goals";
/// The route to delete a savings goal.
pub const GOAL: &str = "/api/goals/{goal_id}";
/// The route to contribute to a savings goal.
pub const GOAL_CONTRIBUTIONS: &str = "/api/goals/{goal_id}/contributions";
/// The route to create and list categories.
pub const CATEGORIES: &str = "/api/categories";
/// The route to delete a category.
pub const CATEGORY: &str = "/api/categories/{category_id}";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/api/goals/{goal_id}', '{goal_id}' is
/// the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let mut param_start = None;
    let mut param_end = None;

    for (i, c) in endpoint_path.chars().enumerate() {
        if c == '{' {
            param_start = Some(i);
        } else if param_start.is_some() && c == '}' {
            param_end = Some(i + 1);
            break;
        }
    }

    let param_start = match param_start {
        Some(start) => start,
        None => return endpoint_path.to_string(),
    };

    let param_end = param_end.unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
