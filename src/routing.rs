//! Application router configuration.

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::{
    AppState,
    analytics::{
        category_breakdown_endpoint, dashboard_summary_endpoint, monthly_trends_endpoint,
        predictions_endpoint,
    },
    budget::{contribute_to_budget_endpoint, create_budget_endpoint, list_budgets_endpoint},
    category::{create_category_endpoint, delete_category_endpoint, list_categories_endpoint},
    endpoints,
    goal::{
        contribute_to_goal_endpoint, create_goal_endpoint, delete_goal_endpoint,
        list_goals_endpoint,
    },
    ledger::{
        create_transaction_endpoint, delete_transaction_endpoint, recent_transactions_endpoint,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::TRANSACTIONS, post(create_transaction_endpoint))
        .route(endpoints::TRANSACTION, delete(delete_transaction_endpoint))
        .route(
            endpoints::RECENT_TRANSACTIONS,
            get(recent_transactions_endpoint),
        )
        .route(
            endpoints::DASHBOARD_SUMMARY,
            get(dashboard_summary_endpoint),
        )
        .route(
            endpoints::CATEGORY_BREAKDOWN,
            get(category_breakdown_endpoint),
        )
        .route(endpoints::MONTHLY_TRENDS, get(monthly_trends_endpoint))
        .route(endpoints::PREDICTIONS, get(predictions_endpoint))
        .route(
            endpoints::BUDGETS,
            get(list_budgets_endpoint).post(create_budget_endpoint),
        )
        .route(
            endpoints::BUDGET_CONTRIBUTIONS,
            post(contribute_to_budget_endpoint),
        )
        .route(
            endpoints::GOALS,
            get(list_goals_endpoint).post(create_goal_endpoint),
        )
        .route(endpoints::GOAL, delete(delete_goal_endpoint))
        .route(
            endpoints::GOAL_CONTRIBUTIONS,
            post(contribute_to_goal_endpoint),
        )
        .route(
            endpoints::CATEGORIES,
            get(list_categories_endpoint).post(create_category_endpoint),
        )
        .route(endpoints::CATEGORY, delete(delete_category_endpoint))
        .with_state(state)
}
