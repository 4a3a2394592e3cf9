//! Budgets: per-category spending limits whose totals are projected from the
//! ledger.

mod core;
mod endpoints;

pub use self::core::{
    Budget, BudgetPeriod, BudgetView, NewBudget, create_budget, create_budget_table, get_budget,
    list_budgets, spent, view,
};
pub use endpoints::{
    ContributionRequest, CreateBudgetRequest, contribute_to_budget_endpoint,
    create_budget_endpoint, list_budgets_endpoint,
};
