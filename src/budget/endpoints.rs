//! HTTP handlers for budgets and budget contributions.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use time::{Date, OffsetDateTime};

use crate::{
    AppState, Error,
    auth::CurrentUser,
    budget::{BudgetPeriod, BudgetView, NewBudget, create_budget, list_budgets, view},
    cache::{CacheKey, Metric},
    contribution,
    database_id::{BudgetId, CategoryId},
    ledger::{self, Transaction},
};

/// The request body for creating a budget.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBudgetRequest {
    /// The category the budget limits.
    pub category_id: CategoryId,
    /// The spending limit for the period.
    pub amount: Decimal,
    /// How often the budget resets.
    pub period: BudgetPeriod,
    /// The first day the budget covers.
    pub start_date: Date,
    /// The last day the budget covers.
    pub end_date: Date,
    /// The spent percentage at which the user wants to be warned, 0-100.
    #[serde(default)]
    pub alert_threshold: Option<i64>,
}

/// The request body for contributing money to a budget.
#[derive(Debug, Clone, Deserialize)]
pub struct ContributionRequest {
    /// The amount to commit, must be positive.
    pub amount: Decimal,
    /// An optional note to carry on the generated transaction.
    #[serde(default)]
    pub description: Option<String>,
    /// When the contribution happened. Defaults to today.
    #[serde(default)]
    pub date: Option<Date>,
}

/// A route handler for creating a budget.
pub async fn create_budget_endpoint(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(request): Json<CreateBudgetRequest>,
) -> Result<(StatusCode, Json<BudgetView>), Error> {
    let budget_view = {
        let connection = state.connection()?;
        let budget = create_budget(
            NewBudget {
                user_id,
                category_id: request.category_id,
                amount: request.amount,
                period: request.period,
                start_date: request.start_date,
                end_date: request.end_date,
                alert_threshold: request.alert_threshold,
            },
            &connection,
        )?;
        view(budget, &connection)?
    };

    // The cached budget list does not know about the new budget; the ledger
    // version has not moved, so the entry has to go explicitly.
    state.cache.invalidate(user_id, &[Metric::Budgets])?;

    Ok((StatusCode::CREATED, Json(budget_view)))
}

/// A route handler for the user's budgets with their derived totals.
pub async fn list_budgets_endpoint(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<BudgetView>>, Error> {
    let version = {
        let connection = state.connection()?;
        ledger::current_version(user_id, &connection)?
    };

    let key = CacheKey::new(user_id, Metric::Budgets, &())?;
    let budgets = state.cache.get_or_compute(key, version, || {
        let connection = state.connection()?;
        list_budgets(user_id, &connection)?
            .into_iter()
            .map(|budget| view(budget, &connection))
            .collect::<Result<Vec<BudgetView>, Error>>()
    })?;

    Ok(Json(budgets))
}

/// A route handler for committing money toward a budget.
///
/// The contribution lands in the ledger as an expense in the budget's
/// category, so the budget's derived spent total rises by exactly the
/// contributed amount.
pub async fn contribute_to_budget_endpoint(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(budget_id): Path<BudgetId>,
    Json(request): Json<ContributionRequest>,
) -> Result<(StatusCode, Json<Transaction>), Error> {
    let date = request
        .date
        .unwrap_or_else(|| OffsetDateTime::now_utc().date());

    let transaction = contribution::contribute_to_budget(
        &state,
        user_id,
        budget_id,
        request.amount,
        request.description,
        date,
    )?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

#[cfg(test)]
mod tests {
    use axum::{
        Json,
        extract::{Path, State},
    };
    use rusqlite::Connection;
    use rust_decimal::Decimal;
    use time::macros::date;

    use crate::{
        AppState, Error,
        auth::CurrentUser,
        budget::{
            BudgetPeriod,
            endpoints::{
                ContributionRequest, CreateBudgetRequest, contribute_to_budget_endpoint,
                create_budget_endpoint, list_budgets_endpoint,
            },
        },
        category::create_category,
    };

    const USER: i64 = 1;

    fn get_test_state() -> AppState {
        let conn = Connection::open_in_memory().unwrap();
        AppState::new(conn).unwrap()
    }

    fn budget_request(category_id: i64) -> CreateBudgetRequest {
        CreateBudgetRequest {
            category_id,
            amount: Decimal::new(20000, 2),
            period: BudgetPeriod::Monthly,
            start_date: date!(2025 - 10 - 01),
            end_date: date!(2025 - 10 - 31),
            alert_threshold: None,
        }
    }

    #[tokio::test]
    async fn contribution_shows_up_in_the_listed_spent_total() {
        let state = get_test_state();
        let category = {
            let connection = state.connection().unwrap();
            create_category("Coffee", USER, &connection).unwrap()
        };

        let (_, Json(created)) = create_budget_endpoint(
            State(state.clone()),
            CurrentUser(USER),
            Json(budget_request(category.id)),
        )
        .await
        .unwrap();
        assert_eq!(created.spent, Decimal::ZERO);

        contribute_to_budget_endpoint(
            State(state.clone()),
            CurrentUser(USER),
            Path(created.budget.id),
            Json(ContributionRequest {
                amount: Decimal::new(2500, 2),
                description: None,
                date: Some(date!(2025 - 10 - 10)),
            }),
        )
        .await
        .expect("could not contribute");

        let Json(budgets) = list_budgets_endpoint(State(state), CurrentUser(USER))
            .await
            .unwrap();
        assert_eq!(budgets.len(), 1);
        assert_eq!(budgets[0].spent, Decimal::new(2500, 2));
        assert_eq!(budgets[0].remaining, Decimal::new(17500, 2));
    }

    #[tokio::test]
    async fn newly_created_budget_appears_in_a_previously_cached_list() {
        let state = get_test_state();
        let category = {
            let connection = state.connection().unwrap();
            create_category("Coffee", USER, &connection).unwrap()
        };

        // Warm the cache with the empty list first.
        let Json(budgets) = list_budgets_endpoint(State(state.clone()), CurrentUser(USER))
            .await
            .unwrap();
        assert!(budgets.is_empty());

        create_budget_endpoint(
            State(state.clone()),
            CurrentUser(USER),
            Json(budget_request(category.id)),
        )
        .await
        .unwrap();

        let Json(budgets) = list_budgets_endpoint(State(state), CurrentUser(USER))
            .await
            .unwrap();
        assert_eq!(budgets.len(), 1, "the cached empty list should be gone");
    }

    #[tokio::test]
    async fn contribution_to_missing_budget_fails() {
        let state = get_test_state();

        let result = contribute_to_budget_endpoint(
            State(state),
            CurrentUser(USER),
            Path(42),
            Json(ContributionRequest {
                amount: Decimal::TEN,
                description: None,
                date: None,
            }),
        )
        .await;

        assert!(matches!(result, Err(Error::NotFound)));
    }
}
