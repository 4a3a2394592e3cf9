//! HTTP handlers for savings goals, their contributions, and their deletion.

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
    cache::{CacheKey, Metric},
    contribution,
    database_id::GoalId,
    goal::{GoalView, NewGoal, create_goal, list_goals, view},
    ledger::{self, Transaction},
};

/// The request body for creating a savings goal.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGoalRequest {
    /// The display name of the goal.
    pub name: String,
    /// The amount the user wants to save.
    pub target_amount: Decimal,
    /// The date the user wants to reach the target by, if any.
    #[serde(default)]
    pub deadline: Option<Date>,
}

/// The request body for contributing money to a savings goal.
#[derive(Debug, Clone, Deserialize)]
pub struct GoalContributionRequest {
    /// The amount to commit, must be positive.
    pub amount: Decimal,
    /// When the contribution happened. Defaults to today.
    #[serde(default)]
    pub date: Option<Date>,
}

/// A route handler for creating a savings goal.
pub async fn create_goal_endpoint(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(request): Json<CreateGoalRequest>,
) -> Result<(StatusCode, Json<GoalView>), Error> {
    let goal_view = {
        let connection = state.connection()?;
        let goal = create_goal(
            NewGoal {
                user_id,
                name: request.name,
                target_amount: request.target_amount,
                deadline: request.deadline,
            },
            OffsetDateTime::now_utc().date(),
            &connection,
        )?;
        view(goal, &connection)?
    };

    // The cached goal list does not know about the new goal; the ledger
    // version has not moved, so the entry has to go explicitly.
    state.cache.invalidate(user_id, &[Metric::Goals])?;

    Ok((StatusCode::CREATED, Json(goal_view)))
}

/// A route handler for the user's live goals with their derived amounts.
pub async fn list_goals_endpoint(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<GoalView>>, Error> {
    let version = {
        let connection = state.connection()?;
        ledger::current_version(user_id, &connection)?
    };

    let key = CacheKey::new(user_id, Metric::Goals, &())?;
    let goals = state.cache.get_or_compute(key, version, || {
        let connection = state.connection()?;
        list_goals(user_id, &connection)?
            .into_iter()
            .map(|goal| view(goal, &connection))
            .collect::<Result<Vec<GoalView>, Error>>()
    })?;

    Ok(Json(goals))
}

/// A route handler for committing money toward a savings goal.
pub async fn contribute_to_goal_endpoint(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(goal_id): Path<GoalId>,
    Json(request): Json<GoalContributionRequest>,
) -> Result<(StatusCode, Json<Transaction>), Error> {
    let date = request
        .date
        .unwrap_or_else(|| OffsetDateTime::now_utc().date());

    let transaction =
        contribution::contribute_to_goal(&state, user_id, goal_id, request.amount, date)?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

/// A route handler for deleting a savings goal.
///
/// Outstanding contributions are returned to the balance as a single income
/// transaction before the goal disappears from listings.
pub async fn delete_goal_endpoint(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(goal_id): Path<GoalId>,
) -> Result<StatusCode, Error> {
    contribution::delete_goal(&state, user_id, goal_id, OffsetDateTime::now_utc().date())?;

    Ok(StatusCode::NO_CONTENT)
}
