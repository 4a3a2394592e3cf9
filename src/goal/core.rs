//! Core data models and database queries for savings goals.
//!
//! A goal owns its name, target, and deadline. How much has been saved toward
//! it is a projection over the ledger: the sum of the goal's contribution
//! transactions minus its refunds. Deleted goals stay in the table but never
//! show up in queries again; their committed funds are returned through the
//! ledger by the contribution coordinator.

use rusqlite::{Connection, Row, params};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    database_id::{GoalId, UserId},
    ledger,
};

/// Where a savings goal is in its lifecycle.
///
/// Only `Active` is stored; `Completed` is derived on read by comparing the
/// goal's ledger-projected amount against its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    /// The goal is accepting contributions.
    Active,
    /// The projected amount has reached the target.
    Completed,
}

/// A savings target the user commits money toward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsGoal {
    /// The ID of the goal.
    pub id: GoalId,
    /// The user that owns the goal.
    pub user_id: UserId,
    /// The display name of the goal, e.g. "Emergency fund".
    pub name: String,
    /// The amount the user wants to save.
    pub target_amount: Decimal,
    /// The date the user wants to reach the target by, if any.
    pub deadline: Option<Date>,
}

/// The data needed to create a savings goal.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGoal {
    /// The user that owns the goal.
    pub user_id: UserId,
    /// The display name of the goal.
    pub name: String,
    /// The amount the user wants to save.
    pub target_amount: Decimal,
    /// The date the user wants to reach the target by, if any.
    pub deadline: Option<Date>,
}

/// A savings goal together with its totals derived from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalView {
    /// The goal's configuration.
    #[serde(flatten)]
    pub goal: SavingsGoal,
    /// The net amount committed so far: contributions minus refunds.
    pub current_amount: Decimal,
    /// The saved share of the target, 0-100 with two decimal places.
    pub progress_percentage: Decimal,
    /// Whether the goal is still collecting or already reached its target.
    pub status: GoalStatus,
}

/// Create the savings goal table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_goal_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS savings_goal (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                target_amount TEXT NOT NULL,
                deadline TEXT,
                deleted INTEGER NOT NULL DEFAULT 0
                )",
        (),
    )?;

    Ok(())
}

/// Create a new savings goal.
///
/// `today` anchors the deadline validation; deadlines before it are rejected.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyGoalName] if the name is empty,
/// - or [Error::InvalidAmount] if the target is zero or negative,
/// - or [Error::DeadlineInPast] if the deadline is before `today`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_goal(
    new_goal: NewGoal,
    today: Date,
    connection: &Connection,
) -> Result<SavingsGoal, Error> {
    if new_goal.name.trim().is_empty() {
        return Err(Error::EmptyGoalName);
    }

    if new_goal.target_amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount(new_goal.target_amount));
    }

    if let Some(deadline) = new_goal.deadline
        && deadline < today
    {
        return Err(Error::DeadlineInPast(deadline));
    }

    connection.execute(
        "INSERT INTO savings_goal (user_id, name, target_amount, deadline, deleted)
         VALUES (?1, ?2, ?3, ?4, 0)",
        params![
            new_goal.user_id,
            new_goal.name,
            new_goal.target_amount.to_string(),
            new_goal.deadline,
        ],
    )?;

    Ok(SavingsGoal {
        id: connection.last_insert_rowid(),
        user_id: new_goal.user_id,
        name: new_goal.name,
        target_amount: new_goal.target_amount,
        deadline: new_goal.deadline,
    })
}

/// Retrieve a goal by its `id`.
///
/// Deleted goals are treated as absent.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a live goal owned by the
///   user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_goal(id: GoalId, user_id: UserId, connection: &Connection) -> Result<SavingsGoal, Error> {
    let goal = connection
        .prepare(
            "SELECT id, user_id, name, target_amount, deadline FROM savings_goal
             WHERE id = :id AND user_id = :user_id AND deleted = 0",
        )?
        .query_row(&[(":id", &id), (":user_id", &user_id)], map_goal_row)?;

    Ok(goal)
}

/// Retrieve the user's live goals in creation order.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn list_goals(user_id: UserId, connection: &Connection) -> Result<Vec<SavingsGoal>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, name, target_amount, deadline FROM savings_goal
             WHERE user_id = :user_id AND deleted = 0
             ORDER BY id ASC",
        )?
        .query_map(&[(":user_id", &user_id)], map_goal_row)?
        .map(|maybe_goal| maybe_goal.map_err(Error::SqlError))
        .collect()
}

/// Mark a goal deleted so it disappears from every query.
///
/// The row is kept so the refund transaction's origin keeps pointing at a
/// record of what it refunded. Called by the contribution coordinator inside
/// the same SQL transaction as the refund append.
pub(crate) fn mark_deleted(
    id: GoalId,
    user_id: UserId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_changed = connection.execute(
        "UPDATE savings_goal SET deleted = 1 WHERE id = ?1 AND user_id = ?2 AND deleted = 0",
        params![id, user_id],
    )?;

    if rows_changed == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// The net amount committed to the goal so far, projected from the ledger.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn current_amount(goal: &SavingsGoal, connection: &Connection) -> Result<Decimal, Error> {
    ledger::goal_net_amount(goal.user_id, goal.id, connection)
}

/// Build the [GoalView] for a goal by projecting its totals from the ledger.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn view(goal: SavingsGoal, connection: &Connection) -> Result<GoalView, Error> {
    let current_amount = current_amount(&goal, connection)?;
    let progress_percentage = if goal.target_amount > Decimal::ZERO {
        (current_amount / goal.target_amount * Decimal::ONE_HUNDRED).round_dp(2)
    } else {
        Decimal::ZERO
    };
    let status = if current_amount >= goal.target_amount {
        GoalStatus::Completed
    } else {
        GoalStatus::Active
    };

    Ok(GoalView {
        goal,
        current_amount,
        progress_percentage,
        status,
    })
}

/// Map a database row to a [SavingsGoal].
fn map_goal_row(row: &Row) -> Result<SavingsGoal, rusqlite::Error> {
    let target_text: String = row.get(3)?;
    let target_amount = target_text.parse::<Decimal>().map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(error))
    })?;

    Ok(SavingsGoal {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        target_amount,
        deadline: row.get(4)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
