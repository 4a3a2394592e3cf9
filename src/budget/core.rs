//! Core data models and database queries for budgets.
//!
//! A budget owns only its configuration: the category, the limit, and the
//! period it covers. How much of it has been spent is a projection over the
//! ledger, computed on every read so it can never drift from the transaction
//! record.

use rusqlite::{Connection, Row, params};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    category,
    database_id::{BudgetId, CategoryId, UserId},
    ledger::{TransactionFilter, TransactionType, sum_by_filter},
};

/// The default alert threshold, in percent of the budget amount.
const DEFAULT_ALERT_THRESHOLD: i64 = 80;

/// How often a budget resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPeriod {
    /// The budget covers a week.
    Weekly,
    /// The budget covers a calendar month.
    Monthly,
    /// The budget covers a year.
    Yearly,
}

impl BudgetPeriod {
    fn as_column(&self) -> &'static str {
        match self {
            BudgetPeriod::Weekly => "weekly",
            BudgetPeriod::Monthly => "monthly",
            BudgetPeriod::Yearly => "yearly",
        }
    }

    fn from_column(text: &str) -> Option<Self> {
        match text {
            "weekly" => Some(BudgetPeriod::Weekly),
            "monthly" => Some(BudgetPeriod::Monthly),
            "yearly" => Some(BudgetPeriod::Yearly),
            _ => None,
        }
    }
}

/// A spending limit for one category over a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// The ID of the budget.
    pub id: BudgetId,
    /// The user that owns the budget.
    pub user_id: UserId,
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
    pub alert_threshold: i64,
}

/// The data needed to create a budget.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBudget {
    /// The user that owns the budget.
    pub user_id: UserId,
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
    /// Defaults to 80.
    pub alert_threshold: Option<i64>,
}

/// A budget together with its totals derived from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetView {
    /// The budget's configuration.
    #[serde(flatten)]
    pub budget: Budget,
    /// The sum of expense transactions in the budget's category and period.
    pub spent: Decimal,
    /// What is left of the budget amount.
    pub remaining: Decimal,
    /// The spent share of the budget amount, 0-100 with two decimal places.
    pub progress_percentage: Decimal,
}

/// Create the budget table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS budget (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                category_id INTEGER NOT NULL,
                amount TEXT NOT NULL,
                period TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                alert_threshold INTEGER NOT NULL,
                FOREIGN KEY(category_id) REFERENCES category(id)
                )",
        (),
    )?;

    Ok(())
}

/// Create a new budget.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the category does not exist for the user,
/// - or [Error::InvalidAmount] if the amount is zero or negative,
/// - or [Error::InvalidDateRange] if the period ends before it starts,
/// - or [Error::InvalidAlertThreshold] if the threshold is outside 0-100,
/// - or [Error::OverlappingBudget] if a budget for the same category already
///   covers part of the period,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_budget(new_budget: NewBudget, connection: &Connection) -> Result<Budget, Error> {
    category::ensure_visible(new_budget.category_id, new_budget.user_id, connection)?;

    if new_budget.amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount(new_budget.amount));
    }

    if new_budget.end_date < new_budget.start_date {
        return Err(Error::InvalidDateRange(format!(
            "the period ends {} before it starts {}",
            new_budget.end_date, new_budget.start_date
        )));
    }

    let alert_threshold = new_budget.alert_threshold.unwrap_or(DEFAULT_ALERT_THRESHOLD);
    if !(0..=100).contains(&alert_threshold) {
        return Err(Error::InvalidAlertThreshold(alert_threshold));
    }

    let overlapping: i64 = connection.query_row(
        "SELECT COUNT(id) FROM budget
         WHERE user_id = ?1 AND category_id = ?2
           AND NOT (end_date < ?3 OR start_date > ?4)",
        params![
            new_budget.user_id,
            new_budget.category_id,
            new_budget.start_date.to_string(),
            new_budget.end_date.to_string(),
        ],
        |row| row.get(0),
    )?;

    if overlapping > 0 {
        return Err(Error::OverlappingBudget);
    }

    connection.execute(
        "INSERT INTO budget
            (user_id, category_id, amount, period, start_date, end_date, alert_threshold)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            new_budget.user_id,
            new_budget.category_id,
            new_budget.amount.to_string(),
            new_budget.period.as_column(),
            new_budget.start_date,
            new_budget.end_date,
            alert_threshold,
        ],
    )?;

    Ok(Budget {
        id: connection.last_insert_rowid(),
        user_id: new_budget.user_id,
        category_id: new_budget.category_id,
        amount: new_budget.amount,
        period: new_budget.period,
        start_date: new_budget.start_date,
        end_date: new_budget.end_date,
        alert_threshold,
    })
}

/// Retrieve a budget by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a budget owned by the user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_budget(
    id: BudgetId,
    user_id: UserId,
    connection: &Connection,
) -> Result<Budget, Error> {
    let budget = connection
        .prepare(
            "SELECT id, user_id, category_id, amount, period, start_date, end_date, alert_threshold
             FROM budget WHERE id = :id AND user_id = :user_id",
        )?
        .query_row(&[(":id", &id), (":user_id", &user_id)], map_budget_row)?;

    Ok(budget)
}

/// Retrieve the user's budgets, earliest start date first.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn list_budgets(user_id: UserId, connection: &Connection) -> Result<Vec<Budget>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, category_id, amount, period, start_date, end_date, alert_threshold
             FROM budget WHERE user_id = :user_id
             ORDER BY start_date ASC, id ASC",
        )?
        .query_map(&[(":user_id", &user_id)], map_budget_row)?
        .map(|maybe_budget| maybe_budget.map_err(Error::SqlError))
        .collect()
}

/// How much of the budget has been spent: the sum of non-void expense
/// transactions in the budget's category within its period.
///
/// This is always recomputed from the ledger; the budget never stores it.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn spent(budget: &Budget, connection: &Connection) -> Result<Decimal, Error> {
    let filter = TransactionFilter::for_user(budget.user_id)
        .with_type(TransactionType::Expense)
        .in_category(budget.category_id)
        .between(budget.start_date, budget.end_date);

    sum_by_filter(&filter, connection)
}

/// Build the [BudgetView] for a budget by projecting its totals from the
/// ledger.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn view(budget: Budget, connection: &Connection) -> Result<BudgetView, Error> {
    let spent = spent(&budget, connection)?;
    let remaining = budget.amount - spent;
    let progress_percentage = if budget.amount > Decimal::ZERO {
        (spent / budget.amount * Decimal::ONE_HUNDRED).round_dp(2)
    } else {
        Decimal::ZERO
    };

    Ok(BudgetView {
        budget,
        spent,
        remaining,
        progress_percentage,
    })
}

/// Map a database row to a [Budget].
fn map_budget_row(row: &Row) -> Result<Budget, rusqlite::Error> {
    let amount_text: String = row.get(3)?;
    let amount = amount_text.parse::<Decimal>().map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(error))
    })?;

    let period_text: String = row.get(4)?;
    let period = BudgetPeriod::from_column(&period_text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unrecognised budget period {period_text:?}").into(),
        )
    })?;

    Ok(Budget {
        id: row.get(0)?,
        user_id: row.get(1)?,
        category_id: row.get(2)?,
        amount,
        period,
        start_date: row.get(5)?,
        end_date: row.get(6)?,
        alert_threshold: row.get(7)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
