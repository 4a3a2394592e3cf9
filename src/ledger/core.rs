//! Core data models and database queries for the transaction ledger.
//!
//! The ledger is the single source of truth for all monetary totals. Rows are
//! never physically deleted: retracting a transaction marks it void so the
//! audit trail survives while every aggregate ignores it. Each mutation bumps
//! the owning user's ledger version inside the same SQL transaction, so the
//! bump is durable and visible before the mutating call returns.

use rusqlite::{
    Connection, OptionalExtension, Row, Transaction as SqlTransaction, TransactionBehavior, params,
    params_from_iter, types::Value,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    category,
    database_id::{BudgetId, CategoryId, GoalId, TransactionId, UserId},
};

// ============================================================================
// MODELS
// ============================================================================

/// Whether a transaction adds to or subtracts from the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Money earned, adds to the balance.
    Income,
    /// Money spent, subtracts from the balance.
    Expense,
}

impl TransactionType {
    fn as_column(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }

    fn from_column(text: &str) -> Option<Self> {
        match text {
            "income" => Some(TransactionType::Income),
            "expense" => Some(TransactionType::Expense),
            _ => None,
        }
    }
}

/// Where a transaction came from.
///
/// Most transactions are entered by hand, but budget and savings goal actions
/// also generate ledger entries. The origin tag keeps those entries traceable
/// to the construct that created them while the ledger stays a single
/// homogeneous table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Origin {
    /// Entered directly by the user.
    Manual,
    /// Generated by a contribution to a budget.
    BudgetContribution(BudgetId),
    /// Generated by a contribution to a savings goal.
    GoalContribution(GoalId),
    /// Generated when a savings goal with outstanding contributions was
    /// deleted, returning the committed funds to the balance.
    GoalRefund(GoalId),
}

impl Origin {
    fn kind_column(&self) -> &'static str {
        match self {
            Origin::Manual => "manual",
            Origin::BudgetContribution(_) => "budget_contribution",
            Origin::GoalContribution(_) => "goal_contribution",
            Origin::GoalRefund(_) => "goal_refund",
        }
    }

    fn ref_column(&self) -> Option<i64> {
        match self {
            Origin::Manual => None,
            Origin::BudgetContribution(id) => Some(*id),
            Origin::GoalContribution(id) | Origin::GoalRefund(id) => Some(*id),
        }
    }

    fn from_columns(kind: &str, ref_id: Option<i64>) -> Option<Self> {
        match (kind, ref_id) {
            ("manual", None) => Some(Origin::Manual),
            ("budget_contribution", Some(id)) => Some(Origin::BudgetContribution(id)),
            ("goal_contribution", Some(id)) => Some(Origin::GoalContribution(id)),
            ("goal_refund", Some(id)) => Some(Origin::GoalRefund(id)),
            _ => None,
        }
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user the transaction belongs to.
    pub user_id: UserId,
    /// Whether the transaction is income or an expense.
    pub transaction_type: TransactionType,
    /// The amount of money spent or earned, always positive.
    pub amount: Decimal,
    /// The ID of the category the transaction belongs to, if any.
    pub category_id: Option<CategoryId>,
    /// A text description of what the transaction was for.
    pub description: String,
    /// When the transaction happened.
    pub date: Date,
    /// Where the transaction came from.
    pub origin: Origin,
    /// Whether the transaction has been retracted.
    ///
    /// Void transactions stay in the table for audit but are excluded from
    /// every aggregate.
    pub void: bool,
}

/// The data needed to append a new transaction to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// The user the transaction belongs to.
    pub user_id: UserId,
    /// Whether the transaction is income or an expense.
    pub transaction_type: TransactionType,
    /// The amount of money spent or earned, must be positive.
    pub amount: Decimal,
    /// The ID of the category the transaction belongs to, if any.
    pub category_id: Option<CategoryId>,
    /// A text description of what the transaction was for.
    pub description: String,
    /// When the transaction happened.
    pub date: Date,
    /// Where the transaction came from.
    pub origin: Origin,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

const TRANSACTION_COLUMNS: &str =
    "id, user_id, transaction_type, amount, category_id, description, date, origin, origin_id, void";

/// Create the ledger tables in the database.
///
/// # Errors
/// Returns an error if the tables cannot be created or if there is an SQL error.
pub fn create_ledger_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                transaction_type TEXT NOT NULL,
                amount TEXT NOT NULL,
                category_id INTEGER,
                description TEXT NOT NULL,
                date TEXT NOT NULL,
                origin TEXT NOT NULL,
                origin_id INTEGER,
                void INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY(category_id) REFERENCES category(id)
                )",
        (),
    )?;

    // Composite index used by the date windowed analytics queries.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_date
         ON \"transaction\"(user_id, date)",
        (),
    )?;

    connection.execute(
        "CREATE TABLE IF NOT EXISTS ledger_version (
                user_id INTEGER PRIMARY KEY,
                version INTEGER NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Append a transaction to the ledger and bump the owner's ledger version.
///
/// Both happen in one SQL transaction so a crash cannot leave a row without
/// its version bump.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the amount is zero or negative,
/// - or [Error::NotFound] if the category does not exist for the user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn append(
    new_transaction: NewTransaction,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let sql_transaction =
        SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    let transaction = append_within(new_transaction, &sql_transaction)?;

    sql_transaction.commit()?;

    Ok(transaction)
}

/// Append a transaction without opening a new SQL transaction.
///
/// Callers that need to combine the append with other statements (e.g. the
/// savings goal deletion, which also flips the goal's status) open their own
/// SQL transaction and call this inside it.
pub(crate) fn append_within(
    new_transaction: NewTransaction,
    connection: &Connection,
) -> Result<Transaction, Error> {
    if new_transaction.amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount(new_transaction.amount));
    }

    if let Some(category_id) = new_transaction.category_id {
        category::ensure_visible(category_id, new_transaction.user_id, connection)?;
    }

    connection.execute(
        "INSERT INTO \"transaction\"
            (user_id, transaction_type, amount, category_id, description, date, origin, origin_id, void)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)",
        params![
            new_transaction.user_id,
            new_transaction.transaction_type.as_column(),
            new_transaction.amount.to_string(),
            new_transaction.category_id,
            new_transaction.description,
            new_transaction.date,
            new_transaction.origin.kind_column(),
            new_transaction.origin.ref_column(),
        ],
    )?;

    let id = connection.last_insert_rowid();

    bump_version(new_transaction.user_id, connection)?;

    Ok(Transaction {
        id,
        user_id: new_transaction.user_id,
        transaction_type: new_transaction.transaction_type,
        amount: new_transaction.amount,
        category_id: new_transaction.category_id,
        description: new_transaction.description,
        date: new_transaction.date,
        origin: new_transaction.origin,
        void: false,
    })
}

/// Mark a transaction void and bump the owner's ledger version.
///
/// The row is kept so the audit trail is preserved; every aggregate ignores
/// void rows.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the id is unknown, belongs to another user, or the
///   transaction is already void,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn void(
    transaction_id: TransactionId,
    user_id: UserId,
    connection: &Connection,
) -> Result<(), Error> {
    let sql_transaction =
        SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    let rows_changed = sql_transaction.execute(
        "UPDATE \"transaction\" SET void = 1 WHERE id = ?1 AND user_id = ?2 AND void = 0",
        params![transaction_id, user_id],
    )?;

    if rows_changed == 0 {
        return Err(Error::NotFound);
    }

    bump_version(user_id, &sql_transaction)?;
    sql_transaction.commit()?;

    Ok(())
}

fn bump_version(user_id: UserId, connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "INSERT INTO ledger_version (user_id, version) VALUES (?1, 1)
         ON CONFLICT(user_id) DO UPDATE SET version = version + 1",
        params![user_id],
    )?;

    Ok(())
}

/// Get the user's current ledger version.
///
/// The version starts at zero and increases by one on every ledger mutation.
/// The analytics cache uses it to gate entry validity.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn current_version(user_id: UserId, connection: &Connection) -> Result<i64, Error> {
    let version = connection
        .query_row(
            "SELECT version FROM ledger_version WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()?;

    Ok(version.unwrap_or(0))
}

/// A predicate over ledger transactions used for read-only aggregation.
///
/// Void transactions are always excluded.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionFilter {
    user_id: UserId,
    transaction_type: Option<TransactionType>,
    category_id: Option<CategoryId>,
    origin: Option<Origin>,
    date_range: Option<(Date, Date)>,
}

impl TransactionFilter {
    /// Create a filter matching all of the user's non-void transactions.
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id,
            transaction_type: None,
            category_id: None,
            origin: None,
            date_range: None,
        }
    }

    /// Restrict the filter to one transaction type.
    pub fn with_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = Some(transaction_type);
        self
    }

    /// Restrict the filter to one category.
    pub fn in_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Restrict the filter to transactions with the given origin.
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Restrict the filter to an inclusive date range.
    pub fn between(mut self, from: Date, to: Date) -> Self {
        self.date_range = Some((from, to));
        self
    }

    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses = vec!["user_id = ?".to_owned(), "void = 0".to_owned()];
        let mut parameters = vec![Value::Integer(self.user_id)];

        if let Some(transaction_type) = self.transaction_type {
            clauses.push("transaction_type = ?".to_owned());
            parameters.push(Value::Text(transaction_type.as_column().to_owned()));
        }

        if let Some(category_id) = self.category_id {
            clauses.push("category_id = ?".to_owned());
            parameters.push(Value::Integer(category_id));
        }

        if let Some(origin) = self.origin {
            clauses.push("origin = ?".to_owned());
            parameters.push(Value::Text(origin.kind_column().to_owned()));

            if let Some(ref_id) = origin.ref_column() {
                clauses.push("origin_id = ?".to_owned());
                parameters.push(Value::Integer(ref_id));
            }
        }

        if let Some((from, to)) = self.date_range {
            clauses.push("date BETWEEN ? AND ?".to_owned());
            parameters.push(Value::Text(from.to_string()));
            parameters.push(Value::Text(to.to_string()));
        }

        (clauses.join(" AND "), parameters)
    }
}

/// Sum the amounts of the transactions matching `filter`.
///
/// Amounts are stored as fixed point decimal text, so the fold happens here
/// rather than in SQL. Results are never cached at this layer; caching
/// happens one layer up where the full query parameters are known.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn sum_by_filter(filter: &TransactionFilter, connection: &Connection) -> Result<Decimal, Error> {
    let (where_clause, parameters) = filter.where_clause();
    let query = format!("SELECT amount FROM \"transaction\" WHERE {where_clause}");

    let amounts = connection
        .prepare(&query)?
        .query_map(params_from_iter(parameters), |row| amount_from_row(row, 0))?
        .collect::<Result<Vec<Decimal>, rusqlite::Error>>()?;

    Ok(amounts.into_iter().sum())
}

/// Retrieve the user's non-void transactions within an inclusive date range,
/// oldest first.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn transactions_in_range(
    user_id: UserId,
    from: Date,
    to: Date,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let query = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
         WHERE user_id = ?1 AND void = 0 AND date BETWEEN ?2 AND ?3
         ORDER BY date ASC, id ASC"
    );

    connection
        .prepare(&query)?
        .query_map(
            params![user_id, from.to_string(), to.to_string()],
            map_transaction_row,
        )?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::SqlError))
        .collect()
}

/// Retrieve the user's most recent non-void transactions, newest first, at
/// most `limit` of them.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn recent(
    user_id: UserId,
    limit: u32,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let query = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
         WHERE user_id = ?1 AND void = 0
         ORDER BY date DESC, id DESC
         LIMIT ?2"
    );

    connection
        .prepare(&query)?
        .query_map(params![user_id, limit], map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::SqlError))
        .collect()
}

/// The net amount committed to a savings goal: contributions minus refunds,
/// ignoring void rows.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn goal_net_amount(
    user_id: UserId,
    goal_id: GoalId,
    connection: &Connection,
) -> Result<Decimal, Error> {
    let contributed = sum_by_filter(
        &TransactionFilter::for_user(user_id).with_origin(Origin::GoalContribution(goal_id)),
        connection,
    )?;
    let refunded = sum_by_filter(
        &TransactionFilter::for_user(user_id).with_origin(Origin::GoalRefund(goal_id)),
        connection,
    )?;

    Ok(contributed - refunded)
}

/// Map a database row to a [Transaction].
fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let transaction_type_text: String = row.get(2)?;
    let transaction_type = TransactionType::from_column(&transaction_type_text)
        .ok_or_else(|| invalid_column(2, &transaction_type_text))?;

    let origin_text: String = row.get(7)?;
    let origin_ref: Option<i64> = row.get(8)?;
    let origin = Origin::from_columns(&origin_text, origin_ref)
        .ok_or_else(|| invalid_column(7, &origin_text))?;

    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        transaction_type,
        amount: amount_from_row(row, 3)?,
        category_id: row.get(4)?,
        description: row.get(5)?,
        date: row.get(6)?,
        origin,
        void: row.get(9)?,
    })
}

fn amount_from_row(row: &Row, index: usize) -> Result<Decimal, rusqlite::Error> {
    let text: String = row.get(index)?;

    text.parse::<Decimal>().map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Text,
            Box::new(error),
        )
    })
}

fn invalid_column(index: usize, text: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        rusqlite::types::Type::Text,
        format!("unrecognised column value {text:?}").into(),
    )
}

// ============================================================================
// TESTS
// ============================================================================
