//! HTTP handlers for creating, retracting, and listing transactions.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    AppState, Error,
    auth::CurrentUser,
    cache::{CacheKey, Metric},
    contribution,
    database_id::{CategoryId, TransactionId},
    ledger::{self, NewTransaction, Origin, Transaction, TransactionType},
};

/// How many transactions the recent list returns when no limit is given.
const DEFAULT_RECENT_LIMIT: u32 = 10;

/// The request body for creating a transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTransactionRequest {
    /// Whether the transaction is income or an expense.
    pub transaction_type: TransactionType,
    /// The amount of money spent or earned, must be positive.
    pub amount: Decimal,
    /// The ID of the category the transaction belongs to, if any.
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    /// A text description of what the transaction was for.
    #[serde(default)]
    pub description: String,
    /// When the transaction happened.
    pub date: Date,
}

/// A route handler for recording a manually entered transaction.
pub async fn create_transaction_endpoint(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<Transaction>), Error> {
    let transaction = contribution::record_transaction(
        &state,
        NewTransaction {
            user_id,
            transaction_type: request.transaction_type,
            amount: request.amount,
            category_id: request.category_id,
            description: request.description,
            date: request.date,
            origin: Origin::Manual,
        },
    )?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

/// A route handler for retracting a transaction.
///
/// The transaction is marked void rather than deleted so the audit trail
/// survives.
pub async fn delete_transaction_endpoint(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(transaction_id): Path<TransactionId>,
) -> Result<StatusCode, Error> {
    contribution::retract_transaction(&state, user_id, transaction_id)?;

    Ok(StatusCode::NO_CONTENT)
}

/// The query parameters for the recent transactions list.
#[derive(Debug, Clone, Deserialize)]
pub struct RecentQuery {
    /// At most how many transactions to return. Defaults to 10.
    #[serde(default)]
    pub limit: Option<u32>,
}

/// The full parameter set the recent transactions cache key encodes.
#[derive(Debug, Clone, Serialize)]
struct RecentKey {
    limit: u32,
}

/// A route handler for the user's most recent transactions, newest first.
pub async fn recent_transactions_endpoint(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<Transaction>>, Error> {
    let limit = match query.limit {
        Some(limit) if limit > 0 => limit,
        _ => DEFAULT_RECENT_LIMIT,
    };

    let version = {
        let connection = state.connection()?;
        ledger::current_version(user_id, &connection)?
    };

    let key = CacheKey::new(user_id, Metric::RecentTransactions, &RecentKey { limit })?;
    let transactions = state.cache.get_or_compute(key, version, || {
        let connection = state.connection()?;
        ledger::recent(user_id, limit, &connection)
    })?;

    Ok(Json(transactions))
}
