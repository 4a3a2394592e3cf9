//! Database ID type definitions.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;
/// The ID of a user, as resolved by the fronting session layer.
pub type UserId = i64;
/// The ID of a ledger transaction.
pub type TransactionId = i64;
/// The ID of a spending category.
pub type CategoryId = i64;
/// The ID of a budget.
pub type BudgetId = i64;
/// The ID of a savings goal.
pub type GoalId = i64;
