//! Coordinates user actions that mutate the ledger.
//!
//! Budget contributions, savings goal contributions, and savings goal
//! deletions all create or retract ledger entries as side effects. This
//! module is the only place those side effects happen, so every one of them
//! follows the same discipline:
//!
//! 1. take the user's mutation lock,
//! 2. validate, then write to the ledger (row + version bump in one SQL
//!    transaction),
//! 3. synchronously invalidate the affected cache metrics before returning.
//!
//! If step 3 fails after its internal retries the whole operation reports
//! [Error::ConsistencyFailure]; a silently stale cache is not an acceptable
//! outcome.

use rusqlite::{Transaction as SqlTransaction, TransactionBehavior};
use rust_decimal::Decimal;
use time::Date;

use crate::{
    AppState, Error, budget,
    cache::Metric,
    database_id::{BudgetId, GoalId, TransactionId, UserId},
    goal::{self, GoalStatus},
    ledger::{self, NewTransaction, Origin, Transaction, TransactionType},
};

/// The metrics every ledger mutation invalidates, plus the budget list,
/// whose derived spent totals shift with any categorised expense.
const LEDGER_AND_BUDGET_METRICS: &[Metric] = &[
    Metric::DashboardSummary,
    Metric::CategoryBreakdown,
    Metric::MonthlyTrends,
    Metric::RecentTransactions,
    Metric::Predictions,
    Metric::Budgets,
];

/// The metrics every ledger mutation invalidates, plus the goal list, whose
/// derived amounts are projected from contribution and refund entries.
const LEDGER_AND_GOAL_METRICS: &[Metric] = &[
    Metric::DashboardSummary,
    Metric::CategoryBreakdown,
    Metric::MonthlyTrends,
    Metric::RecentTransactions,
    Metric::Predictions,
    Metric::Goals,
];

/// Every cacheable metric; used when retracting, since the retracted row may
/// have originated anywhere.
const ALL_METRICS: &[Metric] = &[
    Metric::DashboardSummary,
    Metric::CategoryBreakdown,
    Metric::MonthlyTrends,
    Metric::RecentTransactions,
    Metric::Predictions,
    Metric::Budgets,
    Metric::Goals,
];

/// Append a manually entered transaction to the ledger.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the amount is zero or negative,
/// - or [Error::NotFound] if the category does not exist for the user,
/// - or [Error::ConsistencyFailure] if the cache could not be invalidated
///   after the write,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn record_transaction(
    state: &AppState,
    new_transaction: NewTransaction,
) -> Result<Transaction, Error> {
    let user_id = new_transaction.user_id;
    let user_lock = state.user_locks.lock_for(user_id)?;
    let _guard = user_lock.lock().map_err(|_| Error::DatabaseLockError)?;

    let transaction = {
        let connection = state.connection()?;
        ledger::append(new_transaction, &connection)?
    };

    state.cache.invalidate(user_id, LEDGER_AND_BUDGET_METRICS)?;

    Ok(transaction)
}

/// Retract a transaction, keeping its row for audit.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the id is unknown, belongs to another user, or is
///   already void,
/// - or [Error::ConsistencyFailure] if the cache could not be invalidated
///   after the write,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn retract_transaction(
    state: &AppState,
    user_id: UserId,
    transaction_id: TransactionId,
) -> Result<(), Error> {
    let user_lock = state.user_locks.lock_for(user_id)?;
    let _guard = user_lock.lock().map_err(|_| Error::DatabaseLockError)?;

    {
        let connection = state.connection()?;
        ledger::void(transaction_id, user_id, &connection)?;
    }

    state.cache.invalidate(user_id, ALL_METRICS)?;

    Ok(())
}

/// Commit money toward a budget.
///
/// The contribution is recorded as an expense in the budget's category with
/// a description carrying a contribution marker, so downstream reporting can
/// tell it apart from plain spending. The budget's derived spent total rises
/// by exactly the contributed amount.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the budget is absent,
/// - or [Error::InvalidAmount] if the amount is zero or negative,
/// - or [Error::ConsistencyFailure] if the cache could not be invalidated
///   after the write,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn contribute_to_budget(
    state: &AppState,
    user_id: UserId,
    budget_id: BudgetId,
    amount: Decimal,
    description: Option<String>,
    date: Date,
) -> Result<Transaction, Error> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount(amount));
    }

    let user_lock = state.user_locks.lock_for(user_id)?;
    let _guard = user_lock.lock().map_err(|_| Error::DatabaseLockError)?;

    let transaction = {
        let connection = state.connection()?;
        let budget = budget::get_budget(budget_id, user_id, &connection)?;

        let description = match description {
            Some(text) if !text.trim().is_empty() => format!("Budget contribution: {text}"),
            _ => "Budget contribution".to_owned(),
        };

        ledger::append(
            NewTransaction {
                user_id,
                transaction_type: TransactionType::Expense,
                amount,
                category_id: Some(budget.category_id),
                description,
                date,
                origin: Origin::BudgetContribution(budget.id),
            },
            &connection,
        )?
    };

    state.cache.invalidate(user_id, LEDGER_AND_BUDGET_METRICS)?;

    Ok(transaction)
}

/// Commit money toward a savings goal.
///
/// The contribution is recorded as an uncategorised expense tagged with the
/// goal's name. The goal's current amount is never touched directly; it
/// changes only because the next read projects this entry.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the goal is absent or deleted,
/// - or [Error::GoalNotActive] if the goal already reached its target,
/// - or [Error::InvalidAmount] if the amount is zero or negative,
/// - or [Error::ConsistencyFailure] if the cache could not be invalidated
///   after the write,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn contribute_to_goal(
    state: &AppState,
    user_id: UserId,
    goal_id: GoalId,
    amount: Decimal,
    date: Date,
) -> Result<Transaction, Error> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount(amount));
    }

    let user_lock = state.user_locks.lock_for(user_id)?;
    let _guard = user_lock.lock().map_err(|_| Error::DatabaseLockError)?;

    let transaction = {
        let connection = state.connection()?;
        let goal = goal::get_goal(goal_id, user_id, &connection)?;

        if goal::view(goal.clone(), &connection)?.status != GoalStatus::Active {
            return Err(Error::GoalNotActive);
        }

        ledger::append(
            NewTransaction {
                user_id,
                transaction_type: TransactionType::Expense,
                amount,
                category_id: None,
                description: format!("Savings goal contribution: {}", goal.name),
                date,
                origin: Origin::GoalContribution(goal.id),
            },
            &connection,
        )?
    };

    state.cache.invalidate(user_id, LEDGER_AND_GOAL_METRICS)?;

    Ok(transaction)
}

/// Delete a savings goal, returning its committed funds to the balance.
///
/// The goal's contributions already reduced the balance as expenses, so
/// deleting the goal before the target is reached must give that capacity
/// back. One income transaction is appended for the goal's *net* contributed
/// amount (contributions minus earlier refunds) rather than one per original
/// contribution, and the original expense rows are left untouched: the full
/// history stays readable while the net balance returns to its
/// pre-contribution value. Goals with nothing outstanding are removed without
/// a refund.
///
/// The refund append and the goal's status flip share one SQL transaction,
/// so the two effects are atomic.
///
/// Returns the refund transaction, if one was created.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the goal is absent or already deleted,
/// - or [Error::ConsistencyFailure] if the cache could not be invalidated
///   after the write,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_goal(
    state: &AppState,
    user_id: UserId,
    goal_id: GoalId,
    today: Date,
) -> Result<Option<Transaction>, Error> {
    let user_lock = state.user_locks.lock_for(user_id)?;
    let _guard = user_lock.lock().map_err(|_| Error::DatabaseLockError)?;

    let refund = {
        let connection = state.connection()?;
        let goal = goal::get_goal(goal_id, user_id, &connection)?;
        let net_amount = ledger::goal_net_amount(user_id, goal_id, &connection)?;

        let sql_transaction =
            SqlTransaction::new_unchecked(&connection, TransactionBehavior::Exclusive)?;

        let refund = if net_amount > Decimal::ZERO {
            Some(ledger::append_within(
                NewTransaction {
                    user_id,
                    transaction_type: TransactionType::Income,
                    amount: net_amount,
                    category_id: None,
                    description: format!("Savings goal deleted: {} (returned)", goal.name),
                    date: today,
                    origin: Origin::GoalRefund(goal.id),
                },
                &sql_transaction,
            )?)
        } else {
            None
        };

        goal::mark_deleted(goal_id, user_id, &sql_transaction)?;
        sql_transaction.commit()?;

        refund
    };

    state.cache.invalidate(user_id, LEDGER_AND_GOAL_METRICS)?;

    Ok(refund)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use rust_decimal::Decimal;
    use serde::{Deserialize, Serialize};
    use time::macros::date;

    use crate::{
        AppState, Error,
        budget::{self, BudgetPeriod, NewBudget},
        cache::{CacheKey, Metric},
        category::create_category,
        contribution::{
            contribute_to_budget, contribute_to_goal, delete_goal, record_transaction,
            retract_transaction,
        },
        goal::{self, NewGoal},
        ledger::{
            NewTransaction, Origin, TransactionFilter, TransactionType, sum_by_filter,
        },
    };

    const USER: i64 = 1;
    const TODAY: time::Date = date!(2025 - 10 - 05);

    fn get_test_state() -> AppState {
        let conn = Connection::open_in_memory().unwrap();
        AppState::new(conn).expect("could not create app state")
    }

    fn manual_expense(amount: Decimal, category_id: Option<i64>) -> NewTransaction {
        NewTransaction {
            user_id: USER,
            transaction_type: TransactionType::Expense,
            amount,
            category_id,
            description: "weekly shop".to_owned(),
            date: TODAY,
            origin: Origin::Manual,
        }
    }

    fn create_test_budget(state: &AppState) -> budget::Budget {
        let connection = state.connection().unwrap();
        let category = create_category("Coffee", USER, &connection).unwrap();
        budget::create_budget(
            NewBudget {
                user_id: USER,
                category_id: category.id,
                amount: Decimal::new(20000, 2),
                period: BudgetPeriod::Monthly,
                start_date: date!(2025 - 10 - 01),
                end_date: date!(2025 - 10 - 31),
                alert_threshold: None,
            },
            &connection,
        )
        .unwrap()
    }

    fn create_test_goal(state: &AppState, target: Decimal) -> goal::SavingsGoal {
        let connection = state.connection().unwrap();
        goal::create_goal(
            NewGoal {
                user_id: USER,
                name: "Holiday".to_owned(),
                target_amount: target,
                deadline: None,
            },
            TODAY,
            &connection,
        )
        .unwrap()
    }

    fn balance(state: &AppState) -> Decimal {
        let connection = state.connection().unwrap();
        let income = sum_by_filter(
            &TransactionFilter::for_user(USER).with_type(TransactionType::Income),
            &connection,
        )
        .unwrap();
        let expenses = sum_by_filter(
            &TransactionFilter::for_user(USER).with_type(TransactionType::Expense),
            &connection,
        )
        .unwrap();
        income - expenses
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct WindowParams {
        months: u32,
    }

    /// Prime a cache entry for each window size of the monthly trends metric.
    fn prime_trends_cache(state: &AppState) {
        for months in [3u32, 6] {
            let key = CacheKey::new(USER, Metric::MonthlyTrends, &WindowParams { months }).unwrap();
            let _: u32 = state.cache.get_or_compute(key, 0, || Ok(months)).unwrap();
        }
    }

    #[test]
    fn recording_a_transaction_invalidates_every_window_variant() {
        let state = get_test_state();
        prime_trends_cache(&state);
        assert_eq!(state.cache.entry_count(), 2);

        record_transaction(&state, manual_expense(Decimal::TEN, None)).unwrap();

        assert_eq!(state.cache.entry_count(), 0);
    }

    #[test]
    fn retracting_restores_the_previous_totals() {
        let state = get_test_state();
        let transaction =
            record_transaction(&state, manual_expense(Decimal::new(4200, 2), None)).unwrap();
        assert_eq!(balance(&state), Decimal::new(-4200, 2));

        retract_transaction(&state, USER, transaction.id).unwrap();

        assert_eq!(balance(&state), Decimal::ZERO);
    }

    #[test]
    fn retracting_twice_fails() {
        let state = get_test_state();
        let transaction = record_transaction(&state, manual_expense(Decimal::TEN, None)).unwrap();
        retract_transaction(&state, USER, transaction.id).unwrap();

        assert_eq!(
            retract_transaction(&state, USER, transaction.id),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn budget_contribution_is_marked_and_raises_spent() {
        let state = get_test_state();
        let test_budget = create_test_budget(&state);

        let transaction = contribute_to_budget(
            &state,
            USER,
            test_budget.id,
            Decimal::new(2500, 2),
            Some("october top up".to_owned()),
            TODAY,
        )
        .expect("could not contribute to budget");

        assert_eq!(transaction.transaction_type, TransactionType::Expense);
        assert_eq!(transaction.category_id, Some(test_budget.category_id));
        assert_eq!(transaction.origin, Origin::BudgetContribution(test_budget.id));
        assert!(
            transaction.description.to_lowercase().contains("contribution"),
            "description {:?} should carry the contribution marker",
            transaction.description
        );

        let connection = state.connection().unwrap();
        assert_eq!(
            budget::spent(&test_budget, &connection).unwrap(),
            Decimal::new(2500, 2)
        );
    }

    #[test]
    fn budget_contribution_fails_for_missing_budget() {
        let state = get_test_state();

        let result = contribute_to_budget(&state, USER, 42, Decimal::TEN, None, TODAY);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn budget_contribution_fails_for_non_positive_amount() {
        let state = get_test_state();
        let test_budget = create_test_budget(&state);

        let result =
            contribute_to_budget(&state, USER, test_budget.id, Decimal::ZERO, None, TODAY);

        assert_eq!(result, Err(Error::InvalidAmount(Decimal::ZERO)));
    }

    #[test]
    fn goal_contribution_references_the_goal() {
        let state = get_test_state();
        let test_goal = create_test_goal(&state, Decimal::new(50000, 2));

        let transaction =
            contribute_to_goal(&state, USER, test_goal.id, Decimal::new(12500, 2), TODAY)
                .expect("could not contribute to goal");

        assert_eq!(transaction.transaction_type, TransactionType::Expense);
        assert_eq!(transaction.origin, Origin::GoalContribution(test_goal.id));
        assert!(transaction.description.contains("Holiday"));

        let connection = state.connection().unwrap();
        let current = goal::current_amount(&test_goal, &connection).unwrap();
        assert_eq!(current, Decimal::new(12500, 2));
    }

    #[test]
    fn goal_contribution_fails_once_the_target_is_reached() {
        let state = get_test_state();
        let test_goal = create_test_goal(&state, Decimal::new(10000, 2));
        contribute_to_goal(&state, USER, test_goal.id, Decimal::new(10000, 2), TODAY).unwrap();

        let result =
            contribute_to_goal(&state, USER, test_goal.id, Decimal::new(100, 2), TODAY);

        assert_eq!(result, Err(Error::GoalNotActive));
    }

    #[test]
    fn deleting_a_goal_refunds_the_net_amount_as_income() {
        let state = get_test_state();
        let test_goal = create_test_goal(&state, Decimal::new(50000, 2));
        let balance_before = balance(&state);
        contribute_to_goal(&state, USER, test_goal.id, Decimal::new(12500, 2), TODAY).unwrap();
        contribute_to_goal(&state, USER, test_goal.id, Decimal::new(7500, 2), TODAY).unwrap();
        assert_eq!(balance(&state), balance_before - Decimal::new(20000, 2));

        let refund = delete_goal(&state, USER, test_goal.id, TODAY)
            .expect("could not delete goal")
            .expect("expected a refund transaction");

        assert_eq!(refund.transaction_type, TransactionType::Income);
        assert_eq!(refund.amount, Decimal::new(20000, 2));
        assert_eq!(refund.origin, Origin::GoalRefund(test_goal.id));
        assert!(refund.description.contains("Holiday"));

        // Exactly one refund row, and the balance is back where it started.
        let connection = state.connection().unwrap();
        let refunded = sum_by_filter(
            &TransactionFilter::for_user(USER).with_origin(Origin::GoalRefund(test_goal.id)),
            &connection,
        )
        .unwrap();
        assert_eq!(refunded, Decimal::new(20000, 2));
        drop(connection);
        assert_eq!(balance(&state), balance_before);
    }

    #[test]
    fn deleting_a_goal_keeps_the_contribution_history() {
        let state = get_test_state();
        let test_goal = create_test_goal(&state, Decimal::new(50000, 2));
        contribute_to_goal(&state, USER, test_goal.id, Decimal::new(12500, 2), TODAY).unwrap();

        delete_goal(&state, USER, test_goal.id, TODAY).unwrap();

        let connection = state.connection().unwrap();
        let contributed = sum_by_filter(
            &TransactionFilter::for_user(USER)
                .with_origin(Origin::GoalContribution(test_goal.id)),
            &connection,
        )
        .unwrap();
        assert_eq!(
            contributed,
            Decimal::new(12500, 2),
            "the original expense rows must stay readable"
        );
    }

    #[test]
    fn deleting_a_goal_without_contributions_skips_the_refund() {
        let state = get_test_state();
        let test_goal = create_test_goal(&state, Decimal::new(50000, 2));

        let refund = delete_goal(&state, USER, test_goal.id, TODAY).unwrap();

        assert_eq!(refund, None);
        assert_eq!(balance(&state), Decimal::ZERO);
    }

    #[test]
    fn deleting_a_goal_twice_fails() {
        let state = get_test_state();
        let test_goal = create_test_goal(&state, Decimal::new(50000, 2));
        delete_goal(&state, USER, test_goal.id, TODAY).unwrap();

        assert_eq!(
            delete_goal(&state, USER, test_goal.id, TODAY),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn deleting_a_missing_goal_fails() {
        let state = get_test_state();

        assert_eq!(delete_goal(&state, USER, 42, TODAY), Err(Error::NotFound));
    }
}
