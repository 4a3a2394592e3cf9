//! Aggregate computations over the ledger: dashboard totals, category
//! breakdowns, and monthly trend series.
//!
//! Everything here is a pure projection: the ledger is read, nothing is
//! written, and nothing is cached at this layer. Handlers run these through
//! the analytics cache so repeated reads are cheap and invalidation lives in
//! one place.

use std::collections::HashMap;

use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error, category,
    database_id::{CategoryId, UserId},
    ledger::{Transaction, TransactionFilter, TransactionType, sum_by_filter, transactions_in_range},
};

use super::window::{month_label, month_start, months_back};

/// Income, expense, and balance totals over the whole ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    /// The sum of all non-void income transactions.
    pub total_income: Decimal,
    /// The sum of all non-void expense transactions.
    pub total_expenses: Decimal,
    /// `total_income - total_expenses`.
    pub balance: Decimal,
}

/// One row of the category breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdownRow {
    /// The category the row aggregates.
    pub category_id: CategoryId,
    /// The category's display name.
    pub category_name: String,
    /// The summed expenses in the category within the window.
    pub total: Decimal,
    /// The category's share of the window's expenses, 0-100 with two decimal
    /// places.
    pub percentage: Decimal,
    /// How many transactions the total covers.
    pub transaction_count: usize,
}

/// One month of the trend series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTrend {
    /// A short label for the month, e.g. "Jan 2026".
    pub month: String,
    /// The month's summed income.
    pub income: Decimal,
    /// The month's summed expenses.
    pub expenses: Decimal,
    /// `income - expenses`.
    pub net: Decimal,
}

/// Sum all of the user's non-void transactions by type.
///
/// The balance is recomputed from the ledger on every call; it is never a
/// stored counter.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn dashboard_summary(
    user_id: UserId,
    connection: &Connection,
) -> Result<DashboardSummary, Error> {
    let total_income = sum_by_filter(
        &TransactionFilter::for_user(user_id).with_type(TransactionType::Income),
        connection,
    )?;
    let total_expenses = sum_by_filter(
        &TransactionFilter::for_user(user_id).with_type(TransactionType::Expense),
        connection,
    )?;

    Ok(DashboardSummary {
        total_income,
        total_expenses,
        balance: total_income - total_expenses,
    })
}

/// Group the trailing `months` months of expenses by category, largest total
/// first.
///
/// Uncategorised expenses (e.g. savings goal contributions) are left out;
/// they have no category to attribute the spending to.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn category_breakdown(
    user_id: UserId,
    months: u32,
    today: Date,
    connection: &Connection,
) -> Result<Vec<CategoryBreakdownRow>, Error> {
    let window_start = months_back(today, months.saturating_sub(1));
    let transactions = transactions_in_range(user_id, window_start, today, connection)?;

    let mut by_category: HashMap<CategoryId, (Decimal, usize)> = HashMap::new();
    let mut window_total = Decimal::ZERO;

    for transaction in &transactions {
        if transaction.transaction_type != TransactionType::Expense {
            continue;
        }
        let Some(category_id) = transaction.category_id else {
            continue;
        };

        let entry = by_category.entry(category_id).or_insert((Decimal::ZERO, 0));
        entry.0 += transaction.amount;
        entry.1 += 1;
        window_total += transaction.amount;
    }

    let names = category::category_names(user_id, connection)?;

    let mut breakdown: Vec<CategoryBreakdownRow> = by_category
        .into_iter()
        .map(|(category_id, (total, transaction_count))| {
            let percentage = if window_total > Decimal::ZERO {
                (total / window_total * Decimal::ONE_HUNDRED).round_dp(2)
            } else {
                Decimal::ZERO
            };
            let category_name = names
                .get(&category_id)
                .cloned()
                .unwrap_or_else(|| format!("Category {category_id}"));

            CategoryBreakdownRow {
                category_id,
                category_name,
                total,
                percentage,
                transaction_count,
            }
        })
        .collect();

    breakdown.sort_by(|a, b| b.total.cmp(&a.total).then(a.category_id.cmp(&b.category_id)));

    Ok(breakdown)
}

/// Build the trend series for the trailing `months` calendar months.
///
/// The series always has exactly `months` entries, oldest first, ending with
/// the month containing `today`. Months without transactions contribute zero
/// rows rather than being skipped.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn monthly_trends(
    user_id: UserId,
    months: u32,
    today: Date,
    connection: &Connection,
) -> Result<Vec<MonthlyTrend>, Error> {
    let window_start = months_back(today, months.saturating_sub(1));
    let transactions = transactions_in_range(user_id, window_start, today, connection)?;

    let mut by_month: HashMap<Date, (Decimal, Decimal)> = HashMap::new();
    for transaction in &transactions {
        let entry = by_month
            .entry(month_start(transaction.date))
            .or_insert((Decimal::ZERO, Decimal::ZERO));
        match transaction.transaction_type {
            TransactionType::Income => entry.0 += transaction.amount,
            TransactionType::Expense => entry.1 += transaction.amount,
        }
    }

    let trends = (0..months)
        .rev()
        .map(|offset| {
            let month = months_back(today, offset);
            let (income, expenses) = by_month.get(&month).copied().unwrap_or_default();

            MonthlyTrend {
                month: month_label(month),
                income,
                expenses,
                net: income - expenses,
            }
        })
        .collect();

    Ok(trends)
}

/// The transactions an analytics window covers, exposed for the prediction
/// module which shares the same notion of a trailing window.
pub(super) fn expenses_in_window(
    user_id: UserId,
    months: u32,
    today: Date,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let window_start = months_back(today, months.saturating_sub(1));
    let transactions = transactions_in_range(user_id, window_start, today, connection)?;

    Ok(transactions
        .into_iter()
        .filter(|transaction| transaction.transaction_type == TransactionType::Expense)
        .collect())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use rust_decimal::Decimal;
    use time::macros::date;

    use crate::{
        analytics::engine::{category_breakdown, dashboard_summary, monthly_trends},
        category::create_category,
        db::initialize,
        ledger::{NewTransaction, Origin, TransactionType, append, void},
    };

    const USER: i64 = 1;
    const TODAY: time::Date = date!(2025 - 10 - 15);

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    fn record(
        conn: &Connection,
        transaction_type: TransactionType,
        amount: Decimal,
        category_id: Option<i64>,
        date: time::Date,
    ) -> i64 {
        append(
            NewTransaction {
                user_id: USER,
                transaction_type,
                amount,
                category_id,
                description: "test".to_owned(),
                date,
                origin: Origin::Manual,
            },
            conn,
        )
        .unwrap()
        .id
    }

    #[test]
    fn summary_balance_is_income_minus_expenses() {
        let conn = get_test_connection();
        record(&conn, TransactionType::Income, Decimal::new(300000, 2), None, TODAY);
        record(&conn, TransactionType::Expense, Decimal::new(120050, 2), None, TODAY);

        let summary = dashboard_summary(USER, &conn).unwrap();

        assert_eq!(summary.total_income, Decimal::new(300000, 2));
        assert_eq!(summary.total_expenses, Decimal::new(120050, 2));
        assert_eq!(summary.balance, summary.total_income - summary.total_expenses);
    }

    #[test]
    fn summary_ignores_void_transactions() {
        let conn = get_test_connection();
        let id = record(&conn, TransactionType::Expense, Decimal::TEN, None, TODAY);
        void(id, USER, &conn).unwrap();

        let summary = dashboard_summary(USER, &conn).unwrap();

        assert_eq!(summary.total_expenses, Decimal::ZERO);
    }

    #[test]
    fn breakdown_orders_by_total_descending() {
        let conn = get_test_connection();
        let coffee = create_category("Coffee", USER, &conn).unwrap();
        let books = create_category("Books", USER, &conn).unwrap();
        record(&conn, TransactionType::Expense, Decimal::new(2500, 2), Some(coffee.id), TODAY);
        record(&conn, TransactionType::Expense, Decimal::new(7500, 2), Some(books.id), TODAY);

        let breakdown = category_breakdown(USER, 6, TODAY, &conn).unwrap();

        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].category_name, "Books");
        assert_eq!(breakdown[0].total, Decimal::new(7500, 2));
        assert_eq!(breakdown[0].percentage, Decimal::new(7500, 2));
        assert_eq!(breakdown[1].category_name, "Coffee");
        assert_eq!(breakdown[1].percentage, Decimal::new(2500, 2));
    }

    #[test]
    fn breakdown_excludes_income_and_uncategorised_expenses() {
        let conn = get_test_connection();
        let coffee = create_category("Coffee", USER, &conn).unwrap();
        record(&conn, TransactionType::Expense, Decimal::new(2500, 2), Some(coffee.id), TODAY);
        record(&conn, TransactionType::Income, Decimal::new(9999, 2), Some(coffee.id), TODAY);
        record(&conn, TransactionType::Expense, Decimal::new(1111, 2), None, TODAY);

        let breakdown = category_breakdown(USER, 6, TODAY, &conn).unwrap();

        assert_eq!(breakdown.len(), 1);
        assert_eq!(breakdown[0].total, Decimal::new(2500, 2));
        assert_eq!(breakdown[0].transaction_count, 1);
    }

    #[test]
    fn breakdown_windows_differ_when_the_data_does() {
        let conn = get_test_connection();
        let coffee = create_category("Coffee", USER, &conn).unwrap();
        // Inside the trailing 3 month window.
        record(&conn, TransactionType::Expense, Decimal::new(1000, 2), Some(coffee.id), TODAY);
        // Four months back: only the 6 month window sees it.
        record(
            &conn,
            TransactionType::Expense,
            Decimal::new(5000, 2),
            Some(coffee.id),
            date!(2025 - 06 - 15),
        );

        let narrow = category_breakdown(USER, 3, TODAY, &conn).unwrap();
        let wide = category_breakdown(USER, 6, TODAY, &conn).unwrap();

        assert_eq!(narrow[0].total, Decimal::new(1000, 2));
        assert_eq!(wide[0].total, Decimal::new(6000, 2));
        assert_ne!(narrow, wide);
    }

    #[test]
    fn trends_always_return_exactly_the_requested_months() {
        let conn = get_test_connection();
        record(&conn, TransactionType::Expense, Decimal::TEN, None, TODAY);

        for months in [1u32, 3, 6, 12] {
            let trends = monthly_trends(USER, months, TODAY, &conn).unwrap();
            assert_eq!(
                trends.len(),
                months as usize,
                "want {months} entries, got {}",
                trends.len()
            );
        }
    }

    #[test]
    fn trends_bucket_amounts_into_their_calendar_months() {
        let conn = get_test_connection();
        record(&conn, TransactionType::Income, Decimal::new(200000, 2), None, date!(2025 - 09 - 01));
        record(&conn, TransactionType::Expense, Decimal::new(50000, 2), None, date!(2025 - 09 - 28));
        record(&conn, TransactionType::Expense, Decimal::new(7500, 2), None, TODAY);

        let trends = monthly_trends(USER, 3, TODAY, &conn).unwrap();

        assert_eq!(trends[0].month, "Aug 2025");
        assert_eq!(trends[0].income, Decimal::ZERO);
        assert_eq!(trends[1].month, "Sep 2025");
        assert_eq!(trends[1].income, Decimal::new(200000, 2));
        assert_eq!(trends[1].expenses, Decimal::new(50000, 2));
        assert_eq!(trends[1].net, Decimal::new(150000, 2));
        assert_eq!(trends[2].month, "Oct 2025");
        assert_eq!(trends[2].expenses, Decimal::new(7500, 2));
    }
}
