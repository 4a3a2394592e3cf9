//! Database initialization for the application's domain models.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};

use crate::{Error, budget, category, goal, ledger};

/// Create the application's tables and seed the system categories.
///
/// Everything happens inside one exclusive SQL transaction so a half
/// initialized database is never observable.
///
/// # Errors
/// Returns an error if a table cannot be created or if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let sql_transaction =
        SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    category::create_category_table(&sql_transaction)?;
    ledger::create_ledger_tables(&sql_transaction)?;
    budget::create_budget_table(&sql_transaction)?;
    goal::create_goal_table(&sql_transaction)?;

    category::seed_system_categories(&sql_transaction)?;

    sql_transaction.commit()?;

    Ok(())
}
