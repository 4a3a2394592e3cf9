//! The transaction ledger: the single source of truth for monetary totals.

mod core;
mod endpoints;

pub use self::core::{
    NewTransaction, Origin, Transaction, TransactionFilter, TransactionType, append,
    create_ledger_tables, current_version, goal_net_amount, recent, sum_by_filter,
    transactions_in_range, void,
};
pub(crate) use self::core::append_within;
pub use endpoints::{
    CreateTransactionRequest, create_transaction_endpoint, delete_transaction_endpoint,
    recent_transactions_endpoint,
};
