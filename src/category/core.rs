//! Core data models and database queries for spending categories.
//!
//! Categories come in two flavours: system categories seeded at database
//! initialization and shared by every user, and custom categories owned by a
//! single user. System categories are immutable and undeletable.

use std::collections::HashMap;

use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    database_id::{CategoryId, UserId},
};

/// The system categories seeded at database initialization.
const SYSTEM_CATEGORIES: &[&str] = &[
    "Groceries",
    "Dining Out",
    "Rent & Housing",
    "Transport",
    "Utilities",
    "Healthcare",
    "Entertainment",
    "Shopping",
    "Travel",
    "Salary",
    "Investments",
    "Other",
];

/// A label for grouping transactions, e.g. "Groceries" or "Rent & Housing".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,
    /// The user that owns the category, absent for system categories.
    pub user_id: Option<UserId>,
    /// The display name of the category.
    pub name: String,
    /// Whether this is a seeded system category.
    ///
    /// System categories cannot be modified or deleted.
    pub is_system: bool,
}

/// Create the category table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS category (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER,
                name TEXT NOT NULL,
                is_system INTEGER NOT NULL DEFAULT 0
                )",
        (),
    )?;

    Ok(())
}

/// Insert the system categories if none exist yet.
pub(crate) fn seed_system_categories(connection: &Connection) -> Result<(), rusqlite::Error> {
    let count: i64 = connection.query_row(
        "SELECT COUNT(id) FROM category WHERE is_system = 1",
        [],
        |row| row.get(0),
    )?;

    if count > 0 {
        return Ok(());
    }

    for name in SYSTEM_CATEGORIES {
        connection.execute(
            "INSERT INTO category (user_id, name, is_system) VALUES (NULL, ?1, 1)",
            params![name],
        )?;
    }

    tracing::debug!("seeded {} system categories", SYSTEM_CATEGORIES.len());

    Ok(())
}

/// Create a custom category for a user.
///
/// # Errors
/// This function will return a:
/// - [Error::DuplicateCategoryName] if the user already sees a category with
///   that name (system or custom),
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_category(
    name: &str,
    user_id: UserId,
    connection: &Connection,
) -> Result<Category, Error> {
    let clashes: i64 = connection.query_row(
        "SELECT COUNT(id) FROM category
         WHERE name = ?1 AND (is_system = 1 OR user_id = ?2)",
        params![name, user_id],
        |row| row.get(0),
    )?;

    if clashes > 0 {
        return Err(Error::DuplicateCategoryName(name.to_owned()));
    }

    connection.execute(
        "INSERT INTO category (user_id, name, is_system) VALUES (?1, ?2, 0)",
        params![user_id, name],
    )?;

    Ok(Category {
        id: connection.last_insert_rowid(),
        user_id: Some(user_id),
        name: name.to_owned(),
        is_system: false,
    })
}

/// Retrieve a category by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_category(id: CategoryId, connection: &Connection) -> Result<Category, Error> {
    let category = connection
        .prepare("SELECT id, user_id, name, is_system FROM category WHERE id = :id")?
        .query_row(&[(":id", &id)], map_category_row)?;

    Ok(category)
}

/// Check that a category exists and is visible to `user_id` (system, or owned
/// by the user).
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the category is absent or owned by another user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn ensure_visible(
    id: CategoryId,
    user_id: UserId,
    connection: &Connection,
) -> Result<(), Error> {
    let category = get_category(id, connection)?;

    if !category.is_system && category.user_id != Some(user_id) {
        // Do not reveal that the category exists for someone else.
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Retrieve the categories visible to a user: system categories plus their
/// own, ordered by name.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn list_categories(user_id: UserId, connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, name, is_system FROM category
             WHERE is_system = 1 OR user_id = :user_id
             ORDER BY name ASC",
        )?
        .query_map(&[(":user_id", &user_id)], map_category_row)?
        .map(|maybe_category| maybe_category.map_err(Error::SqlError))
        .collect()
}

/// The names of the categories visible to a user, keyed by ID.
///
/// Used by the analytics queries to label breakdown and prediction rows.
pub(crate) fn category_names(
    user_id: UserId,
    connection: &Connection,
) -> Result<HashMap<CategoryId, String>, Error> {
    let names = list_categories(user_id, connection)?
        .into_iter()
        .map(|category| (category.id, category.name))
        .collect();

    Ok(names)
}

/// Delete a custom category.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the category is absent or owned by another user,
/// - or [Error::PermissionDenied] if the category is a system category,
/// - or [Error::CategoryInUse] if transactions still reference the category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_category(
    id: CategoryId,
    user_id: UserId,
    connection: &Connection,
) -> Result<(), Error> {
    let category = get_category(id, connection)?;

    if category.is_system {
        return Err(Error::PermissionDenied(
            "system categories cannot be deleted".to_owned(),
        ));
    }

    if category.user_id != Some(user_id) {
        return Err(Error::NotFound);
    }

    let references: i64 = connection.query_row(
        "SELECT COUNT(id) FROM \"transaction\" WHERE category_id = ?1",
        params![id],
        |row| row.get(0),
    )?;

    if references > 0 {
        return Err(Error::CategoryInUse);
    }

    connection.execute("DELETE FROM category WHERE id = ?1", params![id])?;

    Ok(())
}

/// Map a database row to a [Category].
fn map_category_row(row: &Row) -> Result<Category, rusqlite::Error> {
    Ok(Category {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        is_system: row.get(3)?,
    })
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
        Error,
        category::{create_category, delete_category, ensure_visible, list_categories},
        db::initialize,
        ledger::{NewTransaction, Origin, TransactionType, append},
    };

    const USER: i64 = 1;

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    #[test]
    fn initialization_seeds_system_categories() {
        let conn = get_test_connection();

        let categories = list_categories(USER, &conn).unwrap();

        assert!(!categories.is_empty());
        assert!(categories.iter().all(|category| category.is_system));
    }

    #[test]
    fn list_includes_own_but_not_other_users_categories() {
        let conn = get_test_connection();
        let system_count = list_categories(USER, &conn).unwrap().len();
        create_category("Board Games", USER, &conn).unwrap();
        create_category("Climbing", 2, &conn).unwrap();

        let categories = list_categories(USER, &conn).unwrap();

        assert_eq!(categories.len(), system_count + 1);
        assert!(categories.iter().any(|category| category.name == "Board Games"));
    }

    #[test]
    fn create_rejects_duplicate_names() {
        let conn = get_test_connection();
        create_category("Board Games", USER, &conn).unwrap();

        let result = create_category("Board Games", USER, &conn);

        assert_eq!(
            result,
            Err(Error::DuplicateCategoryName("Board Games".to_owned()))
        );
    }

    #[test]
    fn create_rejects_names_clashing_with_system_categories() {
        let conn = get_test_connection();

        let result = create_category("Groceries", USER, &conn);

        assert_eq!(
            result,
            Err(Error::DuplicateCategoryName("Groceries".to_owned()))
        );
    }

    #[test]
    fn delete_system_category_is_forbidden() {
        let conn = get_test_connection();

        for category in list_categories(USER, &conn).unwrap() {
            let result = delete_category(category.id, USER, &conn);

            assert_eq!(
                result,
                Err(Error::PermissionDenied(
                    "system categories cannot be deleted".to_owned()
                ))
            );
        }
    }

    #[test]
    fn delete_custom_category_succeeds() {
        let conn = get_test_connection();
        let category = create_category("Board Games", USER, &conn).unwrap();

        delete_category(category.id, USER, &conn).expect("could not delete category");

        assert!(ensure_visible(category.id, USER, &conn).is_err());
    }

    #[test]
    fn delete_fails_for_other_users_category() {
        let conn = get_test_connection();
        let category = create_category("Board Games", 2, &conn).unwrap();

        assert_eq!(delete_category(category.id, USER, &conn), Err(Error::NotFound));
    }

    #[test]
    fn delete_fails_while_transactions_reference_the_category() {
        let conn = get_test_connection();
        let category = create_category("Board Games", USER, &conn).unwrap();
        append(
            NewTransaction {
                user_id: USER,
                transaction_type: TransactionType::Expense,
                amount: Decimal::TEN,
                category_id: Some(category.id),
                description: "catan expansion".to_owned(),
                date: date!(2025 - 10 - 05),
                origin: Origin::Manual,
            },
            &conn,
        )
        .unwrap();

        assert_eq!(
            delete_category(category.id, USER, &conn),
            Err(Error::CategoryInUse)
        );
    }
}
