//! HTTP handlers for listing, creating, and deleting categories.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::{
    AppState, Error,
    auth::CurrentUser,
    category::{Category, create_category, delete_category, list_categories},
    database_id::CategoryId,
};

/// The request body for creating a custom category.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryRequest {
    /// The display name of the category.
    pub name: String,
}

/// A route handler for the categories visible to the user: the seeded system
/// categories plus their own.
pub async fn list_categories_endpoint(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<Category>>, Error> {
    let connection = state.connection()?;
    let categories = list_categories(user_id, &connection)?;

    Ok(Json(categories))
}

/// A route handler for creating a custom category.
pub async fn create_category_endpoint(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(request): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), Error> {
    let connection = state.connection()?;
    let category = create_category(&request.name, user_id, &connection)?;

    Ok((StatusCode::CREATED, Json(category)))
}

/// A route handler for deleting a custom category.
///
/// System categories are never deletable; custom categories only while no
/// transactions reference them.
pub async fn delete_category_endpoint(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(category_id): Path<CategoryId>,
) -> Result<StatusCode, Error> {
    let connection = state.connection()?;
    delete_category(category_id, user_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::{
        Json,
        extract::{Path, State},
    };
    use rusqlite::Connection;

    use crate::{
        AppState, Error,
        auth::CurrentUser,
        category::endpoints::{
            CreateCategoryRequest, create_category_endpoint, delete_category_endpoint,
            list_categories_endpoint,
        },
    };

    const USER: i64 = 1;

    fn get_test_state() -> AppState {
        let conn = Connection::open_in_memory().unwrap();
        AppState::new(conn).unwrap()
    }

    #[tokio::test]
    async fn deleting_each_system_category_is_forbidden() {
        let state = get_test_state();
        let Json(categories) = list_categories_endpoint(State(state.clone()), CurrentUser(USER))
            .await
            .unwrap();
        assert!(!categories.is_empty());

        for category in categories {
            let result = delete_category_endpoint(
                State(state.clone()),
                CurrentUser(USER),
                Path(category.id),
            )
            .await;

            assert!(
                matches!(result, Err(Error::PermissionDenied(_))),
                "deleting system category {} should be forbidden",
                category.name
            );
        }
    }

    #[tokio::test]
    async fn custom_categories_can_be_created_and_deleted() {
        let state = get_test_state();

        let (_, Json(category)) = create_category_endpoint(
            State(state.clone()),
            CurrentUser(USER),
            Json(CreateCategoryRequest {
                name: "Board Games".to_owned(),
            }),
        )
        .await
        .expect("could not create category");
        assert!(!category.is_system);

        delete_category_endpoint(State(state), CurrentUser(USER), Path(category.id))
            .await
            .expect("could not delete category");
    }
}
