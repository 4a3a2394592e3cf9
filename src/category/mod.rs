//! Spending categories: seeded system categories plus per-user custom ones.

mod core;
mod endpoints;

pub use self::core::{
    Category, create_category, create_category_table, delete_category, ensure_visible,
    get_category, list_categories,
};
pub(crate) use self::core::{category_names, seed_system_categories};
pub use endpoints::{
    CreateCategoryRequest, create_category_endpoint, delete_category_endpoint,
    list_categories_endpoint,
};
