//! Fiscus is a personal finance tracking backend.
//!
//! This library provides a JSON REST API over a transaction ledger with
//! budgets, savings goals, and cached analytics views. The ledger is the
//! single source of truth for all monetary totals: budget spending and goal
//! progress are projections over it, and the aggregate cache in front of the
//! analytics reads is keyed by every query parameter and gated by a per-user
//! ledger version so a read can never observe a total older than the last
//! write.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;

pub mod analytics;
mod app_state;
mod auth;
pub mod budget;
pub mod cache;
pub mod category;
pub mod contribution;
pub mod database_id;
mod db;
pub mod endpoints;
mod error;
pub mod goal;
pub mod ledger;
mod logging;
mod routing;
mod user_lock;

pub use app_state::AppState;
pub use auth::{CurrentUser, USER_ID_HEADER};
pub use db::initialize as initialize_db;
pub use error::Error;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use routing::build_router;
pub use user_lock::UserLocks;

/// An async task that waits for either the ctrl+c or terminate signal,
/// whichever comes first, and then signals the server to shut down
/// gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}
