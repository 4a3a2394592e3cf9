//! Resolves the acting user on each request.
//!
//! Session issuance lives in a separate service that authenticates callers
//! and forwards the resolved user id with every proxied request. This module
//! only reads that forwarded id; requests without one are rejected.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{Error, database_id::UserId};

/// The header the session layer uses to forward the authenticated user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Extractor for the authenticated user's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub UserId);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<UserId>().ok())
            .map(CurrentUser)
            .ok_or(Error::MissingUserId)
    }
}
