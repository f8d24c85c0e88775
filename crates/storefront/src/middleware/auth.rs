//! Authentication extractors.
//!
//! Provides an extractor for requiring a customer bearer token in route
//! handlers.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use printshop_core::UserId;
use tracing::Span;

use crate::error::{AppError, set_sentry_user};
use crate::services::AuthError;
use crate::state::AppState;

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: UserId,
}

/// Extractor that requires a valid `Authorization: Bearer` token.
///
/// Rejects with a JSON 401 if the header is missing, malformed, forged, or
/// expired.
///
/// # Example
///
/// ```rust,ignore
/// async fn my_orders(
///     State(state): State<AppState>,
///     RequireAuth(user): RequireAuth,
/// ) -> Result<Json<OrdersResponse>> {
///     let orders = state.orders().find_by_user(user.id).await?;
///     // ...
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AuthError::MissingToken)?;

        let id = state.tokens().verify_header(header)?;

        Span::current().record("user_id", id.as_i32());
        set_sentry_user(&id);

        Ok(Self(CurrentUser { id }))
    }
}
