//! services/web/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::{debug, error};

use crate::web::session::session_id_from_headers;
use crate::web::state::AppState;
use chatbot_core::ports::PortError;

/// Middleware that validates the session cookie and resolves the logged-in user.
///
/// If valid, inserts the `SessionUser` into request extensions for handlers to use.
/// If invalid or missing, redirects to the login page.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    // 1. Parse and verify the signed session cookie
    let Some(auth_session_id) = session_id_from_headers(req.headers(), &state.config.secret_key)
    else {
        debug!("No valid session cookie, redirecting to login");
        return Redirect::to("/login").into_response();
    };

    // 2. Validate auth session in database
    let user = match state.db.validate_auth_session(&auth_session_id).await {
        Ok(user) => user,
        Err(PortError::Unauthorized) => return Redirect::to("/login").into_response(),
        Err(e) => {
            error!("Failed to validate auth session: {:?}", e);
            return Redirect::to("/login").into_response();
        }
    };

    // 3. Insert the user into request extensions
    req.extensions_mut().insert(user);

    // 4. Continue to the handler
    next.run(req).await
}
