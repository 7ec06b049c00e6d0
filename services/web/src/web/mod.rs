pub mod auth;
pub mod chat;
pub mod middleware;
pub mod session;
pub mod state;
pub mod templates;

pub use middleware::require_auth;
pub use state::AppState;

use axum::{middleware as axum_middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Builds the full application router around the shared state.
pub fn router(state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/", get(auth::index_handler))
        .route("/login", get(auth::login_page).post(auth::login_handler))
        .route("/register", get(auth::register_page).post(auth::register_handler))
        .route("/logout", get(auth::logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/chat", get(chat::chat_list_handler))
        .route(
            "/chat/{chat_id}",
            get(chat::chat_page_handler).post(chat::chat_post_handler),
        )
        .route("/new_chat", get(chat::new_chat_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
