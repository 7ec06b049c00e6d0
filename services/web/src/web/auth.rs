//! services/web/src/web/auth.rs
//!
//! Authentication pages for registration, login, and logout.

use crate::error::ApiError;
use crate::web::session::{
    clear_session_cookie, notice_cookie, session_cookie, session_id_from_headers,
    session_lifetime, sign_session_id, Notice,
};
use crate::web::state::AppState;
use crate::web::templates::{render_page, Flashes};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    Form,
};
use chatbot_core::domain::AuthSession;
use chatbot_core::ports::PortError;
use chrono::Utc;
use minijinja::context;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

//=========================================================================================
// Form Types
//=========================================================================================

#[derive(Deserialize)]
pub struct CredentialsForm {
    pub username: String,
    pub password: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET / - Send visitors to the login page
pub async fn index_handler() -> Redirect {
    Redirect::to("/login")
}

/// GET /login
pub async fn login_page(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    render_page(&state, "login.html", Flashes::from_headers(&headers), context! {})
}

/// POST /login - Verify credentials and start a session
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<CredentialsForm>,
) -> Response {
    let mut flashes = Flashes::from_headers(&headers);

    match start_session(&state, &form).await {
        Ok(Some(cookie)) => ([(header::SET_COOKIE, cookie)], Redirect::to("/chat")).into_response(),
        Ok(None) => {
            flashes.danger("Invalid username or password!");
            render_page(&state, "login.html", flashes, context! { username => form.username })
        }
        Err(e) => {
            error!("Failed to log in user {}: {:?}", form.username, e);
            flashes.danger("An error occurred while logging in.");
            render_page(&state, "login.html", flashes, context! { username => form.username })
        }
    }
}

/// Returns the session cookie for valid credentials, `None` for invalid ones.
async fn start_session(state: &AppState, form: &CredentialsForm) -> Result<Option<String>, ApiError> {
    // 1. Get user by username
    let user_creds = match state.db.get_user_by_username(&form.username).await {
        Ok(creds) => creds,
        Err(PortError::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&user_creds.hashed_password)
        .map_err(|e| ApiError::Internal(format!("Failed to parse password hash: {}", e)))?;
    let valid = Argon2::default()
        .verify_password(form.password.as_bytes(), &parsed_hash)
        .is_ok();
    if !valid {
        warn!("Failed login attempt for {}", form.username);
        return Ok(None);
    }

    // 3. Create auth session in database
    let auth_session = AuthSession {
        id: Uuid::new_v4().to_string(),
        user_id: user_creds.user_id,
        expires_at: Utc::now() + session_lifetime(),
    };
    state.db.create_auth_session(&auth_session).await?;

    // 4. Sign the session id for the cookie
    let signed = sign_session_id(&state.config.secret_key, &auth_session.id)?;
    info!(user_id = user_creds.user_id, "User logged in");

    Ok(Some(session_cookie(&signed, state.config.cookie_secure)))
}

/// GET /register
pub async fn register_page(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    render_page(&state, "register.html", Flashes::from_headers(&headers), context! {})
}

/// POST /register - Create a new user account
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<CredentialsForm>,
) -> Response {
    let mut flashes = Flashes::from_headers(&headers);

    // 1. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = match Argon2::default().hash_password(form.password.as_bytes(), &salt) {
        Ok(hash) => hash.to_string(),
        Err(e) => {
            error!("Failed to hash password: {:?}", e);
            flashes.danger("An error occurred during registration.");
            return render_page(&state, "register.html", flashes, context! {});
        }
    };

    // 2. Create user in database
    match state.db.create_user(&form.username, &password_hash).await {
        Ok(user) => {
            info!(user_id = user.user_id, "User registered");
            (
                [(
                    header::SET_COOKIE,
                    notice_cookie(Notice::Registered, state.config.cookie_secure),
                )],
                Redirect::to("/login"),
            )
                .into_response()
        }
        Err(PortError::UniqueViolation(_)) => {
            flashes.danger("Username already exists!");
            render_page(&state, "register.html", flashes, context! {})
        }
        Err(e) => {
            error!("Failed to create user: {:?}", e);
            flashes.danger("An error occurred during registration.");
            render_page(&state, "register.html", flashes, context! {})
        }
    }
}

/// GET /logout - End the session and forget the cookie
pub async fn logout_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(session_id) = session_id_from_headers(&headers, &state.config.secret_key) {
        if let Err(e) = state.db.delete_auth_session(&session_id).await {
            error!("Failed to delete auth session: {:?}", e);
        }
    }

    let secure = state.config.cookie_secure;
    (
        AppendHeaders([
            (header::SET_COOKIE, clear_session_cookie(secure)),
            (header::SET_COOKIE, notice_cookie(Notice::LoggedOut, secure)),
        ]),
        Redirect::to("/login"),
    )
        .into_response()
}
