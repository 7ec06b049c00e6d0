//! services/web/src/web/templates.rs
//!
//! HTML rendering. Templates are compiled into the binary and loaded into a
//! `minijinja` environment once at startup.

use crate::error::ApiError;
use crate::web::session::{clear_notice_cookie, read_cookie, Notice, NOTICE_COOKIE};
use crate::web::state::AppState;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use minijinja::{context, Environment, Value};
use serde::Serialize;
use tracing::error;

const TEMPLATES: [(&str, &str); 4] = [
    ("base.html", include_str!("../../templates/base.html")),
    ("login.html", include_str!("../../templates/login.html")),
    ("register.html", include_str!("../../templates/register.html")),
    ("chat.html", include_str!("../../templates/chat.html")),
];

pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    pub fn new() -> Result<Self, ApiError> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    pub fn render(&self, name: &str, ctx: Value) -> Result<String, ApiError> {
        let template = self.env.get_template(name)?;
        Ok(template.render(ctx)?)
    }
}

//=========================================================================================
// Flash Messages
//=========================================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Flash {
    pub category: &'static str,
    pub message: String,
}

/// The messages to show on the page being rendered.
///
/// Starts with the notice left by a redirect, if any; rendering clears that cookie.
#[derive(Debug, Default)]
pub struct Flashes {
    items: Vec<Flash>,
    consumed_notice: bool,
}

impl Flashes {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        match read_cookie(headers, NOTICE_COOKIE) {
            Some(key) => {
                let items = Notice::from_key(key)
                    .map(|notice| Flash {
                        category: notice.category(),
                        message: notice.text().to_string(),
                    })
                    .into_iter()
                    .collect();
                Self {
                    items,
                    consumed_notice: true,
                }
            }
            None => Self::default(),
        }
    }

    pub fn danger(&mut self, message: &str) {
        self.push("danger", message);
    }

    pub fn warning(&mut self, message: &str) {
        self.push("warning", message);
    }

    fn push(&mut self, category: &'static str, message: &str) {
        self.items.push(Flash {
            category,
            message: message.to_string(),
        });
    }
}

/// Renders a page with its flashes, or a bare 500 if the template fails.
pub fn render_page(state: &AppState, name: &str, flashes: Flashes, ctx: Value) -> Response {
    let ctx = context! { flashes => flashes.items, ..ctx };
    match state.templates.render(name, ctx) {
        Ok(html) if flashes.consumed_notice => (
            [(header::SET_COOKIE, clear_notice_cookie(state.config.cookie_secure))],
            Html(html),
        )
            .into_response(),
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Failed to render template {}: {:?}", name, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
        }
    }
}
