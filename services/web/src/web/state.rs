//! services/web/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::web::templates::Templates;
use chatbot_core::conversation::ConversationPipeline;
use chatbot_core::ports::DatabaseService;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub pipeline: Arc<ConversationPipeline>,
    pub templates: Arc<Templates>,
}
