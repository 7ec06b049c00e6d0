//! crates/chatbot_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or models.

use async_trait::async_trait;
use crate::domain::{
    AuthSession, Chat, ChatSummary, Language, Message, Sender, SessionUser, User, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, models).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    async fn create_user(&self, username: &str, hashed_password: &str) -> PortResult<User>;

    async fn get_user_by_username(&self, username: &str) -> PortResult<UserCredentials>;

    // --- Auth Methods ---
    async fn create_auth_session(&self, session: &AuthSession) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<SessionUser>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Chat Management ---
    async fn create_chat(&self, user_id: i64) -> PortResult<Chat>;

    async fn get_chat(&self, chat_id: i64) -> PortResult<Chat>;

    /// Most recent chat first, each with its opening message.
    async fn list_chats(&self, user_id: i64) -> PortResult<Vec<ChatSummary>>;

    // --- Message Management ---
    async fn append_message(&self, chat_id: i64, sender: Sender, text: &str) -> PortResult<Message>;

    /// Stores a user message and the bot's reply as one unit.
    async fn append_turn(
        &self,
        chat_id: i64,
        user_text: &str,
        bot_text: &str,
    ) -> PortResult<(Message, Message)>;

    /// Oldest message first.
    async fn list_messages(&self, chat_id: i64) -> PortResult<Vec<Message>>;
}

/// Statistical language identification.
pub trait LanguageDetectionService: Send + Sync {
    /// Returns the ISO 639-1 code of the most likely language of `text`.
    fn detect_code(&self, text: &str) -> PortResult<String>;
}

#[async_trait]
pub trait IntentModelService: Send + Sync {
    /// Runs the sequence classifier and returns the argmax class id.
    async fn predict_class(&self, text: &str) -> PortResult<usize>;
}

#[async_trait]
pub trait TranslationService: Send + Sync {
    /// Translates `text` from `source` into `target`.
    async fn translate(&self, text: &str, source: Language, target: Language) -> PortResult<String>;
}
