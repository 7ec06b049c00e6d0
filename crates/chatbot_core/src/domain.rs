//! crates/chatbot_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;

// Represents a user - used throughout app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: i64,
    pub username: String,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: i64,
    pub username: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

/// The user a valid auth session belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub user_id: i64,
    pub username: String,
}

/// A conversation owned by a single user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub chat_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

/// A chat as shown in the history sidebar, with the opening message if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSummary {
    pub chat_id: i64,
    pub created_at: DateTime<Utc>,
    pub first_message: Option<String>,
}

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Bot => "bot",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Sender::User),
            "bot" => Some(Sender::Bot),
            _ => None,
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single stored message within a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub message_id: i64,
    pub chat_id: i64,
    pub sender: Sender,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// The two languages the bot understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    English,
    Swahili,
}

impl Language {
    /// ISO 639-1 code, also used to build the translator's language tokens.
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Swahili => "sw",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// The bot's answer to one user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Language the user wrote in, and therefore the language of `text`.
    pub language: Language,
    pub intent: String,
}
