//! services/web/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the SQLite database file using `sqlx`.

use async_trait::async_trait;
use chatbot_core::domain::{
    AuthSession, Chat, ChatSummary, Message, Sender, SessionUser, User, UserCredentials,
};
use chatbot_core::ports::{DatabaseService, PortError, PortResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, Sqlite, SqlitePool};
use std::str::FromStr;
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: SqlitePool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens the database file named by `database_url`, creating it if absent.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    /// A private, migrated database that lives as long as the adapter.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        // Every connection to `:memory:` is a separate database, so keep exactly one alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let adapter = Self::new(pool);
        adapter.run_migrations().await?;
        Ok(adapter)
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: i64,
    username: String,
    password: String,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.id,
            username: self.username,
        }
    }

    fn to_credentials(self) -> UserCredentials {
        UserCredentials {
            user_id: self.id,
            username: self.username,
            hashed_password: self.password,
        }
    }
}

#[derive(FromRow)]
struct AuthSessionRecord {
    user_id: i64,
    username: String,
    expires_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ChatRecord {
    chat_id: i64,
    user_id: i64,
    created_at: NaiveDateTime,
}
impl ChatRecord {
    fn to_domain(self) -> Chat {
        Chat {
            chat_id: self.chat_id,
            user_id: self.user_id,
            created_at: self.created_at.and_utc(),
        }
    }
}

#[derive(FromRow)]
struct ChatSummaryRecord {
    chat_id: i64,
    created_at: NaiveDateTime,
    first_message: Option<String>,
}
impl ChatSummaryRecord {
    fn to_domain(self) -> ChatSummary {
        ChatSummary {
            chat_id: self.chat_id,
            created_at: self.created_at.and_utc(),
            first_message: self.first_message,
        }
    }
}

#[derive(FromRow)]
struct MessageRecord {
    message_id: i64,
    chat_id: i64,
    sender: String,
    message: String,
    created_at: NaiveDateTime,
}
impl MessageRecord {
    fn to_domain(self) -> PortResult<Message> {
        let sender = Sender::parse(&self.sender).ok_or_else(|| {
            PortError::Unexpected(format!(
                "Message {} has unknown sender '{}'",
                self.message_id, self.sender
            ))
        })?;
        Ok(Message {
            message_id: self.message_id,
            chat_id: self.chat_id,
            sender,
            text: self.message,
            created_at: self.created_at.and_utc(),
        })
    }
}

async fn insert_message<'e, E>(
    executor: E,
    chat_id: i64,
    sender: Sender,
    text: &str,
) -> PortResult<Message>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let record = sqlx::query_as::<_, MessageRecord>(
        "INSERT INTO messages (chat_id, sender, message) VALUES (?1, ?2, ?3)
         RETURNING message_id, chat_id, sender, message, created_at",
    )
    .bind(chat_id)
    .bind(sender.as_str())
    .bind(text)
    .fetch_one(executor)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
            PortError::NotFound(format!("Chat {} not found", chat_id))
        }
        _ => PortError::Unexpected(e.to_string()),
    })?;
    record.to_domain()
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(&self, username: &str, hashed_password: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (username, password) VALUES (?1, ?2) RETURNING id, username, password",
        )
        .bind(username)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                PortError::UniqueViolation(format!("Username '{}' already exists", username))
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_username(&self, username: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, username, password FROM users WHERE username = ?1",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User '{}' not found", username)),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_credentials())
    }

    async fn create_auth_session(&self, session: &AuthSession) -> PortResult<()> {
        // Expired sessions, including abandoned ones, go on every login.
        let pruned = sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= ?1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .rows_affected();
        if pruned > 0 {
            debug!(pruned, "Removed expired auth sessions");
        }

        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES (?1, ?2, ?3)")
            .bind(&session.id)
            .bind(session.user_id)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<SessionUser> {
        let record = sqlx::query_as::<_, AuthSessionRecord>(
            "SELECT s.user_id, u.username, s.expires_at
             FROM auth_sessions s JOIN users u ON u.id = s.user_id
             WHERE s.id = ?1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?
        .ok_or(PortError::Unauthorized)?;

        if record.expires_at <= Utc::now() {
            self.delete_auth_session(session_id).await?;
            return Err(PortError::Unauthorized);
        }

        Ok(SessionUser {
            user_id: record.user_id,
            username: record.username,
        })
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = ?1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn create_chat(&self, user_id: i64) -> PortResult<Chat> {
        let record = sqlx::query_as::<_, ChatRecord>(
            "INSERT INTO chats (user_id) VALUES (?1) RETURNING chat_id, user_id, created_at",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                PortError::NotFound(format!("User {} not found", user_id))
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }

    async fn get_chat(&self, chat_id: i64) -> PortResult<Chat> {
        let record = sqlx::query_as::<_, ChatRecord>(
            "SELECT chat_id, user_id, created_at FROM chats WHERE chat_id = ?1",
        )
        .bind(chat_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Chat {} not found", chat_id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }

    async fn list_chats(&self, user_id: i64) -> PortResult<Vec<ChatSummary>> {
        let records = sqlx::query_as::<_, ChatSummaryRecord>(
            "SELECT c.chat_id, c.created_at,
                    (SELECT m.message FROM messages m
                     WHERE m.chat_id = c.chat_id
                     ORDER BY m.created_at, m.message_id LIMIT 1) AS first_message
             FROM chats c
             WHERE c.user_id = ?1
             ORDER BY c.created_at DESC, c.chat_id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let chats = records.into_iter().map(|r| r.to_domain()).collect();
        Ok(chats)
    }

    async fn append_message(&self, chat_id: i64, sender: Sender, text: &str) -> PortResult<Message> {
        insert_message(&self.pool, chat_id, sender, text).await
    }

    async fn append_turn(
        &self,
        chat_id: i64,
        user_text: &str,
        bot_text: &str,
    ) -> PortResult<(Message, Message)> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let user_message = insert_message(&mut *tx, chat_id, Sender::User, user_text).await?;
        let bot_message = insert_message(&mut *tx, chat_id, Sender::Bot, bot_text).await?;

        tx.commit()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok((user_message, bot_message))
    }

    async fn list_messages(&self, chat_id: i64) -> PortResult<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(
            "SELECT message_id, chat_id, sender, message, created_at FROM messages
             WHERE chat_id = ?1 ORDER BY created_at ASC, message_id ASC",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }
}
