//! services/web/src/web/chat.rs
//!
//! Chat pages: the conversation list, a single conversation, and posting a message.

use crate::web::session::{notice_cookie, Notice};
use crate::web::state::AppState;
use crate::web::templates::{render_page, Flashes};
use axum::{
    extract::{Extension, Path, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use chatbot_core::domain::{Chat, ChatSummary, Message, SessionUser};
use chatbot_core::ports::{PortError, PortResult};
use minijinja::context;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

const SIDEBAR_PREVIEW_CHARS: usize = 40;
const PROCESSING_ERROR: &str = "An error occurred while processing your message.";

//=========================================================================================
// Form and View Types
//=========================================================================================

#[derive(Deserialize)]
pub struct MessageForm {
    pub message: String,
}

#[derive(Serialize)]
struct ChatLink {
    chat_id: i64,
    title: String,
    created_at: String,
}

impl From<ChatSummary> for ChatLink {
    fn from(summary: ChatSummary) -> Self {
        let title = match summary.first_message {
            Some(text) if text.chars().count() > SIDEBAR_PREVIEW_CHARS => {
                let preview: String = text.chars().take(SIDEBAR_PREVIEW_CHARS).collect();
                format!("{}...", preview)
            }
            Some(text) => text,
            None => "New chat".to_string(),
        };
        Self {
            chat_id: summary.chat_id,
            title,
            created_at: summary.created_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

#[derive(Serialize)]
struct MessageView {
    sender: &'static str,
    text: String,
    created_at: String,
}

impl From<Message> for MessageView {
    fn from(message: Message) -> Self {
        Self {
            sender: message.sender.as_str(),
            text: message.text,
            created_at: message.created_at.format("%H:%M").to_string(),
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /chat - List the user's conversations
pub async fn chat_list_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    headers: HeaderMap,
) -> Response {
    let mut flashes = Flashes::from_headers(&headers);
    let chats = sidebar(&state, &user, &mut flashes).await;
    render_page(
        &state,
        "chat.html",
        flashes,
        context! { username => user.username, chats => chats },
    )
}

/// GET /chat/{chat_id} - Show one conversation with its history
pub async fn chat_page_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    Path(chat_id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let flashes = Flashes::from_headers(&headers);
    match owned_chat(&state, &user, chat_id).await {
        Ok(Some(chat)) => render_chat(&state, &user, chat, flashes).await,
        Ok(None) => chat_not_found(&state),
        Err(e) => {
            error!("Failed to load chat {}: {:?}", chat_id, e);
            chat_not_found(&state)
        }
    }
}

/// POST /chat/{chat_id} - Answer a message and store the turn
pub async fn chat_post_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
    Path(chat_id): Path<i64>,
    headers: HeaderMap,
    Form(form): Form<MessageForm>,
) -> Response {
    let mut flashes = Flashes::from_headers(&headers);

    // 1. Make sure the chat exists and belongs to the user
    let chat = match owned_chat(&state, &user, chat_id).await {
        Ok(Some(chat)) => chat,
        Ok(None) => return chat_not_found(&state),
        Err(e) => {
            error!("Failed to load chat {}: {:?}", chat_id, e);
            return chat_not_found(&state);
        }
    };

    // 2. Reject blank input before touching the models
    let text = form.message.trim();
    if text.is_empty() {
        flashes.warning("Please enter a message.");
        return render_chat(&state, &user, chat, flashes).await;
    }

    // 3. Generate the reply and persist both sides of the turn
    if let Err(e) = answer(&state, chat.chat_id, text).await {
        error!("Failed to process message in chat {}: {:?}", chat_id, e);
        flashes.danger(PROCESSING_ERROR);
    }

    render_chat(&state, &user, chat, flashes).await
}

/// GET /new_chat - Start an empty conversation
pub async fn new_chat_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<SessionUser>,
) -> Response {
    match state.db.create_chat(user.user_id).await {
        Ok(chat) => {
            info!(chat_id = chat.chat_id, user_id = user.user_id, "Chat created");
            Redirect::to(&format!("/chat/{}", chat.chat_id)).into_response()
        }
        Err(e) => {
            error!("Failed to create chat: {:?}", e);
            (
                [(
                    header::SET_COOKIE,
                    notice_cookie(Notice::NewChatFailed, state.config.cookie_secure),
                )],
                Redirect::to("/chat"),
            )
                .into_response()
        }
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

async fn answer(state: &AppState, chat_id: i64, text: &str) -> PortResult<()> {
    let reply = state.pipeline.reply_to(text).await?;
    state.db.append_turn(chat_id, text, &reply.text).await?;
    Ok(())
}

/// A chat the user may see; anyone else's chat is reported as missing.
async fn owned_chat(state: &AppState, user: &SessionUser, chat_id: i64) -> PortResult<Option<Chat>> {
    match state.db.get_chat(chat_id).await {
        Ok(chat) if chat.user_id == user.user_id => Ok(Some(chat)),
        Ok(_) => {
            warn!(chat_id, user_id = user.user_id, "Access to another user's chat refused");
            Ok(None)
        }
        Err(PortError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

async fn sidebar(state: &AppState, user: &SessionUser, flashes: &mut Flashes) -> Vec<ChatLink> {
    match state.db.list_chats(user.user_id).await {
        Ok(chats) => chats.into_iter().map(ChatLink::from).collect(),
        Err(e) => {
            error!("Failed to fetch chats for user {}: {:?}", user.user_id, e);
            flashes.danger("Error fetching chats.");
            Vec::new()
        }
    }
}

async fn render_chat(state: &AppState, user: &SessionUser, chat: Chat, mut flashes: Flashes) -> Response {
    let chats = sidebar(state, user, &mut flashes).await;
    let messages: Vec<MessageView> = match state.db.list_messages(chat.chat_id).await {
        Ok(messages) => messages.into_iter().map(MessageView::from).collect(),
        Err(e) => {
            error!("Failed to fetch messages for chat {}: {:?}", chat.chat_id, e);
            flashes.danger(PROCESSING_ERROR);
            Vec::new()
        }
    };

    render_page(
        state,
        "chat.html",
        flashes,
        context! {
            username => user.username,
            chats => chats,
            chat_id => chat.chat_id,
            messages => messages,
        },
    )
}

fn chat_not_found(state: &AppState) -> Response {
    (
        [(
            header::SET_COOKIE,
            notice_cookie(Notice::ChatNotFound, state.config.cookie_secure),
        )],
        Redirect::to("/chat"),
    )
        .into_response()
}
