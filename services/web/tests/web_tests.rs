//! Router-level tests: real handlers and an in-memory database, with the
//! models replaced by deterministic doubles.

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, Response, StatusCode},
    Router,
};
use chatbot_core::catalog::IntentCatalog;
use chatbot_core::conversation::ConversationPipeline;
use chatbot_core::domain::{
    AuthSession, Chat, ChatSummary, Message, Sender, SessionUser, User, UserCredentials,
};
use chatbot_core::ports::{DatabaseService, PortError, PortResult};
use chatbot_core::responder::FALLBACK_ENGLISH;
use chatbot_core::testing::{KeywordDetector, KeywordIntentModel, RecordingTranslator};
use std::sync::Arc;
use tower::ServiceExt;
use web_lib::adapters::DbAdapter;
use web_lib::config::Config;
use web_lib::web::{router, state::AppState, templates::Templates};

const INTENTS: &str = r#"{"intents": [
    {"tag": "greeting", "responses": ["Hello! How can I help you?"]},
    {"tag": "goodbye", "responses": ["Goodbye!"]}
]}"#;
const MAPPING: &str = r#"{"0": "greeting", "1": "goodbye"}"#;
const GREETING_SW: &str = "Habari! Nikusaidie vipi?";

struct TestApp {
    app: Router,
    db: Arc<DbAdapter>,
}

fn greeting_translator() -> RecordingTranslator {
    RecordingTranslator::with_entries(&[
        ("Hujambo", "Hello"),
        ("Hello! How can I help you?", GREETING_SW),
    ])
}

async fn test_app() -> TestApp {
    build_app(greeting_translator(), |db| db as Arc<dyn DatabaseService>).await
}

/// Builds the router with the given translator, serving storage through `storage`.
async fn build_app<F>(translator: RecordingTranslator, storage: F) -> TestApp
where
    F: FnOnce(Arc<DbAdapter>) -> Arc<dyn DatabaseService>,
{
    let db = Arc::new(DbAdapter::in_memory().await.unwrap());
    let config = Config::from_lookup(|key| match key {
        "SECRET_KEY" => Some("integration-secret".to_string()),
        "SESSION_COOKIE_SECURE" => Some("false".to_string()),
        _ => None,
    })
    .unwrap();

    let catalog = Arc::new(IntentCatalog::from_json(INTENTS, MAPPING).unwrap());
    let pipeline = ConversationPipeline::from_parts(
        catalog,
        Arc::new(KeywordDetector),
        Arc::new(KeywordIntentModel::new(&[("hello", 0), ("bye", 1)], 99)),
        Arc::new(translator),
        Some(7),
    );

    let state = Arc::new(AppState {
        db: storage(db.clone()),
        config: Arc::new(config),
        pipeline: Arc::new(pipeline),
        templates: Arc::new(Templates::new().unwrap()),
    });

    TestApp {
        app: router(state),
        db,
    }
}

/// Real storage, except that reading a chat's history always fails.
struct HistoryUnavailable(Arc<DbAdapter>);

#[async_trait]
impl DatabaseService for HistoryUnavailable {
    async fn create_user(&self, username: &str, hashed_password: &str) -> PortResult<User> {
        self.0.create_user(username, hashed_password).await
    }

    async fn get_user_by_username(&self, username: &str) -> PortResult<UserCredentials> {
        self.0.get_user_by_username(username).await
    }

    async fn create_auth_session(&self, session: &AuthSession) -> PortResult<()> {
        self.0.create_auth_session(session).await
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<SessionUser> {
        self.0.validate_auth_session(session_id).await
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.0.delete_auth_session(session_id).await
    }

    async fn create_chat(&self, user_id: i64) -> PortResult<Chat> {
        self.0.create_chat(user_id).await
    }

    async fn get_chat(&self, chat_id: i64) -> PortResult<Chat> {
        self.0.get_chat(chat_id).await
    }

    async fn list_chats(&self, user_id: i64) -> PortResult<Vec<ChatSummary>> {
        self.0.list_chats(user_id).await
    }

    async fn append_message(&self, chat_id: i64, sender: Sender, text: &str) -> PortResult<Message> {
        self.0.append_message(chat_id, sender, text).await
    }

    async fn append_turn(
        &self,
        chat_id: i64,
        user_text: &str,
        bot_text: &str,
    ) -> PortResult<(Message, Message)> {
        self.0.append_turn(chat_id, user_text, bot_text).await
    }

    async fn list_messages(&self, _chat_id: i64) -> PortResult<Vec<Message>> {
        Err(PortError::Unexpected("database is locked".to_string()))
    }
}

//=========================================================================================
// Request Helpers
//=========================================================================================

impl TestApp {
    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.app
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn post_form(&self, uri: &str, form: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.app
            .clone()
            .oneshot(builder.body(Body::from(form.to_string())).unwrap())
            .await
            .unwrap()
    }

    /// Registers and logs in, returning the `session=...` cookie pair.
    async fn login_as(&self, username: &str, password: &str) -> String {
        let form = format!("username={}&password={}", username, password);
        let response = self.post_form("/register", &form, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = self.post_form("/login", &form, None).await;
        assert_eq!(location(&response), Some("/chat"));
        cookie_pair(&response, "session").expect("login sets a session cookie")
    }

    /// Creates a chat and returns its id.
    async fn new_chat(&self, session: &str) -> i64 {
        let response = self.get("/new_chat", Some(session)).await;
        let location = location(&response).expect("new chat redirects").to_string();
        location
            .trim_start_matches("/chat/")
            .parse()
            .expect("redirect names the chat id")
    }
}

fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

/// The `name=value` part of a Set-Cookie header for `name`.
fn cookie_pair(response: &Response<Body>, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&prefix))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

//=========================================================================================
// Authentication
//=========================================================================================

#[tokio::test]
async fn root_redirects_to_login() {
    let t = test_app().await;
    let response = t.get("/", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
}

#[tokio::test]
async fn chat_routes_require_a_session() {
    let t = test_app().await;
    for uri in ["/chat", "/chat/1", "/new_chat"] {
        let response = t.get(uri, None).await;
        assert_eq!(location(&response), Some("/login"), "{uri}");
    }
}

#[tokio::test]
async fn forged_session_cookie_is_rejected() {
    let t = test_app().await;
    let session = t.login_as("alice", "secret123").await;
    let unsigned = session.split('.').next().unwrap().to_string();

    let response = t.get("/chat", Some(&unsigned)).await;
    assert_eq!(location(&response), Some("/login"));
}

#[tokio::test]
async fn registration_notice_is_shown_once_on_login_page() {
    let t = test_app().await;

    let response = t
        .post_form("/register", "username=alice&password=secret123", None)
        .await;
    assert_eq!(location(&response), Some("/login"));
    let notice = cookie_pair(&response, "flash").unwrap();
    assert_eq!(notice, "flash=registered");

    let response = t.get("/login", Some(&notice)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cookie_pair(&response, "flash").as_deref(), Some("flash="));
    let body = body_text(response).await;
    assert!(body.contains("Registration successful! Please log in."));
}

#[tokio::test]
async fn duplicate_username_keeps_the_first_password() {
    let t = test_app().await;
    t.login_as("alice", "secret123").await;

    let response = t
        .post_form("/register", "username=alice&password=other", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Username already exists!"));

    let response = t
        .post_form("/login", "username=alice&password=secret123", None)
        .await;
    assert_eq!(location(&response), Some("/chat"));
    let response = t
        .post_form("/login", "username=alice&password=other", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn wrong_password_and_unknown_user_fail_alike() {
    let t = test_app().await;
    t.login_as("alice", "secret123").await;

    for form in [
        "username=alice&password=wrong",
        "username=nobody&password=secret123",
    ] {
        let response = t.post_form("/login", form, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(cookie_pair(&response, "session").is_none());
        assert!(body_text(response).await.contains("Invalid username or password!"));
    }
}

#[tokio::test]
async fn logout_ends_the_server_side_session() {
    let t = test_app().await;
    let session = t.login_as("alice", "secret123").await;

    let response = t.get("/logout", Some(&session)).await;
    assert_eq!(location(&response), Some("/login"));
    assert_eq!(cookie_pair(&response, "session").as_deref(), Some("session="));
    assert_eq!(cookie_pair(&response, "flash").as_deref(), Some("flash=logged_out"));

    // The old cookie is still correctly signed but no longer known to the server.
    let response = t.get("/chat", Some(&session)).await;
    assert_eq!(location(&response), Some("/login"));
}

//=========================================================================================
// Chatting
//=========================================================================================

#[tokio::test]
async fn swahili_greeting_is_answered_in_swahili() {
    let t = test_app().await;
    let session = t.login_as("alice", "secret123").await;
    let chat_id = t.new_chat(&session).await;

    let response = t
        .post_form(&format!("/chat/{}", chat_id), "message=Hujambo", Some(&session))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("Hujambo"));
    assert!(body.contains(GREETING_SW));

    let messages = t.db.list_messages(chat_id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].sender, Sender::User);
    assert_eq!(messages[0].text, "Hujambo");
    assert_eq!(messages[1].sender, Sender::Bot);
    assert_eq!(messages[1].text, GREETING_SW);
}

#[tokio::test]
async fn unrecognised_intent_gets_the_fallback_reply() {
    let t = test_app().await;
    let session = t.login_as("alice", "secret123").await;
    let chat_id = t.new_chat(&session).await;

    let response = t
        .post_form(
            &format!("/chat/{}", chat_id),
            "message=what+is+the+weather",
            Some(&session),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let messages = t.db.list_messages(chat_id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].text, "what is the weather");
    assert_eq!(messages[1].text, FALLBACK_ENGLISH);
}

#[tokio::test]
async fn blank_message_is_rejected_without_storing_anything() {
    let t = test_app().await;
    let session = t.login_as("alice", "secret123").await;
    let chat_id = t.new_chat(&session).await;

    let response = t
        .post_form(&format!("/chat/{}", chat_id), "message=+++", Some(&session))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Please enter a message."));
    assert!(t.db.list_messages(chat_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn history_is_stable_and_listed_in_the_sidebar() {
    let t = test_app().await;
    let session = t.login_as("alice", "secret123").await;
    let chat_id = t.new_chat(&session).await;
    t.post_form(&format!("/chat/{}", chat_id), "message=bye", Some(&session))
        .await;

    let first = body_text(t.get(&format!("/chat/{}", chat_id), Some(&session)).await).await;
    let second = body_text(t.get(&format!("/chat/{}", chat_id), Some(&session)).await).await;
    assert_eq!(first, second);
    assert!(first.contains("Goodbye!"));

    let list = body_text(t.get("/chat", Some(&session)).await).await;
    assert!(list.contains(&format!("href=\"/chat/{}\"", chat_id)));
    assert!(list.contains("bye"));
}

#[tokio::test]
async fn other_users_chats_are_not_found() {
    let t = test_app().await;
    let alice = t.login_as("alice", "secret123").await;
    let bob = t.login_as("bob", "hunter2").await;
    let chat_id = t.new_chat(&alice).await;

    let response = t.get(&format!("/chat/{}", chat_id), Some(&bob)).await;
    assert_eq!(location(&response), Some("/chat"));
    assert_eq!(
        cookie_pair(&response, "flash").as_deref(),
        Some("flash=chat_not_found")
    );

    let response = t
        .post_form(&format!("/chat/{}", chat_id), "message=hello", Some(&bob))
        .await;
    assert_eq!(location(&response), Some("/chat"));
    assert!(t.db.list_messages(chat_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_chat_redirects_to_the_list() {
    let t = test_app().await;
    let session = t.login_as("alice", "secret123").await;

    let response = t.get("/chat/999", Some(&session)).await;
    assert_eq!(location(&response), Some("/chat"));
}

#[tokio::test]
async fn model_failure_flashes_an_error_and_stores_nothing() {
    let t = build_app(RecordingTranslator::failing(), |db| db as Arc<dyn DatabaseService>).await;
    let session = t.login_as("alice", "secret123").await;
    let chat_id = t.new_chat(&session).await;

    let response = t
        .post_form(&format!("/chat/{}", chat_id), "message=Hujambo", Some(&session))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response)
        .await
        .contains("An error occurred while processing your message."));
    assert!(t.db.list_messages(chat_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn history_failure_on_chat_page_flashes_processing_error() {
    let t = build_app(greeting_translator(), |db| {
        Arc::new(HistoryUnavailable(db)) as Arc<dyn DatabaseService>
    })
    .await;
    let session = t.login_as("alice", "secret123").await;
    let chat_id = t.new_chat(&session).await;

    let response = t.get(&format!("/chat/{}", chat_id), Some(&session)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("An error occurred while processing your message."));
    assert!(!body.contains("Error fetching chats."));
}
