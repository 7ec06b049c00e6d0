pub mod catalog;
pub mod conversation;
pub mod domain;
pub mod language;
pub mod ports;
pub mod responder;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use catalog::{CatalogError, IntentCatalog, UNKNOWN_INTENT};
pub use conversation::ConversationPipeline;
pub use domain::{
    AuthSession, Chat, ChatSummary, Language, Message, Reply, Sender, SessionUser, User,
    UserCredentials,
};
pub use ports::{
    DatabaseService, IntentModelService, LanguageDetectionService, PortError, PortResult,
    TranslationService,
};
pub use responder::ResponseSelector;
