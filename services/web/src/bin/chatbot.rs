//! services/web/src/bin/chatbot.rs

use chatbot_core::{catalog::IntentCatalog, conversation::ConversationPipeline};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use web_lib::{
    adapters::{DbAdapter, LinguaDetectorAdapter, OnnxIntentAdapter, OnnxTranslationAdapter},
    config::Config,
    error::ApiError,
    web::{router, state::AppState, templates::Templates},
};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_adapter = Arc::new(DbAdapter::connect(&config.database_url).await?);
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Load the Intent Catalog ---
    let catalog = Arc::new(IntentCatalog::load(
        &config.intents_path,
        &config.intent_mapping_path,
    )?);
    info!(
        intents = catalog.intent_count(),
        classes = catalog.class_count(),
        "Intent catalog loaded"
    );

    // --- 4. Initialize Model Adapters ---
    let detector = Arc::new(LinguaDetectorAdapter::new());
    let intent_model = Arc::new(OnnxIntentAdapter::from_directories(
        &config.model_path,
        &config.tokenizer_path,
    )?);
    let translator = Arc::new(OnnxTranslationAdapter::from_directory(
        &config.translation_model_path,
        config.translation_max_length,
    )?);

    let pipeline = Arc::new(ConversationPipeline::from_parts(
        catalog,
        detector,
        intent_model,
        translator,
        config.response_seed,
    ));

    // --- 5. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        config: config.clone(),
        pipeline,
        templates: Arc::new(Templates::new()?),
    });

    // --- 6. Create the Web Router ---
    let app = router(app_state);

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
