//! services/web/src/adapters/intent_onnx.rs
//!
//! This module contains the adapter for the intent classification model.
//! It implements the `IntentModelService` port from the `core` crate using a
//! sequence-classification ONNX export (e.g. a fine-tuned RoBERTa) run by `ort`.

use crate::adapters::onnx::{argmax, batch_of_one, load_session, load_tokenizer};
use async_trait::async_trait;
use chatbot_core::ports::{IntentModelService, PortError, PortResult};
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokenizers::{Tokenizer, TruncationParams};
use tracing::info;

/// Longest input the classifier accepts; longer text is truncated.
const MAX_INPUT_TOKENS: usize = 512;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// Expects a model directory containing `model.onnx` and a tokenizer directory
/// containing `tokenizer.json`. The model takes `input_ids` and `attention_mask`
/// and returns `logits` of shape `[1, num_labels]`.
#[derive(Clone)]
pub struct OnnxIntentAdapter {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
}

impl std::fmt::Debug for OnnxIntentAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxIntentAdapter").finish()
    }
}

impl OnnxIntentAdapter {
    /// Loads the classifier from its model and tokenizer directories.
    pub fn from_directories(model_dir: &Path, tokenizer_dir: &Path) -> PortResult<Self> {
        Self::from_files(&model_dir.join("model.onnx"), &tokenizer_dir.join("tokenizer.json"))
    }

    /// Load from explicit model and tokenizer file paths.
    pub fn from_files(model_path: &Path, tokenizer_path: &Path) -> PortResult<Self> {
        let session = load_session(model_path)?;
        let mut tokenizer = load_tokenizer(tokenizer_path)?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_INPUT_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| PortError::Unexpected(format!("Tokenizer truncation: {}", e)))?;

        info!(model = %model_path.display(), "Loaded ONNX intent model");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
        })
    }

    /// Tokenize, run one forward pass, and take the argmax over the logits.
    fn predict_sync(&self, text: &str) -> PortResult<usize> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| PortError::Unexpected(format!("Tokenization failed: {}", e)))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();

        let ids_array = batch_of_one(input_ids, "input_ids")?;
        let mask_array = batch_of_one(attention_mask, "attention_mask")?;
        let ids_ref = TensorRef::from_array_view(&ids_array)
            .map_err(|e| PortError::Unexpected(format!("TensorRef input_ids: {}", e)))?;
        let mask_ref = TensorRef::from_array_view(&mask_array)
            .map_err(|e| PortError::Unexpected(format!("TensorRef attention_mask: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| PortError::Unexpected(format!("Session lock poisoned: {}", e)))?;
        let outputs = session
            .run(ort::inputs!["input_ids" => ids_ref, "attention_mask" => mask_ref])
            .map_err(|e| PortError::Unexpected(format!("ONNX inference failed: {}", e)))?;

        // Logits for a batch of one: [1, num_labels].
        let (_shape, logits) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| PortError::Unexpected(format!("Extract logits: {}", e)))?;

        argmax(logits).ok_or_else(|| PortError::Unexpected("Model produced no logits".to_string()))
    }
}

//=========================================================================================
// `IntentModelService` Trait Implementation
//=========================================================================================

#[async_trait]
impl IntentModelService for OnnxIntentAdapter {
    async fn predict_class(&self, text: &str) -> PortResult<usize> {
        // ONNX Runtime inference is CPU-bound; run on a blocking thread.
        let adapter = self.clone();
        let text_owned = text.to_string();

        tokio::task::spawn_blocking(move || adapter.predict_sync(&text_owned))
            .await
            .map_err(|e| PortError::Unexpected(format!("Intent task panicked: {}", e)))?
    }
}
