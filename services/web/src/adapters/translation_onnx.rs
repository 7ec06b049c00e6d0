//! services/web/src/adapters/translation_onnx.rs
//!
//! This module contains the adapter for the Swahili/English translation model.
//! It implements the `TranslationService` port from the `core` crate with an
//! M2M100-style encoder/decoder ONNX export and greedy decoding.

use crate::adapters::onnx::{argmax, batch_of_one, load_session, load_tokenizer};
use async_trait::async_trait;
use chatbot_core::domain::Language;
use chatbot_core::ports::{PortError, PortResult, TranslationService};
use ndarray::{Array2, Array3};
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokenizers::Tokenizer;
use tracing::{debug, info};

const EOS_TOKEN: &str = "</s>";

/// The tokenizer's marker for a language, e.g. `__sw__`.
fn language_token(language: Language) -> String {
    format!("__{}__", language.code())
}

/// Encoder output kept alive across decoding steps.
struct EncodedSource {
    hidden: Array3<f32>,
    attention_mask: Array2<i64>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// Expects a model directory containing `encoder_model.onnx`,
/// `decoder_model.onnx` and `tokenizer.json`.
///
/// The source is encoded as `__src__ tokens </s>`. Decoding starts from `</s>`
/// with the first generated token forced to `__tgt__`, then picks the most
/// likely token at each step until `</s>` or `max_length`.
#[derive(Clone)]
pub struct OnnxTranslationAdapter {
    encoder: Arc<Mutex<Session>>,
    decoder: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    eos_id: u32,
    english_id: u32,
    swahili_id: u32,
    max_length: usize,
}

impl std::fmt::Debug for OnnxTranslationAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxTranslationAdapter")
            .field("max_length", &self.max_length)
            .finish()
    }
}

impl OnnxTranslationAdapter {
    /// Load the encoder, decoder and tokenizer from one directory.
    pub fn from_directory(model_dir: &Path, max_length: usize) -> PortResult<Self> {
        let encoder = load_session(&model_dir.join("encoder_model.onnx"))?;
        let decoder = load_session(&model_dir.join("decoder_model.onnx"))?;
        let tokenizer = load_tokenizer(&model_dir.join("tokenizer.json"))?;

        let token_id = |token: &str| {
            tokenizer.token_to_id(token).ok_or_else(|| {
                PortError::Unexpected(format!("Translation tokenizer has no '{}' token", token))
            })
        };
        let eos_id = token_id(EOS_TOKEN)?;
        let english_id = token_id(&language_token(Language::English))?;
        let swahili_id = token_id(&language_token(Language::Swahili))?;

        info!(
            model = %model_dir.display(),
            max_length,
            "Loaded ONNX translation model"
        );

        Ok(Self {
            encoder: Arc::new(Mutex::new(encoder)),
            decoder: Arc::new(Mutex::new(decoder)),
            tokenizer: Arc::new(tokenizer),
            eos_id,
            english_id,
            swahili_id,
            max_length,
        })
    }

    fn language_id(&self, language: Language) -> u32 {
        match language {
            Language::English => self.english_id,
            Language::Swahili => self.swahili_id,
        }
    }

    fn translate_sync(&self, text: &str, source: Language, target: Language) -> PortResult<String> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| PortError::Unexpected(format!("Tokenization failed: {}", e)))?;

        let mut input_ids = Vec::with_capacity(encoding.len() + 2);
        input_ids.push(self.language_id(source) as i64);
        input_ids.extend(encoding.get_ids().iter().map(|&id| id as i64));
        input_ids.push(self.eos_id as i64);

        let source_encoded = self.encode(input_ids)?;

        let mut generated: Vec<i64> = vec![self.eos_id as i64, self.language_id(target) as i64];
        while generated.len() < self.max_length {
            let next = self.next_token(&generated, &source_encoded)?;
            if next == self.eos_id as i64 {
                break;
            }
            generated.push(next);
        }

        let output_ids: Vec<u32> = generated.iter().skip(2).map(|&id| id as u32).collect();
        debug!(tokens = output_ids.len(), "Translation decoded");
        self.tokenizer
            .decode(&output_ids, true)
            .map(|s| s.trim().to_string())
            .map_err(|e| PortError::Unexpected(format!("Detokenization failed: {}", e)))
    }

    fn encode(&self, input_ids: Vec<i64>) -> PortResult<EncodedSource> {
        let mask = vec![1_i64; input_ids.len()];
        let ids_array = batch_of_one(input_ids, "input_ids")?;
        let mask_array = batch_of_one(mask, "attention_mask")?;
        let ids_ref = TensorRef::from_array_view(&ids_array)
            .map_err(|e| PortError::Unexpected(format!("TensorRef input_ids: {}", e)))?;
        let mask_ref = TensorRef::from_array_view(&mask_array)
            .map_err(|e| PortError::Unexpected(format!("TensorRef attention_mask: {}", e)))?;

        let mut encoder = self
            .encoder
            .lock()
            .map_err(|e| PortError::Unexpected(format!("Encoder lock poisoned: {}", e)))?;
        let outputs = encoder
            .run(ort::inputs!["input_ids" => ids_ref, "attention_mask" => mask_ref])
            .map_err(|e| PortError::Unexpected(format!("Encoder inference failed: {}", e)))?;

        // last_hidden_state: [1, src_len, hidden].
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| PortError::Unexpected(format!("Extract encoder state: {}", e)))?;
        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        if dims.len() != 3 {
            return Err(PortError::Unexpected(format!(
                "Unexpected encoder output shape: {:?}",
                dims
            )));
        }
        let hidden = Array3::from_shape_vec((dims[0], dims[1], dims[2]), data.to_vec())
            .map_err(|e| PortError::Unexpected(format!("encoder state array: {}", e)))?;

        Ok(EncodedSource {
            hidden,
            attention_mask: mask_array.clone(),
        })
    }

    fn next_token(&self, generated: &[i64], source: &EncodedSource) -> PortResult<i64> {
        let ids_array = batch_of_one(generated.to_vec(), "decoder input_ids")?;
        let ids_ref = TensorRef::from_array_view(&ids_array)
            .map_err(|e| PortError::Unexpected(format!("TensorRef input_ids: {}", e)))?;
        let mask_ref = TensorRef::from_array_view(&source.attention_mask)
            .map_err(|e| PortError::Unexpected(format!("TensorRef encoder_attention_mask: {}", e)))?;
        let hidden_ref = TensorRef::from_array_view(&source.hidden)
            .map_err(|e| PortError::Unexpected(format!("TensorRef encoder_hidden_states: {}", e)))?;

        let mut decoder = self
            .decoder
            .lock()
            .map_err(|e| PortError::Unexpected(format!("Decoder lock poisoned: {}", e)))?;
        let outputs = decoder
            .run(ort::inputs![
                "input_ids" => ids_ref,
                "encoder_attention_mask" => mask_ref,
                "encoder_hidden_states" => hidden_ref
            ])
            .map_err(|e| PortError::Unexpected(format!("Decoder inference failed: {}", e)))?;

        // logits: [1, tgt_len, vocab]; only the last position matters.
        let (shape, logits) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| PortError::Unexpected(format!("Extract decoder logits: {}", e)))?;
        let vocab = shape
            .last()
            .map(|&d| d as usize)
            .filter(|&d| d > 0 && logits.len() >= d)
            .ok_or_else(|| PortError::Unexpected(format!("Unexpected logits shape: {:?}", shape)))?;
        let last_step = &logits[logits.len() - vocab..];

        argmax(last_step)
            .map(|id| id as i64)
            .ok_or_else(|| PortError::Unexpected("Decoder produced no logits".to_string()))
    }
}

//=========================================================================================
// `TranslationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TranslationService for OnnxTranslationAdapter {
    async fn translate(&self, text: &str, source: Language, target: Language) -> PortResult<String> {
        if source == target || text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let adapter = self.clone();
        let text_owned = text.to_string();

        tokio::task::spawn_blocking(move || adapter.translate_sync(&text_owned, source, target))
            .await
            .map_err(|e| PortError::Unexpected(format!("Translation task panicked: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_tokens_follow_m2m100_convention() {
        assert_eq!(language_token(Language::English), "__en__");
        assert_eq!(language_token(Language::Swahili), "__sw__");
    }

    #[test]
    fn missing_model_directory_is_an_error() {
        let err = OnnxTranslationAdapter::from_directory(Path::new("/nonexistent"), 200).unwrap_err();
        assert!(matches!(err, PortError::Unexpected(_)));
    }
}
