//! services/web/src/adapters/onnx.rs
//!
//! Loading and tensor helpers shared by the ONNX Runtime model adapters.

use chatbot_core::ports::{PortError, PortResult};
use ndarray::Array2;
use ort::session::Session;
use std::path::Path;
use tokenizers::Tokenizer;

/// Opens an ONNX model file, failing early with a readable message if it is missing.
pub(crate) fn load_session(model_path: &Path) -> PortResult<Session> {
    if !model_path.exists() {
        return Err(PortError::Unexpected(format!(
            "ONNX model not found at {}",
            model_path.display()
        )));
    }

    Session::builder()
        .map_err(|e| PortError::Unexpected(format!("ONNX session builder: {}", e)))?
        .with_intra_threads(1)
        .map_err(|e| PortError::Unexpected(format!("ONNX set threads: {}", e)))?
        .commit_from_file(model_path)
        .map_err(|e| PortError::Unexpected(format!("ONNX load model {}: {}", model_path.display(), e)))
}

/// Opens a HuggingFace `tokenizer.json`.
pub(crate) fn load_tokenizer(tokenizer_path: &Path) -> PortResult<Tokenizer> {
    if !tokenizer_path.exists() {
        return Err(PortError::Unexpected(format!(
            "Tokenizer not found at {}",
            tokenizer_path.display()
        )));
    }
    Tokenizer::from_file(tokenizer_path)
        .map_err(|e| PortError::Unexpected(format!("Failed to load tokenizer: {}", e)))
}

/// Shapes a token sequence as a batch of one: `[1, len]`.
pub(crate) fn batch_of_one(values: Vec<i64>, name: &str) -> PortResult<Array2<i64>> {
    let len = values.len();
    Array2::from_shape_vec((1, len), values)
        .map_err(|e| PortError::Unexpected(format!("{} array: {}", name, e)))
}

/// Index of the largest score; the first one wins on ties.
pub(crate) fn argmax(scores: &[f32]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((i, score)),
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_picks_highest_score() {
        assert_eq!(argmax(&[0.1, 2.5, -1.0, 0.3]), Some(1));
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0]), Some(1));
    }

    #[test]
    fn argmax_of_empty_is_none() {
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn batch_of_one_has_leading_unit_dimension() {
        let array = batch_of_one(vec![5, 6, 7], "input_ids").unwrap();
        assert_eq!(array.shape(), &[1, 3]);
    }

    #[test]
    fn missing_model_file_is_reported() {
        let err = load_session(Path::new("/nonexistent/model.onnx")).unwrap_err();
        assert!(err.to_string().contains("ONNX model not found"));
    }
}
