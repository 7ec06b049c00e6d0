pub mod db;
pub mod intent_onnx;
pub mod language;
mod onnx;
pub mod translation_onnx;

pub use db::DbAdapter;
pub use intent_onnx::OnnxIntentAdapter;
pub use language::LinguaDetectorAdapter;
pub use translation_onnx::OnnxTranslationAdapter;
