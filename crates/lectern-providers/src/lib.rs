//! Lectern Providers - Clients for the external services the pipeline calls.
//!
//! Transcription goes to an OpenAI-compatible Whisper endpoint. Image
//! captioning goes to Gemini, an OpenAI-compatible chat endpoint, or Ollama.

mod error;
mod factory;
mod gemini;
mod http;
mod ollama;
mod openai;
mod traits;
mod types;
mod whisper;

pub use error::{ProviderError, ProviderResult};
pub use factory::{api_key_from_env, transcription_from_config, vision_from_config};
pub use gemini::GeminiVision;
pub use ollama::OllamaVision;
pub use openai::OpenAiVision;
pub use traits::{TranscriptionProvider, VisionProvider};
pub use whisper::WhisperClient;
