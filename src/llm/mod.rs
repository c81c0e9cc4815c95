// LLM Provider Module
// Provides a unified interface for multiple LLM providers

pub mod key_rotator;
pub mod loop_detector;
pub mod provider;

#[cfg(feature = "gemini")]
pub mod gemini;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(test)]
mod tests;

// Re-export main types
pub use key_rotator::KeyRotator;
pub use loop_detector::{LoopAction, LoopDetection, LoopDetector, LoopDetectorConfig, LoopType};
pub use provider::*;

#[cfg(feature = "gemini")]
pub use gemini::GeminiProvider;

#[cfg(feature = "openai")]
pub use openai::OpenAIProvider;
