//! Content generation adapter.
//!
//! One interface ([`GenerationAdapter`]) over an external generative AI
//! capability, with a stage-specific instruction profile and typed output
//! shape per generation kind.

pub mod adapter;
pub mod error;
pub mod gemini;

pub use adapter::{GenerationAdapter, GenerationKind, GenerationOutput, GenerationRequest};
pub use error::{AdapterError, AdapterResult};
pub use gemini::GeminiClient;
