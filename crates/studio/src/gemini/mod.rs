//! Google Gemini text generation.
//!
//! Only the `generateContent` call is used: one instruction in, one text
//! answer out. Retry and model fallback live in
//! [`crate::services::prompt`].

mod client;
mod error;
mod types;

pub use client::GeminiClient;
pub use error::GeminiError;
pub use types::{GenerateRequest, GenerateResponse};
