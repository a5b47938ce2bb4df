//! Extension traits at the two external seams of EquityTool.
//!
//! ```text
//! ┌──────────────┐  verify/create   ┌──────────────────┐
//! │     CLI      │─────────────────▶│ CredentialStore  │  (SQLite + bcrypt)
//! └──────┬───────┘                  └──────────────────┘
//!        │ Session
//!        ▼
//! ┌──────────────┐    generate      ┌──────────────────┐
//! │  QaEngine    │─────────────────▶│  LanguageModel   │  (Gemini / OpenAI)
//! └──────────────┘                  └──────────────────┘
//! ```
//!
//! Implement [`LanguageModel`] to plug in another provider (or a fake in
//! tests); implement [`CredentialStore`] to keep accounts somewhere other
//! than the bundled SQLite database.

use async_trait::async_trait;

use crate::auth::AuthError;
use crate::llm::ModelFailure;

/// A hosted text-generation model.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use equity_tool::llm::ModelFailure;
/// use equity_tool::traits::LanguageModel;
///
/// pub struct EchoModel;
///
/// #[async_trait]
/// impl LanguageModel for EchoModel {
///     fn model_name(&self) -> &str { "echo" }
///
///     async fn generate(&self, prompt: &str) -> Result<String, ModelFailure> {
///         Ok(prompt.lines().last().unwrap_or_default().to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Returns the model identifier (e.g. `"gemini-2.5-flash"`).
    fn model_name(&self) -> &str;

    /// Sends one prompt and returns the model's text verbatim.
    ///
    /// Every fault must be returned as a [`ModelFailure`]; implementations
    /// never panic on transport or decoding errors.
    async fn generate(&self, prompt: &str) -> Result<String, ModelFailure>;
}

/// Username/password persistence with salted-hash verification.
///
/// Plaintext passwords cross this boundary only to be hashed or compared;
/// they are never stored.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns `true` only when the user exists and the password matches.
    async fn verify(&self, username: &str, password: &str) -> Result<bool, AuthError>;

    /// Stores a new account. An existing username yields
    /// [`AuthError::DuplicateUsername`] and leaves the stored hash untouched.
    async fn create(&self, username: &str, password: &str) -> Result<(), AuthError>;
}
