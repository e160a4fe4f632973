//! Identity provider errors and their user-facing text.

use thiserror::Error;

/// Provider codes with a fixed user-facing translation.
const MESSAGES: &[(&str, &str)] = &[
    ("EMAIL_EXISTS", "This email is already registered"),
    ("INVALID_EMAIL", "Invalid email address"),
    ("OPERATION_NOT_ALLOWED", "Operation not allowed"),
    ("WEAK_PASSWORD", "The password is too weak"),
    ("USER_DISABLED", "This account has been disabled"),
    ("EMAIL_NOT_FOUND", "No account exists with this email"),
    ("INVALID_PASSWORD", "Incorrect password"),
    ("INVALID_LOGIN_CREDENTIALS", "Incorrect email or password"),
    ("TOO_MANY_ATTEMPTS_TRY_LATER", "Too many attempts. Try again later"),
];

const NETWORK_MESSAGE: &str = "Connection error. Check your internet connection";

/// Errors from the identity provider.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The provider rejected the request with an error code.
    #[error("identity provider rejected request: {code}")]
    Rejected {
        /// Provider code, e.g. `EMAIL_EXISTS`.
        code: String,
        /// Full provider message, which may carry detail after the code.
        message: String,
    },

    /// The provider could not be reached.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to parse response.
    #[error("parse error: {0}")]
    Parse(String),

    /// Client could not be configured.
    #[error("configuration error: {0}")]
    Config(String),
}

impl IdentityError {
    /// Build a rejection from a provider message such as
    /// `"WEAK_PASSWORD : Password should be at least 6 characters"`.
    #[must_use]
    pub fn from_provider_message(message: &str) -> Self {
        let code = message
            .split_once(" : ")
            .map_or(message, |(code, _)| code)
            .trim()
            .to_string();
        Self::Rejected {
            code,
            message: message.to_string(),
        }
    }

    /// Text to show the user.
    ///
    /// Unmapped provider codes fall back to the provider's own message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { code, message } => MESSAGES
                .iter()
                .find(|(known, _)| known == code)
                .map_or_else(|| message.clone(), |(_, text)| (*text).to_string()),
            Self::Http(_) => NETWORK_MESSAGE.to_string(),
            Self::Parse(_) | Self::Config(_) => "Authentication is unavailable".to_string(),
        }
    }

    /// The provider code, if the provider answered.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Rejected { code, .. } => Some(code),
            _ => None,
        }
    }
}
