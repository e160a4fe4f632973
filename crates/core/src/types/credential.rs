//! User-supplied credentials: account passwords and image-provider API keys.

use core::fmt;

use secrecy::{ExposeSecret, SecretString};

use super::email::{Email, EmailError};

/// Error for an image-provider key that cannot possibly be valid.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiKeyError {
    /// No key was supplied.
    #[error("an API key is required for this image backend")]
    Missing,
    /// The key does not have the provider's shape.
    #[error("API key must start with `{prefix}` and be longer than {min_len} characters")]
    Malformed {
        /// Expected prefix.
        prefix: &'static str,
        /// Length the key must exceed.
        min_len: usize,
    },
}

/// A caller-supplied `OpenAI` API key.
///
/// Only the shape is checked (`sk-` prefix, more than 20 characters); the
/// provider decides whether it is authorised. `Debug` never prints the key.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Required key prefix.
    pub const PREFIX: &'static str = "sk-";
    /// The key must be strictly longer than this.
    pub const MIN_LENGTH: usize = 20;

    /// Validate an optional key.
    ///
    /// # Errors
    ///
    /// Returns `ApiKeyError::Missing` for `None` or a blank key and
    /// `ApiKeyError::Malformed` for a key with the wrong shape.
    pub fn parse(raw: Option<&str>) -> Result<Self, ApiKeyError> {
        let raw = raw.map(str::trim).filter(|s| !s.is_empty());
        let key = raw.ok_or(ApiKeyError::Missing)?;
        if !key.starts_with(Self::PREFIX) || key.len() <= Self::MIN_LENGTH {
            return Err(ApiKeyError::Malformed {
                prefix: Self::PREFIX,
                min_len: Self::MIN_LENGTH,
            });
        }
        Ok(Self(SecretString::from(key.to_owned())))
    }

    /// The key for the `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

/// An account password that passed the local length rule.
#[derive(Clone)]
pub struct Password(SecretString);

impl Password {
    /// Minimum password length accepted by the sign-up form.
    pub const MIN_LENGTH: usize = 6;

    /// The password to forward to the identity provider.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password([REDACTED])")
    }
}

/// Every problem found in a sign-in or sign-up form.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", .problems.join("\n"))]
pub struct AuthFormError {
    /// One message per failed rule, in form order.
    pub problems: Vec<String>,
}

/// Validate a sign-in (`confirm` is `None`) or sign-up form.
///
/// All rules are checked so the user sees every problem at once.
///
/// # Errors
///
/// Returns an [`AuthFormError`] listing each failed rule.
pub fn validate_auth_form(
    email: &str,
    password: &str,
    confirm: Option<&str>,
) -> Result<(Email, Password), AuthFormError> {
    let mut problems = Vec::new();

    let email = Email::parse(email).map_err(|e: EmailError| {
        problems.push(format!("Please enter a valid email ({e})"));
    });

    if password.chars().count() < Password::MIN_LENGTH {
        problems.push(format!(
            "Password must be at least {} characters",
            Password::MIN_LENGTH
        ));
    }

    if confirm.is_some_and(|c| c != password) {
        problems.push("Passwords do not match".to_owned());
    }

    match email {
        Ok(email) if problems.is_empty() => {
            Ok((email, Password(SecretString::from(password.to_owned()))))
        }
        _ => Err(AuthFormError { problems }),
    }
}
