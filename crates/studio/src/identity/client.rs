//! Identity Toolkit REST client.

use std::sync::Arc;

use memory_therapy_core::{Email, Password, UserId};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

use crate::config::IdentityConfig;

use super::error::IdentityError;

const IDENTITY_TOOLKIT_BASE: &str = "https://identitytoolkit.googleapis.com/v1";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResponse {
    local_id: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// A user whose credentials the provider accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub user_id: UserId,
    pub email: Email,
}

/// Identity Toolkit client.
#[derive(Clone)]
pub struct IdentityClient {
    inner: Arc<IdentityClientInner>,
}

struct IdentityClientInner {
    client: reqwest::Client,
    api_key: SecretString,
}

impl IdentityClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Config` if the HTTP client cannot be built.
    pub fn new(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| IdentityError::Config(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(IdentityClientInner {
                client,
                api_key: config.api_key.clone(),
            }),
        })
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Rejected` with the provider code (for example
    /// `EMAIL_EXISTS`) or a transport error.
    #[instrument(skip_all, fields(email = %email))]
    pub async fn sign_up(
        &self,
        email: &Email,
        password: &Password,
    ) -> Result<VerifiedIdentity, IdentityError> {
        self.password_call("accounts:signUp", email, password).await
    }

    /// Check an email/password pair.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Rejected` with the provider code (for example
    /// `INVALID_LOGIN_CREDENTIALS`) or a transport error.
    #[instrument(skip_all, fields(email = %email))]
    pub async fn sign_in(
        &self,
        email: &Email,
        password: &Password,
    ) -> Result<VerifiedIdentity, IdentityError> {
        self.password_call("accounts:signInWithPassword", email, password)
            .await
    }

    async fn password_call(
        &self,
        method: &str,
        email: &Email,
        password: &Password,
    ) -> Result<VerifiedIdentity, IdentityError> {
        let url = endpoint(method, &self.inner.api_key)?;
        let request = PasswordRequest {
            email: email.as_str(),
            password: password.expose(),
            return_secure_token: true,
        };

        let response = self.inner.client.post(url).json(&request).send().await?;

        if !response.status().is_success() {
            let body = response.text().await?;
            return Err(serde_json::from_str::<ErrorEnvelope>(&body).map_or_else(
                |_| IdentityError::Parse(format!("unexpected error body: {body}")),
                |envelope| IdentityError::from_provider_message(&envelope.error.message),
            ));
        }

        let body: PasswordResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Parse(e.to_string()))?;
        verified(body)
    }
}

fn endpoint(method: &str, api_key: &SecretString) -> Result<Url, IdentityError> {
    Url::parse_with_params(
        &format!("{IDENTITY_TOOLKIT_BASE}/{method}"),
        &[("key", api_key.expose_secret())],
    )
    .map_err(|e| IdentityError::Config(e.to_string()))
}

fn verified(body: PasswordResponse) -> Result<VerifiedIdentity, IdentityError> {
    Ok(VerifiedIdentity {
        user_id: UserId::new(body.local_id).map_err(|e| IdentityError::Parse(e.to_string()))?,
        email: Email::parse(&body.email).map_err(|e| IdentityError::Parse(e.to_string()))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_carries_key() {
        let url = endpoint("accounts:signUp", &SecretString::from("AIzaTestKey")).expect("url");
        assert_eq!(url.path(), "/v1/accounts:signUp");
        assert_eq!(url.query(), Some("key=AIzaTestKey"));
    }

    #[test]
    fn test_verified_from_response() {
        let body: PasswordResponse = serde_json::from_str(
            r#"{"kind":"identitytoolkit#SignupNewUserResponse","localId":"u1","email":"a@b.co","idToken":"t","refreshToken":"r","expiresIn":"3600"}"#,
        )
        .expect("parse");
        let identity = verified(body).expect("valid");
        assert_eq!(identity.user_id.as_str(), "u1");
        assert_eq!(identity.email.as_str(), "a@b.co");
    }

    #[test]
    fn test_request_is_camel_case() {
        let request = PasswordRequest {
            email: "a@b.co",
            password: "secret1",
            return_secure_token: true,
        };
        let json = serde_json::to_value(&request).expect("json");
        assert_eq!(json["returnSecureToken"], true);
    }
}
