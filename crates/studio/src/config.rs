//! Studio configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STUDIO_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STUDIO_BASE_URL` - Public URL for the studio
//! - `STUDIO_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `GEMINI_API_KEY` - Google Generative Language API key
//! - `HF_TOKEN` - Hugging Face inference token
//! - `FIREBASE_API_KEY` - Firebase Identity Toolkit web API key
//!
//! ## Optional
//! - `STUDIO_HOST` - Bind address (default: 127.0.0.1)
//! - `STUDIO_PORT` - Listen port (default: 3000)
//! - `GEMINI_MODELS` - Comma-separated text models in priority order
//! - `PROMPT_MAX_ATTEMPTS` - Attempts per text model (default: 3)
//! - `PROMPT_BACKOFF_BASE_MS` - Rate-limit backoff base (default: 2000)
//! - `HF_MODELS` - Comma-separated image models in priority order
//! - `DEEPAI_API_KEY` - Enables the `DeepAI` backend
//! - `STRIPE_BASIC_LINK`, `STRIPE_PREMIUM_LINK`, `STRIPE_ENTERPRISE_LINK` - Payment links
//! - `STRIPE_SECRET_KEY` - Enables the background purchase lookup
//! - `PAYMENT_RETURN_WINDOW_SECS` - Pending plan change validity (default: 3600)
//! - `PAYMENT_AUTH_WAIT_MS` - How long a payment return waits for sign-in (default: 30000)
//! - `PAYMENT_CHECK_INTERVAL_SECS` - Background purchase check interval (default: 86400)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use memory_therapy_core::PlanTier;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Text models tried in order when `GEMINI_MODELS` is unset.
pub const DEFAULT_GEMINI_MODELS: &[&str] = &["gemini-2.5-flash", "gemini-2.5-pro"];

/// Image models tried in order when `HF_MODELS` is unset.
pub const DEFAULT_HF_MODELS: &[&str] = &[
    "black-forest-labs/FLUX.1-dev",
    "runwayml/stable-diffusion-v1-5",
    "CompVis/stable-diffusion-v1-4",
    "stabilityai/stable-diffusion-xl-base-1.0",
];

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Studio application configuration.
#[derive(Debug, Clone)]
pub struct StudioConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the studio
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    pub gemini: GeminiConfig,
    pub imaging: ImagingConfig,
    pub identity: IdentityConfig,
    pub billing: BillingConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
}

/// Text-generation configuration.
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: SecretString,
    /// Models in priority order
    pub models: Vec<String>,
    /// Attempts per model before falling through to the next one
    pub max_attempts: u32,
    /// Base of the exponential rate-limit backoff
    pub backoff_base: Duration,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"[REDACTED]")
            .field("models", &self.models)
            .field("max_attempts", &self.max_attempts)
            .field("backoff_base", &self.backoff_base)
            .finish()
    }
}

/// Image backend configuration.
#[derive(Clone)]
pub struct ImagingConfig {
    pub hf_token: SecretString,
    /// Hugging Face models in priority order
    pub hf_models: Vec<String>,
    /// `DeepAI` key; the backend is unavailable without it
    pub deepai_api_key: Option<SecretString>,
}

impl std::fmt::Debug for ImagingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagingConfig")
            .field("hf_token", &"[REDACTED]")
            .field("hf_models", &self.hf_models)
            .field(
                "deepai_api_key",
                &self.deepai_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Identity provider configuration.
#[derive(Clone)]
pub struct IdentityConfig {
    pub api_key: SecretString,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Payment links and the payment-return timings.
#[derive(Clone)]
pub struct BillingConfig {
    pub basic_link: Option<String>,
    pub premium_link: Option<String>,
    pub enterprise_link: Option<String>,
    /// Enables the background purchase lookup
    pub stripe_secret_key: Option<SecretString>,
    /// How long a pending plan change stays valid
    pub return_window: Duration,
    /// How long a payment return waits for an authenticated session
    pub auth_wait: Duration,
    /// Minimum time between background purchase checks per browser
    pub check_interval: Duration,
}

impl std::fmt::Debug for BillingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingConfig")
            .field("basic_link", &self.basic_link)
            .field("premium_link", &self.premium_link)
            .field("enterprise_link", &self.enterprise_link)
            .field(
                "stripe_secret_key",
                &self.stripe_secret_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("return_window", &self.return_window)
            .field("auth_wait", &self.auth_wait)
            .field("check_interval", &self.check_interval)
            .finish()
    }
}

impl BillingConfig {
    /// The payment link for a paid plan, if one is configured.
    #[must_use]
    pub fn link_for(&self, plan: PlanTier) -> Option<&str> {
        match plan {
            PlanTier::Free => None,
            PlanTier::Basic => self.basic_link.as_deref(),
            PlanTier::Premium => self.premium_link.as_deref(),
            PlanTier::Enterprise => self.enterprise_link.as_deref(),
        }
    }
}

impl StudioConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STUDIO_DATABASE_URL")?;
        let host = parse_env_or_default::<IpAddr>("STUDIO_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("STUDIO_PORT", "3000")?;
        let base_url = get_required_env("STUDIO_BASE_URL")?;
        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("STUDIO_BASE_URL".to_string(), e.to_string()))?;
        let session_secret = get_validated_secret("STUDIO_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "STUDIO_SESSION_SECRET")?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            gemini: GeminiConfig::from_env()?,
            imaging: ImagingConfig::from_env()?,
            identity: IdentityConfig::from_env()?,
            billing: BillingConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env_or_default("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env_or_default("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Optional features that are switched off by missing configuration.
    ///
    /// Logged at startup so a half-configured deployment is visible.
    #[must_use]
    pub fn missing_optional(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.imaging.deepai_api_key.is_none() {
            missing.push("DEEPAI_API_KEY (DeepAI backend disabled)");
        }
        if self.billing.basic_link.is_none() {
            missing.push("STRIPE_BASIC_LINK (basic checkout disabled)");
        }
        if self.billing.premium_link.is_none() {
            missing.push("STRIPE_PREMIUM_LINK (premium checkout disabled)");
        }
        if self.billing.enterprise_link.is_none() {
            missing.push("STRIPE_ENTERPRISE_LINK (enterprise checkout disabled)");
        }
        if self.billing.stripe_secret_key.is_none() {
            missing.push("STRIPE_SECRET_KEY (background purchase check disabled)");
        }
        if self.sentry_dsn.is_none() {
            missing.push("SENTRY_DSN (error tracking disabled)");
        }
        missing
    }
}

impl GeminiConfig {
    /// Load only the text-generation settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `GEMINI_API_KEY` is missing or weak, or a
    /// tuning variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let max_attempts = parse_env_or_default::<u32>("PROMPT_MAX_ATTEMPTS", "3")?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "PROMPT_MAX_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            api_key: get_validated_secret("GEMINI_API_KEY")?,
            models: get_list_or_default("GEMINI_MODELS", DEFAULT_GEMINI_MODELS)?,
            max_attempts,
            backoff_base: Duration::from_millis(parse_env_or_default(
                "PROMPT_BACKOFF_BASE_MS",
                "2000",
            )?),
        })
    }
}

impl ImagingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let deepai_api_key = match get_optional_env("DEEPAI_API_KEY") {
            Some(value) => {
                validate_secret_strength(&value, "DEEPAI_API_KEY")?;
                Some(SecretString::from(value))
            }
            None => None,
        };
        Ok(Self {
            hf_token: get_validated_secret("HF_TOKEN")?,
            hf_models: get_list_or_default("HF_MODELS", DEFAULT_HF_MODELS)?,
            deepai_api_key,
        })
    }
}

impl IdentityConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: get_validated_secret("FIREBASE_API_KEY")?,
        })
    }
}

impl BillingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let stripe_secret_key = match get_optional_env("STRIPE_SECRET_KEY") {
            Some(value) => {
                validate_secret_strength(&value, "STRIPE_SECRET_KEY")?;
                Some(SecretString::from(value))
            }
            None => None,
        };
        Ok(Self {
            basic_link: get_optional_env("STRIPE_BASIC_LINK"),
            premium_link: get_optional_env("STRIPE_PREMIUM_LINK"),
            enterprise_link: get_optional_env("STRIPE_ENTERPRISE_LINK"),
            stripe_secret_key,
            return_window: Duration::from_secs(parse_env_or_default(
                "PAYMENT_RETURN_WINDOW_SECS",
                "3600",
            )?),
            auth_wait: Duration::from_millis(parse_env_or_default(
                "PAYMENT_AUTH_WAIT_MS",
                "30000",
            )?),
            check_interval: Duration::from_secs(parse_env_or_default(
                "PAYMENT_CHECK_INTERVAL_SECS",
                "86400",
            )?),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default`.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Read a comma-separated list, falling back to `default` when unset.
fn get_list_or_default(key: &str, default: &[&str]) -> Result<Vec<String>, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(default.iter().map(|s| (*s).to_string()).collect());
    };
    let list = parse_list(&raw);
    if list.is_empty() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "list is empty".to_string(),
        ));
    }
    Ok(list)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
