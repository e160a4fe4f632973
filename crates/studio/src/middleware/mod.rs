//! HTTP middleware stack for the studio.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (tower-sessions with `PostgreSQL` store)
//! 4. Rate limiting (governor) on auth and submission routes

pub mod auth;
pub mod rate_limit;
pub mod session;

pub use auth::{OptionalAuth, RequireAuth, clear_current_user, set_current_user};
pub use rate_limit::{auth_rate_limiter, generation_rate_limiter};
pub use session::{
    SessionAuthWatch, SessionClientStore, SignInBus, SignInEvent, create_session_layer,
};
