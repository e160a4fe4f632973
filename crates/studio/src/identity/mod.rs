//! Email/password identity via the Firebase Identity Toolkit REST API.
//!
//! The provider only vouches for credentials. Who is signed in to a
//! browser is tracked by the server session (see [`crate::models::session`]).

mod client;
mod error;

pub use client::{IdentityClient, VerifiedIdentity};
pub use error::IdentityError;
