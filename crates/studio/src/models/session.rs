//! Session-related types.
//!
//! The server session is the browser's durable state: who is signed in,
//! the plan upgrade awaiting a payment return, and when the background
//! purchase check last ran.

use serde::{Deserialize, Serialize};

use memory_therapy_core::{Email, UserId};

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Identity provider user ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
}

/// Session keys.
pub mod keys {
    /// Key for storing the current signed-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the plan upgrade recorded before the payment redirect.
    pub const PENDING_PLAN_CHANGE: &str = "pending_plan_change";

    /// Key for the timestamp of the last background purchase check.
    pub const LAST_PAYMENT_CHECK: &str = "last_payment_check";
}
