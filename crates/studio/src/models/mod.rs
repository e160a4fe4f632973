//! Domain models for the studio.

pub mod session;
pub mod user;

pub use session::{CurrentUser, keys as session_keys};
pub use user::UserAccount;
