//! Memory Therapy Core - Shared domain types.
//!
//! This crate provides the types used across all Memory Therapy components:
//! - `studio` - The web service that runs the memory-to-image workflow
//! - `cli` - Command-line tools for migrations and provider diagnostics
//!
//! # Architecture
//!
//! The core crate contains only types and pure decisions - no I/O, no
//! database access, no HTTP clients. This keeps the quota and validation
//! rules testable in isolation.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for user ids, emails, plans, memories,
//!   prompts, images and pending plan changes
//! - [`entitlement`] - The quota gate and usage snapshot

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod entitlement;
pub mod types;

pub use entitlement::{UsageSnapshot, can_generate};
pub use types::*;
