//! Memory Therapy Studio library.
//!
//! Turns a described memory into a therapeutic image prompt and an image,
//! metered against the user's plan. The binary in `main.rs` serves it over
//! HTTP; the CLI and integration tests use the library directly.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod gemini;
pub mod identity;
pub mod imaging;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
