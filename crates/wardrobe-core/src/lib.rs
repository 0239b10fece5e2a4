//! Client-side sync and caching layer for the Wardrobe Designer backend.
//!
//! - `api`: backend trait, HTTP client, error taxonomy
//! - `auth`: bearer-token session and local key-value storage
//! - `cache`: in-memory caches (collections, signed URLs, schedules, profile)
//! - `sync`: polling, pagination, optimistic mutation, bulk upload
//! - `session`: the per-user service object that owns all of the above

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod preferences;
pub mod session;
pub mod sync;

#[cfg(test)]
mod testing;

pub use api::{ApiClient, ApiError, WardrobeApi};
pub use config::Config;
pub use session::WardrobeSession;
