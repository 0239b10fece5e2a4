//! REST API client module for the Wardrobe Designer backend.
//!
//! This module provides the `WardrobeApi` trait that the caches and
//! controllers depend on, and `ApiClient`, its HTTP implementation.
//!
//! The API uses bearer token authentication obtained from `/auth/signin`.
//! A 401 from any non-auth endpoint fires the client's session-invalidated
//! callback instead of being retried.

pub mod backend;
pub mod client;
pub mod error;

pub use backend::WardrobeApi;
pub use client::{ApiClient, UnauthorizedCallback};
pub use error::ApiError;
