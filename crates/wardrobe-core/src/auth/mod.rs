//! Authentication module for bearer tokens and local key-value persistence.
//!
//! This module provides:
//! - `AuthSession`: sign in/up/out and token restore
//! - `KeyValueStore`: get/set/remove contract, backed by the OS keychain
//!   (`KeyringStore`) or process memory (`MemoryStore`)

pub mod session;
pub mod store;

pub use session::{AuthResponse, AuthSession, AuthTokens, AuthUser, Credentials};
pub use store::{KeyValueStore, KeyringStore, MemoryStore};
