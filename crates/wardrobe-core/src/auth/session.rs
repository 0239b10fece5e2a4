use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::ApiClient;

use super::KeyValueStore;

const ACCESS_TOKEN_KEY: &str = "wardrobe_access_token";
const REFRESH_TOKEN_KEY: &str = "wardrobe_refresh_token";

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub user: AuthUser,
    /// `None` when the account still needs email confirmation.
    pub session: Option<AuthSessionTokens>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Bearer-token lifecycle: sign in, restore from the store, sign out.
pub struct AuthSession {
    api: ApiClient,
    store: Arc<dyn KeyValueStore>,
}

impl AuthSession {
    pub fn new(api: ApiClient, store: Arc<dyn KeyValueStore>) -> Self {
        Self { api, store }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn load_tokens(&self) -> Result<Option<AuthTokens>> {
        let Some(access_token) = self.store.get(ACCESS_TOKEN_KEY)? else {
            return Ok(None);
        };
        let refresh_token = self.store.get(REFRESH_TOKEN_KEY)?;
        Ok(Some(AuthTokens {
            access_token,
            refresh_token,
        }))
    }

    fn save_tokens(&self, tokens: &AuthTokens) -> Result<()> {
        self.store
            .set(ACCESS_TOKEN_KEY, &tokens.access_token)
            .context("Failed to save access token")?;
        if let Some(ref refresh) = tokens.refresh_token {
            self.store
                .set(REFRESH_TOKEN_KEY, refresh)
                .context("Failed to save refresh token")?;
        }
        Ok(())
    }

    /// Put a previously stored token back on the client. Returns whether one was found.
    pub fn restore(&self) -> Result<bool> {
        match self.load_tokens()? {
            Some(tokens) => {
                self.api.set_token(Some(tokens.access_token));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.api.token().is_some()
    }

    pub async fn sign_in(&self, credentials: &Credentials) -> Result<AuthUser> {
        let response = self
            .api
            .sign_in(credentials)
            .await
            .context("Sign in failed")?;
        let session = response
            .session
            .ok_or_else(|| anyhow::anyhow!("Account requires email confirmation"))?;

        let tokens = AuthTokens {
            access_token: session.access_token,
            refresh_token: Some(session.refresh_token),
        };
        self.save_tokens(&tokens)?;
        self.api.set_token(Some(tokens.access_token));
        info!(user = %response.user.email, "Signed in");
        Ok(response.user)
    }

    /// Sign the user up. Returns `true` if the backend issued a session immediately.
    pub async fn sign_up(&self, credentials: &Credentials) -> Result<bool> {
        let response = self
            .api
            .sign_up(credentials)
            .await
            .context("Sign up failed")?;
        match response.session {
            Some(session) => {
                let tokens = AuthTokens {
                    access_token: session.access_token,
                    refresh_token: Some(session.refresh_token),
                };
                self.save_tokens(&tokens)?;
                self.api.set_token(Some(tokens.access_token));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Tell the server, then drop local tokens regardless of its answer.
    pub async fn sign_out(&self) -> Result<()> {
        if let Err(e) = self.api.sign_out().await {
            warn!(error = %e, "Server sign out failed, clearing local session anyway");
        }
        self.invalidate()
    }

    /// Drop local tokens without contacting the server (used after a 401).
    pub fn invalidate(&self) -> Result<()> {
        self.api.set_token(None);
        self.store.remove(ACCESS_TOKEN_KEY)?;
        self.store.remove(REFRESH_TOKEN_KEY)?;
        info!("Local session cleared");
        Ok(())
    }
}
