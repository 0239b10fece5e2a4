//! API client for communicating with the Wardrobe Designer REST API.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! API requests against the item, schedule, event and profile endpoints.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{multipart, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::auth::{AuthResponse, Credentials};
use crate::config::Config;
use crate::models::{
    CreateEventRequest, CreateItemRequest, DailySchedule, Event, EventQuery,
    GenerateScheduleRequest, ImageSource, ItemPage, ItemQuery, RegenerateDayRequest,
    SignedUrlsRequest, SignedUrlsResponse, UpdateEventRequest, UpdateItemRequest,
    UpdateProfileRequest, UserProfile, WardrobeItem, WeeklySchedule,
};

use super::{ApiError, WardrobeApi};

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Endpoints whose 401 responses mean "bad credentials", not "session expired".
const AUTH_ENDPOINT_PREFIX: &str = "/auth/";

const ITEMS_ENDPOINT: &str = "/items";
const SCHEDULE_ENDPOINT: &str = "/schedule";
const EVENTS_ENDPOINT: &str = "/events";
const PROFILE_ENDPOINT: &str = "/profile";

/// Invoked when a non-auth endpoint answers 401.
pub type UnauthorizedCallback = Arc<dyn Fn() + Send + Sync>;

/// API client for the Wardrobe Designer backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling,
/// and clones share the same bearer token.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
    on_unauthorized: Option<UnauthorizedCallback>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(None)),
            on_unauthorized: None,
        })
    }

    /// Set (or clear) the bearer token for authenticated requests
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Register the session-invalidated callback fired on 401 from non-auth endpoints.
    pub fn set_on_unauthorized(&mut self, callback: UnauthorizedCallback) {
        self.on_unauthorized = Some(callback);
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn is_auth_endpoint(endpoint: &str) -> bool {
        endpoint.starts_with(AUTH_ENDPOINT_PREFIX)
    }

    fn notify_unauthorized(&self, endpoint: &str) {
        if Self::is_auth_endpoint(endpoint) {
            return;
        }
        if let Some(ref callback) = self.on_unauthorized {
            warn!(endpoint = endpoint, "Session rejected by server, invalidating");
            callback();
        }
    }

    /// Send a request built by `build`, retrying 429s with exponential backoff.
    ///
    /// `build` runs once per attempt so multipart bodies can be rebuilt.
    async fn execute<F>(&self, endpoint: &str, build: F) -> Result<reqwest::Response, ApiError>
    where
        F: Fn(&Client, String) -> Result<RequestBuilder, ApiError> + Send + Sync,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut request = build(&self.client, self.url(endpoint))?;
            if let Some(token) = self.token() {
                request = request.bearer_auth(token);
            }

            let response = request.send().await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited);
                }
                warn!(endpoint = endpoint, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2; // Exponential backoff
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(self.rejection(endpoint, status, &body));
        }
    }

    /// Map a failed response to an error, invalidating the session on a 401
    /// from any non-auth endpoint.
    fn rejection(&self, endpoint: &str, status: StatusCode, body: &str) -> ApiError {
        let error = ApiError::from_status(status, body);
        if error.is_unauthorized() {
            self.notify_unauthorized(endpoint);
        }
        error
    }

    async fn parse_json<T: DeserializeOwned>(
        endpoint: &str,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", endpoint, e))
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&'static str, String)],
    ) -> Result<T, ApiError> {
        let response = self
            .execute(endpoint, |client, url| Ok(client.get(url).query(params)))
            .await?;
        Self::parse_json(endpoint, response).await
    }

    async fn send_json<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .execute(endpoint, |client, url| {
                Ok(client.request(method.clone(), url).json(body))
            })
            .await?;
        Self::parse_json(endpoint, response).await
    }

    async fn delete(&self, endpoint: &str) -> Result<(), ApiError> {
        self.execute(endpoint, |client, url| Ok(client.delete(url)))
            .await?;
        Ok(())
    }

    async fn send_multipart<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        fields: Vec<(&'static str, String)>,
        image: Option<(&ImageSource, Vec<u8>)>,
    ) -> Result<T, ApiError> {
        let response = self
            .execute(endpoint, |client, url| {
                let mut form = multipart::Form::new();
                for (name, value) in &fields {
                    form = form.text(*name, value.clone());
                }
                if let Some((source, bytes)) = &image {
                    let part = multipart::Part::bytes(bytes.clone())
                        .file_name(source.file_name.clone())
                        .mime_str(&source.mime_type)?;
                    form = form.part("image", part);
                }
                Ok(client.request(method.clone(), url).multipart(form))
            })
            .await?;
        Self::parse_json(endpoint, response).await
    }

    // ===== Authentication =====

    pub async fn sign_in(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        self.send_json(reqwest::Method::POST, "/auth/signin", credentials)
            .await
    }

    pub async fn sign_up(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        self.send_json(reqwest::Method::POST, "/auth/signup", credentials)
            .await
    }

    pub async fn sign_out(&self) -> Result<(), ApiError> {
        self.execute("/auth/signout", |client, url| Ok(client.post(url)))
            .await?;
        Ok(())
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), ApiError> {
        let body = serde_json::json!({ "email": email });
        self.execute("/auth/reset-password", |client, url| {
            Ok(client.post(url).json(&body))
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl WardrobeApi for ApiClient {
    async fn list_items(&self, query: &ItemQuery) -> Result<ItemPage, ApiError> {
        let page: ItemPage = self.get(ITEMS_ENDPOINT, &query.to_params()).await?;
        debug!(page = page.page, pages = page.pages, count = page.items.len(), "Fetched item page");
        Ok(page)
    }

    async fn get_item(&self, item_id: &str) -> Result<WardrobeItem, ApiError> {
        self.get(&format!("{}/{}", ITEMS_ENDPOINT, item_id), &[])
            .await
    }

    async fn create_item(&self, request: &CreateItemRequest) -> Result<WardrobeItem, ApiError> {
        let bytes = tokio::fs::read(&request.image.path).await?;
        let mut fields = Vec::new();
        if let Some(ref name) = request.name {
            fields.push(("name", name.clone()));
        }
        if let Some(category) = request.category {
            fields.push(("category", category.as_str().to_string()));
        }
        if let Some(ref color) = request.color {
            fields.push(("color", color.clone()));
        }
        self.send_multipart(
            reqwest::Method::POST,
            ITEMS_ENDPOINT,
            fields,
            Some((&request.image, bytes)),
        )
        .await
    }

    async fn update_item(
        &self,
        item_id: &str,
        request: &UpdateItemRequest,
    ) -> Result<WardrobeItem, ApiError> {
        let image = match request.image {
            Some(ref source) => Some((source, tokio::fs::read(&source.path).await?)),
            None => None,
        };
        let mut fields = Vec::new();
        if let Some(ref name) = request.name {
            fields.push(("name", name.clone()));
        }
        if let Some(category) = request.category {
            fields.push(("category", category.as_str().to_string()));
        }
        if let Some(ref color) = request.color {
            fields.push(("color", color.clone()));
        }
        self.send_multipart(
            reqwest::Method::PUT,
            &format!("{}/{}", ITEMS_ENDPOINT, item_id),
            fields,
            image,
        )
        .await
    }

    async fn delete_item(&self, item_id: &str) -> Result<(), ApiError> {
        self.delete(&format!("{}/{}", ITEMS_ENDPOINT, item_id))
            .await
    }

    async fn signed_urls(
        &self,
        item_ids: &[String],
        expires_in: u64,
    ) -> Result<SignedUrlsResponse, ApiError> {
        let body = SignedUrlsRequest {
            item_ids,
            expires_in,
        };
        self.send_json(
            reqwest::Method::POST,
            &format!("{}/signed-urls", ITEMS_ENDPOINT),
            &body,
        )
        .await
    }

    async fn get_weekly_schedule(
        &self,
        start_date: NaiveDate,
    ) -> Result<Option<WeeklySchedule>, ApiError> {
        let endpoint = format!("{}/weekly", SCHEDULE_ENDPOINT);
        let params = [("start_date", start_date.format("%Y-%m-%d").to_string())];
        let response = match self
            .execute(&endpoint, |client, url| Ok(client.get(url).query(&params)))
            .await
        {
            Ok(response) => response,
            Err(ApiError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let status = response.status();
        let text = response.text().await?;
        weekly_schedule_from(status, &text)
    }

    async fn generate_weekly_schedule(
        &self,
        request: &GenerateScheduleRequest,
    ) -> Result<WeeklySchedule, ApiError> {
        self.send_json(
            reqwest::Method::POST,
            &format!("{}/weekly", SCHEDULE_ENDPOINT),
            request,
        )
        .await
    }

    async fn regenerate_day(
        &self,
        date: NaiveDate,
        request: &RegenerateDayRequest,
    ) -> Result<DailySchedule, ApiError> {
        self.send_json(
            reqwest::Method::POST,
            &format!("{}/{}/regenerate", SCHEDULE_ENDPOINT, date.format("%Y-%m-%d")),
            request,
        )
        .await
    }

    async fn list_events(&self, query: &EventQuery) -> Result<Vec<Event>, ApiError> {
        self.get(EVENTS_ENDPOINT, &query.to_params()).await
    }

    async fn get_event(&self, event_id: &str) -> Result<Event, ApiError> {
        self.get(&format!("{}/{}", EVENTS_ENDPOINT, event_id), &[])
            .await
    }

    async fn create_event(&self, request: &CreateEventRequest) -> Result<Event, ApiError> {
        self.send_json(reqwest::Method::POST, EVENTS_ENDPOINT, request)
            .await
    }

    async fn update_event(
        &self,
        event_id: &str,
        request: &UpdateEventRequest,
    ) -> Result<Event, ApiError> {
        self.send_json(
            reqwest::Method::PUT,
            &format!("{}/{}", EVENTS_ENDPOINT, event_id),
            request,
        )
        .await
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), ApiError> {
        self.delete(&format!("{}/{}", EVENTS_ENDPOINT, event_id))
            .await
    }

    async fn get_profile(&self) -> Result<UserProfile, ApiError> {
        self.get(PROFILE_ENDPOINT, &[]).await
    }

    async fn update_profile(
        &self,
        request: &UpdateProfileRequest,
    ) -> Result<UserProfile, ApiError> {
        self.send_json(reqwest::Method::PUT, PROFILE_ENDPOINT, request)
            .await
    }
}

/// A week with no plan comes back as 404, an empty body, or `null`.
fn weekly_schedule_from(
    status: StatusCode,
    body: &str,
) -> Result<Option<WeeklySchedule>, ApiError> {
    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !status.is_success() {
        return Err(ApiError::from_status(status, body));
    }
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse weekly schedule: {}", e)))
}
