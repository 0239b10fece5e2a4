use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{
    CreateEventRequest, CreateItemRequest, DailySchedule, Event, EventQuery,
    GenerateScheduleRequest, ItemPage, ItemQuery, RegenerateDayRequest, SignedUrlsResponse,
    UpdateEventRequest, UpdateItemRequest, UpdateProfileRequest, UserProfile, WardrobeItem,
    WeeklySchedule,
};

use super::ApiError;

/// The backend operations the sync layer consumes.
///
/// `ApiClient` is the HTTP implementation; tests substitute a scripted fake.
#[async_trait]
pub trait WardrobeApi: Send + Sync {
    // ===== Items =====

    async fn list_items(&self, query: &ItemQuery) -> Result<ItemPage, ApiError>;

    async fn get_item(&self, item_id: &str) -> Result<WardrobeItem, ApiError>;

    async fn create_item(&self, request: &CreateItemRequest) -> Result<WardrobeItem, ApiError>;

    async fn update_item(
        &self,
        item_id: &str,
        request: &UpdateItemRequest,
    ) -> Result<WardrobeItem, ApiError>;

    async fn delete_item(&self, item_id: &str) -> Result<(), ApiError>;

    async fn signed_urls(
        &self,
        item_ids: &[String],
        expires_in: u64,
    ) -> Result<SignedUrlsResponse, ApiError>;

    // ===== Schedule =====

    /// `Ok(None)` when no schedule exists for the week.
    async fn get_weekly_schedule(
        &self,
        start_date: NaiveDate,
    ) -> Result<Option<WeeklySchedule>, ApiError>;

    async fn generate_weekly_schedule(
        &self,
        request: &GenerateScheduleRequest,
    ) -> Result<WeeklySchedule, ApiError>;

    async fn regenerate_day(
        &self,
        date: NaiveDate,
        request: &RegenerateDayRequest,
    ) -> Result<DailySchedule, ApiError>;

    // ===== Events =====

    async fn list_events(&self, query: &EventQuery) -> Result<Vec<Event>, ApiError>;

    async fn get_event(&self, event_id: &str) -> Result<Event, ApiError>;

    async fn create_event(&self, request: &CreateEventRequest) -> Result<Event, ApiError>;

    async fn update_event(
        &self,
        event_id: &str,
        request: &UpdateEventRequest,
    ) -> Result<Event, ApiError>;

    async fn delete_event(&self, event_id: &str) -> Result<(), ApiError>;

    // ===== Profile =====

    async fn get_profile(&self) -> Result<UserProfile, ApiError>;

    async fn update_profile(&self, request: &UpdateProfileRequest)
        -> Result<UserProfile, ApiError>;
}
