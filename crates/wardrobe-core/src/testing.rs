//! Shared fakes and fixtures for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, TimeZone, Utc};

use crate::api::{ApiError, WardrobeApi};
use crate::cache::{Clock, CollectionSource};
use crate::models::{
    Category, CreateEventRequest, CreateItemRequest, DailySchedule, DressCode, Event, EventQuery,
    GenerateScheduleRequest, ItemPage, ItemQuery, RegenerateDayRequest, SignedUrlItem,
    SignedUrlsResponse, UpdateEventRequest, UpdateItemRequest, UpdateProfileRequest, UserProfile,
    WardrobeItem, WeatherSnapshot, WeeklySchedule,
};

// ============================================================================
// Fixtures
// ============================================================================

pub fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("fixture date")
}

fn fixture_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0)
        .single()
        .expect("fixture time")
}

pub fn item(id: &str) -> WardrobeItem {
    WardrobeItem {
        id: id.to_string(),
        name: format!("Item {}", id),
        category: Category::Tops,
        color: None,
        image_url: format!("user-1/{}.jpg", id),
        created_at: fixture_time(),
        updated_at: fixture_time(),
        last_used: None,
    }
}

pub fn event(id: &str, on: &str) -> Event {
    Event {
        id: id.to_string(),
        name: format!("Event {}", id),
        date: date(on),
        dress_code: DressCode::SmartCasual,
        notes: None,
    }
}

pub fn day(on: NaiveDate) -> DailySchedule {
    DailySchedule {
        date: on,
        day_name: on.format("%A").to_string(),
        weather: WeatherSnapshot {
            temp_min: 12.0,
            temp_max: 21.0,
            description: "clear sky".into(),
            icon: Some("01d".into()),
            precipitation_chance: None,
        },
        event: None,
        top: None,
        bottom: None,
        shoes: None,
        outer_layer: None,
        accessories: Vec::new(),
        ai_reasoning: format!("Plan for {}", on),
    }
}

/// Seven consecutive days starting at `start`.
pub fn week(start: NaiveDate) -> WeeklySchedule {
    WeeklySchedule {
        start_date: start,
        generated_at: fixture_time(),
        location: "Lisbon, PT".into(),
        schedule: (0..7)
            .map(|offset| day(start + ChronoDuration::days(offset)))
            .collect(),
    }
}

// ============================================================================
// Clock
// ============================================================================

#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

pub fn manual_clock() -> ManualClock {
    ManualClock {
        now: Arc::new(Mutex::new(fixture_time())),
    }
}

impl ManualClock {
    pub fn as_clock(&self) -> Clock {
        let now = Arc::clone(&self.now);
        Arc::new(move || *now.lock().expect("clock lock"))
    }

    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.now.lock().expect("clock lock");
        *now += ChronoDuration::seconds(secs);
    }
}

// ============================================================================
// Scripted collection source
// ============================================================================

/// Returns queued responses in order; fails once the queue is empty.
pub struct ScriptedSource<T> {
    responses: Mutex<VecDeque<Result<Vec<T>, ApiError>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl<T> ScriptedSource<T> {
    pub fn new(responses: Vec<Result<Vec<T>, ApiError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push(&self, response: Result<Vec<T>, ApiError>) {
        self.responses.lock().expect("script lock").push_back(response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: Send + Sync> CollectionSource<T> for ScriptedSource<T> {
    async fn fetch(&self) -> Result<Vec<T>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.responses.lock().expect("script lock").pop_front();
        next.unwrap_or_else(|| Err(ApiError::ServerError("no scripted response".into())))
    }
}

// ============================================================================
// Fake backend
// ============================================================================

/// In-memory backend with per-operation call counters and injectable failures.
#[derive(Default)]
pub struct FakeApi {
    items: Mutex<Vec<WardrobeItem>>,
    events: Mutex<Vec<Event>>,
    schedules: Mutex<HashMap<NaiveDate, WeeklySchedule>>,
    profile: Mutex<UserProfile>,
    failures: Mutex<HashMap<&'static str, usize>>,
    failing_uploads: Mutex<HashSet<String>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    signed_url_batches: Mutex<Vec<Vec<String>>>,
    last_generate: Mutex<Option<GenerateScheduleRequest>>,
    latency: Mutex<Option<Duration>>,
    next_id: AtomicUsize,
}

impl FakeApi {
    /// Server holding `item-1` through `item-{count}`.
    pub fn with_items(count: usize) -> Self {
        let api = Self::default();
        *api.items.lock().expect("items lock") =
            (1..=count).map(|n| item(&format!("item-{}", n))).collect();
        api
    }

    pub fn insert_item_front(&self, record: WardrobeItem) {
        self.items.lock().expect("items lock").insert(0, record);
    }

    pub fn add_event(&self, name: &str, on: &str) {
        let mut events = self.events.lock().expect("events lock");
        let mut record = event(&format!("event-{}", events.len() + 1), on);
        record.name = name.to_string();
        events.push(record);
    }

    /// Make the next `count` calls to `op` fail with a server error.
    pub fn fail_next(&self, op: &'static str, count: usize) {
        *self.failures.lock().expect("failures lock").entry(op).or_default() += count;
    }

    pub fn fail_uploads_named(&self, file_name: &str) {
        self.failing_uploads
            .lock()
            .expect("uploads lock")
            .insert(file_name.to_string());
    }

    pub fn allow_all_uploads(&self) {
        self.failing_uploads.lock().expect("uploads lock").clear();
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .get(op)
            .copied()
            .unwrap_or(0)
    }

    pub fn signed_url_batches(&self) -> Vec<Vec<String>> {
        self.signed_url_batches.lock().expect("batches lock").clone()
    }

    pub fn last_generate_request(&self) -> Option<GenerateScheduleRequest> {
        self.last_generate.lock().expect("generate lock").clone()
    }

    /// Delay every call by `latency` before it answers.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().expect("latency lock") = Some(latency);
    }

    async fn record(&self, op: &'static str) -> Result<(), ApiError> {
        *self.calls.lock().expect("calls lock").entry(op).or_default() += 1;
        let latency = *self.latency.lock().expect("latency lock");
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let mut failures = self.failures.lock().expect("failures lock");
        match failures.get_mut(op) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(ApiError::ServerError(format!("scripted {} failure", op)))
            }
            _ => Ok(()),
        }
    }

    fn new_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl WardrobeApi for FakeApi {
    async fn list_items(&self, query: &ItemQuery) -> Result<ItemPage, ApiError> {
        self.record("list_items").await?;
        let items = self.items.lock().expect("items lock");
        let limit = query.limit.max(1);
        let total = items.len() as u32;
        let offset = (query.page.saturating_sub(1) * limit) as usize;
        Ok(ItemPage {
            items: items.iter().skip(offset).take(limit as usize).cloned().collect(),
            total,
            page: query.page,
            limit,
            pages: total.div_ceil(limit),
        })
    }

    async fn get_item(&self, item_id: &str) -> Result<WardrobeItem, ApiError> {
        self.record("get_item").await?;
        let items = self.items.lock().expect("items lock");
        items
            .iter()
            .find(|i| i.id == item_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(item_id.to_string()))
    }

    async fn create_item(&self, request: &CreateItemRequest) -> Result<WardrobeItem, ApiError> {
        self.record("create_item").await?;
        if self
            .failing_uploads
            .lock()
            .expect("uploads lock")
            .contains(&request.image.file_name)
        {
            return Err(ApiError::ServerError("image rejected".into()));
        }
        let mut created = item(&self.new_id("created"));
        if let Some(ref name) = request.name {
            created.name = name.clone();
        } else {
            created.name = request.image.file_name.clone();
        }
        if let Some(category) = request.category {
            created.category = category;
        }
        created.color = request.color.clone();
        self.items.lock().expect("items lock").insert(0, created.clone());
        Ok(created)
    }

    async fn update_item(
        &self,
        item_id: &str,
        request: &UpdateItemRequest,
    ) -> Result<WardrobeItem, ApiError> {
        self.record("update_item").await?;
        let mut items = self.items.lock().expect("items lock");
        let existing = items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| ApiError::NotFound(item_id.to_string()))?;
        if let Some(ref name) = request.name {
            existing.name = name.clone();
        }
        if let Some(category) = request.category {
            existing.category = category;
        }
        if let Some(ref color) = request.color {
            existing.color = (!color.is_empty()).then(|| color.clone());
        }
        Ok(existing.clone())
    }

    async fn delete_item(&self, item_id: &str) -> Result<(), ApiError> {
        self.record("delete_item").await?;
        let mut items = self.items.lock().expect("items lock");
        let before = items.len();
        items.retain(|i| i.id != item_id);
        if items.len() == before {
            return Err(ApiError::NotFound(item_id.to_string()));
        }
        Ok(())
    }

    async fn signed_urls(
        &self,
        item_ids: &[String],
        expires_in: u64,
    ) -> Result<SignedUrlsResponse, ApiError> {
        self.record("signed_urls").await?;
        let mut batches = self.signed_url_batches.lock().expect("batches lock");
        batches.push(item_ids.to_vec());
        let batch = batches.len();
        Ok(SignedUrlsResponse {
            urls: item_ids
                .iter()
                .map(|id| SignedUrlItem {
                    item_id: id.clone(),
                    signed_url: format!("https://cdn.test/{}?sig={}", id, batch),
                    expires_in,
                })
                .collect(),
        })
    }

    async fn get_weekly_schedule(
        &self,
        start_date: NaiveDate,
    ) -> Result<Option<WeeklySchedule>, ApiError> {
        self.record("get_weekly_schedule").await?;
        Ok(self
            .schedules
            .lock()
            .expect("schedules lock")
            .get(&start_date)
            .cloned())
    }

    async fn generate_weekly_schedule(
        &self,
        request: &GenerateScheduleRequest,
    ) -> Result<WeeklySchedule, ApiError> {
        self.record("generate_weekly_schedule").await?;
        *self.last_generate.lock().expect("generate lock") = Some(request.clone());
        let mut schedule = week(request.start_date);
        schedule.location = match request.country {
            Some(ref country) => format!("{}, {}", request.city, country),
            None => request.city.clone(),
        };
        self.schedules
            .lock()
            .expect("schedules lock")
            .insert(request.start_date, schedule.clone());
        Ok(schedule)
    }

    async fn regenerate_day(
        &self,
        date: NaiveDate,
        request: &RegenerateDayRequest,
    ) -> Result<DailySchedule, ApiError> {
        self.record("regenerate_day").await?;
        let mut regenerated = day(date);
        regenerated.ai_reasoning = request
            .feedback
            .clone()
            .unwrap_or_else(|| "Regenerated outfit".to_string());
        Ok(regenerated)
    }

    async fn list_events(&self, query: &EventQuery) -> Result<Vec<Event>, ApiError> {
        self.record("list_events").await?;
        let events = self.events.lock().expect("events lock");
        Ok(events
            .iter()
            .filter(|e| query.start_date.map_or(true, |start| e.date >= start))
            .filter(|e| query.end_date.map_or(true, |end| e.date <= end))
            .cloned()
            .collect())
    }

    async fn get_event(&self, event_id: &str) -> Result<Event, ApiError> {
        self.record("get_event").await?;
        let events = self.events.lock().expect("events lock");
        events
            .iter()
            .find(|e| e.id == event_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(event_id.to_string()))
    }

    async fn create_event(&self, request: &CreateEventRequest) -> Result<Event, ApiError> {
        self.record("create_event").await?;
        let created = Event {
            id: self.new_id("event"),
            name: request.event_name.clone(),
            date: request.event_date,
            dress_code: request.dress_code,
            notes: request.notes.clone(),
        };
        self.events.lock().expect("events lock").push(created.clone());
        Ok(created)
    }

    async fn update_event(
        &self,
        event_id: &str,
        request: &UpdateEventRequest,
    ) -> Result<Event, ApiError> {
        self.record("update_event").await?;
        let mut events = self.events.lock().expect("events lock");
        let existing = events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| ApiError::NotFound(event_id.to_string()))?;
        if let Some(ref name) = request.event_name {
            existing.name = name.clone();
        }
        if let Some(on) = request.event_date {
            existing.date = on;
        }
        if let Some(code) = request.dress_code {
            existing.dress_code = code;
        }
        if request.notes.is_some() {
            existing.notes = request.notes.clone();
        }
        Ok(existing.clone())
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), ApiError> {
        self.record("delete_event").await?;
        let mut events = self.events.lock().expect("events lock");
        events.retain(|e| e.id != event_id);
        Ok(())
    }

    async fn get_profile(&self) -> Result<UserProfile, ApiError> {
        self.record("get_profile").await?;
        Ok(self.profile.lock().expect("profile lock").clone())
    }

    async fn update_profile(
        &self,
        request: &UpdateProfileRequest,
    ) -> Result<UserProfile, ApiError> {
        self.record("update_profile").await?;
        let mut profile = self.profile.lock().expect("profile lock");
        if request.default_city.is_some() {
            profile.default_city = request.default_city.clone();
        }
        if request.default_country.is_some() {
            profile.default_country = request.default_country.clone();
        }
        Ok(profile.clone())
    }
}
