use std::sync::Arc;

use async_trait::async_trait;

use crate::api::{ApiError, WardrobeApi};
use crate::cache::CollectionSource;
use crate::models::{
    CreateEventRequest, CreateItemRequest, Event, EventQuery, UpdateEventRequest,
    UpdateItemRequest, WardrobeItem,
};

use super::mutation::RecordStore;

/// Authoritative event list, optionally limited to a date window.
pub struct EventSource {
    api: Arc<dyn WardrobeApi>,
    query: EventQuery,
}

impl EventSource {
    pub fn new(api: Arc<dyn WardrobeApi>) -> Self {
        Self::with_query(api, EventQuery::default())
    }

    pub fn with_query(api: Arc<dyn WardrobeApi>, query: EventQuery) -> Self {
        Self { api, query }
    }
}

#[async_trait]
impl CollectionSource<Event> for EventSource {
    async fn fetch(&self) -> Result<Vec<Event>, ApiError> {
        self.api.list_events(&self.query).await
    }
}

pub struct ItemStore {
    api: Arc<dyn WardrobeApi>,
}

impl ItemStore {
    pub fn new(api: Arc<dyn WardrobeApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl RecordStore<WardrobeItem> for ItemStore {
    type Create = CreateItemRequest;
    type Update = UpdateItemRequest;

    async fn create(&self, request: &CreateItemRequest) -> Result<WardrobeItem, ApiError> {
        self.api.create_item(request).await
    }

    async fn update(
        &self,
        id: &str,
        request: &UpdateItemRequest,
    ) -> Result<WardrobeItem, ApiError> {
        self.api.update_item(id, request).await
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.api.delete_item(id).await
    }
}

pub struct EventStore {
    api: Arc<dyn WardrobeApi>,
}

impl EventStore {
    pub fn new(api: Arc<dyn WardrobeApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl RecordStore<Event> for EventStore {
    type Create = CreateEventRequest;
    type Update = UpdateEventRequest;

    async fn create(&self, request: &CreateEventRequest) -> Result<Event, ApiError> {
        self.api.create_event(request).await
    }

    async fn update(&self, id: &str, request: &UpdateEventRequest) -> Result<Event, ApiError> {
        self.api.update_event(id, request).await
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.api.delete_event(id).await
    }
}
