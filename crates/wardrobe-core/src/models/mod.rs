//! Data models for Wardrobe Designer entities.
//!
//! This module contains all the data structures exchanged with the backend:
//!
//! - `WardrobeItem`, `ItemPage`, `ItemQuery`: catalog items and paging
//! - `Event`, `DressCode`: calendar events
//! - `WeeklySchedule`, `DailySchedule`: AI-generated outfit plans
//! - `UserProfile`, `UserPreferences`: default location and style text

pub mod event;
pub mod item;
pub mod profile;
pub mod schedule;

pub use event::{CreateEventRequest, DressCode, Event, EventQuery, UpdateEventRequest};
pub use item::{
    Category, CreateItemRequest, ImageSource, ItemPage, ItemQuery, SignedUrlItem,
    SignedUrlsRequest, SignedUrlsResponse, SortOption, UpdateItemRequest, WardrobeItem,
};
pub use profile::{UpdateProfileRequest, UserPreferences, UserProfile};
pub use schedule::{
    DailySchedule, GenerateScheduleRequest, OutfitSlot, RegenerateDayRequest, ScheduleEvent,
    ScheduleOutfitItem, WeatherSnapshot, WeeklySchedule,
};
