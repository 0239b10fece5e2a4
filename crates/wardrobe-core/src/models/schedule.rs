use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{Category, DressCode};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub temp_min: f64,
    pub temp_max: f64,
    pub description: String,
    /// OpenWeatherMap icon code, e.g. `10d`.
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub precipitation_chance: Option<f64>,
}

/// A wardrobe item as embedded in a schedule, optionally with a pre-signed URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleOutfitItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub signed_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEvent {
    pub id: String,
    pub event_name: String,
    pub dress_code: DressCode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySchedule {
    pub date: NaiveDate,
    pub day_name: String,
    pub weather: WeatherSnapshot,
    #[serde(default)]
    pub event: Option<ScheduleEvent>,
    #[serde(default)]
    pub top: Option<ScheduleOutfitItem>,
    #[serde(default)]
    pub bottom: Option<ScheduleOutfitItem>,
    #[serde(default)]
    pub shoes: Option<ScheduleOutfitItem>,
    #[serde(default)]
    pub outer_layer: Option<ScheduleOutfitItem>,
    #[serde(default)]
    pub accessories: Vec<ScheduleOutfitItem>,
    #[serde(default)]
    pub ai_reasoning: String,
}

impl DailySchedule {
    pub fn has_outfit(&self) -> bool {
        self.top.is_some() || self.bottom.is_some() || self.shoes.is_some()
    }

    pub fn slot(&self, slot: OutfitSlot) -> Option<&ScheduleOutfitItem> {
        match slot {
            OutfitSlot::Top => self.top.as_ref(),
            OutfitSlot::Bottom => self.bottom.as_ref(),
            OutfitSlot::Shoes => self.shoes.as_ref(),
            OutfitSlot::OuterLayer => self.outer_layer.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySchedule {
    pub start_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub location: String,
    pub schedule: Vec<DailySchedule>,
}

impl WeeklySchedule {
    pub fn day(&self, date: NaiveDate) -> Option<&DailySchedule> {
        self.schedule.iter().find(|d| d.date == date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutfitSlot {
    Top,
    Bottom,
    Shoes,
    OuterLayer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateScheduleRequest {
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub start_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_preferences: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegenerateDayRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub locked_slots: Vec<OutfitSlot>,
}
