use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cache::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DressCode {
    Casual,
    SmartCasual,
    BusinessCasual,
    Business,
    BusinessFormal,
    SemiFormal,
    Cocktail,
    Formal,
    BlackTie,
    WhiteTie,
    Athletic,
    Outdoor,
    Beach,
    Festive,
}

impl DressCode {
    pub const ALL: [DressCode; 14] = [
        DressCode::Casual,
        DressCode::SmartCasual,
        DressCode::BusinessCasual,
        DressCode::Business,
        DressCode::BusinessFormal,
        DressCode::SemiFormal,
        DressCode::Cocktail,
        DressCode::Formal,
        DressCode::BlackTie,
        DressCode::WhiteTie,
        DressCode::Athletic,
        DressCode::Outdoor,
        DressCode::Beach,
        DressCode::Festive,
    ];
}

impl std::fmt::Display for DressCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DressCode::Casual => "Casual",
            DressCode::SmartCasual => "Smart Casual",
            DressCode::BusinessCasual => "Business Casual",
            DressCode::Business => "Business",
            DressCode::BusinessFormal => "Business Formal",
            DressCode::SemiFormal => "Semi-Formal",
            DressCode::Cocktail => "Cocktail",
            DressCode::Formal => "Formal",
            DressCode::BlackTie => "Black Tie",
            DressCode::WhiteTie => "White Tie",
            DressCode::Athletic => "Athletic",
            DressCode::Outdoor => "Outdoor",
            DressCode::Beach => "Beach",
            DressCode::Festive => "Festive",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "event_name")]
    pub name: String,
    #[serde(rename = "event_date")]
    pub date: NaiveDate,
    pub dress_code: DressCode,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Event {
    pub fn formatted_date(&self) -> String {
        self.date.format("%b %d, %Y").to_string()
    }
}

impl Record for Event {
    fn id(&self) -> &str {
        &self.id
    }

    fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.date.cmp(&other.date)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateEventRequest {
    pub event_name: String,
    pub event_date: NaiveDate,
    pub dress_code: DressCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateEventRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dress_code: Option<DressCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Optional date window for `GET /events`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl EventQuery {
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(start) = self.start_date {
            params.push(("start_date", start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = self.end_date {
            params.push(("end_date", end.format("%Y-%m-%d").to_string()));
        }
        params
    }
}
