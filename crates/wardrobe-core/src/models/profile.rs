use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub default_city: Option<String>,
    #[serde(default)]
    pub default_country: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_country: Option<String>,
}

/// Locally persisted preferences that are sent along with schedule generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default)]
    pub style_preferences: String,
}
