use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Tops,
    Bottoms,
    Shoes,
    Accessories,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Tops,
        Category::Bottoms,
        Category::Shoes,
        Category::Accessories,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Tops => "tops",
            Category::Bottoms => "bottoms",
            Category::Shoes => "shoes",
            Category::Accessories => "accessories",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Tops => write!(f, "Tops"),
            Category::Bottoms => write!(f, "Bottoms"),
            Category::Shoes => write!(f, "Shoes"),
            Category::Accessories => write!(f, "Accessories"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOption {
    #[default]
    Newest,
    Name,
    LastUsed,
}

impl SortOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOption::Newest => "newest",
            SortOption::Name => "name",
            SortOption::LastUsed => "last_used",
        }
    }
}

/// A clothing item owned by the signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WardrobeItem {
    pub id: String,
    pub name: String,
    pub category: Category,
    #[serde(default)]
    pub color: Option<String>,
    /// Opaque storage reference; resolve through `SignedUrlResolver` before display.
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
}

impl Record for WardrobeItem {
    fn id(&self) -> &str {
        &self.id
    }
}

/// An image on local disk to be sent as the multipart `image` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    pub path: PathBuf,
    pub mime_type: String,
    pub file_name: String,
}

impl ImageSource {
    /// Build a source from a path, guessing the MIME type from its extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.jpg".to_string());
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let mime_type = match extension.as_str() {
            "png" => "image/png",
            "webp" => "image/webp",
            "heic" => "image/heic",
            "gif" => "image/gif",
            _ => "image/jpeg",
        }
        .to_string();

        Self {
            path,
            mime_type,
            file_name,
        }
    }
}

/// Fields left as `None` are inferred by the backend from the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateItemRequest {
    pub name: Option<String>,
    pub category: Option<Category>,
    pub color: Option<String>,
    pub image: ImageSource,
}

impl CreateItemRequest {
    pub fn from_image(image: ImageSource) -> Self {
        Self {
            name: None,
            category: None,
            color: None,
            image,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub category: Option<Category>,
    /// `Some("")` clears the color on the server.
    pub color: Option<String>,
    pub image: Option<ImageSource>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemQuery {
    pub page: u32,
    pub limit: u32,
    pub category: Option<Category>,
    pub search: Option<String>,
    pub sort: Option<SortOption>,
}

impl ItemQuery {
    pub fn page(page: u32, limit: u32) -> Self {
        Self {
            page,
            limit,
            category: None,
            search: None,
            sort: None,
        }
    }

    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("page", self.page.to_string()), ("limit", self.limit.to_string())];
        if let Some(category) = self.category {
            params.push(("category", category.as_str().to_string()));
        }
        if let Some(ref search) = self.search {
            if !search.is_empty() {
                params.push(("search", search.clone()));
            }
        }
        if let Some(sort) = self.sort {
            params.push(("sort", sort.as_str().to_string()));
        }
        params
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemPage {
    pub items: Vec<WardrobeItem>,
    pub total: u32,
    pub page: u32,
    pub limit: u32,
    pub pages: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignedUrlsRequest<'a> {
    pub item_ids: &'a [String],
    pub expires_in: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUrlItem {
    pub item_id: String,
    pub signed_url: String,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUrlsResponse {
    #[serde(default)]
    pub urls: Vec<SignedUrlItem>,
}
