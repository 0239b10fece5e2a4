use std::sync::{Arc, PoisonError, RwLock};

use crate::api::{ApiError, WardrobeApi};
use crate::models::{UpdateProfileRequest, UserProfile};

/// Memoised user profile. Fetched once per session, replaced on update.
pub struct ProfileCache {
    api: Arc<dyn WardrobeApi>,
    profile: RwLock<Option<UserProfile>>,
}

impl ProfileCache {
    pub fn new(api: Arc<dyn WardrobeApi>) -> Self {
        Self {
            api,
            profile: RwLock::new(None),
        }
    }

    pub fn cached(&self) -> Option<UserProfile> {
        self.profile
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The cached profile, fetching it first if this session has none.
    pub async fn get(&self) -> Result<UserProfile, ApiError> {
        if let Some(profile) = self.cached() {
            return Ok(profile);
        }
        self.refresh().await
    }

    pub async fn refresh(&self) -> Result<UserProfile, ApiError> {
        let profile = self.api.get_profile().await?;
        self.store(profile.clone());
        Ok(profile)
    }

    pub async fn update(&self, request: &UpdateProfileRequest) -> Result<UserProfile, ApiError> {
        let profile = self.api.update_profile(request).await?;
        self.store(profile.clone());
        Ok(profile)
    }

    pub fn clear(&self) {
        *self.profile.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn store(&self, profile: UserProfile) {
        *self.profile.write().unwrap_or_else(PoisonError::into_inner) = Some(profile);
    }
}
