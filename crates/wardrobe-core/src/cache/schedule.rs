use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{Datelike, Duration, NaiveDate};
use tracing::{debug, warn};

use crate::api::{ApiError, WardrobeApi};
use crate::models::{DailySchedule, GenerateScheduleRequest, RegenerateDayRequest, WeeklySchedule};
use crate::preferences::Preferences;

/// Monday of the ISO week containing `today`, shifted by `offset` weeks.
pub fn week_start(today: NaiveDate, offset: i64) -> NaiveDate {
    let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    monday + Duration::weeks(offset)
}

/// Cache key for a week: its start date as `YYYY-MM-DD`.
pub fn week_key(start: NaiveDate) -> String {
    start.format("%Y-%m-%d").to_string()
}

/// Weekly schedules keyed by week start. No TTL; entries change only on
/// explicit generate/regenerate or a fetch.
#[derive(Default)]
pub struct ScheduleCache {
    weeks: RwLock<HashMap<String, WeeklySchedule>>,
}

impl ScheduleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, week: &str) -> Option<WeeklySchedule> {
        let weeks = self.weeks.read().unwrap_or_else(PoisonError::into_inner);
        weeks.get(week).cloned()
    }

    /// Store `schedule` under `week`. A week that lists the same date twice
    /// is rejected and the previous entry kept.
    pub fn set(&self, week: &str, schedule: WeeklySchedule) -> bool {
        let mut dates = HashSet::with_capacity(schedule.schedule.len());
        if let Some(dup) = schedule.schedule.iter().find(|d| !dates.insert(d.date)) {
            warn!(week = week, date = %dup.date, "Schedule repeats a day, not caching");
            return false;
        }
        let mut weeks = self.weeks.write().unwrap_or_else(PoisonError::into_inner);
        weeks.insert(week.to_string(), schedule);
        true
    }

    /// Swap the day dated `date` for `day`, leaving the other days untouched.
    ///
    /// Returns `false` if the week is not cached, has no such day, or `day`
    /// carries a different date.
    pub fn replace_day(&self, week: &str, date: NaiveDate, day: DailySchedule) -> bool {
        if day.date != date {
            warn!(week = week, %date, got = %day.date, "Replacement day has mismatched date");
            return false;
        }
        let mut weeks = self.weeks.write().unwrap_or_else(PoisonError::into_inner);
        let Some(schedule) = weeks.get_mut(week) else {
            return false;
        };
        match schedule.schedule.iter_mut().find(|d| d.date == date) {
            Some(slot) => {
                *slot = day;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, week: &str) -> Option<WeeklySchedule> {
        let mut weeks = self.weeks.write().unwrap_or_else(PoisonError::into_inner);
        weeks.remove(week)
    }

    pub fn clear(&self) {
        let mut weeks = self.weeks.write().unwrap_or_else(PoisonError::into_inner);
        weeks.clear();
    }
}

/// Schedule operations against the backend, merged into a `ScheduleCache`.
pub struct Schedules {
    api: Arc<dyn WardrobeApi>,
    cache: ScheduleCache,
    preferences: Preferences,
}

impl Schedules {
    pub fn new(api: Arc<dyn WardrobeApi>, preferences: Preferences) -> Self {
        Self {
            api,
            cache: ScheduleCache::new(),
            preferences,
        }
    }

    pub fn cache(&self) -> &ScheduleCache {
        &self.cache
    }

    /// Whatever is cached for the week, without touching the network.
    pub fn cached(&self, start: NaiveDate) -> Option<WeeklySchedule> {
        self.cache.get(&week_key(start))
    }

    /// Fetch the week from the server. `Ok(None)` means no schedule exists;
    /// errors leave the cached copy in place.
    pub async fn fetch(&self, start: NaiveDate) -> Result<Option<WeeklySchedule>, ApiError> {
        let key = week_key(start);
        match self.api.get_weekly_schedule(start).await? {
            Some(schedule) => {
                debug!(week = %key, days = schedule.schedule.len(), "Schedule fetched");
                self.store(&key, &schedule)?;
                Ok(Some(schedule))
            }
            None => {
                self.cache.remove(&key);
                Ok(None)
            }
        }
    }

    /// Generate a new plan. Stored style preferences are sent when the
    /// request does not carry its own.
    pub async fn generate(
        &self,
        mut request: GenerateScheduleRequest,
    ) -> Result<WeeklySchedule, ApiError> {
        if request.style_preferences.is_none() {
            match self.preferences.style_preferences() {
                Ok(style) => request.style_preferences = style,
                Err(e) => warn!(error = %e, "Could not read style preferences"),
            }
        }
        let schedule = self.api.generate_weekly_schedule(&request).await?;
        self.store(&week_key(schedule.start_date), &schedule)?;
        Ok(schedule)
    }

    fn store(&self, key: &str, schedule: &WeeklySchedule) -> Result<(), ApiError> {
        if self.cache.set(key, schedule.clone()) {
            Ok(())
        } else {
            Err(ApiError::InvalidResponse(format!(
                "Schedule for week {} repeats a day",
                key
            )))
        }
    }

    pub async fn regenerate_day(
        &self,
        week: NaiveDate,
        date: NaiveDate,
        request: &RegenerateDayRequest,
    ) -> Result<DailySchedule, ApiError> {
        let day = self.api.regenerate_day(date, request).await?;
        let key = week_key(week);
        if !self.cache.replace_day(&key, date, day.clone()) {
            debug!(week = %key, %date, "Regenerated day not merged, week not cached");
        }
        Ok(day)
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}
