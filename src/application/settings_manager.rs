use crate::domain::models::{
    DaySummary, SordinoSettings, Stats, WeeklyStats, local_date_string, week_start_of,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::settings_repository::SettingsRepository;
use chrono::NaiveDate;
use log::warn;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};

/// Days retained in the weekly archive.
const WEEKLY_ARCHIVE_CAPACITY: usize = 7;

/// Top-level fields merged field-by-field instead of wholesale.
const DEEP_MERGED_FIELDS: &[&str] = &["blockState", "bypassState", "stats", "weeklyStats"];

/// Sole owner of the persisted settings document.
///
/// Every mutation goes through [`update`](Self::update), which holds a fair
/// async mutex across the whole load-apply-save cycle: concurrently issued
/// updates are applied in FIFO order and each observes the effect of all
/// earlier ones. Reads do not take the lock.
pub struct SettingsManager<R: SettingsRepository> {
    repository: Arc<R>,
    update_lock: Mutex<()>,
}

impl<R: SettingsRepository> SettingsManager<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            update_lock: Mutex::new(()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.repository.subscribe()
    }

    /// Load the document and merge it with defaults. Never fails: an
    /// unreadable store or document degrades to the shipped defaults.
    pub async fn read(&self, today: NaiveDate) -> SordinoSettings {
        match self.repository.load().await {
            Ok(Some(document)) => match merge_with_defaults(&document, today) {
                Ok(settings) => settings,
                Err(error) => {
                    warn!("stored settings unreadable, using defaults: {error}");
                    SordinoSettings::with_defaults(today)
                }
            },
            Ok(None) => SordinoSettings::with_defaults(today),
            Err(error) => {
                warn!("settings load failed, using defaults: {error}");
                SordinoSettings::with_defaults(today)
            }
        }
    }

    pub async fn write(&self, settings: &SordinoSettings) -> Result<(), InfraError> {
        let document = serde_json::to_value(settings)?;
        self.repository.save(&document).await
    }

    /// Serialized read-modify-write. A save failure is logged and the call
    /// degrades to returning the currently persisted settings; unchanged
    /// results skip the save (and its change notification) entirely.
    pub async fn update<F>(&self, today: NaiveDate, apply: F) -> SordinoSettings
    where
        F: FnOnce(SordinoSettings) -> SordinoSettings,
    {
        let _guard = self.update_lock.lock().await;
        let current = self.read(today).await;
        let updated = apply(current.clone());
        if updated == current {
            return updated;
        }
        if let Err(error) = self.write(&updated).await {
            warn!("settings update failed to persist: {error}");
            return self.read(today).await;
        }
        updated
    }

    /// Roll daily and weekly statistics forward if the local date has
    /// changed since the last reset. Idempotent within a day.
    pub async fn ensure_current_day(&self, today: NaiveDate) -> SordinoSettings {
        self.update(today, |settings| roll_over_day(settings, today))
            .await
    }
}

fn merge_with_defaults(
    stored: &serde_json::Value,
    today: NaiveDate,
) -> Result<SordinoSettings, InfraError> {
    let mut merged = serde_json::to_value(SordinoSettings::with_defaults(today))?;
    if let (Some(base), Some(stored)) = (merged.as_object_mut(), stored.as_object()) {
        for (key, value) in stored {
            if DEEP_MERGED_FIELDS.contains(&key.as_str()) {
                // A non-object stored section keeps its defaults.
                if let (Some(target), Some(section)) = (
                    base.get_mut(key).and_then(serde_json::Value::as_object_mut),
                    value.as_object(),
                ) {
                    for (field, field_value) in section {
                        target.insert(field.clone(), field_value.clone());
                    }
                }
                continue;
            }
            // Everything else, arrays included, is replaced wholesale.
            base.insert(key.clone(), value.clone());
        }
    }
    Ok(serde_json::from_value(merged)?)
}

/// Archive the previous day's statistics and reset daily counters when
/// `today` differs from the recorded reset date.
fn roll_over_day(mut settings: SordinoSettings, today: NaiveDate) -> SordinoSettings {
    let today_str = local_date_string(today);
    if settings.bypass_state.last_reset_date == today_str {
        return settings;
    }

    archive_day(&mut settings.weekly_stats, &settings.stats);

    let week_start = local_date_string(week_start_of(today));
    if settings.weekly_stats.week_start != week_start {
        settings.weekly_stats = WeeklyStats::empty(week_start);
    }

    settings.bypass_state.quick_bypasses_used = 0;
    settings.bypass_state.active_bypass = None;
    settings.bypass_state.last_reset_date = today_str.clone();
    settings.stats = Stats::zeroed(today_str);
    settings
}

fn archive_day(weekly: &mut WeeklyStats, stats: &Stats) {
    weekly.days.retain(|day| day.date != stats.date);
    weekly.days.push(DaySummary {
        date: stats.date.clone(),
        blocks_triggered: stats.blocks_triggered,
        bypasses_used: stats.bypasses_used,
    });
    if weekly.days.len() > WEEKLY_ARCHIVE_CAPACITY {
        let excess = weekly.days.len() - WEEKLY_ARCHIVE_CAPACITY;
        weekly.days.drain(..excess);
    }

    for (site, counters) in &stats.site_stats {
        let aggregate = weekly.site_stats.entry(site.clone()).or_default();
        aggregate.blocks += counters.blocks;
        aggregate.bypasses += counters.bypasses;
    }
}
