use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Daily cap on quick bypasses.
pub const MAX_QUICK_BYPASSES: u32 = 3;

/// Schedule ids shipped as immutable templates. The settings UI refuses to
/// edit or delete these; the engine treats them like any other schedule.
pub const TEMPLATE_SCHEDULE_IDS: &[&str] =
    &["work-hours", "extended-work", "evenings", "always-on"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl DayOfWeek {
    pub fn from_weekday(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => Self::Mon,
            Weekday::Tue => Self::Tue,
            Weekday::Wed => Self::Wed,
            Weekday::Thu => Self::Thu,
            Weekday::Fri => Self::Fri,
            Weekday::Sat => Self::Sat,
            Weekday::Sun => Self::Sun,
        }
    }
}

/// A recurring weekly blocking window. Times are wall-clock "HH:MM" in
/// device-local time; an `end_time` before `start_time` spans midnight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub days: Vec<DayOfWeek>,
    pub start_time: String,
    pub end_time: String,
}

impl Schedule {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "schedule.id")?;
        validate_non_empty(&self.name, "schedule.name")?;
        validate_hhmm(&self.start_time, "schedule.startTime")?;
        validate_hhmm(&self.end_time, "schedule.endTime")?;
        Ok(())
    }
}

/// A named blocklist fragment; disabling the category disables every site
/// it lists in one toggle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub sites: Vec<String>,
}

impl Category {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "category.id")?;
        validate_non_empty(&self.name, "category.name")?;
        for site in &self.sites {
            validate_non_empty(site, "category.sites[]")?;
        }
        Ok(())
    }
}

/// Three-valued override: `On` forces blocking, `Off` forces allowing,
/// `Unset` defers to schedule evaluation. Persisted as "on" / "off" / null.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ManualOverride {
    On,
    Off,
    #[default]
    Unset,
}

impl Serialize for ManualOverride {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::On => serializer.serialize_str("on"),
            Self::Off => serializer.serialize_str("off"),
            Self::Unset => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for ManualOverride {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Anything unrecognized falls back to Unset so one stale value
        // cannot invalidate the whole stored document.
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(match value.as_deref() {
            Some("on") => Self::On,
            Some("off") => Self::Off,
            _ => Self::Unset,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BlockState {
    pub is_blocking: bool,
    #[serde(default)]
    pub manual_override: ManualOverride,
    /// Epoch milliseconds; while in the future, blocking is suppressed
    /// unconditionally.
    pub paused_until: Option<i64>,
    pub active_schedule: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveBypass {
    pub site: String,
    /// Epoch milliseconds.
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BypassState {
    pub quick_bypasses_used: u32,
    /// Local date ("YYYY-MM-DD") of the last daily reset.
    pub last_reset_date: String,
    pub active_bypass: Option<ActiveBypass>,
    /// Local date of the last emergency refresh, if any.
    pub last_emergency_refresh: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteCounters {
    pub blocks: u32,
    pub bypasses: u32,
}

pub type SiteStats = BTreeMap<String, SiteCounters>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub date: String,
    pub blocks_triggered: u32,
    pub bypasses_used: u32,
    #[serde(default)]
    pub site_stats: SiteStats,
}

impl Stats {
    pub fn zeroed(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            blocks_triggered: 0,
            bypasses_used: 0,
            site_stats: SiteStats::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DaySummary {
    pub date: String,
    pub blocks_triggered: u32,
    pub bypasses_used: u32,
}

/// Rolling archive of the current week, keyed by its Monday.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyStats {
    pub week_start: String,
    pub days: Vec<DaySummary>,
    #[serde(default)]
    pub site_stats: SiteStats,
    #[serde(default)]
    pub emergency_refreshes_used: u32,
}

impl WeeklyStats {
    pub fn empty(week_start: impl Into<String>) -> Self {
        Self {
            week_start: week_start.into(),
            days: Vec::new(),
            site_stats: SiteStats::new(),
            emergency_refreshes_used: 0,
        }
    }
}

/// The root persisted document. Read and written wholesale; merged
/// field-by-field with defaults on load to tolerate schema evolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SordinoSettings {
    pub schedules: Vec<Schedule>,
    pub categories: Vec<Category>,
    pub custom_sites: Vec<String>,
    pub block_state: BlockState,
    pub bypass_state: BypassState,
    pub stats: Stats,
    pub weekly_stats: WeeklyStats,
}

impl SordinoSettings {
    pub fn with_defaults(today: NaiveDate) -> Self {
        let today_str = local_date_string(today);
        Self {
            schedules: default_schedules(),
            categories: default_categories(),
            custom_sites: Vec::new(),
            block_state: BlockState {
                is_blocking: false,
                manual_override: ManualOverride::Unset,
                paused_until: None,
                active_schedule: None,
            },
            bypass_state: BypassState {
                quick_bypasses_used: 0,
                last_reset_date: today_str.clone(),
                active_bypass: None,
                last_emergency_refresh: None,
            },
            stats: Stats::zeroed(today_str),
            weekly_stats: WeeklyStats::empty(local_date_string(week_start_of(today))),
        }
    }
}

pub fn default_schedules() -> Vec<Schedule> {
    use DayOfWeek::{Fri, Mon, Sat, Sun, Thu, Tue, Wed};
    let weekdays = vec![Mon, Tue, Wed, Thu, Fri];
    let every_day = vec![Mon, Tue, Wed, Thu, Fri, Sat, Sun];
    vec![
        Schedule {
            id: "work-hours".to_string(),
            name: "Work hours".to_string(),
            enabled: true,
            days: weekdays.clone(),
            start_time: "09:00".to_string(),
            end_time: "17:00".to_string(),
        },
        Schedule {
            id: "extended-work".to_string(),
            name: "Extended work".to_string(),
            enabled: false,
            days: weekdays,
            start_time: "08:00".to_string(),
            end_time: "18:00".to_string(),
        },
        Schedule {
            id: "evenings".to_string(),
            name: "Evenings".to_string(),
            enabled: false,
            days: every_day.clone(),
            start_time: "18:00".to_string(),
            end_time: "22:00".to_string(),
        },
        Schedule {
            id: "always-on".to_string(),
            name: "Always on".to_string(),
            enabled: false,
            days: every_day,
            start_time: "00:00".to_string(),
            end_time: "23:59".to_string(),
        },
    ]
}

pub fn default_categories() -> Vec<Category> {
    fn sites(names: &[&str]) -> Vec<String> {
        names.iter().map(|site| (*site).to_string()).collect()
    }
    vec![
        Category {
            id: "social".to_string(),
            name: "Social".to_string(),
            enabled: true,
            sites: sites(&[
                "x.com",
                "twitter.com",
                "facebook.com",
                "instagram.com",
                "reddit.com",
                "linkedin.com",
                "threads.net",
                "tiktok.com",
            ]),
        },
        Category {
            id: "video".to_string(),
            name: "Video".to_string(),
            enabled: true,
            sites: sites(&[
                "youtube.com",
                "twitch.tv",
                "netflix.com",
                "hulu.com",
                "disneyplus.com",
                "primevideo.com",
            ]),
        },
        Category {
            id: "news".to_string(),
            name: "News".to_string(),
            enabled: false,
            sites: sites(&[
                "news.google.com",
                "cnn.com",
                "foxnews.com",
                "nytimes.com",
                "bbc.com",
            ]),
        },
    ]
}

/// Local date in "YYYY-MM-DD" form.
pub fn local_date_string(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Monday of the week containing `date`.
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

fn validate_hhmm(value: &str, field_name: &str) -> Result<(), String> {
    let mut split = value.split(':');
    let Some(hour_str) = split.next() else {
        return Err(format!("{field_name} must be HH:MM"));
    };
    let Some(minute_str) = split.next() else {
        return Err(format!("{field_name} must be HH:MM"));
    };
    if split.next().is_some() {
        return Err(format!("{field_name} must be HH:MM"));
    }

    let hour = hour_str
        .parse::<u8>()
        .map_err(|_| format!("{field_name} must be HH:MM"))?;
    let minute = minute_str
        .parse::<u8>()
        .map_err(|_| format!("{field_name} must be HH:MM"))?;
    if hour > 23 || minute > 59 {
        return Err(format!("{field_name} must be HH:MM"));
    }
    Ok(())
}
