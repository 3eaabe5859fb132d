use crate::application::counted_blocks::CountedBlocks;
use crate::application::settings_manager::SettingsManager;
use crate::domain::blocking::should_block;
use crate::domain::models::{
    ActiveBypass, MAX_QUICK_BYPASSES, ManualOverride, SordinoSettings, local_date_string,
};
use crate::domain::schedule::{format_end_time, get_active_schedule};
use crate::infrastructure::counted_blocks_repository::CountedBlocksRepository;
use crate::infrastructure::settings_repository::SettingsRepository;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use url::Url;

const BYPASS_DURATION_MS: i64 = 5 * 60 * 1000;

type NowProvider = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// Operations exposed to the UI surfaces. Adding a variant forces every
/// dispatch site to handle it.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    QueryBlockStatus { url: String },
    UseBypass { url: String },
    GetSettings,
    ToggleManualOverride { state: ManualOverride },
    PauseBlocking { until: i64 },
    ResumeBlocking,
    ClearBypass,
    EmergencyRefreshBypasses,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    BlockStatus(BlockStatusResponse),
    Bypass(BypassResponse),
    Settings(Box<SordinoSettings>),
    Updated,
    EmergencyRefresh(EmergencyRefreshResponse),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlockStatusResponse {
    pub is_blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bypasses_remaining: Option<u32>,
}

impl BlockStatusResponse {
    fn not_blocked() -> Self {
        Self {
            is_blocked: false,
            reason: None,
            time_remaining: None,
            bypasses_remaining: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct BypassResponse {
    pub success: bool,
    pub remaining: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyRefreshResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Message-driven façade over the settings document: answers block-status
/// queries, manages the bypass lifecycle, and applies override / pause
/// transitions. Every operation starts by rolling the persisted state
/// forward to the current local day.
pub struct BlockEngine<R, C>
where
    R: SettingsRepository,
    C: CountedBlocksRepository,
{
    settings: SettingsManager<R>,
    counted: CountedBlocks<C>,
    now_provider: NowProvider,
}

impl<R, C> BlockEngine<R, C>
where
    R: SettingsRepository,
    C: CountedBlocksRepository,
{
    pub fn new(settings_repository: Arc<R>, counted_repository: Arc<C>) -> Self {
        Self {
            settings: SettingsManager::new(settings_repository),
            counted: CountedBlocks::new(counted_repository),
            now_provider: Arc::new(Local::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    /// Notified after every persisted mutation; surfaces re-poll on it.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.settings.subscribe()
    }

    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::QueryBlockStatus { url } => {
                Response::BlockStatus(self.query_block_status(&url).await)
            }
            Request::UseBypass { url } => Response::Bypass(self.use_bypass(&url).await),
            Request::GetSettings => Response::Settings(Box::new(self.get_settings().await)),
            Request::ToggleManualOverride { state } => {
                self.toggle_manual_override(state).await;
                Response::Updated
            }
            Request::PauseBlocking { until } => {
                self.pause_blocking(until).await;
                Response::Updated
            }
            Request::ResumeBlocking => {
                self.resume_blocking().await;
                Response::Updated
            }
            Request::ClearBypass => {
                self.clear_bypass().await;
                Response::Updated
            }
            Request::EmergencyRefreshBypasses => {
                Response::EmergencyRefresh(self.emergency_refresh_bypasses().await)
            }
        }
    }

    pub async fn query_block_status(&self, url: &str) -> BlockStatusResponse {
        let (settings, now) = self.refreshed_settings().await;

        let verdict = should_block(&settings, now);
        if !verdict.should_block {
            return BlockStatusResponse::not_blocked();
        }
        let Some(site) = site_from_url(url) else {
            return BlockStatusResponse::not_blocked();
        };
        if !is_site_listed(&site, &settings) {
            return BlockStatusResponse::not_blocked();
        }
        if has_bypass(&site, &settings, now.timestamp_millis()) {
            return BlockStatusResponse::not_blocked();
        }

        let today = local_date_string(now.date_naive());
        if !self.counted.is_counted(&today, &site).await {
            self.counted.mark(&today, &site).await;
            let counted_site = site.clone();
            self.settings
                .update(now.date_naive(), move |mut settings| {
                    settings.stats.blocks_triggered += 1;
                    settings
                        .stats
                        .site_stats
                        .entry(counted_site)
                        .or_default()
                        .blocks += 1;
                    settings
                })
                .await;
        }

        let time_remaining = get_active_schedule(&settings.schedules, now.naive_local())
            .map(|schedule| format!("until {}", format_end_time(schedule)));
        BlockStatusResponse {
            is_blocked: true,
            reason: verdict.reason,
            time_remaining,
            bypasses_remaining: Some(
                MAX_QUICK_BYPASSES.saturating_sub(settings.bypass_state.quick_bypasses_used),
            ),
        }
    }

    pub async fn use_bypass(&self, url: &str) -> BypassResponse {
        let (settings, now) = self.refreshed_settings().await;

        if settings.bypass_state.quick_bypasses_used >= MAX_QUICK_BYPASSES {
            return BypassResponse {
                success: false,
                remaining: 0,
            };
        }

        // Parse failures fall back to the raw input; a bypass granted to a
        // string no hostname matches is inert.
        let site = site_from_url(url).unwrap_or_else(|| url.trim().to_string());
        let expires_at = now.timestamp_millis() + BYPASS_DURATION_MS;

        let bypass_site = site.clone();
        let updated = self
            .settings
            .update(now.date_naive(), move |mut settings| {
                // Re-checked inside the serialized update so concurrent
                // callers cannot push usage past the cap.
                if settings.bypass_state.quick_bypasses_used >= MAX_QUICK_BYPASSES {
                    return settings;
                }
                settings.bypass_state.quick_bypasses_used += 1;
                settings.bypass_state.active_bypass = Some(ActiveBypass {
                    site: bypass_site.clone(),
                    expires_at,
                });
                settings.stats.bypasses_used += 1;
                settings
                    .stats
                    .site_stats
                    .entry(bypass_site)
                    .or_default()
                    .bypasses += 1;
                settings
            })
            .await;

        let success = updated
            .bypass_state
            .active_bypass
            .as_ref()
            .is_some_and(|bypass| bypass.site == site && bypass.expires_at == expires_at);
        if success {
            // Re-arm counting so a post-bypass re-block counts again.
            let today = local_date_string(now.date_naive());
            self.counted.clear_site(&today, &site).await;
        }
        BypassResponse {
            success,
            remaining: MAX_QUICK_BYPASSES.saturating_sub(updated.bypass_state.quick_bypasses_used),
        }
    }

    pub async fn get_settings(&self) -> SordinoSettings {
        self.refreshed_settings().await.0
    }

    pub async fn toggle_manual_override(&self, state: ManualOverride) -> SordinoSettings {
        let (_, now) = self.refreshed_settings().await;
        self.settings
            .update(now.date_naive(), move |mut settings| {
                settings.block_state.manual_override = state;
                // A fresh override decision cancels any pending pause.
                settings.block_state.paused_until = None;
                settings
            })
            .await
    }

    pub async fn pause_blocking(&self, until: i64) -> SordinoSettings {
        let (_, now) = self.refreshed_settings().await;
        self.settings
            .update(now.date_naive(), move |mut settings| {
                settings.block_state.paused_until = Some(until);
                settings
            })
            .await
    }

    pub async fn resume_blocking(&self) -> SordinoSettings {
        let (_, now) = self.refreshed_settings().await;
        self.settings
            .update(now.date_naive(), |mut settings| {
                settings.block_state.paused_until = None;
                settings.block_state.manual_override = ManualOverride::Unset;
                settings
            })
            .await
    }

    pub async fn clear_bypass(&self) -> SordinoSettings {
        let (_, now) = self.refreshed_settings().await;
        self.settings
            .update(now.date_naive(), |mut settings| {
                settings.bypass_state.active_bypass = None;
                settings
            })
            .await
    }

    pub async fn emergency_refresh_bypasses(&self) -> EmergencyRefreshResponse {
        let (settings, now) = self.refreshed_settings().await;
        let today = local_date_string(now.date_naive());

        if settings.bypass_state.last_emergency_refresh.as_deref() == Some(today.as_str()) {
            return EmergencyRefreshResponse {
                success: false,
                remaining: None,
                reason: Some("Emergency refresh already used today".to_string()),
            };
        }

        let stamp = today.clone();
        let updated = self
            .settings
            .update(now.date_naive(), move |mut settings| {
                if settings.bypass_state.last_emergency_refresh.as_deref() == Some(stamp.as_str()) {
                    return settings;
                }
                settings.bypass_state.quick_bypasses_used = 0;
                settings.bypass_state.last_emergency_refresh = Some(stamp);
                settings.weekly_stats.emergency_refreshes_used += 1;
                settings
            })
            .await;

        if updated.bypass_state.last_emergency_refresh.as_deref() != Some(today.as_str()) {
            return EmergencyRefreshResponse {
                success: false,
                remaining: None,
                reason: Some("Could not refresh bypasses".to_string()),
            };
        }

        EmergencyRefreshResponse {
            success: true,
            remaining: Some(
                MAX_QUICK_BYPASSES.saturating_sub(updated.bypass_state.quick_bypasses_used),
            ),
            reason: None,
        }
    }

    /// Periodic tick: refresh the derived blocking flags and expire a
    /// stale bypass. The only mutation driven by time alone.
    pub async fn reconcile(&self) -> SordinoSettings {
        let (settings, now) = self.refreshed_settings().await;
        let verdict = should_block(&settings, now);
        let now_ms = now.timestamp_millis();

        self.settings
            .update(now.date_naive(), move |mut settings| {
                settings.block_state.is_blocking = verdict.should_block;
                settings.block_state.active_schedule = verdict.reason;
                let expired = settings
                    .bypass_state
                    .active_bypass
                    .as_ref()
                    .is_some_and(|bypass| now_ms > bypass.expires_at);
                if expired {
                    settings.bypass_state.active_bypass = None;
                }
                settings
            })
            .await
    }

    async fn refreshed_settings(&self) -> (SordinoSettings, DateTime<Local>) {
        let now = (self.now_provider)();
        let settings = self.settings.ensure_current_day(now.date_naive()).await;
        (settings, now)
    }
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Hostname of `url` with any leading "www." removed; `None` when the
/// input does not parse as a URL with a host.
fn site_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?;
    Some(strip_www(host).to_string())
}

fn suffix_matches(hostname: &str, site: &str) -> bool {
    let site = strip_www(site.trim());
    if site.is_empty() {
        return false;
    }
    hostname == site || hostname.ends_with(&format!(".{site}"))
}

fn is_site_listed(hostname: &str, settings: &SordinoSettings) -> bool {
    let category_sites = settings
        .categories
        .iter()
        .filter(|category| category.enabled)
        .flat_map(|category| category.sites.iter());
    category_sites
        .chain(settings.custom_sites.iter())
        .any(|site| suffix_matches(hostname, site))
}

fn has_bypass(hostname: &str, settings: &SordinoSettings, now_ms: i64) -> bool {
    settings
        .bypass_state
        .active_bypass
        .as_ref()
        .is_some_and(|bypass| {
            now_ms <= bypass.expires_at && suffix_matches(hostname, &bypass.site)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::counted_blocks_repository::InMemoryCountedBlocksRepository;
    use crate::infrastructure::settings_repository::InMemorySettingsRepository;
    use chrono::{NaiveDate, NaiveDateTime, TimeZone};

    type TestEngine = BlockEngine<InMemorySettingsRepository, InMemoryCountedBlocksRepository>;

    fn local(naive: NaiveDateTime) -> DateTime<Local> {
        Local
            .from_local_datetime(&naive)
            .earliest()
            .expect("valid local time")
    }

    // 2026-01-07 is a Wednesday inside the default work-hours window.
    fn wednesday_at(hour: u32, minute: u32) -> DateTime<Local> {
        local(
            NaiveDate::from_ymd_opt(2026, 1, 7)
                .expect("valid date")
                .and_hms_opt(hour, minute, 0)
                .expect("valid time"),
        )
    }

    fn fixed(now: DateTime<Local>) -> NowProvider {
        Arc::new(move || now)
    }

    struct Fixture {
        settings_repository: Arc<InMemorySettingsRepository>,
        counted_repository: Arc<InMemoryCountedBlocksRepository>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                settings_repository: Arc::new(InMemorySettingsRepository::default()),
                counted_repository: Arc::new(InMemoryCountedBlocksRepository::default()),
            }
        }

        fn engine_at(&self, now: DateTime<Local>) -> TestEngine {
            BlockEngine::new(
                Arc::clone(&self.settings_repository),
                Arc::clone(&self.counted_repository),
            )
            .with_now_provider(fixed(now))
        }
    }

    fn engine_at(now: DateTime<Local>) -> TestEngine {
        Fixture::new().engine_at(now)
    }

    #[tokio::test]
    async fn blocks_default_category_site_during_work_hours() {
        let engine = engine_at(wednesday_at(10, 0));
        let status = engine
            .query_block_status("https://www.youtube.com/watch?v=123")
            .await;

        assert!(status.is_blocked);
        assert_eq!(status.reason.as_deref(), Some("Work hours"));
        assert_eq!(status.time_remaining.as_deref(), Some("until 5:00 PM"));
        assert_eq!(status.bypasses_remaining, Some(3));
    }

    #[tokio::test]
    async fn unlisted_site_is_not_blocked() {
        let engine = engine_at(wednesday_at(10, 0));
        let status = engine.query_block_status("https://example.org/").await;
        assert_eq!(status, BlockStatusResponse::not_blocked());
    }

    #[tokio::test]
    async fn malformed_url_is_not_blocked() {
        let engine = engine_at(wednesday_at(10, 0));
        let status = engine.query_block_status("not a url").await;
        assert_eq!(status, BlockStatusResponse::not_blocked());
    }

    #[tokio::test]
    async fn disabled_category_site_is_not_blocked() {
        let engine = engine_at(wednesday_at(10, 0));
        // News ships disabled.
        let status = engine.query_block_status("https://cnn.com/").await;
        assert!(!status.is_blocked);
    }

    #[tokio::test]
    async fn outside_schedule_nothing_is_blocked() {
        let engine = engine_at(wednesday_at(20, 0));
        let status = engine.query_block_status("https://youtube.com/").await;
        assert!(!status.is_blocked);
    }

    #[tokio::test]
    async fn custom_site_subdomain_is_blocked() {
        let engine = engine_at(wednesday_at(10, 0));
        engine
            .settings
            .update(NaiveDate::from_ymd_opt(2026, 1, 7).expect("valid date"), |mut settings| {
                settings.custom_sites.push("example.com".to_string());
                settings
            })
            .await;

        let status = engine
            .query_block_status("https://sub.example.com/page")
            .await;
        assert!(status.is_blocked);
    }

    #[tokio::test]
    async fn block_counts_once_per_site_per_day() {
        let engine = engine_at(wednesday_at(10, 0));
        engine.query_block_status("https://youtube.com/a").await;
        engine.query_block_status("https://youtube.com/b").await;
        engine.query_block_status("https://www.youtube.com/c").await;
        engine.query_block_status("https://reddit.com/").await;

        let settings = engine.get_settings().await;
        assert_eq!(settings.stats.blocks_triggered, 2);
        assert_eq!(settings.stats.site_stats.get("youtube.com").map(|c| c.blocks), Some(1));
        assert_eq!(settings.stats.site_stats.get("reddit.com").map(|c| c.blocks), Some(1));
    }

    #[tokio::test]
    async fn bypass_grants_five_minutes_and_counts_usage() {
        let now = wednesday_at(10, 0);
        let engine = engine_at(now);
        let result = engine.use_bypass("https://www.youtube.com/watch").await;
        assert_eq!(result, BypassResponse { success: true, remaining: 2 });

        let settings = engine.get_settings().await;
        let bypass = settings.bypass_state.active_bypass.expect("active bypass");
        assert_eq!(bypass.site, "youtube.com");
        assert_eq!(bypass.expires_at, now.timestamp_millis() + BYPASS_DURATION_MS);
        assert_eq!(settings.bypass_state.quick_bypasses_used, 1);
        assert_eq!(settings.stats.bypasses_used, 1);
        assert_eq!(
            settings.stats.site_stats.get("youtube.com").map(|c| c.bypasses),
            Some(1)
        );
    }

    #[tokio::test]
    async fn bypassed_site_and_its_subdomains_are_not_blocked() {
        let engine = engine_at(wednesday_at(10, 0));
        engine
            .settings
            .update(NaiveDate::from_ymd_opt(2026, 1, 7).expect("valid date"), |mut settings| {
                settings.custom_sites.push("example.com".to_string());
                settings
            })
            .await;

        engine.use_bypass("https://example.com/").await;
        let status = engine.query_block_status("https://sub.example.com/").await;
        assert!(!status.is_blocked);
    }

    #[tokio::test]
    async fn last_granted_bypass_wins() {
        let engine = engine_at(wednesday_at(10, 0));
        engine.use_bypass("https://youtube.com/").await;
        engine.use_bypass("https://reddit.com/").await;

        let settings = engine.get_settings().await;
        let bypass = settings.bypass_state.active_bypass.expect("active bypass");
        assert_eq!(bypass.site, "reddit.com");

        let status = engine.query_block_status("https://youtube.com/").await;
        assert!(status.is_blocked);
    }

    #[tokio::test]
    async fn fourth_bypass_fails_without_mutating_state() {
        let engine = engine_at(wednesday_at(10, 0));
        for _ in 0..3 {
            assert!(engine.use_bypass("https://youtube.com/").await.success);
        }
        let before = engine.get_settings().await;

        let result = engine.use_bypass("https://reddit.com/").await;
        assert_eq!(result, BypassResponse { success: false, remaining: 0 });
        assert_eq!(engine.get_settings().await, before);
    }

    #[tokio::test]
    async fn bypass_rearms_block_counting_for_the_site() {
        let engine = engine_at(wednesday_at(10, 0));
        engine.query_block_status("https://youtube.com/").await;
        assert_eq!(engine.get_settings().await.stats.blocks_triggered, 1);

        engine.use_bypass("https://youtube.com/").await;
        engine.clear_bypass().await;

        engine.query_block_status("https://youtube.com/").await;
        assert_eq!(engine.get_settings().await.stats.blocks_triggered, 2);
    }

    #[tokio::test]
    async fn expired_bypass_does_not_exempt() {
        let now = wednesday_at(10, 0);
        let engine = engine_at(now);
        engine
            .settings
            .update(now.date_naive(), |mut settings| {
                settings.bypass_state.active_bypass = Some(ActiveBypass {
                    site: "youtube.com".to_string(),
                    expires_at: now.timestamp_millis() - 1,
                });
                settings
            })
            .await;

        let status = engine.query_block_status("https://youtube.com/").await;
        assert!(status.is_blocked);
    }

    #[tokio::test]
    async fn manual_override_on_blocks_outside_schedule_and_clears_pause() {
        let now = wednesday_at(20, 0);
        let engine = engine_at(now);
        engine.pause_blocking(now.timestamp_millis() + 60_000).await;
        let settings = engine.toggle_manual_override(ManualOverride::On).await;
        assert!(settings.block_state.paused_until.is_none());

        let status = engine.query_block_status("https://youtube.com/").await;
        assert!(status.is_blocked);
        assert_eq!(status.reason.as_deref(), Some("Manual block active"));
        assert!(status.time_remaining.is_none());
    }

    #[tokio::test]
    async fn pause_suppresses_blocking_during_schedule() {
        let now = wednesday_at(10, 0);
        let engine = engine_at(now);
        engine.pause_blocking(now.timestamp_millis() + 60_000).await;

        let status = engine.query_block_status("https://youtube.com/").await;
        assert!(!status.is_blocked);
    }

    #[tokio::test]
    async fn pause_does_not_clear_override() {
        let now = wednesday_at(10, 0);
        let engine = engine_at(now);
        engine.toggle_manual_override(ManualOverride::On).await;
        let settings = engine.pause_blocking(now.timestamp_millis() + 60_000).await;
        assert_eq!(settings.block_state.manual_override, ManualOverride::On);
        assert!(settings.block_state.paused_until.is_some());
    }

    #[tokio::test]
    async fn resume_clears_pause_and_override() {
        let now = wednesday_at(10, 0);
        let engine = engine_at(now);
        engine.toggle_manual_override(ManualOverride::Off).await;
        engine.pause_blocking(now.timestamp_millis() + 60_000).await;

        let settings = engine.resume_blocking().await;
        assert!(settings.block_state.paused_until.is_none());
        assert_eq!(settings.block_state.manual_override, ManualOverride::Unset);
    }

    #[tokio::test]
    async fn emergency_refresh_is_once_per_day() {
        let engine = engine_at(wednesday_at(10, 0));
        for _ in 0..3 {
            engine.use_bypass("https://youtube.com/").await;
        }

        let refreshed = engine.emergency_refresh_bypasses().await;
        assert_eq!(
            refreshed,
            EmergencyRefreshResponse {
                success: true,
                remaining: Some(3),
                reason: None,
            }
        );
        let settings = engine.get_settings().await;
        assert_eq!(settings.bypass_state.quick_bypasses_used, 0);
        assert_eq!(settings.weekly_stats.emergency_refreshes_used, 1);

        let denied = engine.emergency_refresh_bypasses().await;
        assert!(!denied.success);
        assert!(denied.reason.is_some());
        assert_eq!(
            engine.get_settings().await.weekly_stats.emergency_refreshes_used,
            1
        );
    }

    #[tokio::test]
    async fn emergency_refresh_is_available_again_next_day() {
        let fixture = Fixture::new();
        let wednesday = fixture.engine_at(wednesday_at(10, 0));
        assert!(wednesday.emergency_refresh_bypasses().await.success);

        let thursday = fixture.engine_at(local(
            NaiveDate::from_ymd_opt(2026, 1, 8)
                .expect("valid date")
                .and_hms_opt(10, 0, 0)
                .expect("valid time"),
        ));
        assert!(thursday.emergency_refresh_bypasses().await.success);
    }

    #[tokio::test]
    async fn reconcile_refreshes_block_state_flags() {
        let engine = engine_at(wednesday_at(10, 0));
        let settings = engine.reconcile().await;
        assert!(settings.block_state.is_blocking);
        assert_eq!(settings.block_state.active_schedule.as_deref(), Some("Work hours"));

        let evening = engine_at(wednesday_at(20, 0));
        let settings = evening.reconcile().await;
        assert!(!settings.block_state.is_blocking);
        assert!(settings.block_state.active_schedule.is_none());
    }

    #[tokio::test]
    async fn reconcile_expires_stale_bypass() {
        let now = wednesday_at(10, 0);
        let engine = engine_at(now);
        engine
            .settings
            .update(now.date_naive(), |mut settings| {
                settings.bypass_state.active_bypass = Some(ActiveBypass {
                    site: "youtube.com".to_string(),
                    expires_at: now.timestamp_millis() - 1,
                });
                settings
            })
            .await;

        let settings = engine.reconcile().await;
        assert!(settings.bypass_state.active_bypass.is_none());

        let engine = engine_at(now);
        engine.use_bypass("https://youtube.com/").await;
        let settings = engine.reconcile().await;
        assert!(settings.bypass_state.active_bypass.is_some());
    }

    #[tokio::test]
    async fn restart_within_a_day_keeps_counted_blocks() {
        let fixture = Fixture::new();
        let now = wednesday_at(10, 0);
        fixture.engine_at(now).query_block_status("https://youtube.com/").await;

        let restarted = fixture.engine_at(now);
        restarted.query_block_status("https://youtube.com/").await;
        assert_eq!(restarted.get_settings().await.stats.blocks_triggered, 1);
    }

    #[tokio::test]
    async fn new_day_resets_counting_and_daily_stats() {
        let fixture = Fixture::new();
        fixture
            .engine_at(wednesday_at(10, 0))
            .query_block_status("https://youtube.com/")
            .await;

        let thursday = fixture.engine_at(local(
            NaiveDate::from_ymd_opt(2026, 1, 8)
                .expect("valid date")
                .and_hms_opt(10, 0, 0)
                .expect("valid time"),
        ));
        let status = thursday.query_block_status("https://youtube.com/").await;
        assert!(status.is_blocked);

        let settings = thursday.get_settings().await;
        assert_eq!(settings.stats.date, "2026-01-08");
        assert_eq!(settings.stats.blocks_triggered, 1);
        assert_eq!(settings.weekly_stats.days.len(), 1);
        assert_eq!(settings.weekly_stats.days[0].date, "2026-01-07");
    }

    #[tokio::test]
    async fn mutations_notify_subscribers() {
        let engine = engine_at(wednesday_at(10, 0));
        let mut changes = engine.subscribe();
        engine.toggle_manual_override(ManualOverride::On).await;
        changes.try_recv().expect("change notification");
    }

    #[tokio::test]
    async fn handle_dispatches_every_request_variant() {
        let now = wednesday_at(10, 0);
        let engine = engine_at(now);

        let status = engine
            .handle(Request::QueryBlockStatus {
                url: "https://youtube.com/".to_string(),
            })
            .await;
        assert!(matches!(status, Response::BlockStatus(response) if response.is_blocked));

        let bypass = engine
            .handle(Request::UseBypass {
                url: "https://youtube.com/".to_string(),
            })
            .await;
        assert!(matches!(bypass, Response::Bypass(response) if response.success));

        assert!(matches!(
            engine.handle(Request::GetSettings).await,
            Response::Settings(_)
        ));
        assert_eq!(
            engine
                .handle(Request::ToggleManualOverride {
                    state: ManualOverride::Off
                })
                .await,
            Response::Updated
        );
        assert_eq!(
            engine
                .handle(Request::PauseBlocking {
                    until: now.timestamp_millis() + 60_000
                })
                .await,
            Response::Updated
        );
        assert_eq!(engine.handle(Request::ResumeBlocking).await, Response::Updated);
        assert_eq!(engine.handle(Request::ClearBypass).await, Response::Updated);
        assert!(matches!(
            engine.handle(Request::EmergencyRefreshBypasses).await,
            Response::EmergencyRefresh(_)
        ));
    }
}
