//! Sordino: the decision engine of a site-blocking tool.
//!
//! Recurring weekly schedules, a three-valued manual override, a timed
//! pause, per-site timed bypasses with a daily quota, and daily/weekly
//! statistics over a single persisted JSON settings document. UI surfaces
//! talk to [`BlockEngine`] through the [`Request`]/[`Response`] message
//! API and re-poll on its change broadcast.

mod application;
mod domain;
mod infrastructure;

pub use application::bootstrap::{BootstrapResult, bootstrap_workspace, open_engine};
pub use application::counted_blocks::CountedBlocks;
pub use application::engine::{
    BlockEngine, BlockStatusResponse, BypassResponse, EmergencyRefreshResponse, Request, Response,
};
pub use application::reconciler::{RECONCILE_INTERVAL, spawn_reconciler};
pub use application::settings_manager::SettingsManager;
pub use domain::blocking::{BlockVerdict, should_block};
pub use domain::models::{
    ActiveBypass, BlockState, BypassState, Category, DayOfWeek, DaySummary, MAX_QUICK_BYPASSES,
    ManualOverride, Schedule, SiteCounters, SiteStats, SordinoSettings, Stats,
    TEMPLATE_SCHEDULE_IDS, WeeklyStats, default_categories, default_schedules, local_date_string,
    week_start_of,
};
pub use domain::schedule::{
    format_end_time, get_active_schedule, is_schedule_active, time_remaining_in_schedule,
};
pub use infrastructure::counted_blocks_repository::{
    CountedBlocksRepository, CountedBlocksSnapshot, InMemoryCountedBlocksRepository,
    SqliteCountedBlocksRepository,
};
pub use infrastructure::error::InfraError;
pub use infrastructure::settings_repository::{
    InMemorySettingsRepository, SettingsRepository, SqliteSettingsRepository,
};
pub use infrastructure::storage::initialize_database;
