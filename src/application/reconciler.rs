use crate::application::engine::BlockEngine;
use crate::infrastructure::counted_blocks_repository::CountedBlocksRepository;
use crate::infrastructure::settings_repository::SettingsRepository;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Cadence of the proactive re-evaluation tick.
pub const RECONCILE_INTERVAL: Duration = Duration::from_secs(60);

/// Drive [`BlockEngine::reconcile`] on a fixed interval. The first tick
/// fires immediately, which doubles as the startup reconciliation after a
/// process restart. Abort the returned handle to stop.
pub fn spawn_reconciler<R, C>(engine: Arc<BlockEngine<R, C>>, period: Duration) -> JoinHandle<()>
where
    R: SettingsRepository + 'static,
    C: CountedBlocksRepository + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            engine.reconcile().await;
        }
    })
}
