use crate::infrastructure::counted_blocks_repository::{
    CountedBlocksRepository, CountedBlocksSnapshot,
};
use log::warn;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Day-scoped ledger of hostnames already counted as blocked.
///
/// A hostname is counted at most once per local day; using a bypass for it
/// removes it from the ledger so a later re-block counts again. The ledger
/// is persisted through its repository so it survives a process restart
/// within the same day, and is discarded wholesale once the remembered
/// date goes stale. It is synchronized independently of the settings
/// document.
pub struct CountedBlocks<C: CountedBlocksRepository> {
    repository: Arc<C>,
    state: Mutex<Option<CountedBlocksSnapshot>>,
}

impl<C: CountedBlocksRepository> CountedBlocks<C> {
    pub fn new(repository: Arc<C>) -> Self {
        Self {
            repository,
            state: Mutex::new(None),
        }
    }

    pub async fn is_counted(&self, today: &str, site: &str) -> bool {
        let mut state = self.state.lock().await;
        let snapshot = self.current_for(&mut state, today).await;
        snapshot.sites.contains(site)
    }

    /// Record `site` as counted for `today`. Persisting is best-effort:
    /// a store failure only costs restart durability, not correctness.
    pub async fn mark(&self, today: &str, site: &str) {
        let mut state = self.state.lock().await;
        let snapshot = self.current_for(&mut state, today).await;
        if snapshot.sites.insert(site.to_string()) {
            self.persist(snapshot).await;
        }
    }

    /// Forget `site` so a subsequent block counts again.
    pub async fn clear_site(&self, today: &str, site: &str) {
        let mut state = self.state.lock().await;
        let snapshot = self.current_for(&mut state, today).await;
        if snapshot.sites.remove(site) {
            self.persist(snapshot).await;
        }
    }

    async fn current_for<'a>(
        &self,
        state: &'a mut Option<CountedBlocksSnapshot>,
        today: &str,
    ) -> &'a mut CountedBlocksSnapshot {
        if state.is_none() {
            let loaded = match self.repository.load().await {
                Ok(snapshot) => snapshot,
                Err(error) => {
                    warn!("counted-blocks ledger load failed, starting empty: {error}");
                    None
                }
            };
            *state = Some(loaded.unwrap_or_else(|| CountedBlocksSnapshot::empty(today)));
        }

        let snapshot = state.get_or_insert_with(|| CountedBlocksSnapshot::empty(today));
        if snapshot.date != today {
            *snapshot = CountedBlocksSnapshot::empty(today);
        }
        snapshot
    }

    async fn persist(&self, snapshot: &CountedBlocksSnapshot) {
        if let Err(error) = self.repository.save(snapshot).await {
            warn!("counted-blocks ledger save failed: {error}");
        }
    }
}
