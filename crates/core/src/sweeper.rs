//! Background task that periodically drops expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::ResultCache;

/// Owns the periodic cleanup task; aborts it on drop so a discarded sweeper
/// cannot keep the runtime alive.
pub struct ExpirySweeper {
    handle: JoinHandle<()>,
}

impl ExpirySweeper {
    /// Spawn the sweep loop. Must be called from within a Tokio runtime.
    pub fn start(cache: Arc<ResultCache>, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so sweeps start one
            // interval after startup.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cache.cleanup_expired();
                if removed > 0 {
                    info!(removed, "Swept expired cache entries");
                } else {
                    debug!("Sweep found no expired entries");
                }
            }
        });
        Self { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
