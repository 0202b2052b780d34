use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::Engine;

/// Background sweep that expires stale open bids. Reads and writes also
/// enforce the deadline lazily, so the sweep only has to keep the store
/// tidy, not be the first line of defense.
pub struct BidExpirer {
    engine: Arc<Engine>,
    every: Duration,
}

impl BidExpirer {
    pub fn new(engine: Arc<Engine>, every: Duration) -> Self {
        Self { engine, every }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                match self.engine.expire_due().await {
                    Ok(0) => {}
                    Ok(expired) => tracing::info!(expired, "expired stale bids"),
                    Err(err) => tracing::warn!(code = err.code, "expiry sweep failed"),
                }
            }
        })
    }
}
