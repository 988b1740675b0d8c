//! Background cleanup of expired keyed state.
//!
//! A deterministic interval task per store, instead of probabilistic
//! inline sweeps on the request path: cleanup cost never lands on a
//! request, and memory is reclaimed even when traffic stops. Each
//! sweeper subscribes to the shutdown coordinator and exits with the
//! server.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Spawn a sweeper that calls `prune` every `interval_secs` until the
/// shutdown signal fires. `prune` returns how many entries it removed.
pub fn spawn_sweeper<F>(
    name: &'static str,
    interval_secs: u64,
    mut shutdown: broadcast::Receiver<()>,
    prune: F,
) -> JoinHandle<()>
where
    F: Fn() -> usize + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so a fresh start
        // does not scan empty maps.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = prune();
                    if removed > 0 {
                        tracing::debug!(sweeper = name, removed, "Swept expired entries");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!(sweeper = name, "Sweeper stopping");
                    break;
                }
            }
        }
    })
}
