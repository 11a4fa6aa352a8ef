//! Auto-lock sweep: a cooperative loop that locks markets whose resolution
//! time has passed.
//!
//! The loop wakes on a fixed cadence (10 s by default, injectable for
//! tests), locks every overdue TRADING market, logs failures, and retries
//! them on the next tick. It observes the shutdown signal at its wake
//! points only.

use std::sync::Arc;
use std::time::Duration;

use clearbook_types::constants;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::board::MarketBoard;

/// Drives automatic TRADING -> LOCKED transitions.
pub struct AutoLock {
    board: Arc<MarketBoard>,
    interval: Duration,
}

impl AutoLock {
    /// Sweep at the default cadence.
    #[must_use]
    pub fn new(board: Arc<MarketBoard>) -> Self {
        Self::with_interval(board, Duration::from_secs(constants::AUTO_LOCK_INTERVAL_SECS))
    }

    /// Sweep at a custom cadence. Tests use this to tighten the loop.
    #[must_use]
    pub fn with_interval(board: Arc<MarketBoard>, interval: Duration) -> Self {
        Self { board, interval }
    }

    /// One sweep: lock everything overdue. Returns how many markets locked.
    pub fn sweep(&self) -> usize {
        let mut locked = 0;
        for id in self.board.lock_due() {
            match self.board.lock(id) {
                Ok(_) => {
                    info!(market_id = %id, "market auto-locked (resolution time passed)");
                    locked += 1;
                }
                // Raced with a manual transition; the next tick re-checks.
                Err(err) => warn!(market_id = %id, error = %err, "auto-lock failed"),
            }
        }
        locked
    }

    /// Run the sweep loop until the shutdown signal flips.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("auto-lock loop stopping");
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, Utc};
    use clearbook_types::{MarketStatus, UserId};

    use super::*;

    fn expired_board() -> (Arc<MarketBoard>, clearbook_types::MarketId) {
        let board = Arc::new(MarketBoard::new());
        let id = board
            .create(
                "expired",
                None,
                Utc::now() - ChronoDuration::seconds(1),
                UserId::from("c"),
            )
            .id;
        (board, id)
    }

    #[test]
    fn sweep_locks_overdue_markets() {
        let (board, id) = expired_board();
        let sweeper = AutoLock::new(Arc::clone(&board));

        assert_eq!(sweeper.sweep(), 1);
        assert_eq!(board.get(id).unwrap().status, MarketStatus::Locked);
        assert_eq!(sweeper.sweep(), 0, "already locked");
    }

    #[tokio::test]
    async fn loop_locks_within_one_tick() {
        let (board, id) = expired_board();
        let sweeper = AutoLock::with_interval(Arc::clone(&board), Duration::from_millis(20));
        let (_stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(sweeper.run(stop_rx));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(board.get(id).unwrap().status, MarketStatus::Locked);

        handle.abort();
    }

    #[tokio::test]
    async fn loop_observes_shutdown() {
        let (board, _id) = expired_board();
        let sweeper = AutoLock::with_interval(board, Duration::from_secs(3600));
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(sweeper.run(stop_rx));

        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop should exit on shutdown")
            .unwrap();
    }
}
