use std::future::Future;

use tokio::time::{self, Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileWait {
    Loaded,
    TimedOut,
}

/// Waits for `loaded` but never longer than `limit`. Whichever finishes
/// first wins; the loser is dropped.
pub async fn tiles_or_timeout<F>(loaded: F, limit: Duration) -> TileWait
where
    F: Future<Output = ()>,
{
    match time::timeout(limit, loaded).await {
        Ok(()) => TileWait::Loaded,
        Err(_) => TileWait::TimedOut,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fast_tiles_win() {
        let outcome =
            tiles_or_timeout(time::sleep(Duration::from_millis(200)), Duration::from_millis(1500))
                .await;
        assert_eq!(outcome, TileWait::Loaded);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_tiles_time_out() {
        let started = time::Instant::now();
        let outcome = tiles_or_timeout(std::future::pending(), Duration::from_millis(1500)).await;
        assert_eq!(outcome, TileWait::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(1500));
    }
}
