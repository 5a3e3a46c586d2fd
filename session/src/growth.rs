use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::debug;

/// Growth interval tiered by the live mine count. An explicit override on
/// the session takes precedence.
pub fn growth_interval(mines: usize) -> Duration {
    if mines < 20 {
        Duration::from_secs(30)
    } else if mines < 50 {
        Duration::from_secs(20)
    } else {
        Duration::from_secs(10)
    }
}

/// Terrain-mode state owned by a session.
///
/// `enabled` and `delay_override` are configuration and survive a new game;
/// the timers, countdown, and growth stamp are per-board and are cleared by
/// [`TerrainState::cancel`].
#[derive(Debug, Default)]
pub(crate) struct TerrainState {
    pub(crate) enabled: bool,
    pub(crate) delay_override: Option<Duration>,
    pub(crate) countdown: Option<u64>,
    pub(crate) last_growth: Option<Instant>,
    pub(crate) timers: Option<GrowthTimers>,
}

impl TerrainState {
    pub(crate) fn current_interval(&self, mines: usize) -> Duration {
        self.delay_override.unwrap_or_else(|| growth_interval(mines))
    }

    pub(crate) fn is_running(&self) -> bool {
        self.timers.is_some()
    }

    /// Stops both background tasks and clears the visible countdown.
    pub(crate) fn cancel(&mut self) {
        if let Some(timers) = self.timers.take() {
            timers.abort();
            debug!("Growth timers cancelled");
        }
        self.countdown = None;
    }
}

/// Handles to the two background tasks: the growth loop and the 1-second
/// display ticker.
#[derive(Debug)]
pub(crate) struct GrowthTimers {
    pub(crate) growth: JoinHandle<()>,
    pub(crate) countdown: JoinHandle<()>,
}

impl GrowthTimers {
    fn abort(self) {
        self.growth.abort();
        self.countdown.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_tiers_by_mine_count() {
        assert_eq!(growth_interval(0), Duration::from_secs(30));
        assert_eq!(growth_interval(19), Duration::from_secs(30));
        assert_eq!(growth_interval(20), Duration::from_secs(20));
        assert_eq!(growth_interval(49), Duration::from_secs(20));
        assert_eq!(growth_interval(50), Duration::from_secs(10));
        assert_eq!(growth_interval(500), Duration::from_secs(10));
    }

    #[test]
    fn override_takes_precedence_over_tiers() {
        let terrain = TerrainState {
            delay_override: Some(Duration::from_secs(3)),
            ..Default::default()
        };

        assert_eq!(terrain.current_interval(0), Duration::from_secs(3));
        assert_eq!(terrain.current_interval(100), Duration::from_secs(3));
    }
}
