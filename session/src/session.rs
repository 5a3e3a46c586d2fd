use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tokio::time;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use terramine_engine::{Board, BoardSnapshot, GameOverrides, GameParams, RevealOutcome};

use crate::growth::{GrowthTimers, TerrainState};

/// Events emitted by a game session.
///
/// Events carry changed cell indices, not cell payloads; subscribers
/// resynchronize through [`GameSession::snapshot`].
#[derive(Debug, Clone)]
pub enum GameEvent {
    /// A fresh board replaced the previous one.
    GameInitialized {
        width: usize,
        height: usize,
        mines: usize,
    },
    /// Cells at these indices changed visible state, in reveal order.
    BoardUpdated { changed: Vec<usize> },
    /// The game reached a terminal state.
    GameStatusChanged { won: bool, lost: bool },
    /// Terrain mode added a mine; `countdown` is the next interval.
    MineGrown { mines: usize, countdown: u64 },
    /// The display countdown advanced.
    CountdownTick { seconds: u64 },
}

/// Point-in-time view of a session for presentation layers.
#[derive(Debug, Clone, Serialize)]
pub struct GameSnapshot {
    pub board: BoardSnapshot,
    pub terrain_mode: bool,
    pub growth_countdown: Option<u64>,
    pub seconds_since_growth: Option<f64>,
}

struct SessionState {
    params: GameParams,
    board: Board,
    terrain: TerrainState,
    subscribers: HashMap<Uuid, mpsc::UnboundedSender<GameEvent>>,
}

impl SessionState {
    fn broadcast(&mut self, event: GameEvent) {
        self.subscribers.retain(|id, sender| {
            if sender.send(event.clone()).is_ok() {
                true
            } else {
                debug!("Dropping disconnected subscriber {}", id);
                false
            }
        });
    }

    fn handle_terminal(&mut self, outcome: RevealOutcome) {
        if !outcome.is_terminal() {
            return;
        }

        let won = outcome == RevealOutcome::Won;
        info!("Game over, won: {}", won);
        self.terrain.cancel();
        self.broadcast(GameEvent::GameStatusChanged { won, lost: !won });
    }
}

/// A single game with all mutations serialized through one mutex.
///
/// Cloning yields another handle to the same game. Commands lock, mutate,
/// and broadcast; the growth and countdown tasks marshal their mutations
/// through the same mutex, so no two operations ever interleave against the
/// board.
#[derive(Clone)]
pub struct GameSession {
    state: Arc<Mutex<SessionState>>,
}

impl GameSession {
    pub fn new(params: GameParams) -> Self {
        info!(
            "Creating game session: {}x{} with {} mines",
            params.width, params.height, params.mines
        );
        Self::from_board(Board::new(params))
    }

    /// Wraps an existing board, e.g. one built with a fixed mine layout.
    pub fn from_board(board: Board) -> Self {
        let params = GameParams {
            width: board.width(),
            height: board.height(),
            mines: board.initial_mines(),
        };
        Self {
            state: Arc::new(Mutex::new(SessionState {
                params,
                board,
                terrain: TerrainState::default(),
                subscribers: HashMap::new(),
            })),
        }
    }

    /// Registers an event subscriber. The returned id can be passed to
    /// [`GameSession::unsubscribe`]; a dropped receiver is pruned on the
    /// next broadcast either way.
    pub async fn subscribe(&self) -> (Uuid, mpsc::UnboundedReceiver<GameEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        let mut state = self.state.lock().await;
        state.subscribers.insert(id, sender);
        debug!(
            "Subscriber {} added, total subscribers: {}",
            id,
            state.subscribers.len()
        );
        (id, receiver)
    }

    pub async fn unsubscribe(&self, id: &Uuid) {
        let mut state = self.state.lock().await;
        if state.subscribers.remove(id).is_some() {
            debug!(
                "Subscriber {} removed, remaining subscribers: {}",
                id,
                state.subscribers.len()
            );
        } else {
            warn!("Attempted to remove non-existent subscriber: {}", id);
        }
    }

    /// Replaces the board, applying partial parameter overrides; unset
    /// fields retain their previous values. Stops both growth timers before
    /// the new board exists, so a stale tick can never touch it.
    #[instrument(level = "trace", skip(self))]
    pub async fn new_game(&self, overrides: GameOverrides) {
        let mut state = self.state.lock().await;
        state.terrain.cancel();
        state.terrain.last_growth = None;

        state.params = state.params.apply(overrides);
        info!(
            "Starting new game: {}x{} with {} mines",
            state.params.width, state.params.height, state.params.mines
        );
        state.board = Board::new(state.params);

        let (width, height, mines) = (
            state.board.width(),
            state.board.height(),
            state.board.mines(),
        );
        state.broadcast(GameEvent::GameInitialized {
            width,
            height,
            mines,
        });
    }

    #[instrument(level = "trace", skip(self))]
    pub async fn reveal(&self, index: usize) -> RevealOutcome {
        let mut state = self.state.lock().await;
        let mut changed = Vec::new();
        let outcome = state.board.reveal(index, &mut changed);

        if !changed.is_empty() {
            state.broadcast(GameEvent::BoardUpdated { changed });
        }

        match outcome {
            RevealOutcome::Revealed => self.start_growth_locked(&mut state),
            _ => state.handle_terminal(outcome),
        }

        outcome
    }

    #[instrument(level = "trace", skip(self))]
    pub async fn toggle_flag(&self, index: usize) -> bool {
        let mut state = self.state.lock().await;
        let mut changed = Vec::new();
        let toggled = state.board.toggle_flag(index, &mut changed);

        if !changed.is_empty() {
            state.broadcast(GameEvent::BoardUpdated { changed });
        }

        toggled
    }

    #[instrument(level = "trace", skip(self))]
    pub async fn chord(&self, index: usize) -> RevealOutcome {
        let mut state = self.state.lock().await;
        let mut changed = Vec::new();
        let outcome = state.board.chord(index, &mut changed);

        if !changed.is_empty() {
            state.broadcast(GameEvent::BoardUpdated { changed });
        }

        state.handle_terminal(outcome);
        outcome
    }

    /// Enables or disables terrain mode. Enabling never starts growth by
    /// itself; the timers start lazily on the next successful reveal.
    /// Disabling cancels both timers and clears the countdown.
    #[instrument(level = "trace", skip(self))]
    pub async fn set_terrain_mode(&self, enabled: bool) {
        let mut state = self.state.lock().await;
        if state.terrain.enabled == enabled {
            return;
        }

        state.terrain.enabled = enabled;
        if enabled {
            info!("Terrain mode enabled, growth starts on the next reveal");
        } else {
            info!("Terrain mode disabled");
            state.terrain.cancel();
            state.terrain.last_growth = None;
        }
    }

    /// Sets or clears the growth interval override, replacing the
    /// density-tiered default from the next cycle on. Non-finite or
    /// non-positive values are ignored.
    #[instrument(level = "trace", skip(self))]
    pub async fn set_growth_delay_override(&self, seconds: Option<f64>) {
        let delay = match seconds {
            Some(value) if value.is_finite() && value > 0.0 => {
                Some(Duration::from_secs_f64(value))
            }
            Some(value) => {
                warn!("Ignoring invalid growth delay override: {}", value);
                return;
            }
            None => None,
        };

        let mut state = self.state.lock().await;
        state.terrain.delay_override = delay;
        debug!("Growth delay override set to {:?}", delay);
    }

    /// Idempotent growth start, gated the same way as the lazy start on
    /// reveal: terrain mode enabled, not already running, first click done,
    /// game not over.
    pub async fn start_growth_if_needed(&self) {
        let mut state = self.state.lock().await;
        self.start_growth_locked(&mut state);
    }

    pub async fn snapshot(&self) -> GameSnapshot {
        let state = self.state.lock().await;
        GameSnapshot {
            board: state.board.snapshot(),
            terrain_mode: state.terrain.enabled,
            growth_countdown: state.terrain.countdown,
            seconds_since_growth: state
                .terrain
                .last_growth
                .map(|at| at.elapsed().as_secs_f64()),
        }
    }

    /// Instant of the most recent growth event, for UI pulse effects.
    pub async fn last_growth(&self) -> Option<Instant> {
        self.state.lock().await.terrain.last_growth
    }

    fn start_growth_locked(&self, state: &mut SessionState) {
        if !state.terrain.enabled
            || state.terrain.is_running()
            || !state.board.first_click_done()
            || state.board.is_finished()
        {
            return;
        }

        let interval = state.terrain.current_interval(state.board.mines());
        state.terrain.countdown = Some(interval.as_secs());
        info!(
            "Starting mine growth timers, first interval {}s",
            interval.as_secs()
        );
        state.terrain.timers = Some(GrowthTimers {
            growth: tokio::spawn(Self::growth_loop(Arc::clone(&self.state))),
            countdown: tokio::spawn(Self::countdown_loop(Arc::clone(&self.state))),
        });
    }

    async fn growth_loop(shared: Arc<Mutex<SessionState>>) {
        loop {
            let delay = {
                let state = shared.lock().await;
                if !state.terrain.enabled || state.board.is_finished() {
                    break;
                }
                state.terrain.current_interval(state.board.mines())
            };

            time::sleep(delay).await;

            let mut state = shared.lock().await;
            if !state.terrain.enabled || state.board.is_finished() {
                break;
            }

            let mut changed = Vec::new();
            let Some(index) = state.board.grow(&mut rand::rng(), &mut changed) else {
                break;
            };

            // The next wait and the displayed countdown both re-tier on the
            // live, post-growth mine count.
            state.terrain.last_growth = Some(Instant::now());
            let next = state.terrain.current_interval(state.board.mines());
            state.terrain.countdown = Some(next.as_secs());

            let mines = state.board.mines();
            info!("Mine grown at index {}, mine count now {}", index, mines);

            if !changed.is_empty() {
                state.broadcast(GameEvent::BoardUpdated { changed });
            }
            state.broadcast(GameEvent::MineGrown {
                mines,
                countdown: next.as_secs(),
            });

            if state.board.is_finished() {
                // Growth mined the last unrevealed safe cell.
                state.terrain.cancel();
                state.broadcast(GameEvent::GameStatusChanged {
                    won: true,
                    lost: false,
                });
                break;
            }
        }
    }

    /// Display-only ticker; it never mutates mine placement.
    async fn countdown_loop(shared: Arc<Mutex<SessionState>>) {
        loop {
            time::sleep(Duration::from_secs(1)).await;

            let mut state = shared.lock().await;
            if !state.terrain.enabled || state.board.is_finished() {
                break;
            }

            if let Some(seconds) = state.terrain.countdown {
                let remaining = seconds.saturating_sub(1);
                state.terrain.countdown = Some(remaining);
                state.broadcast(GameEvent::CountdownTick { seconds: remaining });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terramine_engine::{Board, GameParams};
    use tokio::time::{self, Duration};

    /// 3x3 board with a mine at index 0; revealing index 1 opens exactly
    /// one numbered cell.
    fn test_session() -> GameSession {
        GameSession::from_board(Board::from_mine_indices(
            GameParams {
                width: 3,
                height: 3,
                mines: 1,
            },
            &[0],
        ))
    }

    #[tokio::test]
    async fn new_game_retains_previous_dimensions() {
        let session = GameSession::new(GameParams {
            width: 12,
            height: 7,
            mines: 14,
        });

        session
            .new_game(GameOverrides {
                mines: Some(20),
                ..Default::default()
            })
            .await;

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.board.width, 12);
        assert_eq!(snapshot.board.height, 7);
        assert_eq!(snapshot.board.mines, 20);
        assert!(!snapshot.board.game_over);
    }

    #[tokio::test]
    async fn subscribers_observe_updates_and_status() {
        let session = test_session();
        let (_id, mut events) = session.subscribe().await;

        assert_eq!(session.reveal(1).await, RevealOutcome::Revealed);
        assert!(matches!(
            events.try_recv(),
            Ok(GameEvent::BoardUpdated { changed }) if changed == vec![1]
        ));

        assert_eq!(session.reveal(0).await, RevealOutcome::Exploded);
        assert!(matches!(
            events.try_recv(),
            Ok(GameEvent::BoardUpdated { .. })
        ));
        assert!(matches!(
            events.try_recv(),
            Ok(GameEvent::GameStatusChanged {
                won: false,
                lost: true
            })
        ));
    }

    #[tokio::test]
    async fn unsubscribed_receivers_get_nothing() {
        let session = test_session();
        let (id, mut events) = session.subscribe().await;

        session.unsubscribe(&id).await;
        session.reveal(1).await;

        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn growth_fires_on_the_tiered_interval() {
        let session = test_session();
        session.set_terrain_mode(true).await;
        session.reveal(1).await;

        let before = session.snapshot().await;
        assert_eq!(before.board.mines, 1);
        assert_eq!(before.growth_countdown, Some(30));

        time::sleep(Duration::from_secs(31)).await;

        let after = session.snapshot().await;
        assert_eq!(after.board.mines, 2);
        assert!(after.growth_countdown.is_some());
        assert!(after.seconds_since_growth.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn growth_respects_the_delay_override() {
        let session = test_session();
        session.set_growth_delay_override(Some(5.0)).await;
        session.set_terrain_mode(true).await;
        session.reveal(1).await;

        time::sleep(Duration::from_millis(5500)).await;
        assert_eq!(session.snapshot().await.board.mines, 2);

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(session.snapshot().await.board.mines, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_ticker_only_decrements_the_display() {
        let session = test_session();
        session.set_growth_delay_override(Some(100.0)).await;
        session.set_terrain_mode(true).await;
        session.reveal(1).await;

        time::sleep(Duration::from_millis(3500)).await;

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.growth_countdown, Some(97));
        assert_eq!(snapshot.board.mines, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disabling_terrain_mode_stops_growth() {
        let session = test_session();
        session.set_growth_delay_override(Some(5.0)).await;
        session.set_terrain_mode(true).await;
        session.reveal(1).await;

        time::sleep(Duration::from_millis(5500)).await;
        assert_eq!(session.snapshot().await.board.mines, 2);

        session.set_terrain_mode(false).await;
        let snapshot = session.snapshot().await;
        assert!(!snapshot.terrain_mode);
        assert!(snapshot.growth_countdown.is_none());

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(session.snapshot().await.board.mines, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn game_over_cancels_growth_timers() {
        let session = test_session();
        session.set_growth_delay_override(Some(5.0)).await;
        session.set_terrain_mode(true).await;
        session.reveal(1).await;
        assert!(session.snapshot().await.growth_countdown.is_some());

        assert_eq!(session.reveal(0).await, RevealOutcome::Exploded);
        let snapshot = session.snapshot().await;
        assert!(snapshot.board.game_over);
        assert!(snapshot.growth_countdown.is_none());

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(session.snapshot().await.board.mines, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn growth_waits_for_the_first_reveal() {
        let session = GameSession::new(GameParams {
            width: 9,
            height: 9,
            mines: 10,
        });
        session.set_growth_delay_override(Some(5.0)).await;
        session.set_terrain_mode(true).await;

        time::sleep(Duration::from_secs(20)).await;
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.board.mines, 10);
        assert!(snapshot.growth_countdown.is_none());

        session.start_growth_if_needed().await;
        assert!(session.snapshot().await.growth_countdown.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn start_growth_if_needed_is_idempotent() {
        let session = test_session();
        session.set_growth_delay_override(Some(5.0)).await;
        session.set_terrain_mode(true).await;
        session.reveal(1).await;
        session.start_growth_if_needed().await;
        session.start_growth_if_needed().await;

        time::sleep(Duration::from_millis(5500)).await;

        assert_eq!(session.snapshot().await.board.mines, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn new_game_stops_growth_and_keeps_terrain_config() {
        let session = test_session();
        session.set_growth_delay_override(Some(5.0)).await;
        session.set_terrain_mode(true).await;
        session.reveal(1).await;

        time::sleep(Duration::from_millis(5500)).await;
        assert_eq!(session.snapshot().await.board.mines, 2);

        session.new_game(GameOverrides::default()).await;
        let snapshot = session.snapshot().await;
        assert!(snapshot.terrain_mode);
        assert!(snapshot.growth_countdown.is_none());
        assert!(snapshot.seconds_since_growth.is_none());

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(session.snapshot().await.board.mines, 1);
        assert!(!session.snapshot().await.board.game_over);
    }

    #[tokio::test]
    async fn invalid_growth_overrides_are_ignored() {
        let session = test_session();
        session.set_growth_delay_override(Some(-3.0)).await;
        session.set_growth_delay_override(Some(f64::NAN)).await;
        session.set_terrain_mode(true).await;
        session.reveal(1).await;

        assert_eq!(session.snapshot().await.growth_countdown, Some(30));
    }
}
