//! Serialized game sessions and terrain-mode growth timers for the
//! terramine engine.
//!
//! A [`GameSession`] owns one board behind a single mutex, so every
//! mutation — player commands and background growth ticks alike — is
//! serialized. Terrain mode runs two independently cancellable tasks: the
//! growth loop that periodically mines a random unrevealed cell, and a
//! 1-second ticker that only maintains the visible countdown. Presentation
//! layers either subscribe to [`GameEvent`]s or poll
//! [`GameSession::snapshot`] after each command.
//!
//! ```rust,no_run
//! use terramine_engine::{GameOverrides, GameParams};
//! use terramine_session::{GameEvent, GameSession};
//!
//! #[tokio::main]
//! async fn main() {
//!     let session = GameSession::new(GameParams::default());
//!     let (_id, mut events) = session.subscribe().await;
//!
//!     session.set_terrain_mode(true).await;
//!     session.reveal(40).await;
//!
//!     while let Some(event) = events.recv().await {
//!         if let GameEvent::GameStatusChanged { won, .. } = event {
//!             println!("Game over, won: {won}");
//!             session.new_game(GameOverrides::default()).await;
//!             break;
//!         }
//!     }
//! }
//! ```

mod growth;
mod registry;
mod session;

pub use growth::growth_interval;
pub use registry::{Sessions, create_registry, create_session, get_session, remove_session};
pub use session::{GameEvent, GameSession, GameSnapshot};

// Re-export the engine types a consumer needs alongside the session API.
pub use terramine_engine::{
    Board, BoardSnapshot, CellSnapshot, GameOverrides, GameParams, RevealOutcome,
};
