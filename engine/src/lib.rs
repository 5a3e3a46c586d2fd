//! Headless minesweeper board engine.
//!
//! This crate owns the grid, mine layout, reveal state, and win/loss
//! evaluation. Mines are placed on the first reveal, excluding the clicked
//! cell and its neighbors, so the first click is always safe. The optional
//! terrain-mode growth step that adds mines to a live board is exposed as
//! [`Board::grow`]; scheduling it belongs to the `terramine-session` crate.
//!
//! ```rust
//! use terramine_engine::{Board, GameParams, RevealOutcome};
//!
//! let mut board = Board::new(GameParams::default());
//! let mut changed = Vec::new();
//!
//! let outcome = board.reveal(40, &mut changed);
//! assert_ne!(outcome, RevealOutcome::Exploded);
//!
//! board.toggle_flag(0, &mut changed);
//! println!("{} mines remaining", board.mines_remaining());
//! ```

mod board;
mod cell;
mod model;

pub use board::Board;
pub use cell::{Cell, CellState, MINE_SENTINEL};
pub use model::{BoardSnapshot, CellSnapshot, GameOverrides, GameParams, RevealOutcome};
