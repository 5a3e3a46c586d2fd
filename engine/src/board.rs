use std::cmp::min;
use std::collections::{HashSet, VecDeque};

use rand::Rng;
use tracing::{debug, instrument, warn};

use crate::cell::{Cell, CellState, MINE_SENTINEL};
use crate::model::{BoardSnapshot, CellSnapshot, GameParams, RevealOutcome};

fn validate_params(params: &mut GameParams) {
    params.mines = min(params.mines, params.width * params.height)
}

/// A single rectangular minefield and its rule set.
///
/// A board starts with no mines placed; placement is deferred to the first
/// reveal so the first click is always safe. Invalid commands (out-of-range
/// index, action on a finished game, toggling a revealed cell) are logged
/// no-ops rather than errors.
///
/// Mutating commands append the index of every cell whose visible state
/// changed to the caller's `changed` vector, in reveal order, so an observer
/// can resynchronize selectively.
#[derive(Debug)]
pub struct Board {
    width: usize,
    height: usize,
    initial_mines: usize,
    mines: usize,
    revealed: usize,
    first_click_done: bool,
    finished: bool,
    won: bool,
    cells: Vec<Cell>,
}

impl Board {
    pub fn new(mut params: GameParams) -> Self {
        validate_params(&mut params);
        debug!(
            "Creating {}x{} board with {} mines",
            params.width, params.height, params.mines
        );
        Self {
            width: params.width,
            height: params.height,
            initial_mines: params.mines,
            mines: params.mines,
            revealed: 0,
            first_click_done: false,
            finished: false,
            won: false,
            cells: vec![Cell::default(); params.width * params.height],
        }
    }

    /// Builds a board with a fixed mine layout, for tests and
    /// puzzle-building frontends.
    ///
    /// Out-of-range and duplicate indices are ignored. The first click is
    /// considered done, so reveals proceed without random placement.
    pub fn from_mine_indices(params: GameParams, mine_indices: &[usize]) -> Self {
        let mut board = Self::new(GameParams { mines: 0, ..params });
        let mut placed = 0;
        for &index in mine_indices {
            if let Some(cell) = board.cells.get_mut(index)
                && !cell.mine
            {
                cell.mine = true;
                placed += 1;
            }
        }
        board.initial_mines = placed;
        board.mines = placed;
        board.recount_adjacency();
        board.first_click_done = true;
        board
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Live mine count; grows under terrain mode.
    pub fn mines(&self) -> usize {
        self.mines
    }

    pub fn initial_mines(&self) -> usize {
        self.initial_mines
    }

    pub fn first_click_done(&self) -> bool {
        self.first_click_done
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_won(&self) -> bool {
        self.won
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn flags_placed(&self) -> usize {
        self.cells
            .iter()
            .filter(|cell| cell.state == CellState::Flagged)
            .count()
    }

    pub fn mines_remaining(&self) -> usize {
        self.mines.saturating_sub(self.flags_placed())
    }

    /// Primary action: reveal the cell at `index`.
    ///
    /// The first effective reveal places the mines, excluding the clicked
    /// cell and its 8 neighbors. A reveal of a flagged or revealed cell is a
    /// no-op, checked before placement, so a first click on a flagged cell
    /// places nothing.
    #[instrument(level = "trace", skip(self, changed))]
    pub fn reveal(&mut self, index: usize, changed: &mut Vec<usize>) -> RevealOutcome {
        if self.finished {
            debug!("Ignoring reveal on finished game at index {}", index);
            return RevealOutcome::Ignored;
        }

        let Some(cell) = self.cells.get(index) else {
            warn!("Invalid reveal index: {}", index);
            return RevealOutcome::Ignored;
        };

        if matches!(cell.state, CellState::Revealed | CellState::Flagged) {
            debug!("Ignoring reveal on {:?} cell at index {}", cell.state, index);
            return RevealOutcome::Ignored;
        }

        if !self.first_click_done {
            self.place_mines(index, &mut rand::rng());
        }

        self.reveal_cell(index, changed)
    }

    /// Secondary action: cycle the marker at `index`
    /// (`Hidden -> Flagged -> Question -> Hidden`).
    ///
    /// Returns whether anything changed.
    #[instrument(level = "trace", skip(self, changed))]
    pub fn toggle_flag(&mut self, index: usize, changed: &mut Vec<usize>) -> bool {
        if self.finished {
            debug!("Ignoring flag action on finished game at index {}", index);
            return false;
        }

        let Some(cell) = self.cells.get_mut(index) else {
            warn!("Invalid flag index: {}", index);
            return false;
        };

        match cell.state {
            CellState::Hidden => {
                cell.state = CellState::Flagged;
                debug!("Cell {} flagged", index);
            }
            CellState::Flagged => {
                cell.state = CellState::Question;
                debug!("Cell {} marked as question", index);
            }
            CellState::Question => {
                cell.state = CellState::Hidden;
                debug!("Cell {} unmarked", index);
            }
            CellState::Revealed => {
                debug!("Ignoring flag action on revealed cell {}", index);
                return false;
            }
        }

        changed.push(index);
        true
    }

    /// Chord: reveal all unmarked neighbors of a revealed numbered cell when
    /// its flagged-neighbor count matches its number.
    ///
    /// No-op, with no partial effect, on any mismatch. A misplaced flag can
    /// make a chord reveal a mine and lose the game.
    #[instrument(level = "trace", skip(self, changed))]
    pub fn chord(&mut self, index: usize, changed: &mut Vec<usize>) -> RevealOutcome {
        if self.finished {
            debug!("Ignoring chord on finished game at index {}", index);
            return RevealOutcome::Ignored;
        }

        let Some(cell) = self.cells.get(index) else {
            warn!("Invalid chord index: {}", index);
            return RevealOutcome::Ignored;
        };

        if cell.state != CellState::Revealed || cell.adjacent <= 0 {
            debug!("Ignoring chord on non-numbered cell at index {}", index);
            return RevealOutcome::Ignored;
        }

        let adjacent = cell.adjacent;
        let neighbors = self.neighbors(index);
        let flagged = neighbors
            .iter()
            .filter(|&&n| self.cells[n].state == CellState::Flagged)
            .count() as i8;

        if flagged != adjacent {
            debug!(
                "Ignoring chord at index {}: {} flags around a {}",
                index, flagged, adjacent
            );
            return RevealOutcome::Ignored;
        }

        let mut outcome = RevealOutcome::Ignored;
        for neighbor in neighbors {
            outcome = outcome.merge(self.reveal_cell(neighbor, changed));
        }
        outcome
    }

    /// One terrain-mode growth step: mine a random unrevealed non-mine cell
    /// and bump its neighbors' counts.
    ///
    /// Revealed neighbors whose displayed numbers change are appended to
    /// `changed`. Returns the grown index, or `None` when the game is over
    /// or no eligible cell remains. Mining the last unrevealed safe cell
    /// finishes the board as a win, since no reveal is left to observe it.
    #[instrument(level = "trace", skip(self, rng, changed))]
    pub fn grow(&mut self, rng: &mut impl Rng, changed: &mut Vec<usize>) -> Option<usize> {
        if self.finished {
            return None;
        }

        let candidates: Vec<usize> = (0..self.cells.len())
            .filter(|&i| !self.cells[i].mine && self.cells[i].state != CellState::Revealed)
            .collect();

        let Some(&index) = candidates.get(rng.random_range(0..candidates.len().max(1))) else {
            debug!("No cell eligible for mine growth");
            return None;
        };

        self.cells[index].mine = true;
        self.cells[index].adjacent = MINE_SENTINEL;
        self.mines += 1;

        for neighbor in self.neighbors(index) {
            let cell = &mut self.cells[neighbor];
            if !cell.mine {
                cell.adjacent += 1;
                if cell.state == CellState::Revealed {
                    changed.push(neighbor);
                }
            }
        }

        debug!("Mine grown at index {}, mine count now {}", index, self.mines);

        if self.has_won() {
            self.finished = true;
            self.won = true;
            debug!("Growth mined the last safe cell - game won");
        }

        Some(index)
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            width: self.width,
            height: self.height,
            mines: self.mines,
            initial_mines: self.initial_mines,
            flags_placed: self.flags_placed(),
            mines_remaining: self.mines_remaining(),
            game_over: self.finished,
            won: self.won,
            cells: self
                .cells
                .iter()
                .enumerate()
                .map(|(index, cell)| CellSnapshot {
                    index,
                    x: index % self.width,
                    y: index / self.width,
                    mine: cell.mine,
                    revealed: cell.state == CellState::Revealed,
                    flagged: cell.state == CellState::Flagged,
                    question: cell.state == CellState::Question,
                    adjacent: cell.adjacent,
                })
                .collect(),
        }
    }

    fn neighbors(&self, index: usize) -> Vec<usize> {
        let x = index % self.width;
        let y = index / self.width;
        let mut neighbors = Vec::with_capacity(8);

        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }

                let new_x = x as i32 + dx;
                let new_y = y as i32 + dy;

                if new_x >= 0
                    && new_x < self.width as i32
                    && new_y >= 0
                    && new_y < self.height as i32
                {
                    neighbors.push((new_x as usize) + (new_y as usize) * self.width);
                }
            }
        }

        neighbors
    }

    /// Unbiased sequential sampling over the cells outside the safe zone:
    /// each eligible cell is mined with probability
    /// `remaining_mines / remaining_cells`.
    fn place_mines(&mut self, safe_index: usize, rng: &mut impl Rng) {
        let mut safe: HashSet<usize> = HashSet::from([safe_index]);
        safe.extend(self.neighbors(safe_index));

        let eligible = self.cells.len() - safe.len();
        let mut mines_left = min(self.mines, eligible);
        self.mines = mines_left;

        let mut cells_left = eligible;
        for index in 0..self.cells.len() {
            if safe.contains(&index) {
                continue;
            }

            if mines_left > 0 && rng.random_ratio(mines_left as u32, cells_left as u32) {
                self.cells[index].mine = true;
                mines_left -= 1;
            }
            cells_left -= 1;
        }

        self.recount_adjacency();
        self.first_click_done = true;
        debug!(
            "Placed {} mines around a {}-cell safe zone",
            self.mines,
            safe.len()
        );
    }

    fn recount_adjacency(&mut self) {
        for index in 0..self.cells.len() {
            if self.cells[index].mine {
                self.cells[index].adjacent = MINE_SENTINEL;
                continue;
            }

            let count = self
                .neighbors(index)
                .iter()
                .filter(|&&neighbor| self.cells[neighbor].mine)
                .count() as i8;
            self.cells[index].adjacent = count;
        }
    }

    /// Shared reveal path for direct reveals and chords; `index` is in
    /// range.
    fn reveal_cell(&mut self, index: usize, changed: &mut Vec<usize>) -> RevealOutcome {
        if self.finished {
            return RevealOutcome::Ignored;
        }

        let cell = &self.cells[index];
        if matches!(cell.state, CellState::Revealed | CellState::Flagged) {
            return RevealOutcome::Ignored;
        }

        if cell.mine {
            warn!("Mine hit at index {} - game over", index);
            self.finished = true;
            self.won = false;
            self.disclose_mines(changed);
            return RevealOutcome::Exploded;
        }

        self.flood_reveal(index, changed);

        if self.has_won() {
            self.finished = true;
            self.won = true;
            debug!("All safe cells revealed - game won");
            return RevealOutcome::Won;
        }

        RevealOutcome::Revealed
    }

    /// Breadth-first flood fill: a revealed zero-adjacency cell enqueues its
    /// neighbors; flagged cells and mines act as fill boundaries.
    fn flood_reveal(&mut self, start: usize, changed: &mut Vec<usize>) {
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);

        while let Some(index) = queue.pop_front() {
            let cell = &mut self.cells[index];
            if cell.mine || matches!(cell.state, CellState::Revealed | CellState::Flagged) {
                continue;
            }

            cell.state = CellState::Revealed;
            self.revealed += 1;
            changed.push(index);

            if cell.adjacent != 0 {
                continue;
            }

            for neighbor in self.neighbors(index) {
                if visited.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
    }

    fn disclose_mines(&mut self, changed: &mut Vec<usize>) {
        for index in 0..self.cells.len() {
            let cell = &mut self.cells[index];
            if cell.mine && cell.state != CellState::Revealed {
                cell.state = CellState::Revealed;
                changed.push(index);
            }
        }
    }

    fn has_won(&self) -> bool {
        self.width * self.height == self.mines + self.revealed
    }
}
