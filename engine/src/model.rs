use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct GameParams {
    pub width: usize,
    pub height: usize,
    pub mines: usize,
}

impl Default for GameParams {
    fn default() -> Self {
        Self {
            width: 9,
            height: 9,
            mines: 10,
        }
    }
}

/// Partial overrides for a new game; unset fields retain their previous
/// values.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize)]
pub struct GameOverrides {
    pub width: Option<usize>,
    pub height: Option<usize>,
    pub mines: Option<usize>,
}

impl GameParams {
    pub fn apply(self, overrides: GameOverrides) -> Self {
        Self {
            width: overrides.width.unwrap_or(self.width),
            height: overrides.height.unwrap_or(self.height),
            mines: overrides.mines.unwrap_or(self.mines),
        }
    }
}

/// Result of a reveal or chord command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealOutcome {
    /// The command was invalid or had no effect.
    Ignored,
    /// One or more cells were revealed and the game continues.
    Revealed,
    /// A mine was revealed; the game is lost.
    Exploded,
    /// The last safe cell was revealed; the game is won.
    Won,
}

impl RevealOutcome {
    /// Combines the outcomes of the individual reveals a chord performs.
    pub(crate) fn merge(self, other: Self) -> Self {
        use RevealOutcome::*;

        match (self, other) {
            (Exploded, _) | (_, Exploded) => Exploded,
            (Won, _) | (_, Won) => Won,
            (Revealed, _) | (_, Revealed) => Revealed,
            (Ignored, Ignored) => Ignored,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Exploded | Self::Won)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CellSnapshot {
    pub index: usize,
    pub x: usize,
    pub y: usize,
    pub mine: bool,
    pub revealed: bool,
    pub flagged: bool,
    pub question: bool,
    pub adjacent: i8,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardSnapshot {
    pub width: usize,
    pub height: usize,
    pub mines: usize,
    pub initial_mines: usize,
    pub flags_placed: usize,
    pub mines_remaining: usize,
    pub game_over: bool,
    pub won: bool,
    pub cells: Vec<CellSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_retain_unset_fields() {
        let params = GameParams::default().apply(GameOverrides {
            width: Some(16),
            height: None,
            mines: None,
        });

        assert_eq!(params.width, 16);
        assert_eq!(params.height, 9);
        assert_eq!(params.mines, 10);
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let params: GameParams = serde_json::from_str(r#"{"width": 30}"#).unwrap();

        assert_eq!(params.width, 30);
        assert_eq!(params.height, 9);
        assert_eq!(params.mines, 10);
    }

    #[test]
    fn outcome_merge_prefers_terminal_results() {
        use RevealOutcome::*;

        assert_eq!(Ignored.merge(Revealed), Revealed);
        assert_eq!(Revealed.merge(Exploded), Exploded);
        assert_eq!(Won.merge(Ignored), Won);
        assert_eq!(Ignored.merge(Ignored), Ignored);
    }
}
