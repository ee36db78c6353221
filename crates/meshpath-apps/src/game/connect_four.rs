use super::{Outcome, PlayerNumber, TurnBasedGame};

const COLS: usize = 7;
const ROWS: usize = 6;

/// Connect Four on a 7-wide, 6-high board. A move is a column, 0..=6;
/// the piece drops to the lowest empty row. Four in a row (horizontal,
/// vertical or diagonal) wins.
#[derive(Debug, Clone)]
pub struct ConnectFour {
    /// `board[col][row]`, row 0 at the bottom. 0 = empty.
    board: [[u8; ROWS]; COLS],
    current: PlayerNumber,
    outcome: Outcome,
}

impl ConnectFour {
    pub fn new() -> Self {
        Self {
            board: [[0; ROWS]; COLS],
            current: 1,
            outcome: Outcome::Ongoing,
        }
    }

    fn column(mv: i64) -> Option<usize> {
        usize::try_from(mv).ok().filter(|c| *c < COLS)
    }

    fn height(&self, col: usize) -> usize {
        self.board[col].iter().take_while(|c| **c != 0).count()
    }

    /// Length of the run through (col, row) along (dc, dr), both ways.
    fn run_length(&self, col: usize, row: usize, dc: isize, dr: isize) -> usize {
        let p = self.board[col][row];
        let count = |sign: isize| {
            (1..4)
                .map_while(|step| {
                    let c = col.checked_add_signed(dc * sign * step)?;
                    let r = row.checked_add_signed(dr * sign * step)?;
                    (c < COLS && r < ROWS && self.board[c][r] == p).then_some(())
                })
                .count()
        };
        1 + count(1) + count(-1)
    }
}

impl Default for ConnectFour {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnBasedGame for ConnectFour {
    fn is_valid_play(&self, mv: i64, player: PlayerNumber) -> bool {
        if player != self.current || self.outcome.is_over() {
            return false;
        }
        matches!(Self::column(mv), Some(col) if self.height(col) < ROWS)
    }

    fn play(&mut self, mv: i64, player: PlayerNumber) {
        let Some(col) = Self::column(mv) else {
            return;
        };
        let row = self.height(col);
        if row >= ROWS {
            return;
        }
        self.board[col][row] = player;
        self.current = if player == 1 { 2 } else { 1 };

        let won = [(1, 0), (0, 1), (1, 1), (1, -1)]
            .into_iter()
            .any(|(dc, dr)| self.run_length(col, row, dc, dr) >= 4);
        if won {
            self.outcome = Outcome::Won(player);
        } else if (0..COLS).all(|c| self.height(c) == ROWS) {
            self.outcome = Outcome::Draw;
        }
    }

    fn current_player(&self) -> PlayerNumber {
        self.current
    }

    fn outcome(&self) -> Outcome {
        self.outcome
    }
}
