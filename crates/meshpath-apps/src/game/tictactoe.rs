use super::{Outcome, PlayerNumber, TurnBasedGame};

/// Tic-tac-toe on a 3x3 board. Moves are cells 0..=8, row-major.
#[derive(Debug, Clone)]
pub struct TicTacToe {
    /// 0 = empty, otherwise the player number.
    board: [[u8; 3]; 3],
    current: PlayerNumber,
}

impl TicTacToe {
    pub fn new() -> Self {
        Self {
            board: [[0; 3]; 3],
            current: 1,
        }
    }

    fn has_won(&self, p: PlayerNumber) -> bool {
        let b = &self.board;
        (0..3).any(|i| (0..3).all(|j| b[i][j] == p))
            || (0..3).any(|j| (0..3).all(|i| b[i][j] == p))
            || (0..3).all(|i| b[i][i] == p)
            || (0..3).all(|i| b[i][2 - i] == p)
    }

    fn is_full(&self) -> bool {
        self.board.iter().all(|row| row.iter().all(|c| *c != 0))
    }
}

impl Default for TicTacToe {
    fn default() -> Self {
        Self::new()
    }
}

fn cell(mv: i64) -> Option<(usize, usize)> {
    let mv = usize::try_from(mv).ok().filter(|m| *m < 9)?;
    Some((mv / 3, mv % 3))
}

impl TurnBasedGame for TicTacToe {
    fn is_valid_play(&self, mv: i64, player: PlayerNumber) -> bool {
        if player != self.current || self.outcome().is_over() {
            return false;
        }
        matches!(cell(mv), Some((r, c)) if self.board[r][c] == 0)
    }

    fn play(&mut self, mv: i64, player: PlayerNumber) {
        if let Some((r, c)) = cell(mv) {
            self.board[r][c] = player;
            self.current = if player == 1 { 2 } else { 1 };
        }
    }

    fn current_player(&self) -> PlayerNumber {
        self.current
    }

    fn outcome(&self) -> Outcome {
        if self.has_won(1) {
            Outcome::Won(1)
        } else if self.has_won(2) {
            Outcome::Won(2)
        } else if self.is_full() {
            Outcome::Draw
        } else {
            Outcome::Ongoing
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play_all(moves: &[i64]) -> TicTacToe {
        let mut game = TicTacToe::new();
        for &mv in moves {
            let p = game.current_player();
            assert!(game.is_valid_play(mv, p), "move {mv} should be valid");
            game.play(mv, p);
        }
        game
    }

    #[test]
    fn test_players_alternate() {
        let game = play_all(&[4]);
        assert_eq!(game.current_player(), 2);
        assert!(!game.is_valid_play(0, 1));
        assert!(game.is_valid_play(0, 2));
    }

    #[test]
    fn test_occupied_and_out_of_range_cells_are_invalid() {
        let game = play_all(&[4]);
        assert!(!game.is_valid_play(4, 2));
        assert!(!game.is_valid_play(9, 2));
        assert!(!game.is_valid_play(-1, 2));
    }

    #[test]
    fn test_row_win() {
        // X: 0 1 2, O: 3 4
        let game = play_all(&[0, 3, 1, 4, 2]);
        assert_eq!(game.outcome(), Outcome::Won(1));
        assert!(!game.is_valid_play(5, 2), "no moves after a win");
    }

    #[test]
    fn test_anti_diagonal_win_for_second_player() {
        // X: 0 1 5, O: 2 4 6
        let game = play_all(&[0, 2, 1, 4, 5, 6]);
        assert_eq!(game.outcome(), Outcome::Won(2));
    }

    #[test]
    fn test_full_board_without_line_is_draw() {
        // X O X
        // X O O
        // O X X
        let game = play_all(&[0, 1, 2, 4, 3, 5, 7, 6, 8]);
        assert_eq!(game.outcome(), Outcome::Draw);
    }
}
