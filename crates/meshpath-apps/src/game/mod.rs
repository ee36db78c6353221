//! Turn-based games.
//!
//! The rules of each game live behind [`TurnBasedGame`]. The
//! [`GameService`] only ever asks the rules whether a move is legal,
//! plays it, and asks who is next and whether someone has won; it never
//! looks at a board.

mod connect_four;
mod service;
mod tictactoe;

pub use connect_four::ConnectFour;
pub use service::{GamePhase, GameService};
pub use tictactoe::TicTacToe;

use meshpath_protocol::Value;

/// Player numbers are 1 and 2.
pub type PlayerNumber = u8;

/// How a game stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ongoing,
    Draw,
    Won(PlayerNumber),
}

impl Outcome {
    /// The wire form: `-1` ongoing, `0` draw, otherwise the winner.
    pub fn code(self) -> i64 {
        match self {
            Outcome::Ongoing => -1,
            Outcome::Draw => 0,
            Outcome::Won(p) => i64::from(p),
        }
    }

    pub fn is_over(self) -> bool {
        self != Outcome::Ongoing
    }
}

/// The rules of one two-player turn-based game.
///
/// A move is a single integer whose meaning is up to the game (a cell
/// index, a column).
pub trait TurnBasedGame: Send + 'static {
    /// Returns `true` if `player` may play `mv` right now.
    fn is_valid_play(&self, mv: i64, player: PlayerNumber) -> bool;

    /// Applies a move already checked with
    /// [`is_valid_play`](Self::is_valid_play).
    fn play(&mut self, mv: i64, player: PlayerNumber);

    /// The player expected to move next.
    fn current_player(&self) -> PlayerNumber;

    fn outcome(&self) -> Outcome;
}

/// Builds a fresh game from the last segment of a `/game/<name>` address.
pub fn game_from_name(name: &str) -> Option<Box<dyn TurnBasedGame>> {
    match name {
        "tic_tac_toe" => Some(Box::new(TicTacToe::new())),
        "connect_four" => Some(Box::new(ConnectFour::new())),
        _ => None,
    }
}

/// A `MOVE` payload that is neither an integer nor a decimal string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("move must be an integer, got {0}")]
    NotAnInteger(&'static str),

    #[error("move {0:?} is not a decimal integer")]
    Unparsable(String),
}

/// Reads a move out of a `MOVE` payload.
pub fn parse_move(content: &Value) -> Result<i64, MoveError> {
    match content {
        Value::Int(_) => content
            .as_i64()
            .ok_or(MoveError::Unparsable(format!("{content:?}"))),
        Value::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| MoveError::Unparsable(s.clone())),
        other => Err(MoveError::NotAnInteger(other.kind())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_codes() {
        assert_eq!(Outcome::Ongoing.code(), -1);
        assert_eq!(Outcome::Draw.code(), 0);
        assert_eq!(Outcome::Won(2).code(), 2);
        assert!(!Outcome::Ongoing.is_over());
        assert!(Outcome::Draw.is_over());
    }

    #[test]
    fn test_game_from_name() {
        assert!(game_from_name("tic_tac_toe").is_some());
        assert!(game_from_name("connect_four").is_some());
        assert!(game_from_name("reversi").is_none());
        assert!(game_from_name("").is_none());
    }

    #[test]
    fn test_parse_move_accepts_int_and_decimal_string() {
        assert_eq!(parse_move(&Value::from(4)), Ok(4));
        assert_eq!(parse_move(&Value::from(" 7 ")), Ok(7));
        assert!(matches!(parse_move(&Value::from("x")), Err(MoveError::Unparsable(_))));
        assert_eq!(
            parse_move(&Value::Bool(true)),
            Err(MoveError::NotAnInteger("bool"))
        );
    }
}
