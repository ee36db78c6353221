//! The services meshpath hosts.
//!
//! - [`ChatService`]: one per `/chat/<room>`, with members and history.
//! - [`WikiService`]: shared by all `/wiki/...` pages, with a change log.
//! - [`LoginService`]: shared by all `/login/<user>` records.
//! - [`GameService`]: one table per `/game/<game>`, running a
//!   [`TurnBasedGame`] such as [`TicTacToe`] or [`ConnectFour`].
//!
//! Each implements [`meshpath_service::Service`]; routing addresses to
//! them is the server's job.

mod chat;
pub mod game;
mod login;
mod wiki;

pub use chat::{ChatService, DEFAULT_HISTORY_LIMIT};
pub use game::{
    ConnectFour, GamePhase, GameService, Outcome, TicTacToe, TurnBasedGame, game_from_name,
};
pub use login::{LOGIN_PREFIX, LoginService};
pub use wiki::{CHANGE_LOG_KEY, WIKI_PREFIX, WikiService};
