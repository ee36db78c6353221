//! One game table: two seats, one rules engine, strict turns.

use std::time::Duration;

use meshpath_protocol::{Message, Value};
use meshpath_service::{Service, ServiceContext};
use meshpath_session::Peer;
use meshpath_transport::ConnectionId;
use tokio::time::Instant;

use super::{Outcome, PlayerNumber, TurnBasedGame, parse_move};

/// Lifecycle of a table.
///
/// ```text
/// WaitingForPlayers ──(second ENTER)──► WaitingMove(1) ⇄ WaitingMove(2) ──► Finished
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// Fewer than two players have entered.
    WaitingForPlayers,
    /// Waiting for this player's move.
    WaitingMove(PlayerNumber),
    /// The game is over. The table is replaced on the next lookup.
    Finished,
}

/// The service behind a `/game/<name>` address.
pub struct GameService {
    game: Box<dyn TurnBasedGame>,
    /// Seat 0 is player 1, seat 1 is player 2.
    seats: [Option<Peer>; 2],
    phase: GamePhase,
    move_timeout: Option<Duration>,
    move_deadline: Option<Instant>,
}

impl GameService {
    /// A table for `game`. With a `move_timeout`, a player who takes
    /// longer than that to move loses.
    pub fn new(game: Box<dyn TurnBasedGame>, move_timeout: Option<Duration>) -> Self {
        Self {
            game,
            seats: [None, None],
            phase: GamePhase::WaitingForPlayers,
            move_timeout,
            move_deadline: None,
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    fn seat_of(&self, conn: ConnectionId) -> Option<usize> {
        self.seats
            .iter()
            .position(|s| s.as_ref().is_some_and(|p| p.id() == conn))
    }

    fn player(&self, number: PlayerNumber) -> Option<&Peer> {
        self.seats.get(usize::from(number).checked_sub(1)?)?.as_ref()
    }

    fn broadcast(&self, ctx: &ServiceContext, msg: &Message) {
        for peer in self.seats.iter().flatten() {
            ctx.send(peer, msg);
        }
    }

    fn send_to(&self, ctx: &ServiceContext, number: PlayerNumber, msg: &Message) {
        if let Some(peer) = self.player(number) {
            ctx.send(peer, msg);
        }
    }

    fn await_move(&mut self, ctx: &ServiceContext, next: PlayerNumber) {
        self.phase = GamePhase::WaitingMove(next);
        self.move_deadline = self.move_timeout.map(|t| Instant::now() + t);
        self.send_to(ctx, next, &ctx.message("REQUEST_MOVE", ""));
        self.send_to(ctx, opponent(next), &ctx.message("WAIT_OPP_MOVE", ""));
    }

    /// Announces the result to everyone still seated and closes them.
    fn finish(&mut self, ctx: &ServiceContext, winner: i64) {
        tracing::info!(address = %ctx.address(), winner, "game finished");
        self.broadcast(ctx, &ctx.message("GAME_FINISHED", winner));
        for peer in self.seats.iter().flatten() {
            peer.close();
        }
        self.phase = GamePhase::Finished;
        self.move_deadline = None;
    }

    fn enter(&mut self, ctx: &ServiceContext, from: &Peer) {
        if self.seat_of(from.id()).is_some() {
            return;
        }
        let free = self.seats.iter().position(Option::is_none);
        let (GamePhase::WaitingForPlayers, Some(seat)) = (self.phase, free) else {
            tracing::debug!(address = %ctx.address(), conn_id = %from.id(), "table is full");
            from.close();
            return;
        };
        self.seats[seat] = Some(from.clone());

        if self.seats.iter().any(Option::is_none) {
            ctx.send(from, &ctx.message("WAITING_PLAYER", ""));
            return;
        }

        tracing::info!(address = %ctx.address(), "game started");
        self.broadcast(ctx, &ctx.message("START", ""));
        self.send_to(ctx, 1, &ctx.message("SET_PLAYER_ID", 1));
        self.send_to(ctx, 2, &ctx.message("SET_PLAYER_ID", 2));
        self.await_move(ctx, self.game.current_player());
    }

    fn play(&mut self, ctx: &ServiceContext, from: &Peer, content: &Value) {
        let GamePhase::WaitingMove(current) = self.phase else {
            return;
        };
        if self.player(current).map(Peer::id) != Some(from.id()) {
            tracing::debug!(address = %ctx.address(), conn_id = %from.id(), "move out of turn ignored");
            return;
        }
        let mv = match parse_move(content) {
            Ok(mv) => mv,
            Err(e) => {
                tracing::debug!(address = %ctx.address(), error = %e, "unreadable move ignored");
                return;
            }
        };
        if !self.game.is_valid_play(mv, current) {
            tracing::debug!(address = %ctx.address(), mv, "invalid move ignored");
            return;
        }

        self.game.play(mv, current);
        self.broadcast(ctx, &ctx.message(format!("PLAYER{current}_MOVE"), mv));

        match self.game.outcome() {
            Outcome::Ongoing => self.await_move(ctx, self.game.current_player()),
            outcome => self.finish(ctx, outcome.code()),
        }
    }
}

fn opponent(p: PlayerNumber) -> PlayerNumber {
    if p == 1 { 2 } else { 1 }
}

impl Service for GameService {
    fn handle_message(&mut self, ctx: &ServiceContext, from: &Peer, msg: Message) {
        match msg.command.as_str() {
            "ENTER" => self.enter(ctx, from),
            "MOVE" => self.play(ctx, from, &msg.content),
            other => {
                tracing::debug!(address = %ctx.address(), command = other, "unknown game command");
            }
        }
    }

    fn handle_connection_lost(&mut self, ctx: &ServiceContext, conn: ConnectionId) {
        let Some(seat) = self.seat_of(conn) else {
            return;
        };
        self.seats[seat] = None;

        match self.phase {
            GamePhase::WaitingMove(_) => {
                // Leaving mid-game forfeits; the player still seated wins.
                let winner = if seat == 0 { 2 } else { 1 };
                tracing::info!(address = %ctx.address(), %conn, "player left mid-game");
                self.finish(ctx, winner);
            }
            GamePhase::WaitingForPlayers if self.seats.iter().all(Option::is_none) => {
                self.phase = GamePhase::Finished;
            }
            _ => {}
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.move_deadline
    }

    fn on_deadline(&mut self, ctx: &ServiceContext) {
        self.move_deadline = None;
        if let GamePhase::WaitingMove(late) = self.phase {
            tracing::info!(address = %ctx.address(), player = late, "move timer expired");
            self.finish(ctx, i64::from(opponent(late)));
        }
    }

    fn is_finished(&self) -> bool {
        self.phase == GamePhase::Finished
    }
}
