use anyhow::Result;
use indexmap::IndexMap;
use serde::Serialize;
use std::{
    collections::{BTreeSet, HashMap},
    fmt::Debug,
    future::Future,
    sync::Arc,
};
use tokio::sync::Mutex;
use tracing::*;

use crate::{
    errors::{Conflict, LobbyError, NotFound},
    events::{BoardView, EventKind, GameEvent, PlayerView, SessionSnapshot},
    Color, Connection, Player,
};

/// Countdown lengths, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub lobby_secs: u32,
    pub game_secs: u32,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            lobby_secs: 60,
            game_secs: 180,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Lobby,
    Playing,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Claim {
    Claimed,
    AlreadyClaimed { owner: String },
    NotPlaying,
}

/// One active game. Everything mutable lives behind a single lock.
pub struct Session {
    code: String,
    title: String,
    timings: Timings,
    state: Mutex<SessionState>,
}

struct SessionState {
    board: IndexMap<String, Option<String>>,
    colors: BTreeSet<Color>,
    roster: HashMap<String, Arc<Player>>,
    phase: Phase,
    time_remaining: u32,
    winner: Option<String>,
    closed: bool,
}

impl Session {
    pub fn new(code: &str, title: &str, items: Vec<String>, timings: Timings) -> Self {
        let board = items.into_iter().map(|item| (item, None)).collect();

        Self {
            code: code.to_owned(),
            title: title.to_owned(),
            timings,
            state: Mutex::new(SessionState {
                board,
                colors: BTreeSet::new(),
                roster: HashMap::new(),
                phase: Phase::Lobby,
                time_remaining: timings.lobby_secs,
                winner: None,
                closed: false,
            }),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub async fn assign_color(&self) -> Result<Color, LobbyError> {
        let mut state = self.state.lock().await;

        state.assign_color()
    }

    pub async fn has_player(&self, username: &str) -> bool {
        let state = self.state.lock().await;

        state.has_player(username)
    }

    /// Adds a player built outside of admission. The player must belong to
    /// this session and their name and color must both be free in it.
    pub async fn add_player(&self, player: Player) -> Result<Arc<Player>, LobbyError> {
        if player.code() != self.code {
            return Err(NotFound::Code.into());
        }

        let mut state = self.state.lock().await;

        if state.closed {
            return Err(NotFound::Code.into());
        }

        if state.has_player(player.username()) {
            return Err(Conflict::Player.into());
        }

        if state
            .roster
            .values()
            .any(|other| other.color() == player.color())
        {
            return Err(Conflict::Color.into());
        }

        let player = Arc::new(player);
        state.add_player(Arc::clone(&player));
        state.broadcast(EventKind::Joined);

        Ok(player)
    }

    /// Check-then-admit. The lock is held across `upgrade` so that the
    /// duplicate check and the roster insert can't interleave with another
    /// admission to this session.
    pub(crate) async fn admit<F, Fut>(
        &self,
        username: &str,
        upgrade: F,
    ) -> Result<Arc<Player>, LobbyError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Box<dyn Connection>>>,
    {
        let mut state = self.state.lock().await;

        // Closed while this admission waited for the lock.
        if state.closed {
            info!(code = %self.code, %username, "admit:closed");
            return Err(NotFound::Code.into());
        }

        if state.has_player(username) {
            info!(code = %self.code, %username, "admit:duplicate");
            return Err(Conflict::Player.into());
        }

        let connection = upgrade().await.map_err(|e| {
            warn!(code = %self.code, %username, "admit:upgrade-failed {:?}", e);
            LobbyError::Transport(e)
        })?;

        // Dropping `connection` on exhaustion closes it.
        let color = state.assign_color()?;
        let player = Arc::new(Player::new(username, color, &self.code, connection));
        state.add_player(Arc::clone(&player));

        info!(code = %self.code, %username, %color, "admitted");

        state.broadcast(EventKind::Joined);

        Ok(player)
    }

    pub async fn remove_player(&self, username: &str) -> Option<Arc<Player>> {
        let mut state = self.state.lock().await;

        let player = state.roster.remove(username)?;
        state.colors.remove(&player.color());
        state.broadcast(EventKind::Left);

        Some(player)
    }

    /// Closes the session to admissions and hands back everyone in it.
    pub(crate) async fn drain(&self) -> Vec<Arc<Player>> {
        let mut state = self.state.lock().await;

        state.closed = true;
        state.colors.clear();
        state.roster.drain().map(|(_, player)| player).collect()
    }

    pub async fn claim(&self, username: &str, item: &str) -> Result<Claim, LobbyError> {
        let mut state = self.state.lock().await;

        if !state.has_player(username) {
            return Err(NotFound::Player.into());
        }

        let owner = state.board.get(item).ok_or(NotFound::Item)?.clone();

        if state.phase != Phase::Playing {
            return Ok(Claim::NotPlaying);
        }

        if let Some(owner) = owner {
            return Ok(Claim::AlreadyClaimed { owner });
        }

        state.board.insert(item.to_owned(), Some(username.to_owned()));

        debug!(code = %self.code, %username, %item, "claimed");

        state.broadcast(EventKind::Claimed);

        if state.board.values().all(|owner| owner.is_some()) {
            state.finish();
        }

        Ok(Claim::Claimed)
    }

    /// Advances the countdown by one second, returning the phase afterwards.
    pub async fn tick(&self) -> Phase {
        let mut state = self.state.lock().await;

        state.tick(&self.timings)
    }

    pub async fn phase(&self) -> Phase {
        self.state.lock().await.phase
    }

    pub async fn time_remaining(&self) -> u32 {
        self.state.lock().await.time_remaining
    }

    pub async fn board(&self) -> BoardView {
        self.state.lock().await.board.clone()
    }

    /// Closes the session to admissions if it is idle, deciding both under
    /// one lock so nobody can be admitted in between.
    pub(crate) async fn close_if_idle(&self) -> bool {
        let mut state = self.state.lock().await;

        if state.closed || state.phase != Phase::Finished || !state.roster.is_empty() {
            return false;
        }

        state.closed = true;

        true
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;

        let mut players: Vec<PlayerView> = state
            .roster
            .values()
            .map(|player| PlayerView {
                username: player.username().to_owned(),
                color: player.color(),
            })
            .collect();
        players.sort_by(|a, b| a.username.cmp(&b.username));

        SessionSnapshot {
            code: self.code.clone(),
            title: self.title.clone(),
            phase: state.phase,
            time_left: state.time_remaining,
            board: state.board.clone(),
            players,
            winner: state.winner.clone(),
        }
    }
}

impl Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("code", &self.code)
            .field("title", &self.title)
            .finish()
    }
}

// Everything below assumes the session lock is held, which the borrow of
// `SessionState` out of the guard guarantees.
impl SessionState {
    fn has_player(&self, username: &str) -> bool {
        self.roster.contains_key(username)
    }

    fn assign_color(&mut self) -> Result<Color, LobbyError> {
        let color = Color::lowest_free(&self.colors).ok_or(LobbyError::Exhausted)?;
        self.colors.insert(color);

        Ok(color)
    }

    fn add_player(&mut self, player: Arc<Player>) {
        self.colors.insert(player.color());
        self.roster.insert(player.username().to_owned(), player);
    }

    fn tick(&mut self, timings: &Timings) -> Phase {
        if self.phase == Phase::Finished {
            return self.phase;
        }

        self.time_remaining = self.time_remaining.saturating_sub(1);

        if self.time_remaining > 0 {
            self.broadcast(EventKind::Tick);
            return self.phase;
        }

        match self.phase {
            Phase::Lobby => {
                self.phase = Phase::Playing;
                self.time_remaining = timings.game_secs;
                self.broadcast(EventKind::Started);
            }
            Phase::Playing => self.finish(),
            Phase::Finished => {}
        }

        self.phase
    }

    fn finish(&mut self) {
        self.phase = Phase::Finished;
        self.time_remaining = 0;
        self.winner = self.leader();

        info!(winner = ?self.winner, "finished");

        self.broadcast(EventKind::Finished);
    }

    /// The single player holding the most items. Ties have no leader.
    fn leader(&self) -> Option<String> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for owner in self.board.values().flatten() {
            *counts.entry(owner.as_str()).or_default() += 1;
        }

        let best = counts.values().max().copied()?;
        let mut leaders = counts.into_iter().filter(|(_, n)| *n == best);

        match (leaders.next(), leaders.next()) {
            (Some((name, _)), None) => Some(name.to_owned()),
            _ => None,
        }
    }

    fn event(&self, kind: EventKind) -> GameEvent {
        GameEvent {
            kind,
            board: self.board.clone(),
            time_left: self.time_remaining,
            winner: self.winner.clone(),
        }
    }

    fn broadcast(&self, kind: EventKind) {
        if self.roster.is_empty() {
            return;
        }

        let event = self.event(kind);
        for player in self.roster.values() {
            if let Err(e) = player.send(&event) {
                warn!(username = %player.username(), "broadcast:error {:?}", e);
            }
        }
    }
}
