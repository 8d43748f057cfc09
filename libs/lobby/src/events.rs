use indexmap::IndexMap;
use serde::Serialize;

use crate::{Color, Phase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Joined,
    Left,
    Claimed,
    Tick,
    Started,
    Finished,
}

/// Item name to the username holding it, `None` while unclaimed.
pub type BoardView = IndexMap<String, Option<String>>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEvent {
    pub kind: EventKind,
    pub board: BoardView,
    pub time_left: u32,
    pub winner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub username: String,
    pub color: Color,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub code: String,
    pub title: String,
    pub phase: Phase,
    pub time_left: u32,
    pub board: BoardView,
    pub players: Vec<PlayerView>,
    pub winner: Option<String>,
}
