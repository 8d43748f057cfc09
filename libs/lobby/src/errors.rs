use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    Code,
    Username,
    Player,
    Color,
}

impl Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Conflict::Code => write!(f, "game code already exists"),
            Conflict::Username => write!(f, "username already in use"),
            Conflict::Player => write!(f, "username already connected to this game"),
            Conflict::Color => write!(f, "color already taken in this game"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFound {
    Code,
    Title,
    Player,
    Item,
}

impl Display for NotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotFound::Code => write!(f, "game not found"),
            NotFound::Title => write!(f, "invalid title"),
            NotFound::Player => write!(f, "player not found"),
            NotFound::Item => write!(f, "no such item on the board"),
        }
    }
}

#[derive(Error, Debug)]
pub enum LobbyError {
    #[error("{0} required")]
    Validation(&'static str),
    #[error("{0}")]
    Conflict(Conflict),
    #[error("{0}")]
    NotFound(NotFound),
    #[error("couldn't create connection")]
    Transport(#[source] anyhow::Error),
    #[error("no colors left in this game")]
    Exhausted,
    #[error(transparent)]
    Anyhow(anyhow::Error),
}

impl From<anyhow::Error> for LobbyError {
    fn from(source: anyhow::Error) -> Self {
        LobbyError::Anyhow(source)
    }
}

impl From<Conflict> for LobbyError {
    fn from(value: Conflict) -> Self {
        LobbyError::Conflict(value)
    }
}

impl From<NotFound> for LobbyError {
    fn from(value: NotFound) -> Self {
        LobbyError::NotFound(value)
    }
}

pub(crate) fn required(value: &str, name: &'static str) -> Result<(), LobbyError> {
    if value.is_empty() {
        Err(LobbyError::Validation(name))
    } else {
        Ok(())
    }
}
