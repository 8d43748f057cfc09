use anyhow::Result;
use std::fmt::Debug;

use crate::{Color, GameEvent};

/// Outbound half of a live client connection. Implemented by the transport.
pub trait Connection: Send + Sync {
    fn send(&self, event: &GameEvent) -> Result<()>;
}

#[derive(Default)]
pub struct DevNullConnection {}

impl Connection for DevNullConnection {
    fn send(&self, _event: &GameEvent) -> Result<()> {
        Ok(())
    }
}

pub struct Player {
    username: String,
    color: Color,
    code: String,
    connection: Box<dyn Connection>,
}

impl Player {
    pub fn new(username: &str, color: Color, code: &str, connection: Box<dyn Connection>) -> Self {
        Self {
            username: username.to_owned(),
            color,
            code: code.to_owned(),
            connection,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// Code of the session this player was admitted to.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn send(&self, event: &GameEvent) -> Result<()> {
        self.connection.send(event)
    }
}

impl Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("username", &self.username)
            .field("color", &self.color)
            .field("code", &self.code)
            .finish()
    }
}
