use anyhow::Result;
use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::*;

use catalog::FileCatalog;
use lobby::{Connection, LobbyError, Player, Registry};

pub struct AppState {
    pub registry: Arc<Registry>,
    pub catalog: Arc<FileCatalog>,
    pub upgrade_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(
        registry: Arc<Registry>,
        catalog: Arc<FileCatalog>,
        upgrade_timeout: Option<Duration>,
    ) -> Self {
        Self {
            registry,
            catalog,
            upgrade_timeout,
        }
    }

    pub async fn connect<F, Fut>(
        &self,
        code: &str,
        username: &str,
        upgrade: F,
    ) -> Result<Arc<Player>, LobbyError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Box<dyn Connection>>>,
    {
        match self.upgrade_timeout {
            Some(timeout) => {
                self.registry
                    .connect_with_timeout(code, username, timeout, upgrade)
                    .await
            }
            None => self.registry.connect(code, username, upgrade).await,
        }
    }

    pub async fn remove_session(&self, session: &ClientSession) {
        match self.registry.leave(&session.code, &session.username).await {
            Ok(_) => info!(code = %session.code, username = %session.username, "removed"),
            Err(e) => warn!(code = %session.code, username = %session.username, "remove: {}", e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientSession {
    pub code: String,
    pub username: String,
}

/// Set once admission succeeds, after which dropping the matching `Seat`
/// removes the player.
#[derive(Clone, Default)]
pub struct Arming(Arc<AtomicBool>);

impl Arming {
    pub fn arm(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn is_armed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A player's place in a session, held by the socket. The upgrade callback
/// owns it, so the player is removed even when the handshake never completes
/// and the callback is dropped without running.
pub struct Seat {
    state: Arc<AppState>,
    session: ClientSession,
    arming: Arming,
    released: bool,
}

impl Seat {
    pub fn new(state: Arc<AppState>, session: ClientSession, arming: Arming) -> Self {
        Self {
            state,
            session,
            arming,
            released: false,
        }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    pub async fn release(mut self) {
        if self.take() {
            self.state.remove_session(&self.session).await;
        }
    }

    fn take(&mut self) -> bool {
        if self.released || !self.arming.is_armed() {
            return false;
        }

        self.released = true;

        true
    }
}

impl Drop for Seat {
    fn drop(&mut self) {
        if !self.take() {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let state = self.state.clone();
                let session = self.session.clone();
                handle.spawn(async move {
                    state.remove_session(&session).await;
                });
            }
            Err(e) => warn!(code = %self.session.code, username = %self.session.username, "seat:drop {}", e),
        }
    }
}
