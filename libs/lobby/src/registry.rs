use anyhow::{anyhow, Result};
use std::{
    collections::{HashMap, HashSet},
    future::Future,
    sync::Arc,
    time::Duration,
};
use tokio::sync::RwLock;
use tracing::*;

use catalog::Catalog;

use crate::{
    errors::{required, Conflict, LobbyError, NotFound},
    Claim, Connection, Player, Session, Timings,
};

/// Process wide directory of sessions and of the usernames in use.
///
/// A reservation is owned by at most one seated player, the first one admitted
/// under that name while it was reserved. Only that player's departure
/// releases it.
///
/// Lock ordering: the directory lock is never held while waiting on a
/// session's lock. `create` is the one place that holds the directory lock
/// across slow work (the catalog lookup), which serializes all creations.
pub struct Registry {
    catalog: Arc<dyn Catalog>,
    timings: Timings,
    directory: RwLock<Directory>,
}

#[derive(Default)]
struct Directory {
    sessions: HashMap<String, Arc<Session>>,
    usernames: HashSet<String>,
    /// Reserved username to the code of the session its owner is seated in.
    seats: HashMap<String, String>,
}

impl Directory {
    /// Releases `username` if its reservation is owned by a player in `code`.
    fn release_seat(&mut self, code: &str, username: &str) -> bool {
        if self.seats.get(username).map(String::as_str) != Some(code) {
            return false;
        }

        self.seats.remove(username);
        self.usernames.remove(username);

        true
    }
}

impl Registry {
    pub fn new(catalog: Arc<dyn Catalog>, timings: Timings) -> Self {
        info!(?timings, "registry-new");

        Self {
            catalog,
            timings,
            directory: Default::default(),
        }
    }

    pub async fn create(&self, code: &str, title: &str) -> Result<Arc<Session>, LobbyError> {
        required(code, "code")?;
        required(title, "title")?;

        let mut directory = self.directory.write().await;

        if directory.sessions.contains_key(code) {
            info!(%code, "create:conflict");
            return Err(Conflict::Code.into());
        }

        // Blocking file I/O on the runtime thread, with the directory locked.
        // Creations are serialized by this on purpose.
        let Some(items) = self.catalog.lookup(title)? else {
            info!(%code, %title, "create:unknown-title");
            return Err(NotFound::Title.into());
        };

        let nitems = items.len();
        let session = Arc::new(Session::new(code, title, items, self.timings));
        directory
            .sessions
            .insert(code.to_owned(), Arc::clone(&session));

        info!(%code, %title, %nitems, "session:created");

        Ok(session)
    }

    pub async fn get(&self, code: &str) -> Option<Arc<Session>> {
        let directory = self.directory.read().await;

        directory.sessions.get(code).cloned()
    }

    /// Registers `session` under `code`, replacing anything already there.
    /// Request handlers go through `create` instead.
    pub async fn set(&self, code: &str, session: Arc<Session>) -> Option<Arc<Session>> {
        let mut directory = self.directory.write().await;

        directory.sessions.insert(code.to_owned(), session)
    }

    pub async fn has_username(&self, username: &str) -> bool {
        self.directory.read().await.usernames.contains(username)
    }

    /// Reserves `username`, returning false if it was already reserved.
    pub async fn add_username(&self, username: &str) -> bool {
        let mut directory = self.directory.write().await;

        directory.usernames.insert(username.to_owned())
    }

    pub async fn remove_username(&self, username: &str) {
        let mut directory = self.directory.write().await;

        directory.usernames.remove(username);
        directory.seats.remove(username);
    }

    /// Whether `username` could join `code` right now. Only a hint, `connect`
    /// checks again while holding the session lock.
    pub async fn can_join(&self, code: &str, username: &str) -> bool {
        if code.is_empty() || username.is_empty() {
            return false;
        }

        match self.get(code).await {
            Some(session) => !session.has_player(username).await,
            None => false,
        }
    }

    /// Admits `username` to the session under `code`. `upgrade` is invoked
    /// with the session locked and only after the duplicate check passes.
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
        required(code, "code")?;
        required(username, "username")?;

        let session = self.get(code).await.ok_or(NotFound::Code)?;

        let owns_reservation = {
            let mut directory = self.directory.write().await;
            let unowned = directory.usernames.contains(username)
                && !directory.seats.contains_key(username);
            if unowned {
                directory
                    .seats
                    .insert(username.to_owned(), code.to_owned());
            }
            unowned
        };

        let admitted = session.admit(username, upgrade).await;

        if admitted.is_err() && owns_reservation {
            let mut directory = self.directory.write().await;
            if directory.seats.get(username).map(String::as_str) == Some(code) {
                directory.seats.remove(username);
            }
        }

        admitted
    }

    /// Same as `connect`, failing the upgrade if it takes longer than `timeout`.
    pub async fn connect_with_timeout<F, Fut>(
        &self,
        code: &str,
        username: &str,
        timeout: Duration,
        upgrade: F,
    ) -> Result<Arc<Player>, LobbyError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Box<dyn Connection>>>,
    {
        self.connect(code, username, move || async move {
            match tokio::time::timeout(timeout, upgrade()).await {
                Ok(upgraded) => upgraded,
                Err(_) => Err(anyhow!("upgrade timed out after {:?}", timeout)),
            }
        })
        .await
    }

    pub async fn claim(&self, code: &str, username: &str, item: &str) -> Result<Claim, LobbyError> {
        let session = self.get(code).await.ok_or(NotFound::Code)?;

        session.claim(username, item).await
    }

    /// Removes a player from their session, releasing their username if
    /// their admission took ownership of its reservation.
    pub async fn leave(&self, code: &str, username: &str) -> Result<Arc<Player>, LobbyError> {
        let session = self.get(code).await.ok_or(NotFound::Code)?;
        let player = session
            .remove_player(username)
            .await
            .ok_or(NotFound::Player)?;

        let released = {
            let mut directory = self.directory.write().await;
            directory.release_seat(code, username)
        };

        info!(%code, %username, %released, "left");

        Ok(player)
    }

    /// Unregisters a session, releasing the usernames of everyone still in it.
    pub async fn close(&self, code: &str) -> Result<Arc<Session>, LobbyError> {
        let session = {
            let mut directory = self.directory.write().await;
            directory.sessions.remove(code)
        }
        .ok_or(NotFound::Code)?;

        let players = session.drain().await;
        if !players.is_empty() {
            let mut directory = self.directory.write().await;
            for player in &players {
                directory.release_seat(code, player.username());
            }
        }

        info!(%code, nplayers = players.len(), "session:closed");

        Ok(session)
    }

    /// Advances every session's countdown by one second.
    pub async fn tick(&self) -> usize {
        let sessions = self.sessions().await;

        for session in &sessions {
            session.tick().await;
        }

        sessions.len()
    }

    /// Closes sessions that have finished and have nobody connected.
    pub async fn reap_finished(&self) -> Vec<String> {
        let mut reaped = Vec::new();

        for session in self.sessions().await {
            if !session.close_if_idle().await {
                continue;
            }

            let mut directory = self.directory.write().await;
            let registered = directory
                .sessions
                .get(session.code())
                .map_or(false, |current| Arc::ptr_eq(current, &session));
            if registered {
                directory.sessions.remove(session.code());
                info!(code = %session.code(), "session:reaped");
                reaped.push(session.code().to_owned());
            }
        }

        reaped
    }

    async fn sessions(&self) -> Vec<Arc<Session>> {
        let directory = self.directory.read().await;

        directory.sessions.values().cloned().collect()
    }
}
