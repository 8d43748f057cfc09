use anyhow::Result;
use clap::Args;
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};
use tokio::{signal, time::sleep};
use tracing::*;

use catalog::FileCatalog;
use lobby::{Registry, Timings};

mod handlers;
mod route;
mod state;
mod ws;


pub use state::*;

#[derive(Debug, Args)]
pub struct Command {
    #[arg(long, env = "TRIVIA_BIND", default_value = "0.0.0.0")]
    bind: IpAddr,
    #[arg(long, env = "TRIVIA_PORT", default_value_t = 8080)]
    port: u16,
    /// Directory of category files.
    #[arg(long, env = "TRIVIA_DIR", default_value = "trivia")]
    trivia: PathBuf,
    #[arg(long, env = "TRIVIA_LOBBY_SECS", default_value_t = 60)]
    lobby_secs: u32,
    #[arg(long, env = "TRIVIA_GAME_SECS", default_value_t = 180)]
    game_secs: u32,
    /// Give up on websocket upgrades that take longer than this.
    #[arg(long, env = "TRIVIA_UPGRADE_TIMEOUT_SECS")]
    upgrade_timeout_secs: Option<u64>,
    /// Close finished games once everyone has disconnected.
    #[arg(long, env = "TRIVIA_REAP_FINISHED")]
    reap_finished: bool,
}

impl Command {
    fn timings(&self) -> Timings {
        Timings {
            lobby_secs: self.lobby_secs,
            game_secs: self.game_secs,
        }
    }

    fn upgrade_timeout(&self) -> Option<Duration> {
        self.upgrade_timeout_secs.map(Duration::from_secs)
    }
}

#[tokio::main]
pub async fn execute_command(cmd: &Command) -> Result<()> {
    info!("serving");

    let catalog = Arc::new(FileCatalog::new(&cmd.trivia));
    info!(path = %catalog.path().display(), "catalog");
    let registry = Arc::new(Registry::new(catalog.clone(), cmd.timings()));
    let app_state = Arc::new(AppState::new(
        registry.clone(),
        catalog,
        cmd.upgrade_timeout(),
    ));

    let app = route::create_router(app_state);

    tokio::task::spawn({
        let reap_finished = cmd.reap_finished;
        async move {
            loop {
                sleep(Duration::from_secs(1)).await;

                let nsessions = registry.tick().await;
                trace!(%nsessions, "ticked");

                if reap_finished {
                    for code in registry.reap_finished().await {
                        info!(%code, "reaped");
                    }
                }
            }
        }
    });

    let addr = SocketAddr::new(cmd.bind, cmd.port);
    info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("ctrl-c handler: {:?}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                warn!("terminate handler: {:?}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    println!();

    info!("signal received, starting graceful shutdown");
}
