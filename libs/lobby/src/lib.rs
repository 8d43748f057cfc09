mod color;
mod errors;
mod events;
mod player;
mod registry;
mod session;

pub use color::*;
pub use errors::{Conflict, LobbyError, NotFound};
pub use events::*;
pub use player::*;
pub use registry::*;
pub use session::*;


#[cfg(test)]
#[ctor::ctor]
fn initialize_tests() {
    // log_test()
}

#[cfg(test)]
#[allow(dead_code)]
pub fn log_test() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "lobby=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
