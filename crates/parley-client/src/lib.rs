pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod state;
pub mod views;

use tracing_subscriber::{fmt, EnvFilter};

pub use auth::{AuthStatus, SessionManager, SignUpForm};
pub use config::ClientConfig;
pub use error::{AuthError, ClientError, ClientResult};
pub use events::{ClientEvent, EventBus};
pub use state::AppState;

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default
/// filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("parley=info,parley_client=debug,parley_net=debug,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
