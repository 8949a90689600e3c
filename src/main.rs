mod app;
mod auth;
mod config;
mod error;
mod state;
mod store;
mod tags;
#[cfg(test)]
mod testing;
mod users;
mod validate;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{config::AppConfig, state::AppState};

const DEFAULT_LOG_FILTER: &str = "recipes=debug,axum=info,tower_http=info";

/// `RUST_LOG` overrides the default filter; `LOG_FORMAT=json` switches to
/// one JSON object per line.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let fmt = tracing_subscriber::fmt().with_env_filter(filter);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => fmt.json().with_current_span(true).init(),
        _ => fmt.compact().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let state = AppState::init(config).await?;
    let addr = state.config.bind_addr()?;
    info!(store = ?state.config.store, %addr, "starting recipes api");

    app::serve(app::build_app(state), addr).await
}
