//! Logging initialization from the environment.
//!
//! The runtime logs through [`tracing`]; hosts that want output without
//! wiring their own subscriber can call [`init`], which honors:
//!
//! - `OPENAI_AGENTS_LOG_LEVEL` — an `EnvFilter` directive (default `info`)
//! - `OPENAI_AGENTS_LOG_FORMAT` — `pretty` or `compact` (default `compact`)

use tracing_subscriber::EnvFilter;

/// Install a global `tracing` subscriber configured from the environment.
///
/// Does nothing when a subscriber is already installed, so it is safe to
/// call from tests and embedded contexts.
pub fn init() {
    let filter = std::env::var("OPENAI_AGENTS_LOG_LEVEL")
        .ok()
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    let format = std::env::var("OPENAI_AGENTS_LOG_FORMAT").unwrap_or_default();
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = if format.eq_ignore_ascii_case("pretty") {
        builder.pretty().try_init()
    } else {
        builder.compact().try_init()
    };

    // An already-installed subscriber wins.
    drop(result);
}
