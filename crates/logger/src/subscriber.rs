use std::env::{VarError, var};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    Layer, Registry,
    filter::EnvFilter,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

pub fn init() {
    init_with_level(LevelFilter::INFO);
}

/// Install the global subscriber with `level` as the default directive.
///
/// `RUST_LOG` overrides the default, `RUST_LOG_FORMAT=json` switches to
/// JSON lines. Panics if a subscriber is already installed.
pub fn init_with_level(level: LevelFilter) {
    tracing_subscriber::registry().with(build_layer(level)).init();
}

/// Like [`init_with_level`] but returns an error instead of panicking when a
/// subscriber is already set. Tests call this from every case.
pub fn try_init_with_level(level: LevelFilter) -> Result<(), TryInitError> {
    tracing_subscriber::registry().with(build_layer(level)).try_init()
}

fn build_layer(level: LevelFilter) -> Box<dyn Layer<Registry> + Send + Sync> {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_format = match var("RUST_LOG_FORMAT") {
        Ok(format) => format,
        Err(VarError::NotPresent) => String::new(),
        // No subscriber exists yet, so this cannot go through tracing.
        Err(error) => {
            eprintln!("Failed to read RUST_LOG_FORMAT, falling back to default: {error}");
            String::new()
        }
    };

    match log_format.as_str() {
        "json" => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .without_time()
            .with_filter(env_filter)
            .boxed(),
    }
}
