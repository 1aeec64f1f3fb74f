use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

const LOG_TARGET: &str = env!("CARGO_CRATE_NAME");

fn crate_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::OFF
    }
}

/// Installs the global subscriber on stderr so JSON reports on stdout stay
/// parseable. Crate logs are off unless `verbose` is set; `RUST_LOG` can
/// narrow what is shown.
pub fn init_logging(verbose: bool) {
    let level = crate_level(verbose);
    let crate_filter = Targets::new().with_target(LOG_TARGET, level);
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .pretty()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(crate_filter)
        .with(env_filter)
        .init();
}
