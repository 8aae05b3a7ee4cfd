use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// `RUST_LOG` wins when set; otherwise `warn`, or `debug` with `--verbose`.
/// Output goes to stderr so tables on stdout stay clean.
pub fn initialize(verbose: bool) -> anyhow::Result<()> {
    let fallback = if verbose { "debug" } else { "warn" };
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| fallback.into());

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_new(&log_level)?)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init()?;

    tracing::debug!(%log_level, "tracing initialized");
    Ok(())
}
