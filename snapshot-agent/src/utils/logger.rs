//! Logging configuration using tracing.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// HTTP client internals stay at warn unless named in `RUST_LOG`.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "h2", "reqwest", "rustls"];

/// Initialize logging with the specified level.
///
/// `RUST_LOG` takes precedence over `level` when set. At debug and trace,
/// lines carry their target and source location.
pub fn init(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directives(level)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let verbose = parse_level(level) >= LevelFilter::DEBUG;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(verbose)
                .with_file(verbose)
                .with_line_number(verbose),
        )
        .try_init()?;

    Ok(())
}

/// Unknown levels fall back to info.
fn parse_level(level: &str) -> LevelFilter {
    level.trim().parse().unwrap_or(LevelFilter::INFO)
}

/// Filter directives for `level`, with the HTTP stack capped at warn.
fn directives(level: &str) -> String {
    let filter = parse_level(level);
    let mut directives = vec![filter.to_string().to_ascii_lowercase()];
    if filter > LevelFilter::WARN {
        directives.extend(QUIET_TARGETS.iter().map(|target| format!("{}=warn", target)));
    }
    directives.join(",")
}
