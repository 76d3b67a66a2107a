//! Provide tracing, tailored to this program.
//!
//! The binary calls [`init_journald_or_stderr`] once at startup to install a
//! tracing subscriber. Logs never go to stdout, which carries the values
//! read from the switch.
//!
//! The rest of the crate uses `crate::tracing::prelude::*` for the
//! `trace!()`, `debug!()`, `info!()`, `warn!()` and `error!()` macros.

use std::env;
use std::io;
use time::OffsetDateTime;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::{format::Writer, time::FormatTime},
    prelude::*,
};

pub mod prelude {
    #[allow(unused_imports)]
    pub use tracing::{debug, error, info, trace, warn};
}

use prelude::*;

/// Map repeated `-v` flags onto a level, starting from WARN.
pub fn level_for_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Initialize logging.
///
/// Under systemd, use journald; otherwise log to stderr. `directive`, if
/// given, is an `EnvFilter` directive from the configuration file; `RUST_LOG`
/// overrides it, and `default_level` applies when neither is set.
pub fn init_journald_or_stderr(default_level: LevelFilter, directive: Option<&str>) {
    if env::var("JOURNAL_STREAM").is_ok() {
        if let Ok(layer) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(env_filter(default_level, directive))
                .with(layer)
                .init();
        } else {
            use_stderr(default_level, directive);
            error!("Failed to initialize journald logging, using stderr.");
        }
    } else {
        use_stderr(default_level, directive);
    }
}

fn env_filter(default_level: LevelFilter, directive: Option<&str>) -> EnvFilter {
    let builder = EnvFilter::builder().with_default_directive(default_level.into());
    match env::var("RUST_LOG") {
        Ok(from_env) => builder.parse_lossy(from_env),
        Err(_) => builder.parse_lossy(directive.unwrap_or_default()),
    }
}

fn use_stderr(default_level: LevelFilter, directive: Option<&str>) {
    tracing_subscriber::registry()
        .with(env_filter(default_level, directive))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_timer(LocalTimer),
        )
        .init();
}

// Timestamps in local time, to the nearest second. The default timer was in
// UTC and formatted timestamps as a long, ugly string.
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = OffsetDateTime::now_local().unwrap_or(OffsetDateTime::now_utc());
        let formatted = now
            .format(time::macros::format_description!("[hour]:[minute]:[second]"))
            .map_err(|_| std::fmt::Error)?;
        write!(w, "{formatted}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_for_verbosity(0), LevelFilter::WARN);
        assert_eq!(level_for_verbosity(1), LevelFilter::INFO);
        assert_eq!(level_for_verbosity(2), LevelFilter::DEBUG);
        assert_eq!(level_for_verbosity(9), LevelFilter::TRACE);
    }
}
