//!
//! src/logging.rs
//!
//! Initializes the tracing subscriber. Logs go to stderr through a
//! non-blocking writer; stdout is reserved for the rendered playlist
//!

use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use tracing_error::ErrorLayer;
use tracing_appender::non_blocking;

use crate::config::{LogFormat, LoggingConfig};
use crate::errors::ResolverError;

/// Keep alive for the life of the program or buffered lines are lost
pub struct LoggingGuard(tracing_appender::non_blocking::WorkerGuard);

pub fn init_logging(cfg: &LoggingConfig) -> Result<LoggingGuard, ResolverError> {
    let (writer, guard) = non_blocking(std::io::stderr());
    let filter = EnvFilter::try_new(&cfg.filter_directives)
        .map_err(|e| ResolverError::Config(format!("log filter: {e}")))?;

    let time = fmt::time::UtcTime::rfc_3339();
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default());

    let installed = match cfg.format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_timer(time)
                .with_target(cfg.include_target)
                .with_file(cfg.include_file_line)
                .with_line_number(cfg.include_file_line)
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(true);
            registry.with(layer).try_init()
        }
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_timer(time)
                .with_ansi(cfg.with_ansi)
                .with_target(cfg.include_target)
                .with_file(cfg.include_file_line)
                .with_line_number(cfg.include_file_line);
            registry.with(layer).try_init()
        }
    };

    installed.map_err(|e| ResolverError::Config(format!("logging init: {e}")))?;
    Ok( LoggingGuard(guard) )
}
