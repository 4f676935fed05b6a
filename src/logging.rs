use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, error, info, warn, LevelFilter};
use log4rs::{
    append::console::ConsoleAppender,
    config::{Appender, Config as LogConfig, Root},
    encode::pattern::PatternEncoder,
};
use thiserror::Error;

use crate::error::{ErrorKind, Result};

/// Pattern used by the programmatic console configuration.
pub const CONSOLE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {h({l:5.5})} [{M}] {m}{n}";

/// A unique identifier for a particular operation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct OperationId(pub usize);

impl Display for OperationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OperationId {
    /// Atomically get the next ID. This wraps around back to zero if you somehow exceed a usize.
    pub fn next() -> OperationId {
        static OPERATION_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);
        OperationId(OPERATION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Run a public operation, logging its entry and its outcome under a fresh ID.
pub(crate) fn operation<T>(name: &str, op: impl FnOnce() -> Result<T>) -> Result<T> {
    let id = OperationId::next();
    debug!("->op{id} {name}");
    let result = op();
    match &result {
        Ok(_) => info!("<-op{id} {name} ok"),
        Err(err) => match err.kind() {
            ErrorKind::Config => error!("<-op{id} {name} failed: {err}"),
            _ => warn!("<-op{id} {name} rejected: {err}"),
        },
    }
    result
}

/// Errors that can occur while installing a logger.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid logging config: {0}")]
    Config(String),
    #[error(transparent)]
    SetLogger(#[from] log::SetLoggerError),
}

/// Install a console logger at the given level, for use when no `log4rs.yaml` is available.
pub fn init_console(level: LevelFilter) -> std::result::Result<(), LoggingError> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(CONSOLE_PATTERN)))
        .build();
    let config = LogConfig::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(level))
        .map_err(|e| LoggingError::Config(e.to_string()))?;
    log4rs::init_config(config)?;
    Ok(())
}
