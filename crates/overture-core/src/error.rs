use std::time::Duration;

use crate::process_manager::{ProcId, ProcessExit};

pub type Result<R, E = Error> = std::result::Result<R, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("internal error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("unknown process id {0:?}")]
    UnknownProcess(ProcId),

    #[error("failed to spawn service `{service}`: {source}")]
    Spawn {
        service: String,
        #[source]
        source: std::io::Error,
    },

    #[error("service `{service}` did not become ready after {}ms", .elapsed.as_millis())]
    ReadinessTimeout { service: String, elapsed: Duration },

    #[error("service `{service}` exited unexpectedly with {exit}")]
    UnexpectedExit { service: String, exit: ProcessExit },

    #[error("interrupted")]
    Interrupted,

    #[error("invalid output pattern: {0}")]
    Pattern(#[from] regex::Error),
}
