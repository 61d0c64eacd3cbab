mod error;
mod orchestrator;
mod output;
mod process_manager;
mod readiness;

pub use error::{Error, Result};
pub use orchestrator::{
    Event, ManagedProcess, Orchestrator, OrchestratorOptions, Phase, ProcessState, Registry,
    ServiceUrl,
};
pub use output::{LogLevel, LogLine, OutputMultiplexer, StderrClassifier, StreamKind};
#[cfg(unix)]
pub use process_manager::UnixProcessManager;
pub use process_manager::{
    BoxStream, CommandSpec, ProcId, ProcessExit, ProcessManager, Spawned, MAX_LINE_LENGTH,
};
pub use readiness::{is_ready_status, CheckOutcome, HttpCheck, Prober, ReqwestCheck};
pub use tokio_util::sync::CancellationToken;
