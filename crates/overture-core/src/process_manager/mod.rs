mod base;
mod implementations;
mod types;

pub use base::ProcessManager;
#[cfg(test)]
pub(crate) use implementations::{MockCall, MockProcessManager};
#[cfg(unix)]
pub use implementations::UnixProcessManager;
pub use types::{BoxStream, CommandSpec, ProcId, ProcessExit, Spawned, MAX_LINE_LENGTH};
