use std::time::Duration;

use crate::{
    error::Result,
    process_manager::types::{CommandSpec, ProcId, ProcessExit, Spawned},
};

#[async_trait::async_trait]
pub trait ProcessManager: Send + Sync {
    /// Spawn a new process without waiting for it to do anything.
    async fn spawn(&mut self, spec: CommandSpec) -> Result<Spawned>;
    /// Ask a process to terminate gracefully.
    async fn shutdown(&mut self, id: ProcId) -> Result<()>;
    /// Wait up to `d` for a process to exit.
    async fn wait(&mut self, id: ProcId, d: Duration) -> Result<Option<ProcessExit>>;
    /// Forcefully kill a process.
    async fn kill(&mut self, id: ProcId) -> Result<()>;
}
