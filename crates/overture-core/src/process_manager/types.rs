use std::{fmt, fmt::Debug, path::PathBuf, pin::Pin};

use futures::Stream;
use overture_types::ServiceDescriptor;
use tokio::sync::oneshot;

pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// Longest output line delivered in one piece; longer lines are chunked.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: String,
    pub cmd: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl From<&ServiceDescriptor> for CommandSpec {
    fn from(descriptor: &ServiceDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            cmd: descriptor.command(),
            cwd: descriptor.cwd.clone(),
            env: descriptor.environment(),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ProcId(pub u64);

/// How a process ended.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProcessExit {
    Code(i32),
    Signal(i32),
}

impl ProcessExit {
    #[must_use]
    pub fn success(self) -> bool {
        self == ProcessExit::Code(0)
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessExit::Code(code) => write!(f, "exit code {code}"),
            ProcessExit::Signal(signal) => write!(f, "signal {signal}"),
        }
    }
}

pub struct Spawned {
    pub id: ProcId,
    pub pid: Option<u32>,
    pub stdout: BoxStream<Vec<u8>>,
    pub stderr: BoxStream<Vec<u8>>,
    /// Resolves once the process has exited.
    pub exit: oneshot::Receiver<ProcessExit>,
}

impl Debug for Spawned {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spawned")
            .field("id", &self.id)
            .field("pid", &self.pid)
            .field("stdout", &"<stream>")
            .field("stderr", &"<stream>")
            .field("exit", &"<receiver>")
            .finish()
    }
}
