use std::{
    collections::{HashMap, HashSet},
    io,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    error::{Error, Result},
    process_manager::{
        base::ProcessManager,
        types::{CommandSpec, ProcId, ProcessExit, Spawned},
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MockCall {
    Spawn(String),
    Shutdown(String),
    Kill(String),
}

struct MockProcess {
    name: String,
    stdout: mpsc::Sender<Vec<u8>>,
    stderr: mpsc::Sender<Vec<u8>>,
    exit: Option<oneshot::Sender<ProcessExit>>,
    exited: Option<ProcessExit>,
}

#[derive(Default)]
struct MockState {
    calls: Vec<MockCall>,
    specs: Vec<CommandSpec>,
    processes: HashMap<ProcId, MockProcess>,
    fail_spawn: HashSet<String>,
    ignore_term: HashSet<String>,
}

/// In-memory process manager; clones share state so tests can drive
/// processes after handing one to the orchestrator.
#[derive(Clone, Default)]
pub(crate) struct MockProcessManager {
    state: Arc<Mutex<MockState>>,
}

impl MockProcessManager {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn fail_spawn(&self, name: &str) {
        self.lock().fail_spawn.insert(name.to_owned());
    }

    pub fn ignore_term(&self, name: &str) {
        self.lock().ignore_term.insert(name.to_owned());
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    pub fn specs(&self) -> Vec<CommandSpec> {
        self.lock().specs.clone()
    }

    /// Makes the named process exit on its own.
    pub fn exit(&self, name: &str, exit: ProcessExit) {
        let mut state = self.lock();
        if let Some(process) = state.processes.values_mut().find(|p| p.name == name) {
            finish(process, exit);
        }
    }

    pub async fn write_stdout(&self, name: &str, line: &str) {
        let tx = self.sender(name, true);
        tx.send(line.as_bytes().to_vec()).await.unwrap();
    }

    pub async fn write_stderr(&self, name: &str, line: &str) {
        let tx = self.sender(name, false);
        tx.send(line.as_bytes().to_vec()).await.unwrap();
    }

    fn sender(&self, name: &str, stdout: bool) -> mpsc::Sender<Vec<u8>> {
        let state = self.lock();
        let process = state
            .processes
            .values()
            .find(|p| p.name == name)
            .unwrap();
        if stdout {
            process.stdout.clone()
        } else {
            process.stderr.clone()
        }
    }

    fn name_of(state: &MockState, id: ProcId) -> Result<String> {
        state
            .processes
            .get(&id)
            .map(|p| p.name.clone())
            .ok_or(Error::UnknownProcess(id))
    }
}

fn finish(process: &mut MockProcess, exit: ProcessExit) {
    if process.exited.is_none() {
        process.exited = Some(exit);
        if let Some(tx) = process.exit.take() {
            let _ = tx.send(exit);
        }
    }
}

#[async_trait]
impl ProcessManager for MockProcessManager {
    async fn spawn(&mut self, spec: CommandSpec) -> Result<Spawned> {
        let mut state = self.lock();
        state.calls.push(MockCall::Spawn(spec.name.clone()));

        if state.fail_spawn.contains(&spec.name) {
            return Err(Error::Spawn {
                service: spec.name,
                source: io::Error::new(io::ErrorKind::NotFound, "no such file or directory"),
            });
        }

        let id = ProcId(state.processes.len() as u64);
        let (stdout_tx, stdout) = mpsc::channel(16);
        let (stderr_tx, stderr) = mpsc::channel(16);
        let (exit_tx, exit) = oneshot::channel();
        state.processes.insert(
            id,
            MockProcess {
                name: spec.name.clone(),
                stdout: stdout_tx,
                stderr: stderr_tx,
                exit: Some(exit_tx),
                exited: None,
            },
        );
        state.specs.push(spec);

        Ok(Spawned {
            id,
            pid: Some(1000 + u32::try_from(id.0).unwrap_or_default()),
            stdout: Box::pin(ReceiverStream::new(stdout)),
            stderr: Box::pin(ReceiverStream::new(stderr)),
            exit,
        })
    }

    async fn shutdown(&mut self, id: ProcId) -> Result<()> {
        let mut state = self.lock();
        let name = Self::name_of(&state, id)?;
        state.calls.push(MockCall::Shutdown(name.clone()));

        if !state.ignore_term.contains(&name) {
            if let Some(process) = state.processes.get_mut(&id) {
                finish(process, ProcessExit::Signal(libc::SIGTERM));
            }
        }
        Ok(())
    }

    async fn wait(&mut self, id: ProcId, d: Duration) -> Result<Option<ProcessExit>> {
        let exited = {
            let state = self.lock();
            Self::name_of(&state, id)?;
            state.processes.get(&id).and_then(|p| p.exited)
        };
        if exited.is_none() {
            tokio::time::sleep(d).await;
        }
        Ok(exited)
    }

    async fn kill(&mut self, id: ProcId) -> Result<()> {
        let mut state = self.lock();
        let name = Self::name_of(&state, id)?;
        state.calls.push(MockCall::Kill(name));
        if let Some(process) = state.processes.get_mut(&id) {
            finish(process, ProcessExit::Signal(libc::SIGKILL));
        }
        Ok(())
    }
}
