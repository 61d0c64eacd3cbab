use std::{
    collections::HashMap,
    io,
    os::unix::process::ExitStatusExt,
    process::{ExitStatus, Stdio},
    time::Duration,
};

use libc::{killpg, setsid, SIGKILL, SIGTERM};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader},
    process::Command,
    sync::{oneshot, watch},
};

use crate::{
    error::{Error, Result},
    process_manager::{
        base::ProcessManager,
        types::{BoxStream, CommandSpec, ProcId, ProcessExit, Spawned, MAX_LINE_LENGTH},
    },
};

#[derive(Debug)]
struct ChildRec {
    pgid: libc::pid_t,
    status: watch::Receiver<Option<ProcessExit>>,
}

/// Unix-specific process manager.
///
/// Every child runs in its own session so signals reach the whole process
/// group, including whatever the service command forks.
#[derive(Debug, Default)]
pub struct UnixProcessManager {
    processes: HashMap<ProcId, ChildRec>,
    next_id: u64,
}

impl UnixProcessManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, id: ProcId) -> Result<&ChildRec> {
        self.processes.get(&id).ok_or(Error::UnknownProcess(id))
    }

    fn signal(&self, id: ProcId, signal: libc::c_int) -> Result<()> {
        let proc = self.record(id)?;

        #[allow(unsafe_code)]
        let rc = unsafe { killpg(proc.pgid, signal) };
        if rc == -1 {
            let err = io::Error::last_os_error();
            // Nothing left in the group.
            if err.raw_os_error() == Some(libc::ESRCH) {
                return Ok(());
            }
            return Err(Error::IOError(err));
        }

        Ok(())
    }
}

fn exit_of(status: ExitStatus) -> ProcessExit {
    status.code().map_or_else(
        || ProcessExit::Signal(status.signal().unwrap_or_default()),
        ProcessExit::Code,
    )
}

/// Splits `reader` into lines that keep their `\n`.
///
/// A line longer than [`MAX_LINE_LENGTH`] arrives as several chunks. The
/// stream ends at EOF or on the first read error.
fn lines<R>(reader: R) -> BoxStream<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let reader = BufReader::new(reader);
    Box::pin(futures::stream::unfold(reader, |mut reader| async move {
        let mut line = Vec::new();
        let limit = MAX_LINE_LENGTH as u64;
        match (&mut reader).take(limit).read_until(b'\n', &mut line).await {
            Ok(0) => None,
            Ok(_) => Some((line, reader)),
            Err(err) => {
                tracing::debug!("Output read failed: {err}");
                None
            }
        }
    }))
}

fn spawn_error(spec: &CommandSpec, source: io::Error) -> Error {
    Error::Spawn {
        service: spec.name.clone(),
        source,
    }
}

#[async_trait::async_trait]
impl ProcessManager for UnixProcessManager {
    async fn spawn(&mut self, spec: CommandSpec) -> Result<Spawned> {
        let Some(program) = spec.cmd.first() else {
            return Err(spawn_error(
                &spec,
                io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
            ));
        };

        if let Some(dir) = &spec.cwd {
            if !dir.is_dir() {
                return Err(spawn_error(
                    &spec,
                    io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("working directory {} does not exist", dir.display()),
                    ),
                ));
            }
        }

        let mut cmd = Command::new(program);
        cmd.args(&spec.cmd[1..]);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        for (k, v) in &spec.env {
            cmd.env(k, v);
        }

        #[allow(unsafe_code)]
        unsafe {
            cmd.pre_exec(|| {
                if setsid() == -1 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|err| spawn_error(&spec, err))?;

        let pid = child.id();
        let pgid = pid
            .and_then(|pid| libc::pid_t::try_from(pid).ok())
            .ok_or_else(|| Error::IOError(io::Error::other("pid not available")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::IOError(io::Error::other("stdout not piped")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::IOError(io::Error::other("stderr not piped")))?;


        let (status_tx, status_rx) = watch::channel(None);
        let (exit_tx, exit_rx) = oneshot::channel();
        let name = spec.name.clone();
        tokio::spawn(async move {
            let exit = match child.wait().await {
                Ok(status) => exit_of(status),
                Err(err) => {
                    tracing::warn!("Failed to wait for `{name}`: {err}");
                    ProcessExit::Code(-1)
                }
            };
            tracing::debug!("Process `{name}` exited with {exit}");

            let _ = status_tx.send(Some(exit));
            let _ = exit_tx.send(exit);
        });

        let id = ProcId(self.next_id);
        self.next_id += 1;
        self.processes.insert(
            id,
            ChildRec {
                pgid,
                status: status_rx,
            },
        );

        tracing::debug!("Spawned `{}` as pid {pgid}", spec.name);

        Ok(Spawned {
            id,
            pid,
            stdout: lines(stdout),
            stderr: lines(stderr),
            exit: exit_rx,
        })
    }

    async fn shutdown(&mut self, id: ProcId) -> Result<()> {
        self.signal(id, SIGTERM)
    }

    async fn wait(&mut self, id: ProcId, d: Duration) -> Result<Option<ProcessExit>> {
        let mut status = self.record(id)?.status.clone();

        let outcome = tokio::time::timeout(d, status.wait_for(Option::is_some)).await;
        match outcome {
            Ok(Ok(exit)) => Ok(*exit),
            Ok(Err(_)) => Err(Error::Internal(format!(
                "exit watcher for {id:?} went away"
            ))),
            Err(_) => Ok(None),
        }
    }

    async fn kill(&mut self, id: ProcId) -> Result<()> {
        self.signal(id, SIGKILL)
    }
}
