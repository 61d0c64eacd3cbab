mod events;
mod state;

use std::{collections::HashSet, time::Duration};

use overture_types::{DescriptorSet, ServiceDescriptor};
use tokio::{sync::mpsc, time::Instant};
use tokio_util::sync::CancellationToken;

pub use events::{Event, Phase, ServiceUrl};
pub use state::{ManagedProcess, ProcessState, Registry};

use crate::{
    error::{Error, Result},
    output::{OutputMultiplexer, StderrClassifier},
    process_manager::{CommandSpec, ProcId, ProcessExit, ProcessManager},
    readiness::{HttpCheck, Prober, ReqwestCheck},
};

const EVENT_BUFFER: usize = 100;
/// How long shutdown waits for the last output lines after the processes stop.
const OUTPUT_DRAIN: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorOptions {
    /// Best-effort wait after the terminate request before killing.
    pub grace: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            grace: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug)]
struct ExitNotice {
    service: String,
    exit: ProcessExit,
}

enum Step {
    Ready(Result<Duration>),
    Exited(ExitNotice),
    Interrupted,
}

/// Brings the services up one by one, primary last, and tears them down.
///
/// All run state lives here and is only touched from the controller's own
/// task; process exits reach it as messages.
pub struct Orchestrator<P: ProcessManager, C: HttpCheck = ReqwestCheck> {
    services: DescriptorSet,
    process_manager: P,
    prober: Prober<C>,
    options: OrchestratorOptions,

    phase: Phase,
    registry: Registry,
    ready: HashSet<String>,
    started_at: Option<Instant>,
    shutdown_started: bool,

    events: mpsc::Sender<Event>,
    output: OutputMultiplexer,
    exits_tx: mpsc::UnboundedSender<ExitNotice>,
    exits_rx: mpsc::UnboundedReceiver<ExitNotice>,
}

impl<P: ProcessManager, C: HttpCheck> Orchestrator<P, C> {
    pub fn new(
        services: DescriptorSet,
        process_manager: P,
        check: C,
        options: OrchestratorOptions,
    ) -> (Self, mpsc::Receiver<Event>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        (
            Self::with_events(services, process_manager, check, options, events_tx),
            events_rx,
        )
    }

    pub fn with_events(
        services: DescriptorSet,
        process_manager: P,
        check: C,
        options: OrchestratorOptions,
        events: mpsc::Sender<Event>,
    ) -> Self {
        tracing::debug!("Orchestrator initialized with {} services", services.len());

        let (exits_tx, exits_rx) = mpsc::unbounded_channel();
        Self {
            services,
            process_manager,
            prober: Prober::new(check),
            options,
            phase: Phase::Idle,
            registry: Registry::default(),
            ready: HashSet::new(),
            started_at: None,
            shutdown_started: false,
            output: OutputMultiplexer::new(events.clone()),
            events,
            exits_tx,
            exits_rx,
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub fn is_ready(&self, service: &str) -> bool {
        self.ready.contains(service)
    }

    /// Start everything, stay up until `cancel` fires, then shut down.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that ended the run, or [`Error::Interrupted`]
    /// if `cancel` fired before every service was ready. Every launched
    /// process has been asked to terminate by the time this returns, and a
    /// fatal error is reported as the final [`Event::Failed`].
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<()> {
        let result = match self.start(cancel).await {
            Ok(()) => self.supervise(cancel).await,
            Err(err) => Err(err),
        };

        if let Err(err) = &result {
            if !matches!(err, Error::Interrupted) {
                tracing::error!("{err}");
            }
        }

        self.shutdown().await;

        // The cause goes out last, after everything shutdown reported.
        if let Err(err) = &result {
            if !matches!(err, Error::Interrupted) {
                self.emit(Event::Failed {
                    message: err.to_string(),
                })
                .await;
            }
        }
        result
    }

    /// Launch the support services in priority order, each gated on the
    /// readiness of the previous one, then the primary.
    ///
    /// # Errors
    ///
    /// Stops at the first spawn failure, readiness timeout, unexpected exit
    /// or interrupt. Already launched processes are left for [`Self::shutdown`].
    pub async fn start(&mut self, cancel: &CancellationToken) -> Result<()> {
        if self.phase != Phase::Idle {
            return Err(Error::Internal(format!(
                "cannot start while {}",
                self.phase
            )));
        }

        self.started_at = Some(Instant::now());
        self.set_phase(Phase::Sequencing).await;

        let support = self.services.support().to_vec();
        for descriptor in &support {
            self.launch_and_await(descriptor, cancel).await?;
        }
        self.set_phase(Phase::AllSupportReady).await;

        let primary = self.services.primary().clone();
        self.set_phase(Phase::PrimaryStarting).await;
        self.launch_and_await(&primary, cancel).await?;

        self.set_phase(Phase::Running).await;

        let elapsed = self.started_at.map(|t| t.elapsed()).unwrap_or_default();
        let services = self
            .registry
            .iter()
            .map(|p| ServiceUrl {
                name: p.descriptor.name.clone(),
                url: p.descriptor.url.clone(),
            })
            .collect();
        tracing::info!("All services ready after {}ms", elapsed.as_millis());
        self.emit(Event::Running { elapsed, services }).await;

        Ok(())
    }

    /// Idle until shutdown is requested or a service dies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedExit`] if any managed process exits.
    pub async fn supervise(&mut self, cancel: &CancellationToken) -> Result<()> {
        let step = tokio::select! {
            biased;
            () = cancel.cancelled() => Step::Interrupted,
            Some(notice) = self.exits_rx.recv() => Step::Exited(notice),
        };

        match step {
            Step::Exited(notice) => Err(self.unexpected_exit(notice).await),
            Step::Interrupted | Step::Ready(_) => {
                tracing::info!("Shutdown requested");
                Ok(())
            }
        }
    }

    /// Ask every launched process to terminate.
    ///
    /// Waits at most the configured grace period for them to go away and
    /// kills whatever is left. Only the first call does anything.
    pub async fn shutdown(&mut self) {
        if self.shutdown_started {
            tracing::debug!("Shutdown already in progress");
            return;
        }
        self.shutdown_started = true;
        self.set_phase(Phase::ShuttingDown).await;

        let targets: Vec<(String, ProcId)> = self
            .registry
            .iter()
            .map(|p| (p.descriptor.name.clone(), p.id))
            .collect();

        for (name, id) in &targets {
            tracing::info!("Terminating `{name}`");
            self.emit(Event::Terminating {
                service: name.clone(),
            })
            .await;

            if let Err(err) = self.process_manager.shutdown(*id).await {
                tracing::warn!("Failed to terminate `{name}`: {err}");
            }
        }

        let deadline = Instant::now() + self.options.grace;
        for (name, id) in &targets {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.process_manager.wait(*id, remaining).await {
                Ok(Some(exit)) => tracing::debug!("`{name}` stopped with {exit}"),
                Ok(None) => {
                    tracing::warn!(
                        "`{name}` still running {}ms after terminate request, killing",
                        self.options.grace.as_millis()
                    );
                    if let Err(err) = self.process_manager.kill(*id).await {
                        tracing::warn!("Failed to kill `{name}`: {err}");
                    }
                }
                Err(err) => tracing::warn!("Failed to wait for `{name}`: {err}"),
            }
        }

        for process in self.registry.iter_mut() {
            if process.state != ProcessState::Failed {
                process.state = ProcessState::Terminated;
            }
        }
        self.ready.clear();

        if !self.output.drain(OUTPUT_DRAIN).await {
            tracing::debug!("Output streams still open after shutdown");
        }
    }

    async fn launch_and_await(
        &mut self,
        descriptor: &ServiceDescriptor,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Interrupted);
        }
        self.launch(descriptor).await?;

        let name = descriptor.name.as_str();
        let step = tokio::select! {
            biased;
            () = cancel.cancelled() => Step::Interrupted,
            Some(notice) = self.exits_rx.recv() => Step::Exited(notice),
            result = self.prober.wait_ready(
                name,
                &descriptor.readiness_url,
                &descriptor.readiness,
            ) => Step::Ready(result),
        };

        match step {
            Step::Interrupted => {
                tracing::info!("Interrupted while waiting for `{name}`");
                Err(Error::Interrupted)
            }
            Step::Exited(notice) => Err(self.unexpected_exit(notice).await),
            Step::Ready(Ok(elapsed)) => {
                self.set_state(name, ProcessState::Ready);
                tracing::info!("`{name}` ready after {}ms", elapsed.as_millis());
                self.emit(Event::Ready {
                    service: name.to_owned(),
                    elapsed,
                })
                .await;
                Ok(())
            }
            Step::Ready(Err(err)) => {
                self.set_state(name, ProcessState::Failed);
                Err(err)
            }
        }
    }

    async fn launch(&mut self, descriptor: &ServiceDescriptor) -> Result<()> {
        let name = &descriptor.name;
        if self.registry.get(name).is_some() {
            return Err(Error::Internal(format!(
                "service `{name}` was already launched"
            )));
        }

        let classifier = StderrClassifier::for_service(descriptor)?;

        tracing::info!("Launching `{name}` on port {}", descriptor.port);
        let spawned = self
            .process_manager
            .spawn(CommandSpec::from(descriptor))
            .await?;

        self.registry.insert(ManagedProcess {
            descriptor: descriptor.clone(),
            id: spawned.id,
            pid: spawned.pid,
            state: ProcessState::Starting,
        });
        self.output
            .attach(name, spawned.stdout, spawned.stderr, &classifier);

        let exits_tx = self.exits_tx.clone();
        let service = name.clone();
        let exit_rx = spawned.exit;
        tokio::spawn(async move {
            if let Ok(exit) = exit_rx.await {
                let _ = exits_tx.send(ExitNotice { service, exit });
            }
        });

        self.emit(Event::Launched {
            service: name.clone(),
            pid: spawned.pid,
        })
        .await;

        Ok(())
    }

    async fn unexpected_exit(&mut self, notice: ExitNotice) -> Error {
        self.set_state(&notice.service, ProcessState::Failed);
        tracing::error!("`{}` exited unexpectedly with {}", notice.service, notice.exit);

        self.emit(Event::Exited {
            service: notice.service.clone(),
            exit: notice.exit,
        })
        .await;

        Error::UnexpectedExit {
            service: notice.service,
            exit: notice.exit,
        }
    }

    /// Keeps `Ready` state and ready-set membership in step.
    fn set_state(&mut self, service: &str, state: ProcessState) {
        if let Some(process) = self.registry.get_mut(service) {
            process.state = state;
        }
        if state == ProcessState::Ready {
            self.ready.insert(service.to_owned());
        } else {
            self.ready.remove(service);
        }
    }

    async fn set_phase(&mut self, phase: Phase) {
        tracing::debug!("Phase {} -> {}", self.phase, phase);
        self.phase = phase;
        self.emit(Event::PhaseChanged(phase)).await;
    }

    async fn emit(&self, event: Event) {
        if self.events.send(event).await.is_err() {
            tracing::trace!("Event receiver dropped");
        }
    }
}
