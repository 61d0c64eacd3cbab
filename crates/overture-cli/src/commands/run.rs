use std::{io::Write, process::ExitCode, time::Duration};

use anyhow::{Context, Result};
use overture_config::load_from_path;
use overture_core::{
    CancellationToken, Error, Event, Orchestrator, OrchestratorOptions, ReqwestCheck,
    UnixProcessManager,
};
use tokio::{
    signal::unix::{signal, SignalKind},
    sync::mpsc,
    task::JoinHandle,
};

use super::config_path;
use crate::logger::Logger;

/// Exit status after an interrupt that arrived before everything was up.
const EXIT_INTERRUPTED: u8 = 130;
/// Exit status after a spawn failure, readiness timeout or unexpected exit.
const EXIT_FAILED: u8 = 1;
/// How long to wait for the last events once the orchestrator is gone.
const PRINTER_FLUSH: Duration = Duration::from_millis(500);

pub async fn run(file: Option<String>, grace_ms: Option<u64>) -> Result<ExitCode> {
    let path = config_path(file)?;
    let config = load_from_path(&path)
        .with_context(|| format!("loading config from {}", path.display()))?;
    tracing::debug!("Loaded {} services from {}", config.services.len(), path.display());

    let grace = grace_ms.map_or(config.shutdown.grace, Duration::from_millis);
    let check = ReqwestCheck::new().context("building the readiness http client")?;

    let cancel = CancellationToken::new();
    let signals = listen_for_signals(cancel.clone()).context("installing signal handlers")?;

    let (mut orchestrator, mut events) = Orchestrator::new(
        config.services,
        UnixProcessManager::new(),
        check,
        OrchestratorOptions { grace },
    );

    let printer = tokio::spawn(async move {
        let mut logger = Logger::default();
        while let Some(event) = events.recv().await {
            report(&mut logger, &event);
        }
    });

    let result = orchestrator.run(&cancel).await;
    drop(orchestrator);
    signals.abort();

    let printer_abort = printer.abort_handle();
    if tokio::time::timeout(PRINTER_FLUSH, printer).await.is_err() {
        tracing::debug!("Output still open after shutdown, not waiting for it");
        printer_abort.abort();
    }

    // Printed only once the stream is done so the cause is the last line.
    if let Err(err) = &result {
        if !matches!(err, Error::Interrupted) {
            Logger::default().error(&err.to_string());
        }
    }

    Ok(ExitCode::from(exit_status(&result)))
}

fn exit_status(result: &overture_core::Result<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(Error::Interrupted) => EXIT_INTERRUPTED,
        Err(_) => EXIT_FAILED,
    }
}

/// Cancels `cancel` on the first SIGINT or SIGTERM.
///
/// Both handlers are installed before this returns.
fn listen_for_signals(cancel: CancellationToken) -> std::io::Result<JoinHandle<usize>> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    let (tx, rx) = mpsc::channel(4);
    tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                Some(()) = interrupt.recv() => "SIGINT",
                Some(()) = terminate.recv() => "SIGTERM",
                else => break,
            };
            if tx.send(name).await.is_err() {
                break;
            }
        }
    });

    Ok(tokio::spawn(handle_signals(rx, cancel)))
}

/// Returns how many signals arrived once shutdown was already under way.
async fn handle_signals(
    mut signals: mpsc::Receiver<&'static str>,
    cancel: CancellationToken,
) -> usize {
    let mut ignored = 0;
    while let Some(name) = signals.recv().await {
        if cancel.is_cancelled() {
            tracing::warn!("{name} received, already shutting down");
            ignored += 1;
        } else {
            tracing::info!("{name} received, stopping services");
            cancel.cancel();
        }
    }
    ignored
}

fn report<W: Write>(logger: &mut Logger<W>, event: &Event) {
    match event {
        Event::Log(line) => logger.log(line),
        Event::Launched { service, pid } => match pid {
            Some(pid) => logger.system(&format!("Started {service} (pid {pid})")),
            None => logger.system(&format!("Started {service}")),
        },
        Event::Ready { service, elapsed } => {
            logger.system(&format!("{service} is ready ({}ms)", elapsed.as_millis()));
        }
        Event::Running { elapsed, services } => logger.summary(*elapsed, services),
        Event::Exited { service, exit } => logger.system(&format!("{service} exited ({exit})")),
        Event::Terminating { service } => logger.system(&format!("Stopping {service}")),
        Event::Failed { message } => tracing::debug!("Run failed: {message}"),
        Event::PhaseChanged(phase) => tracing::debug!("Phase: {phase}"),
    }
}
