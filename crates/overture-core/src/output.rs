//! Combined output of every managed process.

use chrono::{DateTime, Local};
use futures::StreamExt;
use overture_types::ServiceDescriptor;
use regex::RegexSet;
use tokio::sync::mpsc::Sender;
use tokio_util::task::TaskTracker;

use crate::{error::Result, orchestrator::Event, process_manager::BoxStream};

/// stderr lines dev servers print during normal operation.
const BUILTIN_BENIGN: &[&str] = &[
    r"(?i)running on",
    r"(?i)debugger (is active|pin)",
    r"(?i)restarting with",
    r"(?i)development server",
    r"(?i)compiled successfully",
    r"(?i)listening on",
    r"(?i)press ctrl\+c",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
}

#[derive(Debug, Clone)]
pub struct LogLine {
    pub service: String,
    pub stream: StreamKind,
    pub level: LogLevel,
    pub timestamp: DateTime<Local>,
    pub text: String,
}

/// Decides whether a stderr line is a warning.
#[derive(Debug, Clone)]
pub struct StderrClassifier {
    benign: RegexSet,
}

impl StderrClassifier {
    /// Builtin benign patterns plus the service's own.
    ///
    /// # Errors
    ///
    /// Returns an error if one of the service's patterns is not a valid regex.
    pub fn for_service(descriptor: &ServiceDescriptor) -> Result<Self> {
        let patterns = BUILTIN_BENIGN
            .iter()
            .map(|p| (*p).to_owned())
            .chain(descriptor.benign_stderr.iter().cloned());
        Ok(Self {
            benign: RegexSet::new(patterns)?,
        })
    }

    #[must_use]
    pub fn level(&self, stream: StreamKind, text: &str) -> LogLevel {
        match stream {
            StreamKind::Stdout => LogLevel::Info,
            StreamKind::Stderr if self.benign.is_match(text) => LogLevel::Info,
            StreamKind::Stderr => LogLevel::Warn,
        }
    }
}

fn decode(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    text.trim_end_matches(['\n', '\r']).to_owned()
}

async fn follow_output(
    service: String,
    stream: StreamKind,
    mut output: BoxStream<Vec<u8>>,
    classifier: StderrClassifier,
    tx: Sender<Event>,
) {
    while let Some(raw) = output.next().await {
        let text = decode(&raw);
        let line = LogLine {
            level: classifier.level(stream, &text),
            service: service.clone(),
            stream,
            timestamp: Local::now(),
            text,
        };
        if tx.send(Event::Log(line)).await.is_err() {
            break;
        }
    }
    tracing::trace!("Output {stream:?} of `{service}` closed");
}

/// Fans every process's stdout and stderr into the event channel.
///
/// Lines of one stream keep their order; streams of different services
/// interleave as they arrive.
#[derive(Debug)]
pub struct OutputMultiplexer {
    tx: Sender<Event>,
    tasks: TaskTracker,
}

impl OutputMultiplexer {
    #[must_use]
    pub fn new(tx: Sender<Event>) -> Self {
        Self {
            tx,
            tasks: TaskTracker::new(),
        }
    }

    pub fn attach(
        &self,
        service: &str,
        stdout: BoxStream<Vec<u8>>,
        stderr: BoxStream<Vec<u8>>,
        classifier: &StderrClassifier,
    ) {
        self.tasks.spawn(follow_output(
            service.to_owned(),
            StreamKind::Stdout,
            stdout,
            classifier.clone(),
            self.tx.clone(),
        ));
        self.tasks.spawn(follow_output(
            service.to_owned(),
            StreamKind::Stderr,
            stderr,
            classifier.clone(),
            self.tx.clone(),
        ));
    }

    /// Waits up to `limit` for every attached stream to end.
    pub async fn drain(&self, limit: std::time::Duration) -> bool {
        self.tasks.close();
        tokio::time::timeout(limit, self.tasks.wait()).await.is_ok()
    }
}
