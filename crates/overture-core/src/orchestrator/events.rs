use std::{fmt, time::Duration};

use crate::{output::LogLine, process_manager::ProcessExit};

/// Controller state over a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Sequencing,
    AllSupportReady,
    PrimaryStarting,
    Running,
    ShuttingDown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Sequencing => "sequencing",
            Phase::AllSupportReady => "all support services ready",
            Phase::PrimaryStarting => "starting primary",
            Phase::Running => "running",
            Phase::ShuttingDown => "shutting down",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUrl {
    pub name: String,
    pub url: String,
}

/// Everything the orchestrator reports, in the order it happened.
#[derive(Debug, Clone)]
pub enum Event {
    PhaseChanged(Phase),
    Launched {
        service: String,
        pid: Option<u32>,
    },
    Ready {
        service: String,
        elapsed: Duration,
    },
    Running {
        elapsed: Duration,
        services: Vec<ServiceUrl>,
    },
    Exited {
        service: String,
        exit: ProcessExit,
    },
    Terminating {
        service: String,
    },
    Failed {
        message: String,
    },
    Log(LogLine),
}
