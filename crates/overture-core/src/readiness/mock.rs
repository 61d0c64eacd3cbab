use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::readiness::{CheckOutcome, HttpCheck};

#[derive(Debug, Clone, Copy)]
pub(crate) enum Behavior {
    /// Answers 200 from the n-th attempt on.
    ReadyAfter(u32),
    /// Connection refused forever.
    Never,
    /// Never answers at all.
    Hang,
}

#[derive(Debug, Default)]
struct Script {
    behavior: HashMap<String, Behavior>,
    attempts: HashMap<String, u32>,
}

/// Readiness check answering from a per-URL script.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedCheck {
    script: Arc<Mutex<Script>>,
}

impl ScriptedCheck {
    pub fn set(&self, url: &str, behavior: Behavior) {
        self.script
            .lock()
            .unwrap()
            .behavior
            .insert(url.to_owned(), behavior);
    }

    pub fn attempts(&self, url: &str) -> u32 {
        self.script
            .lock()
            .unwrap()
            .attempts
            .get(url)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl HttpCheck for ScriptedCheck {
    async fn check(&self, url: &str, _limit: Duration) -> CheckOutcome {
        let behavior = {
            let mut script = self.script.lock().unwrap();
            let attempt = script.attempts.entry(url.to_owned()).or_default();
            *attempt += 1;
            let attempt = *attempt;
            match script.behavior.get(url).copied().unwrap_or(Behavior::Never) {
                Behavior::ReadyAfter(n) if attempt >= n => return CheckOutcome::Ready(200),
                behavior => behavior,
            }
        };

        if let Behavior::Hang = behavior {
            std::future::pending::<()>().await;
        }
        CheckOutcome::NotReady("connection refused".to_owned())
    }
}
