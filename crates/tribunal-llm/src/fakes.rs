//! In-memory fakes for the completion contract (testing only)
//!
//! `ScriptedBackend` replays per-agent scripts of replies, failures and
//! delays, records every request it receives, and tracks how many calls
//! were in flight at once.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::{CompletionBackend, CompletionRequest, Result};

/// One scripted outcome for a single `complete` call.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    /// Return this text.
    Reply(String),
    /// Fail with a transient error carrying this message.
    Fail(String),
    /// Fail as a backend missing its configuration.
    Unconfigured(String),
    /// Sleep, then resolve the inner step.
    Delay(u64, Box<ScriptStep>),
}

impl ScriptStep {
    pub fn reply(text: impl Into<String>) -> Self {
        ScriptStep::Reply(text.into())
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        ScriptStep::Fail(reason.into())
    }

    pub fn unconfigured(reason: impl Into<String>) -> Self {
        ScriptStep::Unconfigured(reason.into())
    }

    pub fn delayed(ms: u64, step: ScriptStep) -> Self {
        ScriptStep::Delay(ms, Box::new(step))
    }
}

type Responder = Box<dyn Fn(&CompletionRequest) -> ScriptStep + Send + Sync>;

/// Completion backend driven by per-agent scripts.
///
/// Each agent id owns a FIFO queue. When the queue for an agent is empty
/// the responder (if any) decides the outcome; without a responder the
/// call fails.
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<HashMap<String, VecDeque<ScriptStep>>>,
    responder: Option<Responder>,
    calls: Mutex<Vec<CompletionRequest>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `steps` for `agent_id`, after anything already queued.
    pub fn script(self, agent_id: &str, steps: Vec<ScriptStep>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(agent_id.to_string())
            .or_default()
            .extend(steps);
        self
    }

    /// Decide outcomes for requests whose agent has no queued steps left.
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> ScriptStep + Send + Sync + 'static,
    {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Every request received so far, in arrival order.
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of requests received for `agent_id`.
    pub fn call_count(&self, agent_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.agent_id == agent_id)
            .count()
    }

    /// Highest number of concurrently running `complete` calls observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn next_step(&self, request: &CompletionRequest) -> ScriptStep {
        let queued = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&request.agent_id)
            .and_then(VecDeque::pop_front);

        match (queued, &self.responder) {
            (Some(step), _) => step,
            (None, Some(responder)) => responder(request),
            (None, None) => ScriptStep::Fail(format!(
                "no scripted response left for agent '{}'",
                request.agent_id
            )),
        }
    }
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.calls.lock().unwrap().push(request.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        let mut step = self.next_step(request);
        loop {
            match step {
                ScriptStep::Reply(text) => return Ok(text),
                ScriptStep::Fail(reason) => return Err(LlmError::Scripted(reason)),
                ScriptStep::Unconfigured(reason) => return Err(LlmError::NotConfigured(reason)),
                ScriptStep::Delay(ms, inner) => {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    step = *inner;
                }
            }
        }
    }
}
