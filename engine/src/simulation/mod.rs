//! Simulation pipeline: one free-text query in, one validated result or typed failure out.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──submit──▶ Pending ──reply──▶ Succeeded(Consensus | Degraded)
//!   ▲                 │
//!   │                 └──error──▶ Failed(NetworkError | ServiceError | MalformedEnvelope)
//!   └────reset──── (any state)
//! ```
//!
//! `submit` performs its busy check and the `Pending` transition under one lock,
//! before the network task is spawned, then returns immediately. The task is the
//! only writer of the resolution. Every write is tagged with the submission's
//! generation; a write whose generation is no longer current is dropped, so an
//! aborted call can never overwrite newer state. `reset` and `AbortPrevious` both
//! abort the in-flight task, so at most one call per panel is ever outstanding.

mod prompt;
mod reply;

pub use prompt::build_prompt;
pub use reply::{encode_fenced, interpret, strip_code_fence};

use futures_util::FutureExt;
use serde::Deserialize;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thoughtcomm_providers::{AnswerPath, GenerationService};
use thoughtcomm_types::{
    FailureReason, PipelineStatus, SimulationRequest, SimulationResult, SubmitRejection,
};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// What `submit` does when a call is already pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitPolicy {
    /// Reject the new submission with [`SubmitRejection::Busy`].
    #[default]
    RejectWhilePending,
    /// Abort the in-flight call, suppress its result, and start the new one.
    AbortPrevious,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub answer_path: AnswerPath,
    pub timeout: Duration,
    pub policy: SubmitPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            answer_path: AnswerPath::default(),
            timeout: DEFAULT_TIMEOUT,
            policy: SubmitPolicy::default(),
        }
    }
}

#[derive(Debug, Default)]
struct Flight {
    generation: u64,
    abort: Option<AbortHandle>,
}

#[derive(Debug)]
struct Panel {
    flight: Mutex<Flight>,
    status: watch::Sender<PipelineStatus>,
}

impl Panel {
    fn lock(&self) -> MutexGuard<'_, Flight> {
        // Status writes are single assignments; a poisoned guard still holds a consistent value.
        self.flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve(&self, generation: u64, status: PipelineStatus) {
        let mut flight = self.lock();
        if flight.generation != generation {
            tracing::debug!(
                generation,
                current = flight.generation,
                "Dropping stale simulation result"
            );
            return;
        }
        flight.abort = None;
        self.status.send_replace(status);
    }
}

/// Handle to an accepted submission.
#[derive(Debug)]
pub struct Submission {
    generation: u64,
    task: JoinHandle<()>,
}

impl Submission {
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the task has resolved or been aborted.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the call has resolved or been aborted.
    pub async fn finished(self) {
        if let Err(e) = self.task.await
            && !e.is_cancelled()
        {
            tracing::error!(%e, generation = self.generation, "Simulation task failed");
        }
    }
}

/// One simulation panel.
///
/// The API key travels inside `service`; nothing here reads ambient configuration.
pub struct SimulationPipeline<S> {
    service: Arc<S>,
    config: Arc<PipelineConfig>,
    panel: Arc<Panel>,
}

impl<S> std::fmt::Debug for SimulationPipeline<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationPipeline")
            .field("config", &self.config)
            .field("status", &self.panel.status.borrow().as_str())
            .finish_non_exhaustive()
    }
}

impl<S: GenerationService> SimulationPipeline<S> {
    #[must_use]
    pub fn new(service: S, config: PipelineConfig) -> Self {
        let (status, _) = watch::channel(PipelineStatus::Idle);
        Self {
            service: Arc::new(service),
            config: Arc::new(config),
            panel: Arc::new(Panel {
                flight: Mutex::new(Flight::default()),
                status,
            }),
        }
    }

    #[must_use]
    pub fn status(&self) -> PipelineStatus {
        self.panel.status.borrow().clone()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.panel.status.borrow().is_pending()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PipelineStatus> {
        self.panel.status.subscribe()
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Start a simulation for `text`.
    ///
    /// Blank input is rejected with [`SubmitRejection::InputRejected`] and a pending
    /// call (under [`SubmitPolicy::RejectWhilePending`]) with [`SubmitRejection::Busy`];
    /// in both cases the status is left untouched and no request is sent.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, text: &str) -> Result<Submission, SubmitRejection> {
        let request = SimulationRequest::new(text).map_err(|_| SubmitRejection::InputRejected)?;

        let mut flight = self.panel.lock();
        if self.panel.status.borrow().is_pending() {
            match self.config.policy {
                SubmitPolicy::RejectWhilePending => {
                    tracing::debug!("Simulation already pending; rejecting submit");
                    return Err(SubmitRejection::Busy);
                }
                SubmitPolicy::AbortPrevious => {
                    if let Some(abort) = flight.abort.take() {
                        tracing::info!(
                            generation = flight.generation,
                            "Aborting pending simulation"
                        );
                        abort.abort();
                    }
                }
            }
        }

        flight.generation = flight.generation.wrapping_add(1);
        let generation = flight.generation;
        self.panel.status.send_replace(PipelineStatus::Pending);

        let service = Arc::clone(&self.service);
        let config = Arc::clone(&self.config);
        let panel = Arc::clone(&self.panel);
        let prompt = build_prompt(&request);

        tracing::info!(generation, query_bytes = request.query().len(), "Simulation submitted");

        let task = tokio::spawn(async move {
            let outcome = AssertUnwindSafe(run_call(service.as_ref(), &prompt, &config))
                .catch_unwind()
                .await;
            let status = outcome.unwrap_or_else(|_| {
                tracing::error!(generation, "Simulation call panicked");
                PipelineStatus::Failed(FailureReason::NetworkError)
            });
            panel.resolve(generation, status);
        });
        flight.abort = Some(task.abort_handle());
        drop(flight);

        Ok(Submission { generation, task })
    }

    /// Return to `Idle`, discarding any result.
    ///
    /// A call still in flight is aborted, so the next `submit` never overlaps it.
    pub fn reset(&self) {
        let mut flight = self.panel.lock();
        flight.generation = flight.generation.wrapping_add(1);
        if let Some(abort) = flight.abort.take() {
            tracing::info!(
                generation = flight.generation,
                "Aborting pending simulation on reset"
            );
            abort.abort();
        }
        self.panel.status.send_replace(PipelineStatus::Idle);
        tracing::debug!(generation = flight.generation, "Simulation panel reset");
    }
}

async fn run_call<S: GenerationService>(
    service: &S,
    prompt: &str,
    config: &PipelineConfig,
) -> PipelineStatus {
    let envelope = match tokio::time::timeout(config.timeout, service.generate(prompt)).await {
        Ok(Ok(envelope)) => envelope,
        Ok(Err(e)) => {
            tracing::warn!(%e, "Generation service call failed");
            return PipelineStatus::Failed(e.reason());
        }
        Err(_) => {
            tracing::warn!(timeout = ?config.timeout, "Generation service call timed out");
            return PipelineStatus::Failed(FailureReason::NetworkError);
        }
    };

    let Some(text) = config.answer_path.extract(&envelope) else {
        tracing::warn!(
            path = config.answer_path.as_str(),
            "Response envelope has no answer text"
        );
        return PipelineStatus::Failed(FailureReason::MalformedEnvelope);
    };

    let result = interpret(text);
    match &result {
        SimulationResult::Consensus(_) => tracing::info!("Simulation produced consensus"),
        SimulationResult::Degraded { .. } => tracing::info!("Simulation produced degraded reply"),
    }
    PipelineStatus::Succeeded(result)
}
