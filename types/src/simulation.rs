//! Simulation results, failures, and the per-panel pipeline status.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire shape of the structured block the generation service is asked to return.
///
/// Unknown keys are ignored; a missing or non-string key fails decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusRecord {
    #[serde(rename = "agentA")]
    pub agent_a: String,
    #[serde(rename = "agentB")]
    pub agent_b: String,
    #[serde(rename = "sharedThought")]
    pub shared_thought: String,
    pub consensus: String,
}

/// A validated four-part consensus outcome. Every field is non-blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consensus {
    agent_a_statement: String,
    agent_b_statement: String,
    shared_thought: String,
    final_answer: String,
}

impl Consensus {
    /// Validate a decoded record. Returns `None` if any field is blank.
    #[must_use]
    pub fn from_record(record: ConsensusRecord) -> Option<Self> {
        let ConsensusRecord {
            agent_a,
            agent_b,
            shared_thought,
            consensus,
        } = record;
        let fields = [&agent_a, &agent_b, &shared_thought, &consensus];
        if fields.iter().any(|field| field.trim().is_empty()) {
            return None;
        }
        Some(Self {
            agent_a_statement: agent_a,
            agent_b_statement: agent_b,
            shared_thought,
            final_answer: consensus,
        })
    }

    #[must_use]
    pub fn agent_a_statement(&self) -> &str {
        &self.agent_a_statement
    }

    #[must_use]
    pub fn agent_b_statement(&self) -> &str {
        &self.agent_b_statement
    }

    #[must_use]
    pub fn shared_thought(&self) -> &str {
        &self.shared_thought
    }

    #[must_use]
    pub fn final_answer(&self) -> &str {
        &self.final_answer
    }

    /// Back to the wire shape, for re-encoding.
    #[must_use]
    pub fn to_record(&self) -> ConsensusRecord {
        ConsensusRecord {
            agent_a: self.agent_a_statement.clone(),
            agent_b: self.agent_b_statement.clone(),
            shared_thought: self.shared_thought.clone(),
            consensus: self.final_answer.clone(),
        }
    }
}

/// Resolution of one successful simulation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationResult {
    Consensus(Consensus),
    /// The service answered, but not in the requested shape.
    Degraded { raw_text: String },
}

impl SimulationResult {
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    #[must_use]
    pub fn consensus(&self) -> Option<&Consensus> {
        match self {
            Self::Consensus(consensus) => Some(consensus),
            Self::Degraded { .. } => None,
        }
    }
}

/// Why a simulation call failed outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("network error contacting the generation service")]
    NetworkError,
    #[error("generation service returned status {0}")]
    ServiceError(u16),
    #[error("generation service response did not contain an answer")]
    MalformedEnvelope,
}

/// Status of one simulation panel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PipelineStatus {
    #[default]
    Idle,
    Pending,
    Succeeded(SimulationResult),
    Failed(FailureReason),
}

impl PipelineStatus {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// True once a submission has resolved, successfully or not.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_))
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
        }
    }
}

/// Why `submit` did not start a call. Neither is surfaced as a failure state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitRejection {
    #[error("nothing to simulate")]
    InputRejected,
    #[error("a simulation is already pending")]
    Busy,
}
