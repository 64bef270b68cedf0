//! Core domain types for THOUGHTCOMM.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer: the stage controller, the simulation
//! pipeline, and the host binary.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod simulation;
mod stage;

pub use simulation::{
    Consensus, ConsensusRecord, FailureReason, PipelineStatus, SimulationResult, SubmitRejection,
};
pub use stage::{Accent, StageDeck, StageDeckError, StageDescriptor};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// NonEmpty String Types
// ============================================================================

/// A string guaranteed to be non-empty (after trimming).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyString(String);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("value must not be empty")]
pub struct EmptyStringError;

impl NonEmptyString {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyStringError> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(EmptyStringError)
        } else {
            Ok(Self(value))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for NonEmptyString {
    type Error = EmptyStringError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for NonEmptyString {
    type Error = EmptyStringError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl std::ops::Deref for NonEmptyString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl AsRef<str> for NonEmptyString {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

// ============================================================================
// Simulation Request
// ============================================================================

/// One user submission to the simulation panel.
///
/// The query is stored trimmed; whitespace-only input cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationRequest {
    query: NonEmptyString,
}

impl SimulationRequest {
    pub fn new(text: &str) -> Result<Self, EmptyStringError> {
        Ok(Self {
            query: NonEmptyString::new(text.trim())?,
        })
    }

    #[must_use]
    pub fn query(&self) -> &str {
        self.query.as_str()
    }
}

// ============================================================================
// API Key
// ============================================================================

/// Credential for the generation service.
///
/// Note: `Debug` is manually implemented to redact the key value, preventing accidental
/// credential disclosure in logs or error messages.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(NonEmptyString);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey(<redacted>)")
    }
}

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyStringError> {
        NonEmptyString::new(value.into().trim()).map(Self)
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        self.0.as_str()
    }
}
