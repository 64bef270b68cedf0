//! Stage descriptors for the workflow walkthrough.
//!
//! A [`StageDeck`] is the lookup table from stage index to display descriptor.
//! It is fixed at construction; the active index lives in the engine's
//! `StageController`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Display accent for a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accent {
    #[default]
    Gray,
    Indigo,
    Purple,
    Rose,
    Cyan,
    Green,
}

impl Accent {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gray => "gray",
            Self::Indigo => "indigo",
            Self::Purple => "purple",
            Self::Rose => "rose",
            Self::Cyan => "cyan",
            Self::Green => "green",
        }
    }
}

impl std::fmt::Display for Accent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static descriptor for one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDescriptor {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub accent: Accent,
}

impl StageDescriptor {
    pub fn new(title: impl Into<String>, description: impl Into<String>, accent: Accent) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            accent,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StageDeckError {
    #[error("stage deck must contain at least one stage")]
    Empty,
    #[error("stage {index} has an empty title")]
    UntitledStage { index: usize },
}

/// Ordered, non-empty sequence of stage descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDeck {
    stages: Vec<StageDescriptor>,
}

impl StageDeck {
    pub fn new(stages: Vec<StageDescriptor>) -> Result<Self, StageDeckError> {
        if stages.is_empty() {
            return Err(StageDeckError::Empty);
        }
        if let Some(index) = stages.iter().position(|s| s.title.trim().is_empty()) {
            return Err(StageDeckError::UntitledStage { index });
        }
        Ok(Self { stages })
    }

    /// The six-stage walkthrough shown on the reference page.
    #[must_use]
    pub fn reference() -> Self {
        Self {
            stages: vec![
                StageDescriptor::new(
                    "1. Drafting",
                    "Each agent drafts an initial reply from its history. The draft only exposes latent intent and is then discarded.",
                    Accent::Gray,
                ),
                StageDescriptor::new(
                    "2. Snapshotting",
                    "The final-layer hidden state Ht is captured, a snapshot of what the agent is thinking.",
                    Accent::Indigo,
                ),
                StageDescriptor::new(
                    "3. Uncovering",
                    "An encoder maps Ht into latent space, spilling out the mixed thoughts unsorted.",
                    Accent::Purple,
                ),
                StageDescriptor::new(
                    "4. Routing",
                    "A Jacobian mask filters the latent thoughts, separating shared consensus from private noise.",
                    Accent::Rose,
                ),
                StageDescriptor::new(
                    "5. Injection",
                    "The selected thoughts are compressed into a prefix vector Pt and injected into each agent.",
                    Accent::Cyan,
                ),
                StageDescriptor::new(
                    "6. Generation",
                    "Carrying the corrected intent Pt, each agent rereads the context and produces a consensus reply.",
                    Accent::Green,
                ),
            ],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    #[must_use]
    pub fn last_index(&self) -> usize {
        self.stages.len() - 1
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&StageDescriptor> {
        self.stages.get(index)
    }

    /// Descriptor at `index`, clamped into range.
    #[must_use]
    pub fn descriptor(&self, index: usize) -> &StageDescriptor {
        &self.stages[index.min(self.last_index())]
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageDescriptor> {
        self.stages.iter()
    }
}

impl Default for StageDeck {
    fn default() -> Self {
        Self::reference()
    }
}

impl TryFrom<Vec<StageDescriptor>> for StageDeck {
    type Error = StageDeckError;

    fn try_from(stages: Vec<StageDescriptor>) -> Result<Self, Self::Error> {
        Self::new(stages)
    }
}
