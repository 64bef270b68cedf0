//! THOUGHTCOMM orchestration core.
//!
//! Two independent pieces share this crate:
//!
//! - [`StageController`] - the bounded step state machine behind the workflow walkthrough
//! - [`SimulationPipeline`] - submits a query to the generation service and publishes
//!   a [`PipelineStatus`] for the simulation panel
//!
//! Configuration ([`ThoughtcommConfig`]) is read by the host and passed in explicitly;
//! neither component reads files or the environment on its own.

mod config;
pub mod simulation;
mod stage;

pub use config::{
    API_KEY_ENV, ApiKeys, CONFIG_PATH_ENV, ConfigError, ServiceConfig, SimulationConfig,
    ThoughtcommConfig, config_path, expand_env_vars,
};
pub use simulation::{PipelineConfig, SimulationPipeline, SubmitPolicy, Submission};
pub use stage::StageController;

pub use thoughtcomm_providers::{
    AnswerPath, GeminiClient, GeminiClientError, GeminiSettings, GenerationError,
    GenerationService,
};
pub use thoughtcomm_types::{
    Accent, ApiKey, Consensus, ConsensusRecord, FailureReason, PipelineStatus, SimulationResult,
    StageDeck, StageDescriptor, SubmitRejection,
};

impl SimulationPipeline<GeminiClient> {
    /// Pipeline over a Gemini client built from `config`.
    pub fn from_config(config: &ThoughtcommConfig) -> Result<Self, GeminiBootError> {
        let client = GeminiClient::new(config.gemini_settings()?)?;
        tracing::info!(url = %client.url(), "Simulation pipeline configured");
        Ok(Self::new(client, config.pipeline_config()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GeminiBootError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Client(#[from] GeminiClientError),
}
