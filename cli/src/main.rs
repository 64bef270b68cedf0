//! THOUGHTCOMM host - drives the stage walkthrough and the simulation panel from stdin.
//!
//! ```text
//! stdin line ──▶ Command ──▶ StageController / SimulationPipeline
//!                                              │
//!                         status watch ◀───────┘ (printed as it changes)
//! ```
//!
//! Logs go to stderr so they never interleave with the panel output on stdout.
//! Set `RUST_LOG` to adjust verbosity.

use anyhow::{Context, Result};
use std::io::{IsTerminal, Write, stdout};
use thoughtcomm_engine::{
    GenerationService, PipelineStatus, SimulationPipeline, SimulationResult, StageController,
    ThoughtcommConfig,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_LOG_FILTER: &str = "info";

/// `RUST_LOG` when set and valid, else [`DEFAULT_LOG_FILTER`].
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

fn init_tracing() {
    let stderr_is_terminal = std::io::stderr().is_terminal();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(stderr_is_terminal)
                .with_writer(std::io::stderr),
        )
        .with(env_filter())
        .init();
}

const HELP: &str = "\
commands:
  next | n         advance one stage
  prev | p         go back one stage
  stage <N>        jump to stage N (1-based, clamped)
  ask <question>   run a simulation
  status           show the simulation panel
  reset            clear the simulation panel
  help             show this list
  quit | q         exit";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Next,
    Prev,
    Stage(usize),
    Ask(String),
    Status,
    Reset,
    Help,
    Quit,
}

impl Command {
    /// Parse one input line. Blank lines are `Ok(None)`.
    fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(w, r)| (w, r.trim()));

        let command = match word.to_ascii_lowercase().as_str() {
            "next" | "n" => Self::Next,
            "prev" | "p" => Self::Prev,
            "stage" => {
                let number: usize = rest
                    .parse()
                    .map_err(|_| format!("expected a stage number, got {rest:?}"))?;
                Self::Stage(number.saturating_sub(1))
            }
            "ask" => Self::Ask(rest.to_string()),
            "status" => Self::Status,
            "reset" => Self::Reset,
            "help" | "?" => Self::Help,
            "quit" | "q" | "exit" => Self::Quit,
            other => return Err(format!("unknown command {other:?} (try `help`)")),
        };
        Ok(Some(command))
    }
}

fn render_stage(stages: &StageController) -> String {
    let stage = stages.current_descriptor();
    let mut out = format!(
        "[{}/{}] {} ({})\n  {}",
        stages.current() + 1,
        stages.len(),
        stage.title,
        stage.accent,
        stage.description
    );
    if stages.is_first() {
        out.push_str("\n  (first stage)");
    } else if stages.is_last() {
        out.push_str("\n  (last stage)");
    }
    out
}

fn render_status(status: &PipelineStatus) -> String {
    match status {
        PipelineStatus::Idle => "simulation: idle".to_string(),
        PipelineStatus::Pending => "simulation: thinking...".to_string(),
        PipelineStatus::Succeeded(SimulationResult::Consensus(consensus)) => format!(
            "Agent A:        {}\nAgent B:        {}\nShared thought: {}\nConsensus:      {}",
            consensus.agent_a_statement(),
            consensus.agent_b_statement(),
            consensus.shared_thought(),
            consensus.final_answer()
        ),
        PipelineStatus::Succeeded(SimulationResult::Degraded { raw_text }) => {
            format!("Consensus (unstructured):\n{raw_text}")
        }
        PipelineStatus::Failed(reason) => format!("simulation failed: {reason}"),
    }
}

/// Next status change, or never when there is no pipeline or it has gone away.
async fn next_status(rx: Option<&mut watch::Receiver<PipelineStatus>>) -> PipelineStatus {
    if let Some(rx) = rx
        && rx.changed().await.is_ok()
    {
        return rx.borrow_and_update().clone();
    }
    std::future::pending().await
}

fn say(text: &str) {
    let mut out = stdout().lock();
    let _ = writeln!(out, "{text}");
    let _ = out.flush();
}

/// Apply one command. Returns `false` on quit.
fn dispatch<S: GenerationService>(
    command: Command,
    stages: &mut StageController,
    pipeline: Option<&SimulationPipeline<S>>,
) -> bool {
    match command {
        Command::Next => {
            stages.next();
            say(&render_stage(stages));
        }
        Command::Prev => {
            stages.prev();
            say(&render_stage(stages));
        }
        Command::Stage(index) => {
            stages.go_to(index);
            say(&render_stage(stages));
        }
        Command::Ask(question) => match pipeline {
            Some(pipeline) => {
                if let Err(rejection) = pipeline.submit(&question) {
                    say(&format!("not submitted: {rejection}"));
                }
            }
            None => say("simulation unavailable: no generation service configured"),
        },
        Command::Status => match pipeline {
            Some(pipeline) => say(&render_status(&pipeline.status())),
            None => say("simulation unavailable: no generation service configured"),
        },
        Command::Reset => {
            if let Some(pipeline) = pipeline {
                pipeline.reset();
            }
        }
        Command::Help => say(HELP),
        Command::Quit => return false,
    }
    true
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = match ThoughtcommConfig::load() {
        Ok(Some(config)) => config,
        Ok(None) => ThoughtcommConfig::default(),
        Err(e) => {
            tracing::warn!(%e, "Ignoring unreadable config");
            ThoughtcommConfig::default()
        }
    };

    let mut stages = StageController::new(config.stage_deck().context("invalid stage deck")?);
    let pipeline = match SimulationPipeline::from_config(&config) {
        Ok(pipeline) => Some(pipeline),
        Err(e) => {
            tracing::warn!(%e, "Simulation panel disabled");
            None
        }
    };
    let mut status_rx = pipeline.as_ref().map(SimulationPipeline::subscribe);

    say(&render_stage(&stages));
    say("type `help` for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match Command::parse(&line) {
                    Ok(Some(command)) => {
                        if !dispatch(command, &mut stages, pipeline.as_ref()) {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(message) => say(&message),
                }
            }
            status = next_status(status_rx.as_mut()) => say(&render_status(&status)),
        }
    }

    if let Some(pipeline) = &pipeline {
        pipeline.reset();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_filter_defaults_to_info() {
        // SAFETY: no other test in this binary reads or writes RUST_LOG.
        unsafe { std::env::remove_var("RUST_LOG") };
        assert_eq!(env_filter().to_string(), DEFAULT_LOG_FILTER);
        assert_eq!(DEFAULT_LOG_FILTER, "info");
    }

    #[test]
    fn parses_navigation_commands() {
        assert_eq!(Command::parse("next"), Ok(Some(Command::Next)));
        assert_eq!(Command::parse("  P "), Ok(Some(Command::Prev)));
        assert_eq!(Command::parse("stage 3"), Ok(Some(Command::Stage(2))));
        assert_eq!(Command::parse("stage 0"), Ok(Some(Command::Stage(0))));
        assert!(Command::parse("stage three").is_err());
    }

    #[test]
    fn ask_keeps_the_question_text() {
        assert_eq!(
            Command::parse("ask  Why do agents   agree? "),
            Ok(Some(Command::Ask("Why do agents   agree?".to_string())))
        );
        assert_eq!(Command::parse("ask"), Ok(Some(Command::Ask(String::new()))));
    }

    #[test]
    fn blank_and_unknown_lines() {
        assert_eq!(Command::parse("   "), Ok(None));
        assert!(Command::parse("launch").is_err());
    }

    #[test]
    fn stage_rendering_marks_the_ends() {
        let mut stages = StageController::default();
        assert!(render_stage(&stages).starts_with("[1/6] "));
        assert!(render_stage(&stages).contains("(first stage)"));
        stages.go_to(99);
        assert!(render_stage(&stages).starts_with("[6/6] "));
        assert!(render_stage(&stages).contains("(last stage)"));
    }

    #[test]
    fn failure_status_names_the_reason() {
        let text = render_status(&PipelineStatus::Failed(
            thoughtcomm_engine::FailureReason::ServiceError(503),
        ));
        assert!(text.starts_with("simulation failed:"));
        assert!(text.contains("503"));
    }
}
