//! Decoding of the structured block embedded in the service's answer text.
//!
//! The answer is expected to hold a JSON object with the keys `agentA`, `agentB`,
//! `sharedThought` and `consensus`, either bare or inside Markdown code fences.
//! Anything that does not decode into four non-blank strings degrades to
//! [`SimulationResult::Degraded`] carrying the answer text unchanged.

use thoughtcomm_types::{Consensus, ConsensusRecord, SimulationResult};

const FENCE: &str = "```";

/// Interpret the extracted answer text.
#[must_use]
pub fn interpret(text: &str) -> SimulationResult {
    match decode_record(text) {
        Some(record) => match Consensus::from_record(record) {
            Some(consensus) => SimulationResult::Consensus(consensus),
            None => {
                tracing::info!("Structured reply has blank fields; degrading");
                degraded(text)
            }
        },
        None => {
            tracing::info!(text_bytes = text.len(), "Reply is not a structured record; degrading");
            degraded(text)
        }
    }
}

fn degraded(text: &str) -> SimulationResult {
    SimulationResult::Degraded {
        raw_text: text.to_string(),
    }
}

/// First candidate span that decodes as a [`ConsensusRecord`].
///
/// Tried in order: the whole text, the body of the first fenced block, the
/// outermost `{ ... }` span, and finally the text with every fence marker removed.
/// Fence markers inside string values only survive the earlier candidates.
fn decode_record(text: &str) -> Option<ConsensusRecord> {
    let stripped = strip_code_fence(text);
    let candidates = [
        Some(text),
        fenced_body(text),
        outermost_object(text),
        Some(stripped.as_str()),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|candidate| serde_json::from_str(candidate.trim()).ok())
}

/// Remove every code-fence marker (including a language tag right after an
/// opening fence) and trim the result.
#[must_use]
pub fn strip_code_fence(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(FENCE) {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + FENCE.len()..];
        let tag_len = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        rest = &rest[tag_len..];
    }
    out.push_str(rest);
    out.trim().to_string()
}

/// Body of the first complete fenced block, without its info string.
fn fenced_body(text: &str) -> Option<&str> {
    let open = text.find(FENCE)?;
    let after_open = &text[open + FENCE.len()..];
    let body_start = after_open.find('\n').map_or(0, |nl| nl + 1);
    let body = &after_open[body_start..];
    let close = body.find(FENCE)?;
    Some(&body[..close])
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Encode a record the way a well-behaved service would: pretty JSON inside a `json` fence.
pub fn encode_fenced(record: &ConsensusRecord) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string_pretty(record)?;
    Ok(format!("{FENCE}json\n{json}\n{FENCE}"))
}
