//! Instruction template sent to the generation service.

use thoughtcomm_types::SimulationRequest;

const TEMPLATE_HEAD: &str = "\
You are simulating THOUGHTCOMM, a protocol in which two language-model agents \
exchange latent thoughts instead of text before answering together.

Given the user's question, write four short statements:
1. agentA - Agent A's initial draft, from a cautious, analytical perspective.
2. agentB - Agent B's initial draft, from a creative, exploratory perspective.
3. sharedThought - the latent thought both agents hold in common once private noise is filtered out.
4. consensus - the final answer both agents give after the shared thought is injected.

Keep each statement to one or two sentences.
Respond with a single JSON object and nothing else, using exactly these keys:
{\"agentA\": \"...\", \"agentB\": \"...\", \"sharedThought\": \"...\", \"consensus\": \"...\"}

User question:
";

/// Full prompt for one submission: the fixed template followed by the user's query.
#[must_use]
pub fn build_prompt(request: &SimulationRequest) -> String {
    let mut prompt = String::with_capacity(TEMPLATE_HEAD.len() + request.query().len());
    prompt.push_str(TEMPLATE_HEAD);
    prompt.push_str(request.query());
    prompt
}
