//! 假设检查：评估每条假设的新颖度、证据支持与可行性

use serde_json::json;

use crate::agents::prompts::render_documents;
use crate::pipeline::{parse_typed, AgentDescriptor};
use crate::report::ResearchReport;
use crate::verification::types::HypothesisCheck;

pub const HYPOTHESIS_AGENT: &str = "hypothesis_verifier";

const SYSTEM_PROMPT: &str = "You are a Hypothesis Verifier reviewing research hypotheses against the literature. \
For each hypothesis judge: novelty (novel | incremental | known), evidence (strong | moderate | weak | unsupported), \
feasibility (feasible | challenging | infeasible) and a confidence from 0 to 100. \
Respond with a single JSON object: \
{\"verdicts\": [{\"hypothesis\": string, \"novelty\": string, \"evidence\": string, \"feasibility\": string, \"confidence\": number, \"note\": string}]}";

/// 构建单 Agent 描述符；提示词在构建时固定（假设列表已知）
pub fn hypothesis_agent(report: &ResearchReport) -> AgentDescriptor {
    let hypotheses: Vec<_> = report
        .hypotheses
        .iter()
        .map(|h| {
            json!({
                "statement": h.statement,
                "rationale": h.rationale,
                "claimedNovelty": h.novelty,
            })
        })
        .collect();
    let listing = serde_json::to_string_pretty(&hypotheses).unwrap_or_default();

    AgentDescriptor::external(
        HYPOTHESIS_AGENT,
        SYSTEM_PROMPT,
        move |ctx| {
            format!(
                "## Source documents\n{}\n\n## Hypotheses to verify\n{}\n\nReturn one verdict per hypothesis, in order.",
                render_documents(ctx.documents, 1500),
                listing
            )
        },
        parse_typed::<HypothesisCheck>,
    )
    .temperature(0.2)
    .max_tokens(1500)
}
