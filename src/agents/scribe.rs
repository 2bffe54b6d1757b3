//! scribe：汇总所有上游输出，生成研究报告（流水线的汇点）

use crate::agents::prompts::standard_prompt;
use crate::pipeline::{parse_typed, AgentDescriptor, AgentId};
use crate::report::ResearchReport;

pub const ID: &str = "scribe";

const SYSTEM_PROMPT: &str = "You are the Scribe. Synthesize the other agents' work into one research report. \
Only state what the documents and agent inputs support; inputs marked (unavailable) must be ignored. \
Suggest further reading by exact paper title where a connection or quick win calls for it. \
Respond with a single JSON object: {\
\"title\": string, \"summary\": string, \"keyFindings\": [string], \"fields\": [string], \
\"gaps\": [{\"title\": string, \"description\": string, \"severity\": \"low|medium|high|critical\"}], \
\"hypotheses\": [{\"statement\": string, \"rationale\": string, \"novelty\": \"incremental|significant|breakthrough\", \"fields\": [string]}], \
\"experiments\": [{\"title\": string, \"hypothesis\": string, \"method\": string, \"expectedOutcome\": string}], \
\"directions\": [{\"title\": string, \"description\": string, \"potential\": \"low|medium|high\"}], \
\"crossFieldConnections\": [{\"fields\": [string], \"insight\": string, \"suggestedReading\": [string]}], \
\"quickWins\": [{\"title\": string, \"description\": string, \"suggestedReading\": [string]}]}";

pub fn agent<I, S>(depends_on: I) -> AgentDescriptor
where
    I: IntoIterator<Item = S>,
    S: Into<AgentId>,
{
    AgentDescriptor::external(
        ID,
        SYSTEM_PROMPT,
        |ctx| standard_prompt(ctx, "Write the research report."),
        parse_typed::<ResearchReport>,
    )
    .depends_on(depends_on)
    .max_tokens(4096)
    .temperature(0.5)
}
