//! replicate 流水线：精读 → 方法 / 批判 → 复现实验设计 → 报告
//!
//! reader ─┬─ methodologist ─┬─ experimenter ─┐
//!         └─ critic ────────┘                ├─ scribe
//! （scribe 依赖全部四个 Agent）

use crate::agents::prompts::standard_prompt;
use crate::agents::scribe;
use crate::pipeline::{parse_json_object, AgentDescriptor, Pipeline, PipelineError};

pub const NAME: &str = "replicate";

const READER_PROMPT: &str = "You are the Reader, a careful research analyst. \
Extract the core claims, methods, datasets and reported results of the documents. \
Respond with a single JSON object: {\"claims\": [string], \"methods\": [string], \"datasets\": [string], \"results\": [string], \"fields\": [string]}";

const METHODOLOGIST_PROMPT: &str = "You are the Methodologist. Using the Reader's extraction, \
assess the experimental design: controls, sample sizes, statistical treatment and reproducibility risks. \
Respond with a single JSON object: {\"design\": string, \"strengths\": [string], \"weaknesses\": [string], \"reproducibilityRisks\": [string]}";

const CRITIC_PROMPT: &str = "You are the Critic. Challenge the documents' claims: \
identify unsupported conclusions, confounders, missing baselines and open gaps. \
Respond with a single JSON object: {\"concerns\": [string], \"gaps\": [{\"title\": string, \"description\": string, \"severity\": \"low|medium|high|critical\"}]}";

const EXPERIMENTER_PROMPT: &str = "You are the Experimenter. Design replication and follow-up experiments \
that address the Methodologist's risks and the Critic's concerns. \
Respond with a single JSON object: {\"experiments\": [{\"title\": string, \"hypothesis\": string, \"method\": string, \"expectedOutcome\": string}]}";

pub fn agents() -> Vec<AgentDescriptor> {
    vec![
        AgentDescriptor::external(
            "reader",
            READER_PROMPT,
            |ctx| standard_prompt(ctx, "Extract the claims, methods, datasets and results."),
            parse_json_object,
        )
        .temperature(0.3),
        AgentDescriptor::external(
            "methodologist",
            METHODOLOGIST_PROMPT,
            |ctx| standard_prompt(ctx, "Assess the methodology and reproducibility."),
            parse_json_object,
        )
        .depends_on(["reader"]),
        AgentDescriptor::external(
            "critic",
            CRITIC_PROMPT,
            |ctx| standard_prompt(ctx, "List concerns and research gaps."),
            parse_json_object,
        )
        .depends_on(["reader"]),
        AgentDescriptor::external(
            "experimenter",
            EXPERIMENTER_PROMPT,
            |ctx| standard_prompt(ctx, "Propose concrete experiments."),
            parse_json_object,
        )
        .depends_on(["methodologist", "critic"]),
        scribe::agent(["reader", "methodologist", "critic", "experimenter"]),
    ]
}

pub fn pipeline() -> Result<Pipeline, PipelineError> {
    Pipeline::new(NAME, agents(), scribe::ID)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replicate_order() {
        let pipeline = pipeline().unwrap();
        assert_eq!(
            pipeline.execution_order(),
            vec!["reader", "methodologist", "critic", "experimenter", "scribe"]
        );
        assert_eq!(pipeline.report_agent(), "scribe");
        assert!(pipeline.agents().iter().all(|a| a.is_external_call()));
    }
}
