//! discover 流水线：领域索引（本地）→ 版图 → 空白 → 假设 → 实验 → 报告

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::agents::prompts::standard_prompt;
use crate::agents::scribe;
use crate::document::normalize_key;
use crate::pipeline::{parse_json_object, AgentContext, AgentDescriptor, Pipeline, PipelineError};

pub const NAME: &str = "discover";

const CARTOGRAPHER_PROMPT: &str = "You are the Cartographer. Map the research landscape of the documents: \
main themes, how the fields relate, and which areas are crowded or sparse. Use the field index as a starting point. \
Respond with a single JSON object: {\"themes\": [string], \"fields\": [string], \"crowded\": [string], \"sparse\": [string]}";

const GAP_HUNTER_PROMPT: &str = "You are the Gap Hunter. Find open problems and under-explored intersections \
in the landscape map. \
Respond with a single JSON object: {\"gaps\": [{\"title\": string, \"description\": string, \"severity\": \"low|medium|high|critical\"}]}";

const HYPOTHESIST_PROMPT: &str = "You are the Hypothesist. Turn the most promising gaps into testable hypotheses, \
preferring ones that connect different fields. \
Respond with a single JSON object: {\"hypotheses\": [{\"statement\": string, \"rationale\": string, \"novelty\": \"incremental|significant|breakthrough\", \"fields\": [string]}]}";

const EXPERIMENTER_PROMPT: &str = "You are the Experimenter. Design a minimal experiment for each hypothesis. \
Respond with a single JSON object: {\"experiments\": [{\"title\": string, \"hypothesis\": string, \"method\": string, \"expectedOutcome\": string}]}";

/// 本地 Agent：按领域标签统计文献
fn field_index(ctx: &AgentContext<'_>) -> Result<Value, String> {
    let mut index: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut untagged = Vec::new();
    for doc in ctx.documents {
        let fields: Vec<String> = doc
            .fields
            .iter()
            .map(|f| normalize_key(f))
            .filter(|f| !f.is_empty())
            .collect();
        if fields.is_empty() {
            untagged.push(doc.title.clone());
        }
        for field in fields {
            index.entry(field).or_default().push(doc.title.clone());
        }
    }
    Ok(json!({
        "fields": index,
        "untagged": untagged,
        "documentCount": ctx.documents.len(),
    }))
}

pub fn agents() -> Vec<AgentDescriptor> {
    vec![
        AgentDescriptor::local("field_index", field_index),
        AgentDescriptor::external(
            "cartographer",
            CARTOGRAPHER_PROMPT,
            |ctx| standard_prompt(ctx, "Map the research landscape."),
            parse_json_object,
        )
        .depends_on(["field_index"]),
        AgentDescriptor::external(
            "gap_hunter",
            GAP_HUNTER_PROMPT,
            |ctx| standard_prompt(ctx, "Identify research gaps."),
            parse_json_object,
        )
        .depends_on(["cartographer"]),
        AgentDescriptor::external(
            "hypothesist",
            HYPOTHESIST_PROMPT,
            |ctx| standard_prompt(ctx, "Propose hypotheses."),
            parse_json_object,
        )
        .depends_on(["gap_hunter", "cartographer"])
        .temperature(0.9),
        AgentDescriptor::external(
            "experimenter",
            EXPERIMENTER_PROMPT,
            |ctx| standard_prompt(ctx, "Design experiments."),
            parse_json_object,
        )
        .depends_on(["hypothesist"]),
        scribe::agent([
            "field_index",
            "cartographer",
            "gap_hunter",
            "hypothesist",
            "experimenter",
        ]),
    ]
}

pub fn pipeline() -> Result<Pipeline, PipelineError> {
    Pipeline::new(NAME, agents(), scribe::ID)
}
