//! 溯源检查：核对报告陈述是否能在输入文献中找到依据

use std::collections::BTreeSet;

use crate::agents::prompts::{bullet_list, render_documents};
use crate::pipeline::{parse_typed, AgentDescriptor};
use crate::report::ResearchReport;
use crate::verification::types::SourceCheck;

pub const SOURCE_AGENT: &str = "source_verifier";

const SYSTEM_PROMPT: &str = "You are a Source Verifier. Check every claim of a research report against the source documents. \
Flag claims that contradict the sources or cannot be traced to them (severity: warning | critical). \
Score trustScore (0-100, how well the report is grounded), fieldAlignment (0-100, whether the report's fields match the known field vocabulary) \
and gapRelevance (0-100, whether identified gaps reflect real limitations of the sources). \
Respond with a single JSON object: \
{\"trustScore\": number, \"hallucinationFlags\": [{\"claim\": string, \"reason\": string, \"severity\": string}], \"fieldAlignment\": number, \"gapRelevance\": number}";

pub fn source_agent(report: &ResearchReport, field_vocabulary: &BTreeSet<String>) -> AgentDescriptor {
    let claims = bullet_list(&report.claims());
    let report_fields = if report.fields.is_empty() {
        "(none)".to_string()
    } else {
        report.fields.join(", ")
    };
    let vocabulary = if field_vocabulary.is_empty() {
        "(none yet)".to_string()
    } else {
        field_vocabulary.iter().cloned().collect::<Vec<_>>().join(", ")
    };

    AgentDescriptor::external(
        SOURCE_AGENT,
        SYSTEM_PROMPT,
        move |ctx| {
            format!(
                "## Source documents\n{}\n\n## Report claims\n{}\n\n## Report fields\n{}\n\n## Known field vocabulary\n{}",
                render_documents(ctx.documents, 2000),
                claims,
                report_fields,
                vocabulary
            )
        },
        parse_typed::<SourceCheck>,
    )
    .temperature(0.1)
    .max_tokens(1500)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::pipeline::{AgentContext, AgentKind};

    #[test]
    fn test_prompt_contains_claims_and_vocabulary() {
        let report = ResearchReport {
            summary: "Transformers scale".into(),
            key_findings: vec!["Loss follows a power law".into()],
            fields: vec!["machine learning".into()],
            ..ResearchReport::default()
        };
        let vocabulary: BTreeSet<String> = ["nlp".to_string()].into_iter().collect();
        let agent = source_agent(&report, &vocabulary);
        let AgentKind::External(call) = &agent.kind else {
            panic!("expected external agent");
        };
        let docs = vec![Document::new("Scaling laws", "We study...")];
        let ctx = AgentContext {
            documents: &docs,
            guidance: "",
            dependencies: Default::default(),
        };
        let prompt = (call.prompt)(&ctx);
        assert!(prompt.contains("- Loss follows a power law"));
        assert!(prompt.contains("nlp"));
        assert!(prompt.contains("machine learning"));
    }
}
