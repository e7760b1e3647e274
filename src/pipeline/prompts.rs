use std::fmt::Write;

use crate::llm::sanitize_for_prompt;
use crate::models::{Idea, RequirementVersion};

pub const SEARCH_SYSTEM: &str = "\
You are a project assistant. Answer the question using the provided context. \
Be clear, concise and helpful. If the context does not contain enough \
information to answer, say so.";

pub const IDEAS_SYSTEM: &str = "\
You are an expert product analyst and requirements engineer.

Extract zero or more actionable ideas from the user's text. Every idea must be:
- directly relevant to the PROJECT CONTEXT;
- clear, specific and feasible within that context;
- new with respect to the ideas and requirements the context already lists;
- categorized and scored.

Rules:
1. Stay within the PROJECT CONTEXT. Do not invent capabilities it does not describe.
2. If an idea or requirement already covers a concept, do not repeat it. Only refine it when the refinement is meaningful.
3. Ignore unrelated, unclear or joking content.
4. Return nothing unless an idea clearly contributes to the described system.
5. Judge each idea against the project's capacity and constraints.

Scoring (ICE):
- impact (0-10): expected benefit to the system or its users.
- confidence (0-10): how certain it is to succeed without large changes in cost or capacity.
- effort (1-10): work required, 1 trivial, 10 massive.
- priority: LOW, MEDIUM, HIGH or CRITICAL, based on value.";

pub const REQUIREMENTS_SYSTEM: &str = "\
You are an expert requirements engineer and product analyst. Convert ideas \
into clear, actionable, testable requirements.

Use the project context (documents, ideas, existing requirements) to:
1. avoid conflicts with existing requirements;
2. reference dependencies on other requirements;
3. stay consistent with project goals and constraints.

For each requirement:
- title it in standard requirement form (\"The system shall ...\");
- describe it in detail, with acceptance criteria;
- reuse existing categories where they fit;
- choose the requirement type;
- list conflicts and dependencies with existing requirements;
- set priority from 1 (critical) to 5 (nice to have);
- start in DRAFT status.

A good requirement is specific, measurable, testable, unambiguous and \
consistent with the others.";

pub const CHANGE_REQUEST_SYSTEM: &str = "\
You are an expert requirements engineer and change management analyst. \
Assess the impact of a proposed change to a requirement.

Use the project context (documents, ideas, existing requirements) to:
1. identify requirements the change may affect;
2. identify related ideas;
3. assess technical feasibility and risk;
4. estimate the effort required, from 1 (minimal) to 10 (massive);
5. evaluate the benefits;
6. recommend approving, rejecting or modifying the change.

Be thorough about dependencies and conflicts, weigh both technical and \
business impact, and keep the recommendation actionable.";

pub fn search_user(query: &str, context: &str) -> String {
    format!(
        "Question: {}\n\nContext:\n{context}\n\nAnswer the question based on the context above.",
        sanitize_for_prompt(query)
    )
}

pub fn ideas_user(text: &str, context: &str) -> String {
    format!(
        "User text:\n{}\n\n---\n\n\
         Extract the actionable ideas discussed in the user text that are directly \
         relevant to the project context.\n\n---\n\n\
         # Project Context:\n{context}\n",
        sanitize_for_prompt(text)
    )
}

/// Ideas rendered as plain text, used both for query expansion and in the
/// requirement prompt.
pub fn ideas_text(ideas: &[Idea]) -> String {
    let mut out = String::new();
    for (i, idea) in ideas.iter().enumerate() {
        let _ = write!(out, "{}. {idea}", i + 1);
    }
    sanitize_for_prompt(&out)
}

pub fn requirements_user(ideas_text: &str, context: &str) -> String {
    format!(
        "# Ideas to Convert:\n{ideas_text}\n---\n\n\
         # Project Context:\n{context}\n\n---\n\n\
         Based on the ideas and the project context, write formal requirements.\n\
         - Turn each idea into a clear, testable requirement with acceptance criteria.\n\
         - Set priority from the idea's priority and ICE score.\n\
         - Name conflicts with existing requirements and dependencies on other requirements or ideas.\n\
         - Use categories from existing requirements where they apply.\n\n\
         Before answering, check that each requirement is technically feasible within the \
         project's constraints, can be verified, and is specific enough to implement.\n"
    )
}

/// One requirement version as a markdown block.
pub fn version_block(heading: &str, v: &RequirementVersion) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "## {heading}:");
    let _ = writeln!(out, "**Title:** {}", v.title.as_deref().unwrap_or("Untitled"));
    let _ = writeln!(out, "**Category:** {}", v.category);
    let _ = writeln!(out, "**Type:** {}", v.req_type);
    let _ = writeln!(out, "**Status:** {}", v.status);
    let _ = writeln!(out, "**Priority:** {}", v.priority);
    let _ = writeln!(out, "**Description:**\n{}", v.description.as_deref().unwrap_or_default());
    if let Some(deps) = v.dependencies.as_deref().filter(|s| !s.is_empty()) {
        let _ = writeln!(out, "**Dependencies:** {deps}");
    }
    if let Some(conflicts) = v.conflicts.as_deref().filter(|s| !s.is_empty()) {
        let _ = writeln!(out, "**Conflicts:** {conflicts}");
    }
    sanitize_for_prompt(&out)
}

/// Short description of a change, used as query-expansion input.
pub fn change_text(base: &RequirementVersion, proposed: &RequirementVersion) -> String {
    format!(
        "Base version:\n{}\nProposed version:\n{}",
        version_block("Current Version", base),
        version_block("Proposed Version", proposed)
    )
}

pub fn change_request_user(
    base: &RequirementVersion,
    proposed: &RequirementVersion,
    context: &str,
) -> String {
    format!(
        "# Change Analysis Request:\n\n{}\n---\n\n{}\n---\n\n\
         # Project Context:\n{context}\n\n---\n\n\
         Analyze the change from the current version to the proposed version and cover:\n\
         1. Impact summary: what is changing and why it matters.\n\
         2. Affected requirements and related ideas.\n\
         3. Estimated effort from 1 to 10, including testing and documentation.\n\
         4. Risks and technical challenges.\n\
         5. Benefits.\n\
         6. Recommendation: approve, reject or modify, with reasons.\n\n\
         Put the cost analysis in `cost`, the benefits in `benefit`, and the impact \
         summary, risks and recommendation in `summary`.\n",
        version_block("Current Version (Base)", base),
        version_block("Proposed Version (New)", proposed),
    )
}
