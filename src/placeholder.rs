//! Detection of unresolved prompt-template placeholders.
//!
//! A `{variable_name}` token surviving into model output means a prompt
//! substitution never happened upstream: the text is missing data, not
//! malformed JSON, and repair would only fabricate structure. The detector
//! runs before any parse attempt so the pipeline can short-circuit to its
//! fallback.

use regex::Regex;
use std::sync::LazyLock;

static DOUBLE_BRACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap());
static PERCENT_BRACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{%\s*([A-Za-z_][A-Za-z0-9_]*)\s*%\}").unwrap());
static SINGLE_BRACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}").unwrap());

/// Identifiers that legitimately appear as lone keys in real JSON. A match on
/// one of these alone is treated as a false positive.
const COMMON_JSON_FIELDS: &[&str] = &[
    "id",
    "name",
    "type",
    "value",
    "key",
    "data",
    "items",
    "properties",
    "result",
];

/// Substitution variables the surrounding pipeline passes between agent
/// stages. Seeing one of these is deterministic evidence of a broken template,
/// so they are flagged even when they collide with the common-field list.
const PIPELINE_VARIABLES: &[&str] = &[
    "business_requirements",
    "requirements_analysis",
    "tech_stack",
    "system_design",
    "project_plan",
    "code_context",
    "test_results",
    "review_feedback",
];

fn is_common_field(name: &str) -> bool {
    COMMON_JSON_FIELDS.contains(&name)
}

fn is_pipeline_variable(name: &str) -> bool {
    PIPELINE_VARIABLES.contains(&name)
}

/// Scans `text` for unresolved placeholders in the four template syntaxes
/// (`{name}`, `{ name }`, `{{name}}`, `{% name %}`). Returns whether any were
/// found and the deduplicated names, in order of first appearance. Names on
/// the common-JSON-field list are filtered out unless they are also known
/// pipeline variables.
pub fn detect_placeholders(text: &str) -> (bool, Vec<String>) {
    let mut names: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        if is_common_field(name) && !is_pipeline_variable(name) {
            return;
        }
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    };

    for re in [&*DOUBLE_BRACE_RE, &*PERCENT_BRACE_RE, &*SINGLE_BRACE_RE] {
        for caps in re.captures_iter(text) {
            push(&caps[1]);
        }
    }

    (!names.is_empty(), names)
}
