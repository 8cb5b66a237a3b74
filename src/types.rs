use serde_json::Value;
use thiserror::Error;

use crate::provider::ProviderHint;
use crate::schema::SchemaSpec;

/// One stage of the recovery cascade, ordered cheapest to most aggressive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PlaceholderCheck,
    DirectParse,
    MarkdownUnwrap,
    CharScan,
    Normalize,
    ProviderPass,
    Salvage,
    Fallback,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::PlaceholderCheck => "placeholder_check",
            Stage::DirectParse => "direct_parse",
            Stage::MarkdownUnwrap => "markdown_unwrap",
            Stage::CharScan => "char_scan",
            Stage::Normalize => "normalize",
            Stage::ProviderPass => "provider_pass",
            Stage::Salvage => "salvage",
            Stage::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a cascade stage failed to produce a value. Carried in the trace for
/// diagnostics; never propagated out of the public API.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StageFailure {
    #[error("no structural candidate found")]
    NoCandidate,
    #[error("parse error at line {line}, column {column}: {message}")]
    Parse {
        message: String,
        line: usize,
        column: usize,
    },
    #[error("stage not applicable: {0}")]
    Skipped(&'static str),
}

impl StageFailure {
    pub fn from_json_error(err: &serde_json::Error) -> Self {
        StageFailure::Parse {
            message: err.to_string(),
            line: err.line(),
            column: err.column(),
        }
    }
}

/// Record of one stage attempt. A list of these forms the recovery trace,
/// which is diagnostic only and never affects the returned value.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryAttempt {
    pub stage: Stage,
    pub succeeded: bool,
    pub detail: Option<String>,
}

impl RecoveryAttempt {
    pub fn success(stage: Stage, detail: Option<String>) -> Self {
        Self {
            stage,
            succeeded: true,
            detail,
        }
    }

    pub fn failure(stage: Stage, failure: &StageFailure) -> Self {
        Self {
            stage,
            succeeded: false,
            detail: Some(failure.to_string()),
        }
    }
}

/// Key used when salvage finds nothing structured and the raw text is wrapped
/// wholesale. `Auto` keeps the keyword sniff of the surrounding pipeline:
/// text that reads like a requirements narrative goes under
/// `requirements_summary`, everything else under `content`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WrapKeyPolicy {
    Auto,
    Fixed(String),
}

impl WrapKeyPolicy {
    pub fn key_for(&self, text: &str) -> String {
        match self {
            WrapKeyPolicy::Fixed(key) => key.clone(),
            WrapKeyPolicy::Auto => {
                let lower = text.to_lowercase();
                if lower.contains("requirement")
                    || lower.contains("user stor")
                    || lower.contains("acceptance criteria")
                {
                    "requirements_summary".to_string()
                } else {
                    "content".to_string()
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecoverOptions {
    pub provider: ProviderHint,
    pub schema: Option<SchemaSpec>,
    pub fallback: Option<Value>,
    pub wrap_key: WrapKeyPolicy,
    /// Recursion cap for nested salvage. Merge uses the same default.
    pub max_depth: usize,
}

impl Default for RecoverOptions {
    fn default() -> Self {
        Self {
            provider: ProviderHint::Unknown,
            schema: None,
            fallback: None,
            wrap_key: WrapKeyPolicy::Auto,
            max_depth: crate::schema::DEFAULT_MAX_DEPTH,
        }
    }
}

impl RecoverOptions {
    pub fn with_provider(mut self, provider: ProviderHint) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_schema(mut self, schema: SchemaSpec) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_fallback(mut self, fallback: Value) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_wrap_key(mut self, policy: WrapKeyPolicy) -> Self {
        self.wrap_key = policy;
        self
    }
}
