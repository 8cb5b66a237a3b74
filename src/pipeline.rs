//! The recovery cascade, ordered cheapest/most-precise to most aggressive.
//!
//! Stage failure is the common case here, not an exceptional one, so every
//! stage is an ordinary `Result`-returning function composed with early
//! return. Nothing in this module panics or propagates an error to the
//! caller: the worst outcome is the caller's fallback or a sentinel object.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::extract::{naive_span, scan_structural, unwrap_markdown, Extraction};
use crate::placeholder::detect_placeholders;
use crate::repair::normalize;
use crate::salvage::salvage_or_wrap;
use crate::schema::{coerce, PARSING_ERROR_KEY};
use crate::types::{RecoverOptions, RecoveryAttempt, Stage, StageFailure};

/// Result of a `recover` call. `value` is always usable; `stage` names the
/// cascade stage that produced it; `trace` and `validation_errors` are
/// diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Recovered {
    pub value: Value,
    pub stage: Stage,
    pub trace: Vec<RecoveryAttempt>,
    pub validation_errors: BTreeMap<String, String>,
}

impl Recovered {
    pub fn into_value(self) -> Value {
        self.value
    }
}

/// Convenience wrapper over [`recover`] with default options, returning only
/// the value.
pub fn recover_value(text: &str) -> Value {
    recover(text, &RecoverOptions::default()).value
}

fn strict_parse(candidate: &str) -> Result<Value, StageFailure> {
    serde_json::from_str(candidate).map_err(|e| StageFailure::from_json_error(&e))
}

fn fallback_value(options: &RecoverOptions, reason: &str) -> Value {
    options.fallback.clone().unwrap_or_else(|| {
        let mut map = Map::new();
        map.insert(PARSING_ERROR_KEY.to_string(), Value::String(reason.to_string()));
        Value::Object(map)
    })
}

fn try_markdown(text: &str) -> Result<(Value, &'static str), StageFailure> {
    if let Some(inner) = unwrap_markdown(text) {
        return strict_parse(&inner).map(|v| (v, "code_fence"));
    }
    match naive_span(text) {
        Some(span) => strict_parse(&span).map(|v| (v, "naive_span")),
        None => Err(StageFailure::NoCandidate),
    }
}

fn try_char_scan(extraction: Option<&Extraction>) -> Result<Value, StageFailure> {
    match extraction {
        Some(ex) => strict_parse(&ex.text),
        None => Err(StageFailure::NoCandidate),
    }
}

fn try_normalize(base: &str) -> Result<(Value, String), StageFailure> {
    let n = normalize(base);
    let value = strict_parse(&n.text)?;
    Ok((value, n.fixes.join(",")))
}

fn try_provider(options: &RecoverOptions, base: &str) -> Result<(Value, String), StageFailure> {
    let Some(fixed) = options.provider.second_pass(base) else {
        return Err(StageFailure::Skipped("no provider fix"));
    };
    if let Ok(value) = strict_parse(&fixed) {
        return Ok((value, "provider_fix".to_string()));
    }
    let n = normalize(&fixed);
    let value = strict_parse(&n.text)?;
    Ok((value, format!("provider_fix+{}", n.fixes.join(","))))
}

/// Recovers a structured value from `text`. Never panics and never returns an
/// error: empty input and unresolved template placeholders short-circuit to
/// the fallback, and the salvage stage guarantees a value for everything
/// else. Schema coercion, when configured, runs on whatever the cascade
/// produced; its deviations land in `validation_errors`, not in a failure.
pub fn recover(text: &str, options: &RecoverOptions) -> Recovered {
    let mut trace: Vec<RecoveryAttempt> = Vec::new();

    let trimmed = text.trim_start_matches('\u{FEFF}').trim();
    if trimmed.is_empty() {
        tracing::debug!("empty input, returning fallback");
        let value = options.fallback.clone().unwrap_or_else(|| Value::Object(Map::new()));
        trace.push(RecoveryAttempt::success(
            Stage::Fallback,
            Some("empty input".to_string()),
        ));
        return finish(value, Stage::Fallback, trace, options);
    }

    let (has_placeholders, names) = detect_placeholders(trimmed);
    if has_placeholders {
        tracing::warn!(
            placeholders = %names.join(","),
            "unresolved template placeholders, skipping repair"
        );
        trace.push(RecoveryAttempt {
            stage: Stage::PlaceholderCheck,
            succeeded: false,
            detail: Some(format!("unresolved placeholders: {}", names.join(", "))),
        });
        let value = fallback_value(
            options,
            &format!("unresolved template placeholders: {}", names.join(", ")),
        );
        trace.push(RecoveryAttempt::success(Stage::Fallback, None));
        return finish(value, Stage::Fallback, trace, options);
    }
    trace.push(RecoveryAttempt::success(Stage::PlaceholderCheck, None));

    match strict_parse(trimmed) {
        Ok(value) => {
            trace.push(RecoveryAttempt::success(Stage::DirectParse, None));
            return finish(value, Stage::DirectParse, trace, options);
        }
        Err(f) => trace.push(RecoveryAttempt::failure(Stage::DirectParse, &f)),
    }

    match try_markdown(trimmed) {
        Ok((value, method)) => {
            trace.push(RecoveryAttempt::success(
                Stage::MarkdownUnwrap,
                Some(method.to_string()),
            ));
            return finish(value, Stage::MarkdownUnwrap, trace, options);
        }
        Err(f) => trace.push(RecoveryAttempt::failure(Stage::MarkdownUnwrap, &f)),
    }

    // Prefer the fenced inner text as the base for the aggressive stages; a
    // fence is a stronger signal of where the payload lives than the scan.
    let scan_base = unwrap_markdown(trimmed).unwrap_or_else(|| trimmed.to_string());
    let extraction = scan_structural(&scan_base);

    match try_char_scan(extraction.as_ref()) {
        Ok(value) => {
            let detail = extraction
                .as_ref()
                .map(|ex| format!("{} {}..{}", ex.method, ex.span.0, ex.span.1));
            trace.push(RecoveryAttempt::success(Stage::CharScan, detail));
            return finish(value, Stage::CharScan, trace, options);
        }
        Err(f) => trace.push(RecoveryAttempt::failure(Stage::CharScan, &f)),
    }

    let base = extraction
        .as_ref()
        .map(|ex| ex.text.clone())
        .unwrap_or_else(|| scan_base.clone());

    match try_normalize(&base) {
        Ok((value, fixes)) => {
            trace.push(RecoveryAttempt::success(Stage::Normalize, Some(fixes)));
            return finish(value, Stage::Normalize, trace, options);
        }
        Err(f) => trace.push(RecoveryAttempt::failure(Stage::Normalize, &f)),
    }

    match try_provider(options, &base) {
        Ok((value, detail)) => {
            trace.push(RecoveryAttempt::success(Stage::ProviderPass, Some(detail)));
            return finish(value, Stage::ProviderPass, trace, options);
        }
        Err(f) => trace.push(RecoveryAttempt::failure(Stage::ProviderPass, &f)),
    }

    // Salvage always yields something for non-empty input: matched pairs, or
    // the whole text wrapped under the policy key.
    let value = salvage_or_wrap(trimmed, &options.wrap_key, options.max_depth);
    trace.push(RecoveryAttempt::success(Stage::Salvage, None));
    finish(value, Stage::Salvage, trace, options)
}

fn finish(
    value: Value,
    stage: Stage,
    trace: Vec<RecoveryAttempt>,
    options: &RecoverOptions,
) -> Recovered {
    tracing::debug!(stage = %stage, "recovery finished");
    let (value, validation_errors) = match &options.schema {
        Some(schema) if stage != Stage::Fallback => coerce(&value, schema),
        _ => (value, BTreeMap::new()),
    };
    Recovered {
        value,
        stage,
        trace,
        validation_errors,
    }
}
