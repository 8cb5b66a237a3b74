use serde_json::json;

use jsonsalvage::{recover, recover_value, ProviderHint, RecoverOptions, SchemaSpec, Stage, WrapKeyPolicy};

fn init_logs() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[test]
fn idempotent_on_valid_input() {
    init_logs();
    let values = [
        json!({"a": 1, "b": [true, null, "x"], "c": {"d": 3.5}}),
        json!([1, 2, 3]),
        json!({}),
        json!({"text": "brace in string: { not structure }"}),
    ];
    for v in values {
        let serialized = serde_json::to_string(&v).unwrap();
        assert_eq!(recover_value(&serialized), v);
    }
}

#[test]
fn never_panics_on_garbage() {
    let inputs = [
        "",
        "   \n\t  ",
        "plain prose with no structure at all",
        "{\"a\":",
        "}}}}}]]]",
        "\u{0}\u{1}\u{7}binary-ish\u{1b}[0m",
        "{\"a\": \"unterminated",
        "[[[[[[[[[[",
        "null",
        "tru",
        "```json\n```",
        "{,,,}",
    ];
    for input in inputs {
        let r = recover(input, &RecoverOptions::default());
        assert!(
            r.value.is_object() || r.value.is_array() || input.trim() == "null",
            "input {input:?} produced {:?}",
            r.value
        );
    }
    // deeply nested beyond any parser recursion limit still terminates
    let deep = "{\"n\":".repeat(300);
    let _ = recover_value(&deep);
    let deep_arrays = "[".repeat(5000);
    let _ = recover_value(&deep_arrays);
}

#[test]
fn placeholder_short_circuits_to_fallback() {
    let text = r#"{"a": "{unresolved_var}"}"#;
    let fallback = json!({"status": "default"});
    let opt = RecoverOptions::default().with_fallback(fallback.clone());
    let r = recover(text, &opt);
    assert_eq!(r.stage, Stage::Fallback);
    assert_eq!(r.value, fallback);

    // without a caller fallback the sentinel names the offending placeholder
    let r = recover(text, &RecoverOptions::default());
    let msg = r.value["_parsing_error"].as_str().unwrap();
    assert!(msg.contains("unresolved_var"));
}

#[test]
fn markdown_unwrap() {
    let text = "Here is the result:\n```json\n{\"x\": 1}\n```\nThanks!";
    assert_eq!(recover_value(text), json!({"x": 1}));
}

#[test]
fn single_quotes_and_trailing_commas() {
    assert_eq!(
        recover_value("{'a': 1, 'b': [1,2,3,],}"),
        json!({"a": 1, "b": [1, 2, 3]})
    );
}

#[test]
fn unbalanced_braces_are_closed() {
    let v = recover_value("{\"a\": {\"b\": 1");
    assert_eq!(v["a"]["b"], 1);
}

#[test]
fn brackets_inside_string_values_are_not_structure() {
    let text = "noise {\"code\": \"def f(): return {1:2}\"} trailing noise";
    let v = recover_value(text);
    assert_eq!(v, json!({"code": "def f(): return {1:2}"}));
}

#[test]
fn end_to_end_widget() {
    let text = "I think the answer is:\n\n{\n  name: 'Widget',\n  price: 9.99,\n  tags: ['a','b',],\n}\n\nLet me know if you need changes.";
    assert_eq!(
        recover_value(text),
        json!({"name": "Widget", "price": 9.99, "tags": ["a", "b"]})
    );
}

#[test]
fn empty_input_returns_fallback() {
    let fallback = json!({"kind": "empty"});
    let opt = RecoverOptions::default().with_fallback(fallback.clone());
    assert_eq!(recover("", &opt).value, fallback);
    assert_eq!(recover("  \n ", &opt).value, fallback);
    assert_eq!(recover_value(""), json!({}));
}

#[test]
fn salvage_extracts_pairs_without_any_braces() {
    let text = r#"Summary: "status": "ok" with "count": 2 items done."#;
    let r = recover(text, &RecoverOptions::default());
    assert_eq!(r.stage, Stage::Salvage);
    assert_eq!(r.value["status"], json!("ok"));
    assert_eq!(r.value["count"], json!(2));
}

#[test]
fn unsalvageable_prose_is_wrapped_not_dropped() {
    let prose = "I am sorry, I could not do that.";
    let v = recover_value(prose);
    assert_eq!(v, json!({"content": prose}));

    let req = "The requirements were ambiguous so I stopped.";
    let v = recover_value(req);
    assert_eq!(v["requirements_summary"], json!(req));

    let opt = RecoverOptions::default().with_wrap_key(WrapKeyPolicy::Fixed("raw".into()));
    let v = recover(prose, &opt).value;
    assert_eq!(v, json!({"raw": prose}));
}

#[test]
fn bare_key_survives_comma_colon_inside_string_value() {
    let v = recover_value(r#"{foo: 1, "b": "x, y: z"}"#);
    assert_eq!(v, json!({"foo": 1, "b": "x, y: z"}));
}

#[test]
fn smart_quoted_payload_recovered() {
    let v = recover_value("{\u{201C}status\u{201D}: \u{201C}ok\u{201D}}");
    assert_eq!(v, json!({"status": "ok"}));
}

#[test]
fn commented_payload_recovered() {
    let text = "{\n  // generated\n  \"a\": 1 /* final */\n}";
    assert_eq!(recover_value(text), json!({"a": 1}));
}

#[test]
fn python_literals_recovered() {
    let v = recover_value(r#"{"done": True, "error": None}"#);
    assert_eq!(v, json!({"done": true, "error": null}));
}

#[test]
fn bom_prefix_is_tolerated() {
    let r = recover("\u{FEFF}{\"a\": 1}", &RecoverOptions::default());
    assert_eq!(r.stage, Stage::DirectParse);
    assert_eq!(r.value, json!({"a": 1}));
}

#[test]
fn char_scan_trace_reports_span() {
    let r = recover("{\"a\": 1} oops }", &RecoverOptions::default());
    assert_eq!(r.stage, Stage::CharScan);
    let attempt = r.trace.iter().find(|a| a.stage == Stage::CharScan).unwrap();
    assert_eq!(attempt.detail.as_deref(), Some("char_scan 0..8"));
}

#[test]
fn provider_pass_recloses_truncated_field() {
    // normalize alone turns this into `{"a": 1, "b":}`, which still fails;
    // only the provider strategy knows to add the null sentinel.
    let text = r#"{"a": 1, "b":"#;
    let opt = RecoverOptions::default().with_provider(ProviderHint::from_tag("gpt-4o"));
    let r = recover(text, &opt);
    assert_eq!(r.stage, Stage::ProviderPass);
    assert_eq!(r.value["a"], 1);
    assert!(r.value["b"].is_null());
}

#[test]
fn schema_coercion_applies_to_recovered_value() {
    let schema = SchemaSpec::required(["id", "name"]);
    let opt = RecoverOptions::default().with_schema(schema);
    let r = recover(r#"{"name": "x"}"#, &opt);
    assert_eq!(r.value, json!({"id": null, "name": "x"}));
    assert!(r.validation_errors.contains_key("id"));
}

#[test]
fn trace_records_each_attempted_stage() {
    let r = recover("{'a': 1}", &RecoverOptions::default());
    assert_eq!(r.stage, Stage::Normalize);
    let stages: Vec<Stage> = r.trace.iter().map(|a| a.stage).collect();
    assert!(stages.contains(&Stage::PlaceholderCheck));
    assert!(stages.contains(&Stage::DirectParse));
    assert!(stages.contains(&Stage::Normalize));
    let direct = r.trace.iter().find(|a| a.stage == Stage::DirectParse).unwrap();
    assert!(!direct.succeeded);
    let last = r.trace.last().unwrap();
    assert!(last.succeeded);
}

#[test]
fn fenced_but_broken_payload_still_repaired() {
    let text = "```json\n{'a': [1, 2,\n```";
    let v = recover_value(text);
    assert_eq!(v["a"], json!([1, 2]));
}
