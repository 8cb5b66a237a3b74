use serde::Deserialize;
use serde_json::json;

use jsonsalvage::{coerce, coerce_typed, merge, SchemaSpec};

#[derive(Debug, Deserialize, PartialEq)]
struct TaskPlan {
    id: i64,
    name: String,
}

#[test]
fn coerce_preserves_partial_data() {
    let schema = SchemaSpec::required(["id", "name"]);
    let (out, errors) = coerce(&json!({"name": "x"}), &schema);
    assert_eq!(out, json!({"id": null, "name": "x"}));
    assert_eq!(errors.get("id").unwrap(), "required field missing");
}

#[test]
fn typed_coercion_happy_path() {
    let schema = SchemaSpec::required(["id", "name"]);
    let r = coerce_typed::<TaskPlan>(&json!({"id": 7, "name": "x"}), &schema);
    assert_eq!(
        r.typed,
        Some(TaskPlan {
            id: 7,
            name: "x".to_string()
        })
    );
    assert!(r.errors.is_empty());
}

#[test]
fn typed_coercion_failure_annotates_instead_of_discarding() {
    let schema = SchemaSpec::required(["id", "name"]);
    // id is a string where an integer was wanted
    let r = coerce_typed::<TaskPlan>(&json!({"id": "seven", "name": "x"}), &schema);
    assert!(r.typed.is_none());
    assert_eq!(r.value["id"], json!("seven"));
    assert_eq!(r.value["name"], json!("x"));
    assert_eq!(r.value["_validation_status"], json!("failed"));
    assert!(r.value["_validation_errors"].is_object());
    assert!(r.errors.contains_key("_construct"));
}

#[test]
fn strict_mode_records_dropped_keys() {
    let schema = SchemaSpec::required(["a"]).with_optional(["b"]).strict();
    let (out, errors) = coerce(&json!({"a": 1, "hallucinated": true}), &schema);
    assert_eq!(out, json!({"a": 1}));
    assert_eq!(errors.get("hallucinated").unwrap(), "unexpected field dropped");
}

#[test]
fn merge_fills_gaps_from_secondary() {
    let primary = json!({"design": {"db": "postgres"}, "done": false});
    let secondary = json!({"design": {"cache": "redis"}, "owner": "platform"});
    let merged = merge(&primary, &secondary, false);
    assert_eq!(
        merged,
        json!({
            "design": {"db": "postgres", "cache": "redis"},
            "done": false,
            "owner": "platform"
        })
    );
}

#[test]
fn merge_depth_cap_returns_partial_merge() {
    let mut a = json!({"leaf": "a"});
    let mut b = json!({"leaf": "b"});
    for _ in 0..80 {
        a = json!({ "n": a });
        b = json!({ "n": b });
    }
    // must not overflow the stack; beyond the cap the primary side survives
    let merged = merge(&a, &b, true);
    let mut cursor = &merged;
    for _ in 0..80 {
        cursor = &cursor["n"];
    }
    assert_eq!(cursor["leaf"], json!("a"));
}
