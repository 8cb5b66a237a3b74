//! # jsonsalvage
//!
//! Best-effort recovery of structured JSON from the text an LLM actually
//! returns: fenced markdown, stray prose, single quotes, bare keys, trailing
//! commas, truncated output. The entry points never panic and never return an
//! error; the worst case is a caller-supplied fallback or a sentinel object
//! that still carries the original text.
//!
//! ```rust
//! use serde_json::json;
//!
//! let text = "Here you go:\n```json\n{\"x\": 1}\n```\nThanks!";
//! assert_eq!(jsonsalvage::recover_value(text), json!({"x": 1}));
//!
//! let messy = "{'name': 'Widget', 'tags': ['a','b',],}";
//! assert_eq!(
//!     jsonsalvage::recover_value(messy),
//!     json!({"name": "Widget", "tags": ["a", "b"]})
//! );
//! ```
//!
//! The cascade runs cheapest-first: direct parse, markdown unwrap, a
//! string-aware character scan, textual repair, a provider-specific second
//! pass, and finally regex salvage. Later stages can invent
//! plausible-but-wrong structure, so they only run when everything more
//! precise has failed. "Success" here means a parseable value, not a correct
//! one; callers needing guarantees layer a [`SchemaSpec`] on top and inspect
//! the recorded validation errors.

pub mod extract;
pub mod pipeline;
pub mod placeholder;
pub mod provider;
pub mod repair;
pub mod salvage;
pub mod schema;
pub mod types;

pub use pipeline::{recover, recover_value, Recovered};
pub use placeholder::detect_placeholders;
pub use provider::ProviderHint;
pub use schema::{coerce, coerce_typed, merge, SchemaSpec, TypedCoercion};
pub use types::{RecoverOptions, RecoveryAttempt, Stage, StageFailure, WrapKeyPolicy};
