//! Tool-call interpretation.
//!
//! Backends report tool calls in whatever shape their provider emits. This
//! module classifies a [`RawToolCall`] into one of a fixed set of shapes and
//! normalizes it to a [`ToolInvocationRequest`]. Interpretation never fails:
//! when nothing usable can be extracted, a call that mentions retrieval
//! becomes a retrieval of the user's own message, and anything else comes
//! back with an empty tool name.

use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};

use journal_core::defaults::{QUERY_ARGUMENT, RETRIEVE_KEYWORD, RETRIEVE_TOOL_NAME};
use journal_core::{FunctionPayload, RawToolCall, ToolInvocationRequest};

/// Recognized tool-call layouts, in resolution priority order.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCallShape<'a> {
    /// `{"name": ..., "args": {...}}`
    DirectMapping {
        name: &'a str,
        args: Option<&'a JsonValue>,
    },
    /// `{"function": {"name": ..., "arguments": "..." | {...}}}`
    NestedFunctionMapping {
        name: Option<&'a str>,
        arguments: Option<&'a JsonValue>,
    },
    /// Object with `name` and `args` attributes.
    AttributeObject {
        name: &'a str,
        args: Option<&'a JsonValue>,
    },
    /// Object whose `function` attribute is a mapping or another object.
    NestedAttributeObject {
        name: Option<&'a str>,
        arguments: Option<&'a JsonValue>,
    },
    Unrecognized,
}

impl ToolCallShape<'_> {
    pub fn label(&self) -> &'static str {
        match self {
            Self::DirectMapping { .. } => "direct_mapping",
            Self::NestedFunctionMapping { .. } => "nested_function_mapping",
            Self::AttributeObject { .. } => "attribute_object",
            Self::NestedAttributeObject { .. } => "nested_attribute_object",
            Self::Unrecognized => "unrecognized",
        }
    }
}

fn non_empty_str(value: Option<&JsonValue>) -> Option<&str> {
    value.and_then(JsonValue::as_str).filter(|s| !s.is_empty())
}

fn present(value: Option<&JsonValue>) -> Option<&JsonValue> {
    value.filter(|v| !v.is_null())
}

/// Classify a raw tool call.
pub fn classify(raw: &RawToolCall) -> ToolCallShape<'_> {
    match raw {
        RawToolCall::Mapping(value) => {
            let Some(map) = value.as_object() else {
                return ToolCallShape::Unrecognized;
            };
            let function = map.get("function").and_then(JsonValue::as_object);
            if let Some(name) = non_empty_str(map.get("name")) {
                return ToolCallShape::DirectMapping {
                    name,
                    args: present(map.get("args")).or_else(|| present(map.get("arguments"))),
                };
            }
            match function {
                Some(function) => ToolCallShape::NestedFunctionMapping {
                    name: non_empty_str(function.get("name")),
                    arguments: present(map.get("arguments"))
                        .or_else(|| present(function.get("arguments"))),
                },
                None => ToolCallShape::Unrecognized,
            }
        }
        RawToolCall::Object(obj) => {
            if let Some(name) = obj.name.as_deref().filter(|n| !n.is_empty()) {
                return ToolCallShape::AttributeObject {
                    name,
                    args: present(obj.args.as_ref()),
                };
            }
            match &obj.function {
                Some(FunctionPayload::Mapping(value)) => ToolCallShape::NestedAttributeObject {
                    name: non_empty_str(value.get("name")),
                    arguments: present(value.get("arguments")),
                },
                Some(FunctionPayload::Object(attr)) => ToolCallShape::NestedAttributeObject {
                    name: attr.name.as_deref().filter(|n| !n.is_empty()),
                    arguments: present(attr.arguments.as_ref()),
                },
                None => ToolCallShape::Unrecognized,
            }
        }
    }
}

/// Decode an arguments payload into a mapping.
///
/// JSON-encoded strings are decoded; a string that does not decode to an
/// object is taken as the query itself.
pub fn decode_arguments(value: Option<&JsonValue>) -> Map<String, JsonValue> {
    match value {
        None | Some(JsonValue::Null) => Map::new(),
        Some(JsonValue::Object(map)) => map.clone(),
        Some(JsonValue::String(s)) if s.trim().is_empty() => Map::new(),
        Some(JsonValue::String(s)) => match serde_json::from_str::<JsonValue>(s) {
            Ok(JsonValue::Object(map)) => map,
            _ => {
                debug!("Tool arguments are not a JSON object, using them as the query");
                let mut map = Map::new();
                map.insert(QUERY_ARGUMENT.to_string(), JsonValue::String(s.clone()));
                map
            }
        },
        Some(other) => {
            warn!(arguments = %other, "Ignoring tool arguments of unexpected type");
            Map::new()
        }
    }
}

/// Normalize a raw tool call, defaulting missing retrieval queries to
/// `fallback_query`.
pub fn interpret(raw: &RawToolCall, fallback_query: &str) -> ToolInvocationRequest {
    let shape = classify(raw);
    let label = shape.label();

    let (name, args) = match shape {
        ToolCallShape::DirectMapping { name, args }
        | ToolCallShape::AttributeObject { name, args } => (name, args),
        ToolCallShape::NestedFunctionMapping { name, arguments }
        | ToolCallShape::NestedAttributeObject { name, arguments } => {
            (name.unwrap_or_default(), arguments)
        }
        ToolCallShape::Unrecognized => {
            warn!(raw = %raw, "Unrecognized tool call shape");
            ("", None)
        }
    };
    let mut tool_name = name.to_string();
    let mut arguments = decode_arguments(args);

    if tool_name.is_empty() && raw.to_string().to_lowercase().contains(RETRIEVE_KEYWORD) {
        warn!(shape = label, "Tool name missing, defaulting to retrieval");
        tool_name = RETRIEVE_TOOL_NAME.to_string();
        if arguments.is_empty() {
            arguments.insert(
                QUERY_ARGUMENT.to_string(),
                JsonValue::String(fallback_query.to_string()),
            );
        }
    }

    if tool_name == RETRIEVE_TOOL_NAME && !arguments.contains_key(QUERY_ARGUMENT) {
        debug!("Retrieval call without a query, using the user message");
        arguments.insert(
            QUERY_ARGUMENT.to_string(),
            JsonValue::String(fallback_query.to_string()),
        );
    }

    debug!(shape = label, tool_name = %tool_name, "Interpreted tool call");
    ToolInvocationRequest::new(tool_name, arguments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use journal_core::{FunctionAttr, ToolCallObject};
    use serde_json::json;

    fn four_shapes() -> Vec<RawToolCall> {
        vec![
            RawToolCall::Mapping(json!({
                "name": "retrieve_entries",
                "args": {"query": "x"},
            })),
            RawToolCall::Mapping(json!({
                "function": {"name": "retrieve_entries", "arguments": "{\"query\": \"x\"}"},
            })),
            RawToolCall::Object(ToolCallObject {
                name: Some("retrieve_entries".to_string()),
                args: Some(json!({"query": "x"})),
                ..Default::default()
            }),
            RawToolCall::Object(ToolCallObject {
                function: Some(FunctionPayload::Object(FunctionAttr {
                    name: Some("retrieve_entries".to_string()),
                    arguments: Some(json!({"query": "x"})),
                })),
                ..Default::default()
            }),
        ]
    }

    // =========================================================================
    // classification
    // =========================================================================

    #[test]
    fn test_classify_four_shapes() {
        let labels: Vec<&str> = four_shapes().iter().map(|r| classify(r).label()).collect();
        assert_eq!(
            labels,
            vec![
                "direct_mapping",
                "nested_function_mapping",
                "attribute_object",
                "nested_attribute_object",
            ]
        );
    }

    #[test]
    fn test_classify_unrecognized() {
        assert_eq!(
            classify(&RawToolCall::Mapping(json!("retrieve please"))),
            ToolCallShape::Unrecognized
        );
        assert_eq!(
            classify(&RawToolCall::Mapping(json!({"id": "1"}))),
            ToolCallShape::Unrecognized
        );
        assert_eq!(
            classify(&RawToolCall::Object(ToolCallObject::default())),
            ToolCallShape::Unrecognized
        );
    }

    #[test]
    fn test_direct_name_wins_over_function() {
        let raw = RawToolCall::Mapping(json!({
            "name": "retrieve_entries",
            "function": {"name": "other"},
        }));
        assert!(matches!(
            classify(&raw),
            ToolCallShape::DirectMapping { name: "retrieve_entries", .. }
        ));
    }

    // =========================================================================
    // interpretation
    // =========================================================================

    #[test]
    fn test_four_shapes_yield_identical_request() {
        let expected = ToolInvocationRequest::retrieval("x");
        for raw in four_shapes() {
            assert_eq!(interpret(&raw, "user message"), expected, "shape {}", raw);
        }
    }

    #[test]
    fn test_unrecognized_with_keyword_sniffs_retrieval() {
        let raw = RawToolCall::Mapping(json!({"id": "call_9", "type": "retrieve_stuff"}));
        let request = interpret(&raw, "what did I write about dogs?");
        assert_eq!(
            request,
            ToolInvocationRequest::retrieval("what did I write about dogs?")
        );
    }

    #[test]
    fn test_unrecognized_without_keyword_has_empty_name() {
        let raw = RawToolCall::Mapping(json!({"id": "call_1", "type": "mystery"}));
        let request = interpret(&raw, "hello");
        assert!(request.tool_name.is_empty());
        assert!(request.arguments.is_empty());
    }

    #[test]
    fn test_missing_query_is_injected() {
        let raw = RawToolCall::Mapping(json!({"name": "retrieve_entries", "args": {"limit": 3}}));
        let request = interpret(&raw, "fallback");
        assert_eq!(request.query(), Some("fallback"));
        assert_eq!(request.arguments["limit"], 3);
    }

    #[test]
    fn test_undecodable_argument_string_becomes_query() {
        let raw = RawToolCall::Mapping(json!({
            "function": {"name": "retrieve_entries", "arguments": "hiking trips"},
        }));
        assert_eq!(interpret(&raw, "fallback").query(), Some("hiking trips"));
    }

    #[test]
    fn test_top_level_arguments_honoured() {
        let raw = RawToolCall::Mapping(json!({
            "function": {"name": "retrieve_entries"},
            "arguments": "{\"query\": \"garden\"}",
        }));
        assert_eq!(interpret(&raw, "fallback").query(), Some("garden"));
    }

    #[test]
    fn test_nested_function_mapping_on_object() {
        let raw = RawToolCall::Object(ToolCallObject {
            id: Some("call_2".to_string()),
            function: Some(FunctionPayload::Mapping(json!({
                "name": "retrieve_entries",
                "arguments": "{\"query\": \"x\"}",
            }))),
            ..Default::default()
        });
        assert_eq!(interpret(&raw, "m"), ToolInvocationRequest::retrieval("x"));
    }

    #[test]
    fn test_nameless_function_with_keyword() {
        let raw = RawToolCall::Object(ToolCallObject {
            function: Some(FunctionPayload::Object(FunctionAttr {
                name: None,
                arguments: Some(json!({"query": "kept"})),
            })),
            id: Some("retrieve-1".to_string()),
            ..Default::default()
        });
        let request = interpret(&raw, "m");
        assert!(request.is_retrieval());
        assert_eq!(request.query(), Some("kept"));
    }

    #[test]
    fn test_other_tool_passes_through() {
        let raw = RawToolCall::Mapping(json!({"name": "get_weather", "args": {"city": "Oslo"}}));
        let request = interpret(&raw, "m");
        assert_eq!(request.tool_name, "get_weather");
        assert!(request.query().is_none());
    }
}
