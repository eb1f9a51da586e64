// src/services/generation/parse.rs

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

use super::GenerationError;

/// Markdown code fence lines, with or without a `json` tag.
static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json|JSON)?[ \t]*\r?\n?").expect("fence pattern is valid"));

/// Removes markdown code fences around a model reply.
pub fn strip_fences(raw: &str) -> String {
    FENCE.replace_all(raw, "").trim().to_string()
}

/// Parses a model reply as a JSON array of `T`.
///
/// Shared by every generation path; callers decide whether an error means
/// "nothing produced" or a hard failure.
pub fn parse_model_array<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>, GenerationError> {
    let cleaned = strip_fences(raw);
    if cleaned.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }

    let value: serde_json::Value = serde_json::from_str(&cleaned)
        .map_err(|e| GenerationError::Malformed(format!("reply is not JSON: {e}")))?;

    if !value.is_array() {
        return Err(GenerationError::Malformed(
            "reply is not a JSON array".to_string(),
        ));
    }

    serde_json::from_value(value)
        .map_err(|e| GenerationError::Malformed(format!("unexpected item shape: {e}")))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        title: String,
    }

    #[test]
    fn test_parses_fenced_array() {
        let raw = "```json\n[{\"title\": \"GST council meets\"}]\n```";
        let items: Vec<Item> = parse_model_array(raw).unwrap();
        assert_eq!(items, vec![Item { title: "GST council meets".to_string() }]);
    }

    #[test]
    fn test_parses_bare_array_with_untagged_fence() {
        let raw = "```\n[]\n```\n";
        let items: Vec<Item> = parse_model_array(raw).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_rejects_prose() {
        let result: Result<Vec<Item>, _> = parse_model_array("Sure! Here are your questions.");
        assert!(matches!(result, Err(GenerationError::Malformed(_))));
    }

    #[test]
    fn test_rejects_object() {
        let result: Result<Vec<Item>, _> = parse_model_array("{\"title\": \"x\"}");
        assert!(matches!(result, Err(GenerationError::Malformed(_))));
    }

    #[test]
    fn test_rejects_blank_reply() {
        let result: Result<Vec<Item>, _> = parse_model_array("```json\n```");
        assert!(matches!(result, Err(GenerationError::EmptyResponse)));
    }
}
