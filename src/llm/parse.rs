// Copyright 2025 Assistance Micro Design
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Defensive parsing of LLM JSON output.
//!
//! Models routinely wrap JSON in markdown code fences or prepend prose.
//! Decoding strips fences first, then falls back to the outermost brace
//! span. A decode failure activates the caller's fallback branch, never a
//! panic.

use serde::de::DeserializeOwned;

use super::provider::LlmError;

/// Removes a leading/trailing markdown code fence, with or without a
/// language tag.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the language tag line ("json", "JSON", ...) if present
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };

    rest.trim_end()
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

/// Returns the outermost `{ ... }` span, for output with prose around the
/// JSON object.
fn outer_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Decodes a JSON object out of raw LLM output.
///
/// Tries, in order: the fence-stripped text as-is, then its outermost brace
/// span.
pub fn parse_json_object<T: DeserializeOwned>(raw: &str) -> Result<T, LlmError> {
    let stripped = strip_code_fences(raw);

    match serde_json::from_str(stripped) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            if let Some(span) = outer_object(stripped) {
                if let Ok(value) = serde_json::from_str(span) {
                    return Ok(value);
                }
            }
            Err(LlmError::InvalidResponse(format!(
                "JSON decode failed: {}. Output head: {}",
                first_err,
                &stripped[..stripped.len().min(200)]
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        intent: String,
        confidence: f64,
    }

    #[test]
    fn test_strip_plain_text() {
        assert_eq!(strip_code_fences("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_fence_with_language() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_fence_without_language() {
        let raw = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_parse_clean_object() {
        let parsed: Sample =
            parse_json_object(r#"{"intent": "chitchat", "confidence": 0.9}"#).unwrap();
        assert_eq!(parsed.intent, "chitchat");
    }

    #[test]
    fn test_parse_fenced_object() {
        let raw = "```json\n{\"intent\": \"chitchat\", \"confidence\": 0.9}\n```";
        let parsed: Sample = parse_json_object(raw).unwrap();
        assert_eq!(parsed.confidence, 0.9);
    }

    #[test]
    fn test_parse_object_with_surrounding_prose() {
        let raw = "Here is my answer:\n{\"intent\": \"chitchat\", \"confidence\": 0.5}\nHope that helps!";
        let parsed: Sample = parse_json_object(raw).unwrap();
        assert_eq!(parsed.intent, "chitchat");
    }

    #[test]
    fn test_parse_garbage_fails() {
        let result: Result<Sample, _> = parse_json_object("definitely not json");
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }
}
