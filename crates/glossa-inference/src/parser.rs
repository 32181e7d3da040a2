//! Recovery of `{content, tags}` from loosely structured model replies.
//!
//! Models asked for "JSON only" still wrap the object in a Markdown code
//! fence now and then, or return `content` as a nested object instead of a
//! string. [`parse_processed_content`] accepts all of those shapes.

use serde::Deserialize;
use serde_json::Value;
use tracing::trace;

use glossa_core::{Error, ProcessedContent, Result};

const CODE_FENCE: &str = "```";

/// Lenient view used for the direct decoding attempt.
#[derive(Deserialize)]
struct DirectReply {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tags: Vec<String>,
}

/// Parse a model reply into [`ProcessedContent`].
///
/// 1. A reply starting with a code fence is cut down to the span from the
///    first `{` to the last `}` (left untouched if there is no such pair).
/// 2. The text is decoded directly; the result is kept only when `content`
///    is non-empty and at least one tag is present.
/// 3. Otherwise the text is decoded as a JSON object: a string `content` is
///    used verbatim, an object `content` is re-serialized as indented JSON,
///    and `tags` keeps only its string elements (missing or non-list tags
///    give an empty list).
///
/// Empty `content` is legal here; callers decide whether it is a failure.
pub fn parse_processed_content(reply: &str) -> Result<ProcessedContent> {
    let text = strip_code_fence(reply);

    if let Ok(direct) = serde_json::from_str::<DirectReply>(text) {
        if !direct.content.is_empty() && !direct.tags.is_empty() {
            return Ok(ProcessedContent {
                content: direct.content,
                tags: direct.tags,
            });
        }
    }

    trace!(response_len = text.len(), "Direct decode rejected, using flexible parse");

    let raw: serde_json::Map<String, Value> = serde_json::from_str(text)
        .map_err(|e| Error::Parse(format!("failed to parse LLM response: {}", e)))?;

    let content = match raw.get("content") {
        Some(Value::String(s)) => s.clone(),
        Some(obj @ Value::Object(_)) => serde_json::to_string_pretty(obj)
            .map_err(|e| Error::Parse(format!("failed to process content object: {}", e)))?,
        Some(_) => {
            return Err(Error::Parse(
                "unexpected content format in LLM response".to_string(),
            ))
        }
        None => {
            return Err(Error::Parse(
                "content field missing in LLM response".to_string(),
            ))
        }
    };

    let tags = match raw.get("tags") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };

    Ok(ProcessedContent { content, tags })
}

/// Slice a fenced reply down to its outermost braces.
fn strip_code_fence(reply: &str) -> &str {
    if !reply.starts_with(CODE_FENCE) {
        return reply;
    }
    match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if end > start => &reply[start..=end],
        _ => reply,
    }
}
