//! Provider error-body handling.

use serde_json::Value;

use glossa_core::defaults::UNKNOWN_PROVIDER_ERROR;

/// Pull a human-readable message out of a provider error body.
///
/// Tries, in order: `{"error": {"message": "..."}}`, `{"error": "..."}`,
/// `{"message": "..."}`. Anything else (including non-JSON bodies) yields
/// `"unknown error occurred"`.
pub fn extract_error_message(body: &[u8]) -> String {
    let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) else {
        return UNKNOWN_PROVIDER_ERROR.to_string();
    };

    if let Some(Value::String(msg)) = map
        .get("error")
        .and_then(|e| e.as_object())
        .and_then(|e| e.get("message"))
    {
        return msg.clone();
    }

    if let Some(Value::String(msg)) = map.get("error") {
        return msg.clone();
    }

    if let Some(Value::String(msg)) = map.get("message") {
        return msg.clone();
    }

    UNKNOWN_PROVIDER_ERROR.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_error_message() {
        let body = br#"{"error":{"message":"Invalid API key","type":"invalid_request_error"}}"#;
        assert_eq!(extract_error_message(body), "Invalid API key");
    }

    #[test]
    fn test_string_error() {
        assert_eq!(extract_error_message(br#"{"error":"model overloaded"}"#), "model overloaded");
    }

    #[test]
    fn test_top_level_message() {
        assert_eq!(extract_error_message(br#"{"message":"try later"}"#), "try later");
    }

    #[test]
    fn test_nested_error_takes_precedence() {
        let body = br#"{"error":{"message":"inner"},"message":"outer"}"#;
        assert_eq!(extract_error_message(body), "inner");
    }

    #[test]
    fn test_nested_error_without_message_falls_through() {
        let body = br#"{"error":{"code":42},"message":"outer"}"#;
        assert_eq!(extract_error_message(body), "outer");
    }

    #[test]
    fn test_unknown_shapes() {
        assert_eq!(extract_error_message(b"<html>502</html>"), UNKNOWN_PROVIDER_ERROR);
        assert_eq!(extract_error_message(b""), UNKNOWN_PROVIDER_ERROR);
        assert_eq!(extract_error_message(br#"["error"]"#), UNKNOWN_PROVIDER_ERROR);
        assert_eq!(extract_error_message(br#"{"error":17}"#), UNKNOWN_PROVIDER_ERROR);
    }
}
