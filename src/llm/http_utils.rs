//! HTTP utilities for the Gemini provider
//!
//! Request sending, error-page cleanup and response navigation.

use crate::config::get_llm_http_timeout_secs;
use crate::llm::LlmError;
use reqwest::Client as HttpClient;
use serde_json::Value;
use std::time::Duration;

/// Creates an HTTP client configured with the standard LLM timeout.
///
/// Uses `LLM_HTTP_TIMEOUT_SECS` environment variable or 30s default.
#[must_use]
pub fn create_http_client() -> HttpClient {
    let timeout = Duration::from_secs(get_llm_http_timeout_secs());
    HttpClient::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| HttpClient::new())
}

/// Sends an HTTP POST request with JSON body and returns parsed JSON response.
///
/// # Errors
///
/// Returns `LlmError::NetworkError` on connectivity issues, `LlmError::ApiError` on non-success status codes,
/// or `LlmError::JsonError` if parsing fails.
pub async fn send_json_request(
    client: &HttpClient,
    url: &str,
    body: &Value,
    headers: &[(&str, &str)],
) -> Result<Value, LlmError> {
    let mut request = client.post(url).json(body);

    for (key, value) in headers {
        request = request.header(*key, *value);
    }

    let response = request
        .send()
        .await
        .map_err(|e| LlmError::NetworkError(e.without_url().to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(LlmError::ApiError(clean_error_body(status, &error_text)));
    }

    response
        .json()
        .await
        .map_err(|e| LlmError::JsonError(e.to_string()))
}

/// Builds a readable error message from a failed response body.
fn clean_error_body(status: reqwest::StatusCode, error_text: &str) -> String {
    // Proxies sometimes answer with full HTML pages
    let trimmed = error_text.trim_start();
    let is_html = trimmed.starts_with("<!DOCTYPE")
        || trimmed.starts_with("<html")
        || trimmed.starts_with("<HTML");

    if is_html {
        return format!("{status} (Server returned HTML error page)");
    }

    // Gemini wraps errors as {"error": {"message": ...}}
    let message = serde_json::from_str::<Value>(error_text)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| error_text.to_string());

    if message.chars().count() > 500 {
        let head: String = message.chars().take(500).collect();
        format!("{status} - {head}... (truncated)")
    } else {
        format!("{status} - {message}")
    }
}

/// Returns the content parts of the first candidate.
///
/// # Errors
///
/// Returns `LlmError::EmptyResponse` when the response has no candidates
/// (for example when the prompt was blocked).
pub fn first_candidate_parts(response: &Value) -> Result<&[Value], LlmError> {
    let candidate = response
        .get("candidates")
        .and_then(|c| c.get(0))
        .ok_or_else(|| {
            let reason = response
                .pointer("/promptFeedback/blockReason")
                .and_then(Value::as_str)
                .unwrap_or("no candidates");
            LlmError::EmptyResponse(reason.to_string())
        })?;

    Ok(candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default())
}

/// Concatenates every text part of the first candidate.
///
/// # Errors
///
/// See [`first_candidate_parts`].
pub fn extract_text_content(response: &Value) -> Result<String, LlmError> {
    let parts = first_candidate_parts(response)?;
    Ok(parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_text_joins_parts() {
        let response = json!({
            "candidates": [{
                "content": {"parts": [{"text": "Hello, "}, {"text": "world"}]}
            }]
        });
        assert_eq!(
            extract_text_content(&response).expect("text present"),
            "Hello, world"
        );
    }

    #[test]
    fn test_missing_candidates_is_empty_response() {
        let response = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = extract_text_content(&response).expect_err("no candidates");
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_candidate_without_parts_yields_empty_text() {
        let response = json!({"candidates": [{"finishReason": "STOP"}]});
        assert_eq!(extract_text_content(&response).expect("ok"), "");
    }

    #[test]
    fn test_clean_error_body() {
        let status = reqwest::StatusCode::BAD_REQUEST;
        let body = r#"{"error": {"code": 400, "message": "API key not valid"}}"#;
        assert_eq!(clean_error_body(status, body), "400 Bad Request - API key not valid");

        let html = "<!DOCTYPE html><html></html>";
        assert!(clean_error_body(status, html).contains("HTML error page"));
    }
}
