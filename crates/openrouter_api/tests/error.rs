use reqwest::StatusCode;

use openrouter_api::error::parse_error_message;
use openrouter_api::OpenRouterApiError;

#[test]
fn parse_error_message_is_friendly_on_rate_limit() {
    let body = r#"{"error":{"code":429,"message":"slow down"}}"#;

    let message = parse_error_message(StatusCode::TOO_MANY_REQUESTS, body);
    assert_eq!(message, "Rate limited by OpenRouter: slow down");
}

#[test]
fn parse_error_message_names_upstream_provider() {
    let body = r#"{"error":{"code":502,"message":"upstream failed","metadata":{"provider_name":"Azure"}}}"#;

    let message = parse_error_message(StatusCode::BAD_GATEWAY, body);
    assert_eq!(message, "upstream failed (provider: Azure)");
}

#[test]
fn parse_error_message_is_message_fallback_when_json_has_message() {
    let body = r#"{"error":{"code":400,"message":"invalid model"}}"#;
    let message = parse_error_message(StatusCode::BAD_REQUEST, body);
    assert_eq!(message, "invalid model");
}

#[test]
fn parse_error_message_falls_back_to_raw_body() {
    let body = "raw failure text";
    let message = parse_error_message(StatusCode::INTERNAL_SERVER_ERROR, body);
    assert_eq!(message, "raw failure text");
}

#[test]
fn parse_error_message_falls_back_to_reason_on_empty_body() {
    let message = parse_error_message(StatusCode::SERVICE_UNAVAILABLE, "  ");
    assert_eq!(message, "Service Unavailable");
}

#[test]
fn authentication_errors_are_classified() {
    assert!(OpenRouterApiError::MissingApiKey.is_authentication());
    assert!(OpenRouterApiError::Status(StatusCode::UNAUTHORIZED, "bad key".into()).is_authentication());
    assert!(!OpenRouterApiError::Status(StatusCode::BAD_REQUEST, "bad".into()).is_authentication());
}

#[test]
fn error_display_is_stable() {
    assert_eq!(OpenRouterApiError::MissingApiKey.to_string(), "API key is required");
    assert_eq!(
        OpenRouterApiError::Status(StatusCode::BAD_REQUEST, "invalid model".into()).to_string(),
        "HTTP 400 Bad Request invalid model"
    );
}
