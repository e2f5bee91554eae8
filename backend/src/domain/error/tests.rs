//! Tests for dispatch errors.

use super::*;
use rstest::rstest;
use serde_json::json;

#[rstest]
#[case::connection(GatewayError::connection("refused"), ErrorCode::ServiceUnavailable)]
#[case::timeout(GatewayError::timeout("10s"), ErrorCode::ServiceUnavailable)]
#[case::query(GatewayError::query("bad filter"), ErrorCode::InternalError)]
#[case::decode(GatewayError::decode("not json"), ErrorCode::InternalError)]
#[case::rejected(GatewayError::rejected("nope"), ErrorCode::InvalidRequest)]
fn gateway_errors_map_to_codes(#[case] error: GatewayError, #[case] expected: ErrorCode) {
    let mapped = Error::from(error);
    assert_eq!(mapped.code(), expected);
    assert_eq!(mapped.code().is_transient(), expected == ErrorCode::ServiceUnavailable);
}

#[rstest]
fn rejection_message_is_kept_verbatim() {
    let error = Error::from(GatewayError::rejected(
        "A user with this email address has already been registered",
    ));
    assert_eq!(
        error.message(),
        "A user with this email address has already been registered"
    );
}

#[rstest]
#[case::forbidden(ErrorCode::Forbidden)]
#[case::conflict(ErrorCode::Conflict)]
#[case::unavailable(ErrorCode::ServiceUnavailable)]
fn blank_messages_fall_back_to_the_code_message(#[case] code: ErrorCode) {
    let error = Error::new(code, " \n ");
    assert!(!error.message().trim().is_empty());
    assert_eq!(error.message(), code.fallback_message());
}

#[rstest]
fn serialises_code_in_snake_case() {
    let error = Error::conflict("pending cannot become completed")
        .with_details(json!({"orderId": "os-1"}));
    let value = serde_json::to_value(error).expect("error serialises");
    assert_eq!(
        value,
        json!({
            "code": "conflict",
            "message": "pending cannot become completed",
            "details": {"orderId": "os-1"}
        })
    );
}

#[rstest]
fn display_uses_message() {
    let error = Error::service_unavailable("gateway unavailable: refused");
    assert_eq!(error.to_string(), "gateway unavailable: refused");
}
