use super::*;
use crate::services::property::PropertyError;

#[test]
fn payment_error_to_status_maps_variants() {
    assert_eq!(payment_error_to_status(PaymentError::NotFound(Uuid::nil())), StatusCode::NOT_FOUND);
    assert_eq!(payment_error_to_status(PaymentError::AlreadyPaid(Uuid::nil())), StatusCode::CONFLICT);
    assert_eq!(payment_error_to_status(PaymentError::Forbidden), StatusCode::FORBIDDEN);
    assert_eq!(
        payment_error_to_status(PaymentError::TenantNotOnProperty(Uuid::nil())),
        StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(
        payment_error_to_status(PaymentError::Property(PropertyError::NotFound(Uuid::nil()))),
        StatusCode::NOT_FOUND
    );
}

#[test]
fn empty_pay_body_uses_defaults() {
    assert!(parse_pay_request(b"").unwrap().method.is_none());
    assert!(parse_pay_request(b"  \n").unwrap().method.is_none());
}

#[test]
fn pay_body_reads_method() {
    let request = parse_pay_request(br#"{"method":"check"}"#).unwrap();
    assert_eq!(request.method.as_deref(), Some("check"));
}

#[test]
fn malformed_pay_body_is_bad_request() {
    assert_eq!(parse_pay_request(b"{nope").unwrap_err(), StatusCode::BAD_REQUEST);
}
