use super::*;

#[test]
fn invalid_transition_is_conflict() {
    let err = WorkOrderError::InvalidTransition { from: WorkOrderStatus::Completed, to: WorkOrderStatus::Open };
    assert_eq!(work_order_error_to_status(err), StatusCode::CONFLICT);
}

#[test]
fn unknown_vendor_is_unprocessable() {
    assert_eq!(
        work_order_error_to_status(WorkOrderError::VendorNotFound(Uuid::nil())),
        StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(work_order_error_to_status(WorkOrderError::NotFound(Uuid::nil())), StatusCode::NOT_FOUND);
}

#[test]
fn status_body_parses_snake_case() {
    let body: StatusBody = serde_json::from_str(r#"{"status":"in_progress"}"#).unwrap();
    assert_eq!(body.status, WorkOrderStatus::InProgress);
    assert!(serde_json::from_str::<StatusBody>(r#"{"status":"done"}"#).is_err());
}
