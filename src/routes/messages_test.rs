use super::*;

#[test]
fn message_error_to_status_maps_variants() {
    assert_eq!(message_error_to_status(MessageError::NotFound(Uuid::nil())), StatusCode::NOT_FOUND);
    assert_eq!(
        message_error_to_status(MessageError::RecipientNotFound(Uuid::nil())),
        StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(
        message_error_to_status(MessageError::Invalid("empty".into())),
        StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[test]
fn inbox_query_defaults_to_all() {
    let query: InboxQuery = serde_json::from_str("{}").unwrap();
    assert!(!query.unread);
}
