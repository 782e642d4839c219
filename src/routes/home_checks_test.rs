use super::*;
use crate::services::checklist::CheckStatus;
use crate::services::property::PropertyError;

#[test]
fn check_errors_map_to_status() {
    let transition = CheckError::InvalidTransition { from: CheckStatus::Completed, to: CheckStatus::InProgress };
    assert_eq!(check_error_to_status(&transition), StatusCode::CONFLICT);
    assert_eq!(check_error_to_status(&CheckError::NotEditable(CheckStatus::NotStarted)), StatusCode::CONFLICT);
    assert_eq!(check_error_to_status(&CheckError::ItemNotFound(Uuid::nil())), StatusCode::NOT_FOUND);
    assert_eq!(check_error_to_status(&CheckError::PhotoNotFound(Uuid::nil())), StatusCode::NOT_FOUND);
    assert_eq!(check_error_to_status(&CheckError::RequiredItem(Uuid::nil())), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(check_error_to_status(&CheckError::EmptyText), StatusCode::UNPROCESSABLE_ENTITY);
}

#[test]
fn photo_errors_map_to_status() {
    assert_eq!(
        photo_error_to_status(&PhotoError::UnsupportedType("image/gif".into())),
        StatusCode::UNSUPPORTED_MEDIA_TYPE
    );
    assert_eq!(
        photo_error_to_status(&PhotoError::TooLarge { size: 20, max: 10 }),
        StatusCode::PAYLOAD_TOO_LARGE
    );
    assert_eq!(photo_error_to_status(&PhotoError::Empty), StatusCode::UNPROCESSABLE_ENTITY);
}

#[test]
fn home_check_errors_map_to_status() {
    assert_eq!(home_check_error_to_status(&HomeCheckError::NotFound(Uuid::nil())), StatusCode::NOT_FOUND);
    assert_eq!(home_check_error_to_status(&HomeCheckError::NotAssigned), StatusCode::FORBIDDEN);
    assert_eq!(
        home_check_error_to_status(&HomeCheckError::WrongServiceType),
        StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(
        home_check_error_to_status(&HomeCheckError::NotDeletable(CheckStatus::InProgress)),
        StatusCode::CONFLICT
    );
    assert_eq!(
        home_check_error_to_status(&HomeCheckError::Property(PropertyError::NotFound(Uuid::nil()))),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        home_check_error_to_status(&HomeCheckError::Corrupt("bad json".into())),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[tokio::test]
async fn missing_required_response_lists_items() {
    let err = HomeCheckError::Check(CheckError::MissingRequired(vec!["Check locks".into(), "Run taps".into()]));
    let response = home_check_error_response(err);
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["missing"], serde_json::json!(["Check locks", "Run taps"]));
}

#[tokio::test]
async fn other_errors_have_empty_body() {
    let response = home_check_error_response(HomeCheckError::NotAssigned);
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.is_empty());
}
