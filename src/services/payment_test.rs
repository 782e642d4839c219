use super::*;

const NOW: i64 = 1_700_000_000_000;
const DAY_MS: i64 = 86_400_000;

fn charge(amount_cents: i64, due_at: i64, paid_at: Option<i64>) -> PaymentRow {
    PaymentRow {
        id: Uuid::new_v4(),
        property_id: Uuid::new_v4(),
        tenant_id: Uuid::new_v4(),
        amount_cents,
        due_at,
        paid_at,
        method: None,
        memo: None,
        created_at: 0,
        status: derive_status(paid_at, due_at, NOW),
        tenant_user_id: None,
    }
}

#[test]
fn status_is_derived_from_dates() {
    assert_eq!(derive_status(None, NOW + DAY_MS, NOW), PaymentStatus::Pending);
    assert_eq!(derive_status(None, NOW - 1, NOW), PaymentStatus::Overdue);
    assert_eq!(derive_status(Some(NOW), NOW - DAY_MS, NOW), PaymentStatus::Paid);
}

#[test]
fn due_exactly_now_is_still_pending() {
    assert_eq!(derive_status(None, NOW, NOW), PaymentStatus::Pending);
}

#[test]
fn summarize_splits_by_status() {
    let payments = vec![
        charge(100_000, NOW - 30 * DAY_MS, Some(NOW - 31 * DAY_MS)),
        charge(100_000, NOW - 2 * DAY_MS, None),
        charge(5_000, NOW - DAY_MS, None),
        charge(100_000, NOW + 28 * DAY_MS, None),
    ];
    let summary = summarize(&payments);
    assert_eq!(
        summary,
        PaymentSummary {
            collected_cents: 100_000,
            outstanding_cents: 205_000,
            overdue_cents: 105_000,
            overdue_count: 2,
        }
    );
}

#[test]
fn summarize_empty_is_zero() {
    assert_eq!(summarize(&[]), PaymentSummary::default());
}

#[test]
fn charge_amount_must_be_positive() {
    let mut input = NewCharge { tenant_id: Uuid::new_v4(), amount_cents: 0, due_at: NOW, memo: None };
    assert!(matches!(validate_charge(&input), Err(PaymentError::Invalid(_))));
    input.amount_cents = -10;
    assert!(matches!(validate_charge(&input), Err(PaymentError::Invalid(_))));
    input.amount_cents = 1;
    assert!(validate_charge(&input).is_ok());
}

#[test]
fn status_serializes_snake_case() {
    assert_eq!(serde_json::to_value(PaymentStatus::Overdue).unwrap(), serde_json::json!("overdue"));
}

#[test]
fn tenant_user_id_is_not_serialized() {
    let mut p = charge(1, NOW, None);
    p.tenant_user_id = Some(Uuid::new_v4());
    let json = serde_json::to_value(&p).unwrap();
    assert!(json.get("tenant_user_id").is_none());
    assert_eq!(json["status"], "pending");
}

// =============================================================================
// LIVE DATABASE
// =============================================================================

#[cfg(feature = "live-db-tests")]
mod live_db {
    use super::*;
    use crate::services::property::ServiceType;
    use crate::services::tenant::{self, NewTenant};
    use crate::services::user::{Actor, Role};
    use crate::state::test_helpers::live as fixtures;
    use crate::state::AppState;

    /// A tenant user linked to the property, and the tenant row id to bill.
    async fn tenant_of(state: &AppState, owner: Actor, property_id: Uuid) -> (Actor, Uuid) {
        let user = fixtures::user(state, Role::Tenant).await;
        let row = tenant::create_tenant(
            &state.pool,
            owner,
            property_id,
            NewTenant {
                user_id: Some(user.id),
                name: "Dana Reyes".into(),
                email: None,
                phone: None,
                unit: None,
                lease_start: None,
                lease_end: None,
                monthly_rent_cents: 150_000,
            },
        )
        .await
        .expect("tenant should be created");
        (user, row.id)
    }

    fn rent(tenant_id: Uuid) -> NewCharge {
        NewCharge { tenant_id, amount_cents: 150_000, due_at: now_ms() + DAY_MS, memo: Some("Rent".into()) }
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn tenants_only_see_their_own_charges() {
        let state = fixtures::integration_state().await;
        let owner = fixtures::user(&state, Role::Owner).await;
        let property = fixtures::property(&state, owner, ServiceType::PropertyManagement).await;
        let (dana, dana_tenant) = tenant_of(&state, owner, property.id).await;
        let (_, sam_tenant) = tenant_of(&state, owner, property.id).await;

        let dana_charge = create_charge(&state.pool, owner, property.id, rent(dana_tenant)).await.expect("charge");
        let sam_charge = create_charge(&state.pool, owner, property.id, rent(sam_tenant)).await.expect("charge");

        let visible = list_for_property(&state.pool, dana, property.id).await.expect("list should succeed");
        assert_eq!(visible.iter().map(|p| p.id).collect::<Vec<_>>(), vec![dana_charge.id]);
        let own = list_for_user(&state.pool, dana.id).await.expect("list should succeed");
        assert_eq!(own.iter().map(|p| p.id).collect::<Vec<_>>(), vec![dana_charge.id]);

        // Another tenant's charge cannot be paid.
        let err = mark_paid(&state.pool, dana, sam_charge.id, PayRequest::default()).await.unwrap_err();
        assert!(matches!(err, PaymentError::Forbidden));

        assert_eq!(list_for_property(&state.pool, owner, property.id).await.expect("list").len(), 2);
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn paying_twice_is_rejected() {
        let state = fixtures::integration_state().await;
        let owner = fixtures::user(&state, Role::Owner).await;
        let property = fixtures::property(&state, owner, ServiceType::PropertyManagement).await;
        let (dana, dana_tenant) = tenant_of(&state, owner, property.id).await;
        let charge = create_charge(&state.pool, owner, property.id, rent(dana_tenant)).await.expect("charge");

        let paid = mark_paid(&state.pool, dana, charge.id, PayRequest { method: Some("ach".into()) })
            .await
            .expect("first payment should land");
        assert_eq!(paid.status, PaymentStatus::Paid);

        let again = mark_paid(&state.pool, owner, charge.id, PayRequest::default()).await.unwrap_err();
        assert!(matches!(again, PaymentError::AlreadyPaid(id) if id == charge.id));
        assert!(matches!(delete_charge(&state.pool, owner, charge.id).await, Err(PaymentError::AlreadyPaid(_))));
    }
}
