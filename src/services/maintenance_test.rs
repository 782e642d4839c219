use super::*;

fn sample(status: WorkOrderStatus) -> WorkOrderRow {
    WorkOrderRow {
        id: Uuid::new_v4(),
        property_id: Uuid::new_v4(),
        created_by: None,
        vendor_id: None,
        title: "Leaking faucet".into(),
        description: String::new(),
        category: "plumbing".into(),
        priority: Priority::High,
        status,
        estimated_cost_cents: None,
        actual_cost_cents: None,
        scheduled_for: None,
        completed_at: None,
        created_at: 0,
        updated_at: 0,
    }
}

#[test]
fn allowed_transitions() {
    use WorkOrderStatus::*;
    assert!(can_transition(Open, InProgress));
    assert!(can_transition(Open, Cancelled));
    assert!(can_transition(InProgress, Completed));
    assert!(can_transition(InProgress, Cancelled));
    assert!(can_transition(InProgress, Open));
}

#[test]
fn rejected_transitions() {
    use WorkOrderStatus::*;
    assert!(!can_transition(Open, Completed));
    assert!(!can_transition(Open, Open));
    for to in [Open, InProgress, Completed, Cancelled] {
        assert!(!can_transition(Completed, to));
        assert!(!can_transition(Cancelled, to));
    }
}

#[test]
fn terminal_states() {
    assert!(WorkOrderStatus::Completed.is_terminal());
    assert!(WorkOrderStatus::Cancelled.is_terminal());
    assert!(!WorkOrderStatus::InProgress.is_terminal());
}

#[test]
fn completing_stamps_completed_at() {
    let mut order = sample(WorkOrderStatus::InProgress);
    order.transition(WorkOrderStatus::Completed, 42).unwrap();
    assert_eq!(order.status, WorkOrderStatus::Completed);
    assert_eq!(order.completed_at, Some(42));
    assert_eq!(order.updated_at, 42);
}

#[test]
fn invalid_transition_leaves_order_untouched() {
    let mut order = sample(WorkOrderStatus::Cancelled);
    let err = order.transition(WorkOrderStatus::Open, 42).unwrap_err();
    assert!(matches!(
        err,
        WorkOrderError::InvalidTransition { from: WorkOrderStatus::Cancelled, to: WorkOrderStatus::Open }
    ));
    assert_eq!(order.status, WorkOrderStatus::Cancelled);
    assert_eq!(order.updated_at, 0);
}

#[test]
fn enums_round_trip_through_str() {
    for p in [Priority::Low, Priority::Medium, Priority::High, Priority::Urgent] {
        assert_eq!(Priority::parse(p.as_str()), Some(p));
    }
    for s in [
        WorkOrderStatus::Open,
        WorkOrderStatus::InProgress,
        WorkOrderStatus::Completed,
        WorkOrderStatus::Cancelled,
    ] {
        assert_eq!(WorkOrderStatus::parse(s.as_str()), Some(s));
    }
    assert_eq!(Priority::parse("critical"), None);
}

#[test]
fn new_work_order_defaults_to_medium_priority() {
    let input: NewWorkOrder = serde_json::from_str(r#"{"title": "Broken gate"}"#).unwrap();
    assert_eq!(input.priority, Priority::Medium);
    assert_eq!(normalize_category(input.category), "general");
}

#[test]
fn category_is_trimmed_and_lowercased() {
    assert_eq!(normalize_category(Some("  HVAC ".into())), "hvac");
    assert_eq!(normalize_category(Some("   ".into())), "general");
}

#[test]
fn validate_rejects_blank_title_and_negative_cost() {
    let mut order = sample(WorkOrderStatus::Open);
    order.title = String::new();
    assert!(matches!(validate_work_order(&order), Err(WorkOrderError::Invalid(_))));

    let mut order = sample(WorkOrderStatus::Open);
    order.actual_cost_cents = Some(-5);
    assert!(matches!(validate_work_order(&order), Err(WorkOrderError::Invalid(_))));
}

#[test]
fn patch_unassigns_vendor_with_null() {
    let mut order = sample(WorkOrderStatus::Open);
    order.vendor_id = Some(Uuid::new_v4());
    let patch: WorkOrderPatch = serde_json::from_str(r#"{"vendor_id": null, "priority": "urgent"}"#).unwrap();
    apply_patch(&mut order, patch);
    assert_eq!(order.vendor_id, None);
    assert_eq!(order.priority, Priority::Urgent);
    assert_eq!(order.title, "Leaking faucet");
}

// =============================================================================
// LIVE DATABASE
// =============================================================================

#[cfg(feature = "live-db-tests")]
mod live_db {
    use super::*;
    use crate::services::property::ServiceType;
    use crate::services::tenant::{self, NewTenant};
    use crate::state::test_helpers::live as fixtures;
    use crate::state::AppState;

    fn new_order(title: &str) -> NewWorkOrder {
        NewWorkOrder {
            title: title.into(),
            description: String::new(),
            category: None,
            priority: Priority::Medium,
            vendor_id: None,
            estimated_cost_cents: None,
            scheduled_for: None,
        }
    }

    async fn tenant_of(state: &AppState, owner: Actor, property_id: Uuid) -> Actor {
        let user = fixtures::user(state, Role::Tenant).await;
        tenant::create_tenant(
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
        user
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn tenants_only_see_their_own_work_orders() {
        let state = fixtures::integration_state().await;
        let owner = fixtures::user(&state, Role::Owner).await;
        let property = fixtures::property(&state, owner, ServiceType::PropertyManagement).await;
        let alice = tenant_of(&state, owner, property.id).await;
        let bob = tenant_of(&state, owner, property.id).await;

        let mine = create_work_order(&state.pool, alice, property.id, new_order("Dripping tap"))
            .await
            .expect("tenant should file");
        let theirs = create_work_order(&state.pool, bob, property.id, new_order("Broken blind"))
            .await
            .expect("tenant should file");

        let visible = list_for_property(&state.pool, alice, property.id, &WorkOrderFilter::default())
            .await
            .expect("list should succeed");
        assert_eq!(visible.iter().map(|o| o.id).collect::<Vec<_>>(), vec![mine.id]);

        let across = list_visible(&state.pool, alice, &WorkOrderFilter::default()).await.expect("list should succeed");
        assert!(across.iter().all(|o| o.created_by == Some(alice.id)));

        assert!(matches!(get_work_order(&state.pool, alice, theirs.id).await, Err(WorkOrderError::NotFound(_))));

        let all = list_for_property(&state.pool, owner, property.id, &WorkOrderFilter::default())
            .await
            .expect("list should succeed");
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn edit_after_completion_keeps_order_completed() {
        let state = fixtures::integration_state().await;
        let owner = fixtures::user(&state, Role::Owner).await;
        let property = fixtures::property(&state, owner, ServiceType::PropertyManagement).await;
        let order = create_work_order(&state.pool, owner, property.id, new_order("Repaint fence"))
            .await
            .expect("order should be filed");
        set_status(&state.pool, owner, order.id, WorkOrderStatus::InProgress).await.expect("should start");

        // Stale copy as read by an edit that started before the completion.
        let mut stale = load_work_order(&state.pool, order.id).await.expect("order should load");
        let completed = set_status(&state.pool, owner, order.id, WorkOrderStatus::Completed)
            .await
            .expect("should complete");

        apply_patch(&mut stale, WorkOrderPatch { title: Some("Repaint fence and gate".into()), ..WorkOrderPatch::default() });
        persist_fields(&state.pool, &mut stale).await.expect("edit should land");
        assert_eq!(stale.status, WorkOrderStatus::Completed);

        let stored = load_work_order(&state.pool, order.id).await.expect("order should load");
        assert_eq!(stored.status, WorkOrderStatus::Completed);
        assert_eq!(stored.completed_at, completed.completed_at);
        assert_eq!(stored.title, "Repaint fence and gate");
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn racing_status_moves_cannot_leave_terminal_state() {
        let state = fixtures::integration_state().await;
        let owner = fixtures::user(&state, Role::Owner).await;
        let property = fixtures::property(&state, owner, ServiceType::PropertyManagement).await;
        let order = create_work_order(&state.pool, owner, property.id, new_order("Service boiler"))
            .await
            .expect("order should be filed");
        set_status(&state.pool, owner, order.id, WorkOrderStatus::InProgress).await.expect("should start");

        let mut stale = load_work_order(&state.pool, order.id).await.expect("order should load");
        set_status(&state.pool, owner, order.id, WorkOrderStatus::Completed).await.expect("should complete");

        // The stale copy still passes the local transition check.
        stale.transition(WorkOrderStatus::Cancelled, now_ms()).expect("in_progress may cancel");
        let err = persist_status(&state.pool, &stale, WorkOrderStatus::InProgress).await.unwrap_err();
        assert!(matches!(
            err,
            WorkOrderError::InvalidTransition { from: WorkOrderStatus::Completed, to: WorkOrderStatus::Cancelled }
        ));

        let stored = load_work_order(&state.pool, order.id).await.expect("order should load");
        assert_eq!(stored.status, WorkOrderStatus::Completed);
    }
}
