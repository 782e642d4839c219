use super::*;

fn charge(due_at: i64, status: PaymentStatus) -> PaymentRow {
    PaymentRow {
        id: Uuid::new_v4(),
        property_id: Uuid::new_v4(),
        tenant_id: Uuid::new_v4(),
        amount_cents: 100,
        due_at,
        paid_at: (status == PaymentStatus::Paid).then_some(due_at),
        method: None,
        memo: None,
        created_at: 0,
        status,
        tenant_user_id: None,
    }
}

#[test]
fn recent_cutoff_is_thirty_days_back() {
    let now = 100 * DAY_MS;
    assert_eq!(recent_cutoff(now), 70 * DAY_MS);
    assert_eq!(recent_cutoff(0), -30 * DAY_MS);
}

#[test]
fn next_due_skips_paid_and_picks_earliest() {
    let payments = vec![
        charge(10, PaymentStatus::Paid),
        charge(30, PaymentStatus::Pending),
        charge(20, PaymentStatus::Overdue),
    ];
    assert_eq!(next_due(&payments).map(|p| p.due_at), Some(20));
}

#[test]
fn next_due_none_when_all_paid() {
    assert!(next_due(&[charge(10, PaymentStatus::Paid)]).is_none());
    assert!(next_due(&[]).is_none());
}

#[test]
fn dashboard_serializes_with_persona_tag() {
    let dashboard = Dashboard::Admin(AdminDashboard {
        users: 3,
        properties: 2,
        open_work_orders: 1,
        checks_in_progress: 0,
        overdue_payments: 4,
    });
    let json = serde_json::to_value(&dashboard).unwrap();
    assert_eq!(json["persona"], "admin");
    assert_eq!(json["overdue_payments"], 4);

    let dashboard = Dashboard::HouseWatcher(WatcherDashboard {
        assigned_properties: 5,
        checks_not_started: 2,
        checks_in_progress: 1,
        checks_completed_last_30_days: 9,
        upcoming_checks: Vec::new(),
        unread_messages: 0,
    });
    let json = serde_json::to_value(&dashboard).unwrap();
    assert_eq!(json["persona"], "house_watcher");
    assert_eq!(json["checks_completed_last_30_days"], 9);
}
