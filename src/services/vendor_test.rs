use super::*;

fn sample() -> VendorRow {
    VendorRow {
        id: Uuid::new_v4(),
        name: "Gulf Coast Plumbing".into(),
        category: "plumbing".into(),
        phone: Some("555-0100".into()),
        email: None,
        website: None,
        notes: String::new(),
        rating: Some(4),
        created_by: None,
        created_at: 0,
    }
}

fn actor(role: Role) -> Actor {
    Actor { id: Uuid::new_v4(), role }
}

#[test]
fn only_owners_and_admins_manage() {
    assert!(ensure_can_manage(actor(Role::Admin)).is_ok());
    assert!(ensure_can_manage(actor(Role::Owner)).is_ok());
    assert!(matches!(ensure_can_manage(actor(Role::HouseWatcher)), Err(VendorError::Forbidden)));
    assert!(matches!(ensure_can_manage(actor(Role::Tenant)), Err(VendorError::Forbidden)));
}

#[test]
fn rating_must_be_one_to_five() {
    for rating in [1, 3, 5] {
        let mut v = sample();
        v.rating = Some(rating);
        assert!(validate_vendor(&v).is_ok(), "rating {rating} should be valid");
    }
    for rating in [0, 6, -1] {
        let mut v = sample();
        v.rating = Some(rating);
        assert!(matches!(validate_vendor(&v), Err(VendorError::Invalid(_))));
    }
    let mut v = sample();
    v.rating = None;
    assert!(validate_vendor(&v).is_ok());
}

#[test]
fn validate_requires_name_and_category() {
    let mut v = sample();
    v.name = "  ".into();
    assert!(validate_vendor(&v).is_err());

    let mut v = sample();
    v.category = String::new();
    assert!(validate_vendor(&v).is_err());
}

#[test]
fn patch_normalizes_category_and_clears_rating() {
    let patch: VendorPatch = serde_json::from_str(r#"{"category": " Electrical ", "rating": null}"#).unwrap();
    let mut v = sample();
    apply_patch(&mut v, patch);
    assert_eq!(v.category, "electrical");
    assert_eq!(v.rating, None);
    assert_eq!(v.phone.as_deref(), Some("555-0100"));
}

// =============================================================================
// LIVE DATABASE
// =============================================================================

#[cfg(feature = "live-db-tests")]
mod live_db {
    use super::*;
    use crate::services::user::Role;
    use crate::state::test_helpers::live as fixtures;

    fn new_vendor() -> NewVendor {
        NewVendor {
            name: "Coastal Plumbing".into(),
            category: "Plumbing".into(),
            phone: None,
            email: None,
            website: None,
            notes: String::new(),
            rating: Some(4),
        }
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn only_owners_and_admins_write_vendors() {
        let state = fixtures::integration_state().await;
        let owner = fixtures::user(&state, Role::Owner).await;
        let watcher = fixtures::user(&state, Role::HouseWatcher).await;
        let tenant = fixtures::user(&state, Role::Tenant).await;

        for actor in [watcher, tenant] {
            assert!(matches!(create_vendor(&state.pool, actor, new_vendor()).await, Err(VendorError::Forbidden)));
        }

        let vendor = create_vendor(&state.pool, owner, new_vendor()).await.expect("owner should create");
        assert_eq!(vendor.category, "plumbing");

        let patch = VendorPatch { rating: Some(Some(1)), ..VendorPatch::default() };
        assert!(matches!(update_vendor(&state.pool, watcher, vendor.id, patch).await, Err(VendorError::Forbidden)));
        assert!(matches!(delete_vendor(&state.pool, tenant, vendor.id).await, Err(VendorError::Forbidden)));

        // Read access is open to everyone.
        assert_eq!(get_vendor(&state.pool, vendor.id).await.expect("vendor should load").rating, Some(4));
        delete_vendor(&state.pool, owner, vendor.id).await.expect("owner should delete");
    }
}
