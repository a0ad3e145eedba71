//! Driver deprovisioning integration tests: the cascading delete, identity
//! preservation rules and the failure modes of the cascade.

mod common;

use common::*;
use convoy::models::NewOrgMembership;
use convoy::store::{DependentTable, RecordStore};
use serde_json::Value;
use serial_test::serial;
use uuid::Uuid;

/// Provisions a driver through the API and returns (driver_profile_id, identity_id).
async fn provision_driver(app: &TestApp, admin_token: &str, org: Uuid) -> (Uuid, Uuid) {
    let response = app
        .post("/drivers", admin_token, TestApp::invite_payload(org))
        .await;
    assert_status!(response, 201);
    let body: Value = response.json().await.unwrap();
    let driver_id = serde_json::from_value(body["driver"]["id"].clone()).unwrap();
    let identity_id = serde_json::from_value(body["identity_id"].clone()).unwrap();
    (driver_id, identity_id)
}

#[tokio::test]
#[serial]
async fn deprovision_of_unknown_driver_is_not_found() {
    let app = TestApp::spawn().await;
    let org = Uuid::new_v4();
    let admin = app.seed_admin(org);

    let response = app
        .delete(&format!("/drivers/{}", Uuid::new_v4()), &admin.token)
        .await;
    assert_status!(response, 404);
}

#[tokio::test]
#[serial]
async fn deprovision_requires_org_admin() {
    let app = TestApp::spawn().await;
    let org = Uuid::new_v4();
    let admin = app.seed_admin(org);
    let outsider = app.seed_member(Uuid::new_v4(), "admin");

    let (driver_id, _) = provision_driver(&app, &admin.token, org).await;

    let response = app
        .delete(&format!("/drivers/{}", driver_id), &outsider.token)
        .await;
    assert_status!(response, 403);
    assert_eq!(app.store.drivers().len(), 1);
}

#[tokio::test]
#[serial]
async fn deprovision_refuses_organization_mismatch() {
    let app = TestApp::spawn().await;
    let org = Uuid::new_v4();
    let admin = app.seed_admin(org);

    let (driver_id, _) = provision_driver(&app, &admin.token, org).await;

    let response = app
        .delete(
            &format!("/drivers/{}?organization_id={}", driver_id, Uuid::new_v4()),
            &admin.token,
        )
        .await;
    assert_status!(response, 403);
    assert_eq!(app.store.drivers().len(), 1);
}

#[tokio::test]
#[serial]
async fn deprovision_refuses_driver_with_open_shift() {
    let app = TestApp::spawn().await;
    let org = Uuid::new_v4();
    let admin = app.seed_admin(org);

    let (driver_id, identity_id) = provision_driver(&app, &admin.token, org).await;
    app.store.seed_open_shift(driver_id);

    let response = app
        .delete(&format!("/drivers/{}", driver_id), &admin.token)
        .await;
    assert_status!(response, 409);

    // Nothing may be touched while a shift is in progress.
    assert_eq!(app.store.drivers().len(), 1);
    assert!(app.store.identities().iter().any(|i| i.id == identity_id));
    assert_eq!(
        app.store.dependent_count(DependentTable::ShiftLogs, driver_id),
        1
    );
}

#[tokio::test]
#[serial]
async fn deprovision_cascades_and_deletes_sole_org_identity() {
    let app = TestApp::spawn().await;
    let org = Uuid::new_v4();
    let admin = app.seed_admin(org);

    let (driver_id, identity_id) = provision_driver(&app, &admin.token, org).await;
    app.store
        .seed_dependents(DependentTable::VehicleChecks, driver_id, 3);
    app.store
        .seed_dependents(DependentTable::EarningsEntries, driver_id, 7);
    app.store
        .seed_dependents(DependentTable::DayLogs, driver_id, 2);

    let response = app
        .delete(&format!("/drivers/{}", driver_id), &admin.token)
        .await;
    assert_status!(response, 200);

    let body: Value = response.json().await.unwrap();
    let deleted = body["deleted"].as_object().unwrap();
    // Every table reports a count, zero included.
    assert_eq!(deleted.len(), 15);
    assert_eq!(deleted["vehicle_checks"], 3);
    assert_eq!(deleted["earnings_entries"], 7);
    assert_eq!(deleted["day_logs"], 2);
    assert_eq!(deleted["ratings"], 0);
    assert_eq!(deleted["driver_profiles"], 1);
    assert_eq!(deleted["organization_members"], 1);
    assert_eq!(deleted["identities"], 1);
    assert_eq!(body["auth_user_deleted"], true);
    assert!(body["failures"].is_null());

    assert!(app.store.drivers().is_empty());
    assert!(!app.store.identities().iter().any(|i| i.id == identity_id));
    assert!(!app
        .store
        .memberships()
        .iter()
        .any(|m| m.identity_id == identity_id));
    assert_eq!(app.store.audit_entries("DRIVER_DEPROVISIONED").len(), 1);
}

#[tokio::test]
#[serial]
async fn deprovision_preserves_identity_with_other_memberships() {
    let app = TestApp::spawn().await;
    let org = Uuid::new_v4();
    let other_org = Uuid::new_v4();
    let admin = app.seed_admin(org);

    let (driver_id, identity_id) = provision_driver(&app, &admin.token, org).await;
    app.store
        .insert_membership(NewOrgMembership {
            identity_id,
            organization_id: other_org,
            role: "driver".to_string(),
        })
        .unwrap();

    let response = app
        .delete(&format!("/drivers/{}", driver_id), &admin.token)
        .await;
    assert_status!(response, 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["auth_user_deleted"], false);
    assert_eq!(body["deleted"]["identities"], 0);
    assert!(body["message"].as_str().unwrap().contains("preserved"));

    // The profile is gone, the login identity and its memberships stay.
    assert!(app.store.drivers().is_empty());
    assert!(app.store.identities().iter().any(|i| i.id == identity_id));
    assert!(app
        .store
        .memberships()
        .iter()
        .any(|m| m.identity_id == identity_id && m.organization_id == other_org));
}

#[tokio::test]
#[serial]
async fn deprovision_preserves_identity_with_admin_role() {
    let app = TestApp::spawn().await;
    let org = Uuid::new_v4();
    let admin = app.seed_admin(org);

    // The driver also holds an admin role in the same organization; no
    // other memberships exist anywhere.
    let (driver_id, identity_id) = provision_driver(&app, &admin.token, org).await;
    app.store
        .insert_membership(NewOrgMembership {
            identity_id,
            organization_id: org,
            role: "admin".to_string(),
        })
        .unwrap();

    let response = app
        .delete(&format!("/drivers/{}", driver_id), &admin.token)
        .await;
    assert_status!(response, 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["auth_user_deleted"], false);
    assert_eq!(body["deleted"]["identities"], 0);
    assert_eq!(body["deleted"]["organization_members"], 0);

    // Admin standing keeps the login identity, credential and memberships.
    assert!(app.store.drivers().is_empty());
    assert!(app.store.identities().iter().any(|i| i.id == identity_id));
    assert!(app
        .store
        .memberships()
        .iter()
        .any(|m| m.identity_id == identity_id && m.role == "admin"));
}

#[tokio::test]
#[serial]
async fn deprovision_continues_past_a_failing_dependent_table() {
    let app = TestApp::spawn().await;
    let org = Uuid::new_v4();
    let admin = app.seed_admin(org);

    let (driver_id, _) = provision_driver(&app, &admin.token, org).await;
    app.store
        .seed_dependents(DependentTable::Ratings, driver_id, 4);
    app.store
        .seed_dependents(DependentTable::Invoices, driver_id, 2);
    app.store.fail_dependent_table(DependentTable::Ratings);

    let response = app
        .delete(&format!("/drivers/{}", driver_id), &admin.token)
        .await;
    assert_status!(response, 200);

    let body: Value = response.json().await.unwrap();
    let failures = body["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].as_str().unwrap().starts_with("ratings"));
    assert_eq!(body["deleted"]["invoices"], 2);
    assert_eq!(body["deleted"]["ratings"], 0);

    // The failed table's rows are left behind, the rest of the cascade ran.
    assert_eq!(
        app.store.dependent_count(DependentTable::Ratings, driver_id),
        4
    );
    assert_eq!(
        app.store
            .dependent_count(DependentTable::Invoices, driver_id),
        0
    );
    assert!(app.store.drivers().is_empty());
}

#[tokio::test]
#[serial]
async fn deprovision_aborts_when_profile_delete_fails() {
    let app = TestApp::spawn().await;
    let org = Uuid::new_v4();
    let admin = app.seed_admin(org);

    let (driver_id, identity_id) = provision_driver(&app, &admin.token, org).await;
    app.store.fail_driver_delete(true);

    let response = app
        .delete(&format!("/drivers/{}", driver_id), &admin.token)
        .await;
    assert_status!(response, 500);

    // The identity is untouched and the failure is audited.
    assert!(app.store.identities().iter().any(|i| i.id == identity_id));
    assert_eq!(app.store.audit_entries("DEPROVISION_FAILED").len(), 1);
    assert!(app.store.audit_entries("DRIVER_DEPROVISIONED").is_empty());
}

#[tokio::test]
#[serial]
async fn deprovision_requires_authentication() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .delete(format!("{}/drivers/{}", app.base_url, Uuid::new_v4()))
        .send()
        .await
        .expect("Failed to send request");
    assert_status!(response, 401);
}
