//! Login, logout, session and password-change flows through the full router.

mod common;

use std::time::{Duration, Instant};

use axum::http::StatusCode;
use serde_json::json;
use settle_core::models::auth::Role;

use common::{
    RecordingNotifier, TestApp, body_json, set_cookie_header, set_cookie_value, test_app,
    test_app_from, test_app_with, test_config,
};

#[tokio::test]
async fn staff_login_sets_cookie_and_returns_role() {
    let t = test_app();
    t.add_user(1, "a@x.com", "Secret123!", Role::Agent);

    let resp = t
        .post_json(
            "/api/auth/login",
            json!({"email": "a@x.com", "password": "Secret123!"}),
            None,
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let cookie = set_cookie_header(&resp, "auth-token").expect("auth-token cookie");
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Max-Age=604800"));
    assert!(!cookie.contains("Secure"));
    assert!(set_cookie_header(&resp, "portal-auth-token").is_none());

    let json = body_json(resp).await;
    assert_eq!(json["user"]["role"], "agent");
    assert_eq!(json["user"]["email"], "a@x.com");
    assert!(json["user"].get("isAgent").is_none());
}

#[tokio::test]
async fn production_cookies_are_secure() {
    let t = test_app_with(true, RecordingNotifier::default());
    t.add_user(1, "a@x.com", "Secret123!", Role::Admin);
    let resp = t
        .post_json(
            "/api/auth/login",
            json!({"email": "a@x.com", "password": "Secret123!"}),
            None,
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = set_cookie_header(&resp, "auth-token").unwrap();
    assert!(cookie.contains("Secure"));
}

#[tokio::test]
async fn missing_fields_are_bad_requests() {
    let t = test_app();
    let resp = t
        .post_json("/api/auth/login", json!({"email": "a@x.com"}), None)
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "validation_error");

    let resp = t
        .post_json("/api/portal/auth/login", json!({"password": "x"}), None)
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unreadable_bodies_get_the_error_envelope() {
    let t = test_app();
    let cases = [
        ("/api/auth/login", "application/json", "{not json"),
        ("/api/auth/login", "application/json", r#"{"email": 1, "password": "x"}"#),
        ("/api/auth/forgot-password", "text/plain", "a@x.com"),
        ("/api/portal/auth/login", "application/json", "{not json"),
        ("/api/portal/auth/reset-password", "application/json", "42"),
    ];
    for (path, content_type, body) in cases {
        let resp = t.post_raw(path, content_type, body).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{path} {body}");
        let json = body_json(resp).await;
        assert_eq!(json["error"], "validation_error", "{path} {body}");
        assert!(json["message"].is_string());
    }
}

#[tokio::test]
async fn login_failures_do_not_reveal_account_existence() {
    let t = test_app();
    t.add_user(1, "a@x.com", "Secret123!", Role::Manager);

    let unknown = t
        .post_json(
            "/api/auth/login",
            json!({"email": "nobody@x.com", "password": "Secret123!"}),
            None,
        )
        .await;
    let wrong = t
        .post_json(
            "/api/auth/login",
            json!({"email": "a@x.com", "password": "not-it-at-all"}),
            None,
        )
        .await;

    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookie_header(&wrong, "auth-token").is_none());
    assert_eq!(body_json(unknown).await, body_json(wrong).await);
}

/// Fastest of three rejected logins.
async fn fastest_rejection(t: &TestApp, path: &str, email: &str, password: &str) -> Duration {
    let mut best = Duration::MAX;
    for _ in 0..3 {
        let started = Instant::now();
        let resp = t
            .post_json(path, json!({"email": email, "password": password}), None)
            .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        best = best.min(started.elapsed());
    }
    best
}

#[tokio::test]
async fn unknown_accounts_cost_a_full_password_check() {
    let mut config = test_config(false);
    config.bcrypt_cost = 10;
    let t = test_app_from(config, RecordingNotifier::default());
    t.add_user(1, "a@x.com", "Secret123!", Role::Manager);
    t.add_agent(9, "agent.portal@x.com", "PortalPw123");

    let known = fastest_rejection(&t, "/api/auth/login", "a@x.com", "wrong-password").await;
    let unknown = fastest_rejection(&t, "/api/auth/login", "nobody@x.com", "wrong-password").await;
    assert!(
        unknown * 4 >= known,
        "staff miss took {unknown:?}, wrong password took {known:?}"
    );

    let path = "/api/portal/auth/login";
    let known = fastest_rejection(&t, path, "agent.portal@x.com", "wrong-password").await;
    let unknown = fastest_rejection(&t, path, "nobody@x.com", "wrong-password").await;
    assert!(
        unknown * 4 >= known,
        "portal miss took {unknown:?}, wrong password took {known:?}"
    );
}

#[tokio::test]
async fn customer_on_staff_login_gets_portal_redirect() {
    let t = test_app();
    t.add_user(5, "c@x.com", "Secret123!", Role::Customer);

    let resp = t
        .post_json(
            "/api/auth/login",
            json!({"email": "c@x.com", "password": "Secret123!"}),
            None,
        )
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(set_cookie_header(&resp, "auth-token").is_none());
    let json = body_json(resp).await;
    assert_eq!(json["redirectTo"], "/portal/login");
}

#[tokio::test]
async fn portal_customer_login() {
    let t = test_app();
    t.add_user(5, "a@x.com", "Secret123!", Role::Customer);
    t.store.insert_customer_profile(5, 300).unwrap();

    let resp = t
        .post_json(
            "/api/portal/auth/login",
            json!({"email": "a@x.com", "password": "Secret123!"}),
            None,
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(set_cookie_header(&resp, "portal-auth-token").is_some());
    assert!(set_cookie_header(&resp, "auth-token").is_none());
    let json = body_json(resp).await;
    assert_eq!(json["user"]["role"], "customer");
    assert_eq!(json["user"]["isAgent"], false);
    assert_eq!(json["user"]["id"], "300");
    assert_eq!(json["user"]["userId"], 5);

    // The same credentials never open a staff session.
    let staff = t
        .post_json(
            "/api/auth/login",
            json!({"email": "a@x.com", "password": "Secret123!"}),
            None,
        )
        .await;
    assert_ne!(staff.status(), StatusCode::OK);
    assert!(set_cookie_header(&staff, "auth-token").is_none());
}

#[tokio::test]
async fn portal_agent_login_uses_portal_email() {
    let t = test_app();
    t.add_user(2, "agent@x.com", "StaffPw123", Role::Agent);
    t.add_agent(9, "agent.portal@x.com", "PortalPw123");

    let resp = t
        .post_json(
            "/api/portal/auth/login",
            json!({"email": "agent.portal@x.com", "password": "PortalPw123"}),
            None,
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["user"]["role"], "agent");
    assert_eq!(json["user"]["isAgent"], true);
    assert_eq!(json["user"]["email"], "agent.portal@x.com");

    // Staff email and staff password do not open the portal.
    let resp = t
        .post_json(
            "/api/portal/auth/login",
            json!({"email": "agent@x.com", "password": "StaffPw123"}),
            None,
        )
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_endpoints_check_their_own_audience() {
    let t = test_app();
    t.add_user(1, "a@x.com", "Secret123!", Role::Admin);

    let resp = t
        .post_json(
            "/api/auth/login",
            json!({"email": "a@x.com", "password": "Secret123!"}),
            None,
        )
        .await;
    let token = set_cookie_value(&resp, "auth-token").unwrap();

    let me = t
        .get("/api/auth/me", Some(&format!("auth-token={token}")))
        .await;
    assert_eq!(me.status(), StatusCode::OK);
    let json = body_json(me).await;
    assert_eq!(json["user"]["role"], "admin");
    assert!(json["expiresAt"].as_i64().unwrap() > 0);

    // A staff token under the portal cookie name is rejected.
    let portal = t
        .get(
            "/api/portal/auth/me",
            Some(&format!("portal-auth-token={token}")),
        )
        .await;
    assert_eq!(portal.status(), StatusCode::UNAUTHORIZED);

    let anonymous = t.get("/api/auth/me", None).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_clears_cookie() {
    let t = test_app();
    let resp = t.post_json("/api/auth/logout", json!({}), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = set_cookie_header(&resp, "auth-token").unwrap();
    assert!(cookie.contains("Max-Age=0"));

    let resp = t.post_json("/api/portal/auth/logout", json!({}), None).await;
    let cookie = set_cookie_header(&resp, "portal-auth-token").unwrap();
    assert!(cookie.contains("Max-Age=0"));
}

async fn portal_cookie(t: &common::TestApp, email: &str, password: &str) -> String {
    let resp = t
        .post_json(
            "/api/portal/auth/login",
            json!({"email": email, "password": password}),
            None,
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    format!(
        "portal-auth-token={}",
        set_cookie_value(&resp, "portal-auth-token").unwrap()
    )
}

#[tokio::test]
async fn change_password_requires_portal_session() {
    let t = test_app();
    let resp = t
        .post_json(
            "/api/portal/auth/change-password",
            json!({"currentPassword": "Secret123!", "newPassword": "Another123!"}),
            None,
        )
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn customer_changes_password() {
    let t = test_app();
    t.add_user(5, "c@x.com", "Secret123!", Role::Customer);
    let cookie = portal_cookie(&t, "c@x.com", "Secret123!").await;

    let wrong = t
        .post_json(
            "/api/portal/auth/change-password",
            json!({"currentPassword": "guess-guess", "newPassword": "Another123!"}),
            Some(&cookie),
        )
        .await;
    assert_eq!(wrong.status(), StatusCode::BAD_REQUEST);

    let short = t
        .post_json(
            "/api/portal/auth/change-password",
            json!({"currentPassword": "Secret123!", "newPassword": "short"}),
            Some(&cookie),
        )
        .await;
    assert_eq!(short.status(), StatusCode::BAD_REQUEST);

    let ok = t
        .post_json(
            "/api/portal/auth/change-password",
            json!({"currentPassword": "Secret123!", "newPassword": "Another123!"}),
            Some(&cookie),
        )
        .await;
    assert_eq!(ok.status(), StatusCode::OK);

    portal_cookie(&t, "c@x.com", "Another123!").await;
}

#[tokio::test]
async fn agent_changes_portal_password_only() {
    let t = test_app();
    t.add_user(2, "agent@x.com", "StaffPw123", Role::Agent);
    t.add_agent(9, "agent.portal@x.com", "PortalPw123");
    let cookie = portal_cookie(&t, "agent.portal@x.com", "PortalPw123").await;

    let ok = t
        .post_json(
            "/api/portal/auth/change-password",
            json!({"currentPassword": "PortalPw123", "newPassword": "PortalPw456"}),
            Some(&cookie),
        )
        .await;
    assert_eq!(ok.status(), StatusCode::OK);

    portal_cookie(&t, "agent.portal@x.com", "PortalPw456").await;
    let staff = t
        .post_json(
            "/api/auth/login",
            json!({"email": "agent@x.com", "password": "StaffPw123"}),
            None,
        )
        .await;
    assert_eq!(staff.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_reports_store() {
    let t = test_app();
    let resp = t.get("/api/health", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["storeConnected"], true);
    assert_eq!(json["version"], settle_core::version());
}
