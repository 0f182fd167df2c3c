//! Directory login tests.
//!
//! Tests form login through `LdapAuthenticator` with both verification
//! strategies and the HTTP mapping of verification failures.

mod common;

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::test;

use actix_context_security::http::security::ldap::{LdapAuthStrategy, LdapAuthenticator};
use actix_context_security::http::security::InMemorySessionStore;

use common::{
    body_string, compare_directory, create_test_app, session_cookie, test_authenticator,
    test_config, test_directory,
};

fn login(username: &str, password: &str) -> actix_http::Request {
    test::TestRequest::post()
        .uri("/login")
        .set_form([("username", username), ("password", password)])
        .to_request()
}

// =============================================================================
// Bind Strategy
// =============================================================================

#[actix_web::test]
async fn test_bind_login_success() {
    let app = create_test_app(InMemorySessionStore::new(), test_authenticator(&test_directory())).await;

    let resp = test::call_service(&app, login("bob", "bobspassword")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await, "Logged in: bob");

    let resp = test::call_service(&app, login("ann", "annspassword")).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_bad_password_and_unknown_user_look_the_same() {
    let store = InMemorySessionStore::new();
    let app = create_test_app(store.clone(), test_authenticator(&test_directory())).await;

    let resp = test::call_service(&app, login("bob", "wrong")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(session_cookie(&resp).is_none());
    let wrong_password = body_string(resp).await;

    let resp = test::call_service(&app, login("mallory", "whatever")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_string(resp).await, wrong_password);

    assert_eq!(store.session_count(), 0);
}

#[actix_web::test]
async fn test_empty_password_rejected() {
    let directory = test_directory();
    let app = create_test_app(InMemorySessionStore::new(), test_authenticator(&directory)).await;

    let resp = test::call_service(&app, login("bob", "")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(directory.operations().is_empty());
}

#[actix_web::test]
async fn test_directory_outage() {
    let directory = test_directory();
    let app = create_test_app(InMemorySessionStore::new(), test_authenticator(&directory)).await;
    directory.set_available(false);

    let resp = test::call_service(&app, login("bob", "bobspassword")).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_web::test]
async fn test_group_roles() {
    let app = create_test_app(InMemorySessionStore::new(), test_authenticator(&test_directory())).await;

    let resp = test::call_service(&app, login("bob", "bobspassword")).await;
    let bob = session_cookie(&resp).expect("session cookie");
    let resp = test::call_service(&app, login("ann", "annspassword")).await;
    let ann = session_cookie(&resp).expect("session cookie");

    let req = test::TestRequest::get().uri("/developers").cookie(bob).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/developers").cookie(ann).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get().uri("/developers").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Password Comparison Strategy
// =============================================================================

#[actix_web::test]
async fn test_compare_login() {
    let authenticator = LdapAuthenticator::new(
        &test_config(LdapAuthStrategy::PasswordComparison).no_group_search(),
        Arc::new(compare_directory()),
    )
    .unwrap();
    let app = create_test_app(InMemorySessionStore::new(), authenticator).await;

    let resp = test::call_service(&app, login("bob", "bobspassword")).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(&app, login("bob", "wrong")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = test::call_service(&app, login("nobody", "bobspassword")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
