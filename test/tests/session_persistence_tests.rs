//! Security context persistence tests.
//!
//! Tests that the context set by one request is found by the next one through
//! the session cookie, and that the session is only written when needed.

mod common;

use actix_web::http::StatusCode;
use actix_web::{test, web, App, HttpResponse};

use actix_context_security::http::security::{
    InMemorySessionStore, SecurityContextHolder, SPRING_SECURITY_CONTEXT_KEY,
};

use common::{body_string, create_test_app, session_cookie, test_authenticator, test_directory};

fn login_request() -> test::TestRequest {
    test::TestRequest::post()
        .uri("/login")
        .set_form([("username", "bob"), ("password", "bobspassword")])
}

// =============================================================================
// Round Trip
// =============================================================================

#[actix_web::test]
async fn test_login_is_remembered_across_requests() {
    let store = InMemorySessionStore::new();
    let app = create_test_app(store.clone(), test_authenticator(&test_directory())).await;

    let resp = test::call_service(&app, login_request().to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = session_cookie(&resp).expect("session cookie");
    assert!(cookie.http_only().unwrap_or(false));
    assert_eq!(store.session_count(), 1);

    let req = test::TestRequest::get()
        .uri("/me")
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(session_cookie(&resp).is_none());
    assert_eq!(body_string(resp).await, "Principal: bob");
}

#[actix_web::test]
async fn test_session_holds_tagged_context() {
    let store = InMemorySessionStore::new();
    let app = create_test_app(store.clone(), test_authenticator(&test_directory())).await;

    let resp = test::call_service(&app, login_request().to_request()).await;
    let cookie = session_cookie(&resp).expect("session cookie");

    let stored = store
        .attribute(cookie.value(), SPRING_SECURITY_CONTEXT_KEY)
        .expect("context in session");
    assert_eq!(stored["type"], "SecurityContextImpl");
    assert_eq!(stored["context"]["authentication"]["principal"], "bob");
}

#[actix_web::test]
async fn test_unauthenticated_request() {
    let store = InMemorySessionStore::new();
    let app = create_test_app(store.clone(), test_authenticator(&test_directory())).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/me").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(session_cookie(&resp).is_none());
    assert_eq!(body_string(resp).await, "Hello, guest");
    assert_eq!(store.session_count(), 0);
}

// =============================================================================
// Save Rules
// =============================================================================

#[actix_web::test]
async fn test_anonymous_authentication_is_not_stored() {
    let store = InMemorySessionStore::new();
    let app = create_test_app(store.clone(), test_authenticator(&test_directory())).await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/anonymous").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(session_cookie(&resp).is_none());
    assert_eq!(store.session_count(), 0);
}

#[actix_web::test]
async fn test_context_saved_when_handler_fails() {
    let store = InMemorySessionStore::new();
    let app = create_test_app(store.clone(), test_authenticator(&test_directory())).await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/login-then-fail").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let cookie = session_cookie(&resp).expect("session cookie");

    let req = test::TestRequest::get().uri("/me").cookie(cookie).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await, "Principal: carol");
}

#[actix_web::test]
async fn test_logout_removes_context() {
    let store = InMemorySessionStore::new();
    let app = create_test_app(store.clone(), test_authenticator(&test_directory())).await;

    let resp = test::call_service(&app, login_request().to_request()).await;
    let cookie = session_cookie(&resp).expect("session cookie");

    let req = test::TestRequest::post()
        .uri("/logout")
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    // The session survives and now holds an empty context
    assert!(store.contains_session(cookie.value()));
    let stored = store
        .attribute(cookie.value(), SPRING_SECURITY_CONTEXT_KEY)
        .expect("context in session");
    assert!(stored["context"]["authentication"].is_null());

    let req = test::TestRequest::get().uri("/me").cookie(cookie).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_unknown_session_cookie_is_cleared() {
    let store = InMemorySessionStore::new();
    let app = create_test_app(store.clone(), test_authenticator(&test_directory())).await;

    let req = test::TestRequest::get()
        .uri("/")
        .cookie(actix_web::cookie::Cookie::new("JSESSIONID", "stale"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    let cookie = session_cookie(&resp).expect("removal cookie");
    assert_eq!(cookie.value(), "");
    assert_eq!(store.session_count(), 0);
}

// =============================================================================
// URL Encoding
// =============================================================================

#[actix_web::test]
async fn test_encode_url_with_session() {
    let store = InMemorySessionStore::new();
    let app = create_test_app(store.clone(), test_authenticator(&test_directory())).await;

    let resp = test::call_service(&app, login_request().to_request()).await;
    let cookie = session_cookie(&resp).expect("session cookie");

    let req = test::TestRequest::get().uri("/link").cookie(cookie.clone()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(
        body_string(resp).await,
        format!("/me;jsessionid={}?tab=1", cookie.value())
    );

    let resp = test::call_service(&app, test::TestRequest::get().uri("/link").to_request()).await;
    assert_eq!(body_string(resp).await, "/me?tab=1");
}

#[actix_web::test]
async fn test_rewritten_url_finds_session_without_cookie() {
    let store = InMemorySessionStore::new();
    let app = create_test_app(store.clone(), test_authenticator(&test_directory())).await;

    let resp = test::call_service(&app, login_request().to_request()).await;
    let cookie = session_cookie(&resp).expect("session cookie");

    let req = test::TestRequest::get().uri("/link").cookie(cookie).to_request();
    let link = body_string(test::call_service(&app, req).await).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri(&link).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(session_cookie(&resp).is_none());
    assert_eq!(body_string(resp).await, "Principal: bob");
    assert_eq!(store.session_count(), 1);
}

#[actix_web::test]
async fn test_rewritten_url_with_unknown_session() {
    let store = InMemorySessionStore::new();
    let app = create_test_app(store.clone(), test_authenticator(&test_directory())).await;

    let req = test::TestRequest::get().uri("/me;jsessionid=unknown").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(store.session_count(), 0);
}

// =============================================================================
// Misconfiguration
// =============================================================================

#[actix_web::test]
async fn test_holder_without_middleware() {
    let app = test::init_service(App::new().route(
        "/",
        web::get().to(|_holder: SecurityContextHolder| async { HttpResponse::Ok().finish() }),
    ))
    .await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
