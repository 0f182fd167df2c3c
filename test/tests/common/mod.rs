//! Common test utilities and configuration.
//!
//! This module provides shared test infrastructure including:
//! - Test directory with users and groups
//! - Test app builder
//! - Helper functions

#![allow(dead_code)]

use std::sync::Arc;

use actix_web::body::MessageBody;
use actix_web::cookie::Cookie;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::{get, post, test, web, App, HttpResponse, Responder};
use serde::Deserialize;

use actix_context_security::http::error::AuthError;
use actix_context_security::http::security::ldap::{
    Attributes, InMemoryDirectory, LdapAuthStrategy, LdapAuthenticator, LdapConfig,
};
use actix_context_security::http::security::{
    AuthenticatedPrincipal, Authentication, HttpSessionSecurityContextRepository,
    InMemorySessionStore, LdapShaPasswordEncoder, OptionalPrincipal, PasswordEncoder,
    SecurityContextHolder, SecurityContextImpl, SecurityContextPersistence, SecurityExt,
};

pub const SESSION_COOKIE: &str = "JSESSIONID";

// =============================================================================
// Test Configuration
// =============================================================================

/// Creates a test directory below `dc=example,dc=com`.
///
/// Users:
/// - bob/bobspassword: member of developers (salted SHA-256 password)
/// - ann/annspassword: member of managers (plain password)
pub fn test_directory() -> InMemoryDirectory {
    InMemoryDirectory::new("dc=example,dc=com")
        .with_entry(
            "uid=bob,ou=people",
            Attributes::new()
                .with("uid", "bob")
                .with("cn", "Bob Hamilton")
                .with("mail", "bob@example.com")
                .with(
                    "userPassword",
                    LdapShaPasswordEncoder::salted().encode("bobspassword"),
                ),
        )
        .with_entry(
            "uid=ann,ou=people",
            Attributes::new()
                .with("uid", "ann")
                .with("cn", "Ann Smith")
                .with("userPassword", "annspassword"),
        )
        .with_entry(
            "cn=developers,ou=groups",
            Attributes::new()
                .with("cn", "developers")
                .with("member", "uid=bob,ou=people,dc=example,dc=com"),
        )
        .with_entry(
            "cn=managers,ou=groups",
            Attributes::new()
                .with("cn", "managers")
                .with("member", "uid=ann,ou=people,dc=example,dc=com"),
        )
        .hide_attribute("userPassword")
}

/// Creates a directory whose passwords are unsalted `{SHA256}` digests, as
/// required for directory-side comparison.
pub fn compare_directory() -> InMemoryDirectory {
    InMemoryDirectory::new("dc=example,dc=com")
        .with_entry(
            "uid=bob,ou=people",
            Attributes::new()
                .with("uid", "bob")
                .with("cn", "Bob Hamilton")
                .with("userPassword", LdapShaPasswordEncoder::new().encode("bobspassword")),
        )
        .hide_attribute("userPassword")
}

pub fn test_config(strategy: LdapAuthStrategy) -> LdapConfig {
    LdapConfig::new("ldap://localhost:389")
        .base_dn("dc=example,dc=com")
        .user_dn_pattern("uid={0},ou=people")
        .strategy(strategy)
}

pub fn test_authenticator(directory: &InMemoryDirectory) -> LdapAuthenticator {
    LdapAuthenticator::new(&test_config(LdapAuthStrategy::Bind), Arc::new(directory.clone()))
        .expect("valid directory configuration")
}

/// Returns the session cookie set by a response, if any.
pub fn session_cookie<B>(resp: &ServiceResponse<B>) -> Option<Cookie<'static>> {
    resp.response()
        .cookies()
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .map(|cookie| cookie.into_owned())
}

pub async fn body_string<B: MessageBody>(resp: ServiceResponse<B>) -> String {
    String::from_utf8_lossy(&test::read_body(resp).await).to_string()
}

// =============================================================================
// Test Handlers
// =============================================================================

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[post("/login")]
pub async fn login(
    holder: SecurityContextHolder,
    authenticator: web::Data<LdapAuthenticator>,
    form: web::Form<LoginForm>,
) -> Result<HttpResponse, AuthError> {
    let LoginForm { username, password } = form.into_inner();
    let auth = authenticator.authenticate_async(username, password).await?;
    let body = format!("Logged in: {}", auth.get_principal());
    holder.set_authentication(Some(auth));
    Ok(HttpResponse::Ok().body(body))
}

#[post("/logout")]
pub async fn logout(holder: SecurityContextHolder) -> impl Responder {
    holder.clear();
    HttpResponse::Ok().body("Logged out")
}

#[get("/me")]
pub async fn me(principal: AuthenticatedPrincipal) -> impl Responder {
    HttpResponse::Ok().body(format!("Principal: {}", principal.get_principal()))
}

#[get("/")]
pub async fn index(principal: OptionalPrincipal) -> impl Responder {
    match principal.into_inner() {
        Some(auth) => HttpResponse::Ok().body(format!("Hello, {}", auth.get_principal())),
        None => HttpResponse::Ok().body("Hello, guest"),
    }
}

#[get("/developers")]
pub async fn developers(req: actix_web::HttpRequest) -> impl Responder {
    if !req.is_authenticated() {
        return HttpResponse::Unauthorized().finish();
    }
    if !req.has_role("DEVELOPERS") {
        return HttpResponse::Forbidden().finish();
    }
    HttpResponse::Ok().body("Developers area")
}

/// Stores an anonymous token, which must never reach the session.
#[get("/anonymous")]
pub async fn anonymous(holder: SecurityContextHolder) -> impl Responder {
    holder.set_authentication(Some(Authentication::anonymous("key", "anonymousUser")));
    HttpResponse::Ok().body("Anonymous")
}

/// Authenticates and then fails.
#[get("/login-then-fail")]
pub async fn login_then_fail(holder: SecurityContextHolder) -> Result<HttpResponse, AuthError> {
    holder.set_authentication(Some(Authentication::authenticated("carol")));
    Err(AuthError::ServiceUnavailable)
}

#[get("/link")]
pub async fn link(req: actix_web::HttpRequest, holder: SecurityContextHolder) -> impl Responder {
    HttpResponse::Ok().body(holder.encode_url(&req, "/me?tab=1"))
}

// =============================================================================
// Test App
// =============================================================================

pub async fn create_test_app(
    store: InMemorySessionStore,
    authenticator: LdapAuthenticator,
) -> impl Service<actix_http::Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error>
{
    let repository = HttpSessionSecurityContextRepository::<SecurityContextImpl, _>::new(store);

    test::init_service(
        App::new()
            .app_data(web::Data::new(authenticator))
            .wrap(SecurityContextPersistence::new(repository))
            .service(login)
            .service(logout)
            .service(me)
            .service(index)
            .service(developers)
            .service(anonymous)
            .service(login_then_fail)
            .service(link),
    )
    .await
}
