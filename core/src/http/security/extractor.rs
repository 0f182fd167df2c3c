//! Extractors for accessing the current authentication in handlers.
//!
//! # Spring Equivalent
//! `@AuthenticationPrincipal` annotation / `SecurityContextHolder`

use std::future::{ready, Ready};
use std::ops::Deref;

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};

use crate::http::error::AuthError;
use crate::http::security::authentication::Authentication;
use crate::http::security::holder::CurrentAuthentication;

fn logged_in(req: &HttpRequest) -> Option<Authentication> {
    CurrentAuthentication::get(req).filter(|auth| auth.is_authenticated() && !auth.is_anonymous())
}

/// Extractor for the authenticated principal.
///
/// # Spring Equivalent
/// `@AuthenticationPrincipal` parameter or `SecurityContextHolder.getContext().getAuthentication()`
///
/// # Usage
/// ```ignore
/// use actix_context_security::http::security::AuthenticatedPrincipal;
///
/// async fn handler(principal: AuthenticatedPrincipal) -> impl Responder {
///     format!("Hello, {}!", principal.get_principal())
/// }
/// ```
///
/// # Errors
/// Returns `401 Unauthorized` when there is no authentication or it is anonymous.
#[derive(Debug, Clone)]
pub struct AuthenticatedPrincipal(Authentication);

impl AuthenticatedPrincipal {
    /// Returns the inner authentication.
    pub fn into_inner(self) -> Authentication {
        self.0
    }
}

impl Deref for AuthenticatedPrincipal {
    type Target = Authentication;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for AuthenticatedPrincipal {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match logged_in(req) {
            Some(auth) => ready(Ok(AuthenticatedPrincipal(auth))),
            None => ready(Err(AuthError::Unauthorized)),
        }
    }
}

/// Optional extractor for the authenticated principal.
///
/// Returns `None` if not authenticated instead of an error.
#[derive(Debug, Clone)]
pub struct OptionalPrincipal(Option<Authentication>);

impl OptionalPrincipal {
    pub fn into_inner(self) -> Option<Authentication> {
        self.0
    }

    pub fn is_authenticated(&self) -> bool {
        self.0.is_some()
    }
}

impl Deref for OptionalPrincipal {
    type Target = Option<Authentication>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for OptionalPrincipal {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(OptionalPrincipal(logged_in(req))))
    }
}

/// Extension trait for HttpRequest to check authentication.
pub trait SecurityExt {
    /// Returns a clone of the current authentication, anonymous included.
    fn get_authentication(&self) -> Option<Authentication>;

    /// Returns true for an authenticated, non-anonymous principal.
    fn is_authenticated(&self) -> bool;

    fn has_role(&self, role: &str) -> bool;

    fn has_authority(&self, authority: &str) -> bool;

    fn has_any_authority(&self, authorities: &[&str]) -> bool;
}

impl SecurityExt for HttpRequest {
    fn get_authentication(&self) -> Option<Authentication> {
        CurrentAuthentication::get(self)
    }

    fn is_authenticated(&self) -> bool {
        logged_in(self).is_some()
    }

    fn has_role(&self, role: &str) -> bool {
        CurrentAuthentication::get(self).is_some_and(|auth| auth.has_role(role))
    }

    fn has_authority(&self, authority: &str) -> bool {
        CurrentAuthentication::get(self).is_some_and(|auth| auth.has_authority(authority))
    }

    fn has_any_authority(&self, authorities: &[&str]) -> bool {
        CurrentAuthentication::get(self).is_some_and(|auth| auth.has_any_authority(authorities))
    }
}
