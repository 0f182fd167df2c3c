//! Classification of authentication tokens.
//!
//! # Spring Equivalent
//! `AuthenticationTrustResolver` / `AuthenticationTrustResolverImpl`

use crate::http::security::authentication::Authentication;

/// Decides whether an authentication represents an anonymous or remembered user.
pub trait AuthenticationTrustResolver {
    /// Returns `true` for anonymous tokens. A missing authentication is not anonymous.
    fn is_anonymous(&self, authentication: Option<&Authentication>) -> bool;

    /// Returns `true` for tokens restored from a remember-me cookie.
    fn is_remember_me(&self, authentication: Option<&Authentication>) -> bool;
}

/// Resolver based on [`AuthenticationKind`](crate::http::security::AuthenticationKind).
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultTrustResolver;

impl AuthenticationTrustResolver for DefaultTrustResolver {
    fn is_anonymous(&self, authentication: Option<&Authentication>) -> bool {
        authentication.is_some_and(Authentication::is_anonymous)
    }

    fn is_remember_me(&self, authentication: Option<&Authentication>) -> bool {
        authentication.is_some_and(Authentication::is_remember_me)
    }
}
