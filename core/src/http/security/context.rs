//! Security context carried through a request.
//!
//! # Spring Security Equivalent
//! `org.springframework.security.core.context.SecurityContext` / `SecurityContextImpl`
//!
//! # Overview
//! A security context holds the current [`Authentication`], if any. Contexts are
//! compared by their authentication only, and the repository uses
//! [`SecurityContext::fingerprint`] to detect whether a request changed the context.
//!
//! Custom context types implement the trait and are plugged into the repository
//! through a factory closure, replacing reflective instantiation:
//!
//! ```ignore
//! #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
//! struct TenantContext {
//!     authentication: Option<Authentication>,
//!     tenant: Option<String>,
//! }
//!
//! impl SecurityContext for TenantContext {
//!     const TYPE_NAME: &'static str = "TenantContext";
//!     // ...
//! }
//! ```

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::http::security::authentication::Authentication;

/// A security context implementation.
///
/// Implementors must keep `PartialEq` consistent with the authentication: two
/// contexts holding equal authentications are equal.
pub trait SecurityContext:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + 'static
{
    /// Tag written next to the serialized context in the session.
    const TYPE_NAME: &'static str;

    /// Returns the current authentication.
    fn authentication(&self) -> Option<&Authentication>;

    /// Returns the current authentication for in-place changes.
    fn authentication_mut(&mut self) -> Option<&mut Authentication>;

    /// Replaces the current authentication.
    fn set_authentication(&mut self, authentication: Option<Authentication>);

    /// Returns an independent copy of this context.
    fn copy(&self) -> Self {
        self.clone()
    }

    /// Hash over every field of the authentication. Recomputed on each call.
    fn fingerprint(&self) -> u64 {
        fingerprint_of(self.authentication())
    }
}

/// Computes the fingerprint used by [`SecurityContext::fingerprint`].
pub fn fingerprint_of(authentication: Option<&Authentication>) -> u64 {
    let mut hasher = DefaultHasher::new();
    authentication.hash(&mut hasher);
    hasher.finish()
}

/// Default security context.
///
/// # Spring Security Equivalent
/// `SecurityContextImpl`
///
/// # Example
/// ```
/// use actix_context_security::http::security::{Authentication, SecurityContext, SecurityContextImpl};
///
/// let empty = SecurityContextImpl::default();
/// let mut context = SecurityContextImpl::default();
/// assert_eq!(context, empty);
///
/// context.set_authentication(Some(Authentication::authenticated("bob")));
/// assert_ne!(context, empty);
/// assert_ne!(context.fingerprint(), empty.fingerprint());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecurityContextImpl {
    authentication: Option<Authentication>,
}

impl SecurityContextImpl {
    /// Creates a context holding the given authentication.
    pub fn new(authentication: Option<Authentication>) -> Self {
        SecurityContextImpl { authentication }
    }
}

impl SecurityContext for SecurityContextImpl {
    const TYPE_NAME: &'static str = "SecurityContextImpl";

    fn authentication(&self) -> Option<&Authentication> {
        self.authentication.as_ref()
    }

    fn authentication_mut(&mut self) -> Option<&mut Authentication> {
        self.authentication.as_mut()
    }

    fn set_authentication(&mut self, authentication: Option<Authentication>) {
        self.authentication = authentication;
    }
}

impl fmt::Display for SecurityContextImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.authentication {
            Some(auth) => write!(f, "SecurityContextImpl {{ {} }}", auth),
            None => write!(f, "SecurityContextImpl {{ Null authentication }}"),
        }
    }
}
