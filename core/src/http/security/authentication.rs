//! Authentication model carried by the security context.
//!
//! # Spring Equivalent
//! `Authentication` interface, `UsernamePasswordAuthenticationToken`,
//! `AnonymousAuthenticationToken` and `RememberMeAuthenticationToken`

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Prefix applied to role names when they are stored as authorities.
pub const ROLE_PREFIX: &str = "ROLE_";

/// The kind of authentication token.
///
/// Anonymous and remember-me tokens carry a hash of the key they were issued with,
/// so tokens issued by different configurations never compare equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthenticationKind {
    /// Username/password login (form, basic, directory).
    UsernamePassword,
    /// Sentinel for "no logged-in user".
    Anonymous { key_hash: u64 },
    /// Restored from a remember-me cookie.
    RememberMe { key_hash: u64 },
}

/// Result of an authentication attempt.
///
/// # Spring Equivalent
/// `Authentication`
///
/// # Example
/// ```
/// use actix_context_security::http::security::Authentication;
///
/// let auth = Authentication::authenticated("admin")
///     .roles(&["ADMIN".into()])
///     .authorities(&["users:read".into()]);
///
/// assert!(auth.has_role("ADMIN"));
/// assert!(auth.has_authority("ROLE_ADMIN"));
/// assert!(auth.has_authority("users:read"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Authentication {
    principal: String,
    credentials: Option<String>,
    authorities: Vec<String>,
    authenticated: bool,
    kind: AuthenticationKind,
    #[serde(default)]
    details: BTreeMap<String, String>,
}

impl Authentication {
    /// Creates an unauthenticated username/password token, as submitted by a login form.
    pub fn unauthenticated(principal: impl Into<String>, credentials: impl Into<String>) -> Self {
        Authentication {
            principal: principal.into(),
            credentials: Some(credentials.into()),
            authorities: Vec::new(),
            authenticated: false,
            kind: AuthenticationKind::UsernamePassword,
            details: BTreeMap::new(),
        }
    }

    /// Creates an authenticated username/password token with no credentials.
    pub fn authenticated(principal: impl Into<String>) -> Self {
        Authentication {
            principal: principal.into(),
            credentials: None,
            authorities: Vec::new(),
            authenticated: true,
            kind: AuthenticationKind::UsernamePassword,
            details: BTreeMap::new(),
        }
    }

    /// Creates an anonymous token.
    ///
    /// # Spring Equivalent
    /// `new AnonymousAuthenticationToken(key, "anonymousUser", authorities)`
    pub fn anonymous(key: &str, principal: impl Into<String>) -> Self {
        Authentication {
            principal: principal.into(),
            credentials: None,
            authorities: vec![format!("{}ANONYMOUS", ROLE_PREFIX)],
            authenticated: true,
            kind: AuthenticationKind::Anonymous {
                key_hash: key_hash(key),
            },
            details: BTreeMap::new(),
        }
    }

    /// Creates a remember-me token.
    pub fn remember_me(key: &str, principal: impl Into<String>) -> Self {
        Authentication {
            principal: principal.into(),
            credentials: None,
            authorities: Vec::new(),
            authenticated: true,
            kind: AuthenticationKind::RememberMe {
                key_hash: key_hash(key),
            },
            details: BTreeMap::new(),
        }
    }

    /// Returns the principal name.
    pub fn get_principal(&self) -> &str {
        &self.principal
    }

    /// Returns the credentials, unless they have been erased.
    pub fn get_credentials(&self) -> Option<&str> {
        self.credentials.as_deref()
    }

    /// Returns the granted authorities.
    pub fn get_authorities(&self) -> &[String] {
        &self.authorities
    }

    /// Returns the token kind.
    pub fn kind(&self) -> AuthenticationKind {
        self.kind
    }

    /// Returns a detail value (e.g. `dn` for directory logins).
    pub fn get_detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).map(|s| s.as_str())
    }

    /// Returns all details.
    pub fn details(&self) -> &BTreeMap<String, String> {
        &self.details
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self.kind, AuthenticationKind::Anonymous { .. })
    }

    pub fn is_remember_me(&self) -> bool {
        matches!(self.kind, AuthenticationKind::RememberMe { .. })
    }

    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.authenticated = authenticated;
    }

    /// Removes the credentials.
    ///
    /// # Spring Equivalent
    /// `CredentialsContainer.eraseCredentials()`
    pub fn erase_credentials(&mut self) {
        self.credentials = None;
    }

    /// Adds roles as `ROLE_`-prefixed authorities (builder pattern).
    pub fn roles(self, roles: &[String]) -> Self {
        let prefixed: Vec<String> = roles
            .iter()
            .map(|role| {
                if role.starts_with(ROLE_PREFIX) {
                    role.clone()
                } else {
                    format!("{}{}", ROLE_PREFIX, role)
                }
            })
            .collect();
        self.authorities(&prefixed)
    }

    /// Adds authorities (builder pattern).
    pub fn authorities(mut self, authorities: &[String]) -> Self {
        for authority in authorities {
            if !self.authorities.contains(authority) {
                self.authorities.push(authority.clone());
            }
        }
        self
    }

    /// Adds a detail entry (builder pattern).
    pub fn detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Checks for a `ROLE_`-prefixed authority.
    pub fn has_role(&self, role: &str) -> bool {
        if role.starts_with(ROLE_PREFIX) {
            self.has_authority(role)
        } else {
            self.has_authority(&format!("{}{}", ROLE_PREFIX, role))
        }
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == authority)
    }

    /// Checks if the token has ANY of the specified authorities (OR logic).
    pub fn has_any_authority(&self, authorities: &[&str]) -> bool {
        authorities.iter().any(|auth| self.has_authority(auth))
    }

    /// Checks if the token has ALL of the specified authorities (AND logic).
    pub fn has_all_authorities(&self, authorities: &[&str]) -> bool {
        authorities.iter().all(|auth| self.has_authority(auth))
    }
}

impl fmt::Display for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Authentication {{ principal: {}, authenticated: {}, authorities: {:?}, kind: {:?} }}",
            self.principal, self.authenticated, self.authorities, self.kind
        )
    }
}

/// First 64 bits of the SHA-256 digest of `key`. Stored in sessions, so it must not
/// change between builds.
fn key_hash(key: &str) -> u64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthenticated_token() {
        let auth = Authentication::unauthenticated("bob", "secret");
        assert_eq!(auth.get_principal(), "bob");
        assert_eq!(auth.get_credentials(), Some("secret"));
        assert!(!auth.is_authenticated());
        assert!(auth.get_authorities().is_empty());
    }

    #[test]
    fn test_roles_are_prefixed_once() {
        let auth = Authentication::authenticated("admin")
            .roles(&["ADMIN".into(), "ROLE_USER".into()])
            .roles(&["ADMIN".into()]);

        assert_eq!(auth.get_authorities(), &["ROLE_ADMIN", "ROLE_USER"]);
        assert!(auth.has_role("ADMIN"));
        assert!(auth.has_role("ROLE_USER"));
        assert!(!auth.has_role("MANAGER"));
    }

    #[test]
    fn test_authorities_no_duplicates() {
        let auth = Authentication::authenticated("admin")
            .authorities(&["read".into(), "write".into()])
            .authorities(&["read".into(), "delete".into()]);

        assert_eq!(auth.get_authorities().len(), 3);
        assert!(auth.has_any_authority(&["delete", "admin"]));
        assert!(auth.has_all_authorities(&["read", "write"]));
        assert!(!auth.has_all_authorities(&["read", "admin"]));
    }

    #[test]
    fn test_erase_credentials() {
        let mut auth = Authentication::unauthenticated("bob", "secret");
        auth.erase_credentials();
        assert_eq!(auth.get_credentials(), None);
    }

    #[test]
    fn test_anonymous_tokens_depend_on_key() {
        let a = Authentication::anonymous("key-1", "anonymousUser");
        let b = Authentication::anonymous("key-1", "anonymousUser");
        let c = Authentication::anonymous("key-2", "anonymousUser");

        assert!(a.is_anonymous());
        assert!(a.has_role("ANONYMOUS"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_key_hash_is_stable() {
        assert_eq!(key_hash("key"), 0x2c70_e12b_7a06_46f9);

        let json = serde_json::to_value(Authentication::remember_me("key", "bob")).unwrap();
        assert_eq!(json["kind"]["key_hash"], 0x2c70_e12b_7a06_46f9_u64);
    }

    #[test]
    fn test_remember_me_token() {
        let auth = Authentication::remember_me("key", "bob");
        assert!(auth.is_remember_me());
        assert!(!auth.is_anonymous());
    }

    #[test]
    fn test_display_hides_credentials() {
        let auth = Authentication::unauthenticated("admin", "topsecret");
        let display = format!("{}", auth);
        assert!(display.contains("admin"));
        assert!(!display.contains("topsecret"));
    }

    #[test]
    fn test_serialization_keeps_kind_and_details() {
        let auth = Authentication::remember_me("key", "bob").detail("dn", "uid=bob,ou=people");
        let json = serde_json::to_string(&auth).unwrap();
        let restored: Authentication = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, auth);
        assert_eq!(restored.get_detail("dn"), Some("uid=bob,ou=people"));
    }
}
