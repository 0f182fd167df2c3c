//! Bind verification.
//!
//! # Spring Security Equivalent
//! `BindAuthenticator`

use std::sync::Arc;

use tracing::debug;

use crate::http::security::ldap::config::{build_user_dns, qualify_dn};
use crate::http::security::ldap::directory::{ConnectionGuard, ContextSource, DirectoryEntry};
use crate::http::security::ldap::error::{LdapError, VerificationError};
use crate::http::security::ldap::user_search::FilterBasedLdapUserSearch;

/// Verifies credentials by binding to the directory as the user.
pub struct BindAuthenticator {
    source: Arc<dyn ContextSource>,
    user_dn_patterns: Vec<String>,
    user_search: Option<FilterBasedLdapUserSearch>,
}

impl BindAuthenticator {
    pub fn new(source: Arc<dyn ContextSource>) -> Self {
        BindAuthenticator {
            source,
            user_dn_patterns: Vec::new(),
            user_search: None,
        }
    }

    /// Set the user DN patterns, tried in order.
    pub fn user_dn_patterns(mut self, patterns: Vec<String>) -> Self {
        self.user_dn_patterns = patterns;
        self
    }

    /// Set the search used when no pattern accepts the bind.
    pub fn user_search(mut self, search: FilterBasedLdapUserSearch) -> Self {
        self.user_search = Some(search);
        self
    }

    /// Binds as the user and returns the user's entry.
    pub fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<DirectoryEntry, VerificationError> {
        if username.is_empty() || password.is_empty() {
            debug!("Rejecting empty username or password");
            return Err(VerificationError::InvalidCredentials);
        }

        for dn in build_user_dns(&self.user_dn_patterns, username) {
            if let Some(entry) = self.bind_with_dn(&dn, password)? {
                return Ok(entry);
            }
        }

        if let Some(search) = &self.user_search {
            let found = {
                let mut conn = ConnectionGuard::new(
                    self.source.read_only_context().map_err(unavailable)?,
                );
                search.search_for_user(&mut *conn, username)
            };
            match found {
                Ok(entry) => {
                    if let Some(entry) = self.bind_with_dn(&entry.dn, password)? {
                        return Ok(entry);
                    }
                }
                Err(LdapError::NameNotFound(msg)) => debug!("{}", msg),
                Err(e) => return Err(unavailable(e)),
            }
        }

        debug!("Failed to bind as {}", username);
        Err(VerificationError::InvalidCredentials)
    }

    /// Returns `Ok(None)` when the directory rejects the bind so the next candidate is tried.
    fn bind_with_dn(
        &self,
        dn: &str,
        password: &str,
    ) -> Result<Option<DirectoryEntry>, VerificationError> {
        let full_dn = qualify_dn(dn, &self.source.base_dn());
        debug!("Attempting to bind as {}", full_dn);

        let mut conn = match self.source.context(&full_dn, password) {
            Ok(conn) => ConnectionGuard::new(conn),
            Err(LdapError::AuthenticationFailed(msg)) | Err(LdapError::NameNotFound(msg)) => {
                debug!("Bind as {} failed: {}", full_dn, msg);
                return Ok(None);
            }
            Err(e) => return Err(unavailable(e)),
        };

        match conn.get_attributes(dn, None) {
            Ok(attributes) => Ok(Some(DirectoryEntry {
                dn: dn.to_string(),
                full_dn,
                attributes,
            })),
            Err(LdapError::NameNotFound(_)) => Ok(None),
            Err(e) => Err(unavailable(e)),
        }
    }
}

pub(crate) fn unavailable(err: LdapError) -> VerificationError {
    tracing::warn!("Directory failure during authentication: {}", err);
    VerificationError::DirectoryUnavailable(err.to_string())
}
