//! Password comparison verification.
//!
//! # Spring Security Equivalent
//! `PasswordComparisonAuthenticator`
//!
//! The user's entry is read over a service connection. When the password attribute
//! is readable it is compared locally; otherwise the directory compares it with an
//! object-scope search such as `(userPassword={0})`.

use std::sync::Arc;

use tracing::debug;

use crate::http::security::crypto::{LdapShaPasswordEncoder, PasswordEncoder};
use crate::http::security::ldap::bind::unavailable;
use crate::http::security::ldap::config::{build_user_dns, qualify_dn};
use crate::http::security::ldap::directory::{
    ConnectionGuard, ContextSource, DirectoryConnection, DirectoryEntry, SearchControls,
};
use crate::http::security::ldap::error::{LdapError, VerificationError};
use crate::http::security::ldap::user_search::FilterBasedLdapUserSearch;

/// Verifies credentials by comparing the password with the user's entry.
pub struct PasswordComparisonAuthenticator {
    source: Arc<dyn ContextSource>,
    user_dn_patterns: Vec<String>,
    user_search: Option<FilterBasedLdapUserSearch>,
    password_attribute: String,
    password_compare_filter: String,
    use_password_attribute_compare: bool,
    encoder: Box<dyn PasswordEncoder>,
}

impl PasswordComparisonAuthenticator {
    /// Creates an authenticator comparing `userPassword` with `{SHA256}` encoding.
    pub fn new(source: Arc<dyn ContextSource>) -> Self {
        PasswordComparisonAuthenticator {
            source,
            user_dn_patterns: Vec::new(),
            user_search: None,
            password_attribute: "userPassword".to_string(),
            password_compare_filter: "(userPassword={0})".to_string(),
            use_password_attribute_compare: true,
            encoder: Box::new(LdapShaPasswordEncoder::new()),
        }
    }

    /// Set the user DN patterns, tried in order.
    pub fn user_dn_patterns(mut self, patterns: Vec<String>) -> Self {
        self.user_dn_patterns = patterns;
        self
    }

    /// Set the search used when no pattern names an existing entry.
    pub fn user_search(mut self, search: FilterBasedLdapUserSearch) -> Self {
        self.user_search = Some(search);
        self
    }

    /// Set the password attribute. Also used in the default compare filter.
    pub fn password_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.password_attribute = attribute.into();
        self.password_compare_filter = format!("({}={{0}})", self.password_attribute);
        self
    }

    /// Set the filter used by the directory-side compare.
    pub fn password_compare_filter(mut self, filter: impl Into<String>) -> Self {
        self.password_compare_filter = filter.into();
        self
    }

    /// Compare locally when the password attribute is readable (default: true).
    pub fn use_password_attribute_compare(mut self, local: bool) -> Self {
        self.use_password_attribute_compare = local;
        self
    }

    /// Set the encoder applied to the presented password.
    pub fn password_encoder<E: PasswordEncoder + 'static>(self, encoder: E) -> Self {
        self.boxed_password_encoder(Box::new(encoder))
    }

    pub(crate) fn boxed_password_encoder(mut self, encoder: Box<dyn PasswordEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Checks the password and returns the user's entry.
    pub fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<DirectoryEntry, VerificationError> {
        if username.is_empty() || password.is_empty() {
            debug!("Rejecting empty username or password");
            return Err(VerificationError::InvalidCredentials);
        }

        let mut conn =
            ConnectionGuard::new(self.source.read_only_context().map_err(unavailable)?);

        let entry = self.find_user(&mut *conn, username)?;

        let stored = if self.use_password_attribute_compare {
            entry
                .attributes
                .get_first(&self.password_attribute)
                .map(|s| s.to_string())
        } else {
            None
        };

        let matched = match stored {
            Some(stored) => {
                debug!("Comparing password locally for {}", entry.full_dn);
                self.encoder.matches(password, &stored)
            }
            None => self.compare_in_directory(&mut *conn, &entry, password)?,
        };

        if matched {
            Ok(entry)
        } else {
            debug!("Password mismatch for {}", entry.full_dn);
            Err(VerificationError::InvalidCredentials)
        }
    }

    fn find_user(
        &self,
        conn: &mut dyn DirectoryConnection,
        username: &str,
    ) -> Result<DirectoryEntry, VerificationError> {
        for dn in build_user_dns(&self.user_dn_patterns, username) {
            match conn.get_attributes(&dn, None) {
                Ok(attributes) => {
                    let root = conn.name_in_namespace().map_err(unavailable)?;
                    return Ok(DirectoryEntry {
                        full_dn: qualify_dn(&dn, &root),
                        dn,
                        attributes,
                    });
                }
                Err(LdapError::NameNotFound(_)) => debug!("No entry at {}", dn),
                Err(e) => return Err(unavailable(e)),
            }
        }

        if let Some(search) = &self.user_search {
            return match search.search_for_user(conn, username) {
                Ok(entry) => Ok(entry),
                Err(LdapError::NameNotFound(msg)) => {
                    debug!("{}", msg);
                    Err(VerificationError::EntryNotFound)
                }
                Err(e) => Err(unavailable(e)),
            };
        }

        debug!("User {} not found in directory", username);
        Err(VerificationError::EntryNotFound)
    }

    fn compare_in_directory(
        &self,
        conn: &mut dyn DirectoryConnection,
        entry: &DirectoryEntry,
        password: &str,
    ) -> Result<bool, VerificationError> {
        debug!(
            "Performing directory compare of password attribute '{}' for {}",
            self.password_attribute, entry.full_dn
        );
        let args = [self.encoder.encode(password)];
        let results = conn
            .search(
                &entry.dn,
                &self.password_compare_filter,
                &args,
                &SearchControls::object_compare(),
            )
            .map_err(unavailable)?;
        Ok(!results.is_empty())
    }
}
