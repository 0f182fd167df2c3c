//! Filter-based user lookup.
//!
//! # Spring Security Equivalent
//! `FilterBasedLdapUserSearch`

use tracing::debug;

use crate::http::security::ldap::config::qualify_dn;
use crate::http::security::ldap::directory::{
    DirectoryConnection, DirectoryEntry, SearchControls, SearchScope,
};
use crate::http::security::ldap::error::LdapError;

/// Finds a user's entry with a search filter.
#[derive(Debug, Clone)]
pub struct FilterBasedLdapUserSearch {
    search_base: String,
    search_filter: String,
    subtree: bool,
}

impl FilterBasedLdapUserSearch {
    /// Creates a subtree search for `search_filter` ({0} = username) below `search_base`.
    pub fn new(search_base: impl Into<String>, search_filter: impl Into<String>) -> Self {
        FilterBasedLdapUserSearch {
            search_base: search_base.into(),
            search_filter: search_filter.into(),
            subtree: true,
        }
    }

    /// Only search direct children of the base (default: false).
    pub fn one_level(mut self) -> Self {
        self.subtree = false;
        self
    }

    pub fn search_filter(&self) -> &str {
        &self.search_filter
    }

    /// Returns the single entry matching the username.
    ///
    /// # Errors
    /// [`LdapError::NameNotFound`] for no match, [`LdapError::SearchFailed`] for
    /// more than one.
    pub fn search_for_user(
        &self,
        conn: &mut dyn DirectoryConnection,
        username: &str,
    ) -> Result<DirectoryEntry, LdapError> {
        debug!(
            "Searching for user '{}', with filter {} under '{}'",
            username, self.search_filter, self.search_base
        );

        let controls = SearchControls {
            scope: if self.subtree {
                SearchScope::Subtree
            } else {
                SearchScope::OneLevel
            },
            returning_attributes: None,
        };
        let mut results = conn.search(
            &self.search_base,
            &self.search_filter,
            &[username.to_string()],
            &controls,
        )?;

        match results.len() {
            0 => Err(LdapError::NameNotFound(format!("User {} not found in directory", username))),
            1 => {
                let result = results.remove(0);
                let root = conn.name_in_namespace()?;
                Ok(DirectoryEntry {
                    full_dn: qualify_dn(&result.name, &root),
                    dn: result.name,
                    attributes: result.attributes,
                })
            }
            n => Err(LdapError::SearchFailed(format!(
                "Incorrect result size: expected 1, found {}",
                n
            ))),
        }
    }
}
