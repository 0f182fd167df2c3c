//! Directory access contract.
//!
//! # Spring Security Equivalent
//! `ContextSource` / `DirContext` from Spring LDAP and JNDI
//!
//! Operations are blocking. Names passed to a connection are relative to the
//! directory root reported by [`DirectoryConnection::name_in_namespace`].

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use crate::http::security::ldap::error::LdapError;

// =============================================================================
// Attributes
// =============================================================================

/// A single attribute with its values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    id: String,
    values: Vec<String>,
}

impl Attribute {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// Attribute set of an entry. Attribute ids are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: BTreeMap<String, Attribute>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value (builder pattern).
    pub fn with(mut self, id: impl Into<String>, value: impl Into<String>) -> Self {
        self.put(id, value);
        self
    }

    /// Adds a value to an attribute, creating it if needed.
    pub fn put(&mut self, id: impl Into<String>, value: impl Into<String>) {
        let id = id.into();
        self.entries
            .entry(id.to_ascii_lowercase())
            .or_insert_with(|| Attribute {
                id,
                values: Vec::new(),
            })
            .values
            .push(value.into());
    }

    /// Returns all values of an attribute.
    pub fn get(&self, id: &str) -> Option<&[String]> {
        self.entries
            .get(&id.to_ascii_lowercase())
            .map(|attr| attr.values.as_slice())
    }

    /// Returns the first value of an attribute.
    pub fn get_first(&self, id: &str) -> Option<&str> {
        self.get(id)
            .and_then(|values| values.first())
            .map(|s| s.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(&id.to_ascii_lowercase())
    }

    pub fn remove(&mut self, id: &str) -> Option<Attribute> {
        self.entries.remove(&id.to_ascii_lowercase())
    }

    /// Keeps only the listed attributes.
    pub fn retain_ids(&mut self, ids: &[String]) {
        self.entries
            .retain(|key, _| ids.iter().any(|id| id.eq_ignore_ascii_case(key)));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Search
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// The base entry only.
    Object,
    /// Direct children of the base.
    OneLevel,
    /// The base and everything below it.
    Subtree,
}

/// Search options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchControls {
    pub scope: SearchScope,
    /// Attributes to return (None = all, empty = none)
    pub returning_attributes: Option<Vec<String>>,
}

impl SearchControls {
    /// Object scope returning no attributes, as used for a directory-side compare.
    pub fn object_compare() -> Self {
        SearchControls {
            scope: SearchScope::Object,
            returning_attributes: Some(Vec::new()),
        }
    }

    /// Subtree scope returning all attributes.
    pub fn subtree() -> Self {
        SearchControls {
            scope: SearchScope::Subtree,
            returning_attributes: None,
        }
    }

    /// One-level scope returning all attributes.
    pub fn one_level() -> Self {
        SearchControls {
            scope: SearchScope::OneLevel,
            returning_attributes: None,
        }
    }
}

/// A search match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Name relative to the directory root
    pub name: String,
    pub attributes: Attributes,
}

/// A resolved user entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// DN relative to the directory root
    pub dn: String,
    /// Fully qualified DN
    pub full_dn: String,
    pub attributes: Attributes,
}

// =============================================================================
// Connections
// =============================================================================

/// An open directory connection.
pub trait DirectoryConnection {
    /// Reads the attributes of an entry (`None` = all readable attributes).
    ///
    /// # Errors
    /// [`LdapError::NameNotFound`] when no entry exists under `dn`.
    fn get_attributes(
        &mut self,
        dn: &str,
        attr_ids: Option<&[String]>,
    ) -> Result<Attributes, LdapError>;

    /// Searches below `base` with a filter template and its arguments.
    fn search(
        &mut self,
        base: &str,
        filter: &str,
        args: &[String],
        controls: &SearchControls,
    ) -> Result<Vec<SearchResult>, LdapError>;

    /// Full DN of the connection root.
    fn name_in_namespace(&mut self) -> Result<String, LdapError>;

    /// Releases the connection. Safe to call more than once.
    fn close(&mut self);
}

/// Opens directory connections.
///
/// # Spring Security Equivalent
/// `BaseLdapPathContextSource`
pub trait ContextSource: Send + Sync {
    /// Opens a connection with the configured service identity.
    fn read_only_context(&self) -> Result<Box<dyn DirectoryConnection>, LdapError>;

    /// Opens a connection bound as `principal_dn`.
    ///
    /// # Errors
    /// [`LdapError::AuthenticationFailed`] when the directory rejects the credentials.
    fn context(
        &self,
        principal_dn: &str,
        credentials: &str,
    ) -> Result<Box<dyn DirectoryConnection>, LdapError>;

    /// Full DN of the directory root.
    fn base_dn(&self) -> String;
}

/// Closes the wrapped connection when dropped.
pub struct ConnectionGuard {
    connection: Box<dyn DirectoryConnection>,
}

impl ConnectionGuard {
    pub fn new(connection: Box<dyn DirectoryConnection>) -> Self {
        ConnectionGuard { connection }
    }
}

impl Deref for ConnectionGuard {
    type Target = dyn DirectoryConnection;

    fn deref(&self) -> &Self::Target {
        self.connection.as_ref()
    }
}

impl DerefMut for ConnectionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection.as_mut()
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.connection.close();
    }
}
