//! In-memory directory for tests and demos.
//!
//! Supports binds against a password attribute, attribute reads, and searches
//! with `=`, presence and `*` substring filters composed with `&`, `|` and `!`.
//!
//! # Example
//! ```ignore
//! let directory = InMemoryDirectory::new("dc=example,dc=com")
//!     .with_entry(
//!         "uid=bob,ou=people",
//!         Attributes::new().with("uid", "bob").with("userPassword", "bobspassword"),
//!     )
//!     .hide_attribute("userPassword");
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::debug;

use crate::http::security::crypto::{LdapShaPasswordEncoder, PasswordEncoder};
use crate::http::security::ldap::directory::{
    Attributes, ContextSource, DirectoryConnection, SearchControls, SearchResult, SearchScope,
};
use crate::http::security::ldap::error::LdapError;
use crate::http::security::ldap::filter::{format_filter, unescape_filter_value};

/// An operation observed by an [`InMemoryDirectory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryOperation {
    Bind {
        dn: String,
    },
    GetAttributes {
        dn: String,
    },
    Search {
        base: String,
        filter: String,
        args: Vec<String>,
        scope: SearchScope,
    },
}

struct StoredEntry {
    dn: String,
    attributes: Attributes,
}

struct DirectoryInner {
    base_dn: String,
    password_attribute: String,
    entries: RwLock<BTreeMap<String, StoredEntry>>,
    hidden: Vec<String>,
    available: AtomicBool,
    opened: AtomicUsize,
    closed: AtomicUsize,
    operations: Mutex<Vec<DirectoryOperation>>,
}

/// Directory held in process memory.
///
/// Cloning shares the entries, so a clone kept by a test can observe the
/// connections opened by an authenticator.
#[derive(Clone)]
pub struct InMemoryDirectory {
    inner: Arc<DirectoryInner>,
}

impl InMemoryDirectory {
    /// Creates an empty directory rooted at `base_dn`.
    pub fn new(base_dn: impl Into<String>) -> Self {
        InMemoryDirectory {
            inner: Arc::new(DirectoryInner {
                base_dn: base_dn.into(),
                password_attribute: "userPassword".to_string(),
                entries: RwLock::new(BTreeMap::new()),
                hidden: Vec::new(),
                available: AtomicBool::new(true),
                opened: AtomicUsize::new(0),
                closed: AtomicUsize::new(0),
                operations: Mutex::new(Vec::new()),
            }),
        }
    }

    fn configure(mut self, f: impl FnOnce(&mut DirectoryInner)) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => f(inner),
            None => tracing::warn!("InMemoryDirectory is shared; configuration ignored"),
        }
        self
    }

    /// Adds an entry under a DN relative to the base (builder pattern).
    pub fn with_entry(self, dn: impl Into<String>, attributes: Attributes) -> Self {
        self.add_entry(dn, attributes);
        self
    }

    /// Never return this attribute from reads. Filters still match on it.
    pub fn hide_attribute(self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.configure(|inner| inner.hidden.push(id))
    }

    /// Set the attribute checked on bind (default: userPassword).
    pub fn password_attribute(self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.configure(|inner| inner.password_attribute = id)
    }

    /// Adds or replaces an entry.
    pub fn add_entry(&self, dn: impl Into<String>, attributes: Attributes) {
        let dn = dn.into();
        self.inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(normalize_dn(&dn), StoredEntry { dn, attributes });
    }

    /// Simulates an outage. Every operation fails with `ConnectionFailed` while unavailable.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Number of connections opened.
    pub fn open_count(&self) -> usize {
        self.inner.opened.load(Ordering::SeqCst)
    }

    /// Number of connections closed.
    pub fn close_count(&self) -> usize {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Operations performed so far.
    pub fn operations(&self) -> Vec<DirectoryOperation> {
        self.inner
            .operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn open(&self) -> Result<Box<dyn DirectoryConnection>, LdapError> {
        self.inner.check_available()?;
        self.inner.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            inner: Arc::clone(&self.inner),
            closed: false,
        }))
    }
}

impl DirectoryInner {
    fn check_available(&self) -> Result<(), LdapError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LdapError::ConnectionFailed("Connection refused".to_string()))
        }
    }

    fn record(&self, operation: DirectoryOperation) {
        self.operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(operation);
    }

    fn relative_dn(&self, dn: &str) -> String {
        let dn = normalize_dn(dn);
        let base = normalize_dn(&self.base_dn);
        if dn == base {
            return String::new();
        }
        if base.is_empty() {
            return dn;
        }
        match dn.strip_suffix(&base).and_then(|rest| rest.strip_suffix(',')) {
            Some(relative) => relative.to_string(),
            None => dn,
        }
    }

    fn visible(&self, attributes: &Attributes) -> Attributes {
        let mut visible = attributes.clone();
        for id in &self.hidden {
            visible.remove(id);
        }
        visible
    }

    fn password_matches(&self, attributes: &Attributes, credentials: &str) -> bool {
        let encoder = LdapShaPasswordEncoder::new();
        attributes
            .get(&self.password_attribute)
            .unwrap_or_default()
            .iter()
            .any(|stored| {
                if stored.starts_with('{') {
                    encoder.matches(credentials, stored)
                } else {
                    stored == credentials
                }
            })
    }
}

impl ContextSource for InMemoryDirectory {
    fn read_only_context(&self) -> Result<Box<dyn DirectoryConnection>, LdapError> {
        self.open()
    }

    fn context(
        &self,
        principal_dn: &str,
        credentials: &str,
    ) -> Result<Box<dyn DirectoryConnection>, LdapError> {
        self.inner.check_available()?;
        self.inner.record(DirectoryOperation::Bind {
            dn: principal_dn.to_string(),
        });

        let relative = self.inner.relative_dn(principal_dn);
        let accepted = !credentials.is_empty()
            && self
                .inner
                .entries
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&relative)
                .is_some_and(|entry| self.inner.password_matches(&entry.attributes, credentials));

        if !accepted {
            debug!("Bind as {} rejected", principal_dn);
            return Err(LdapError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ));
        }
        self.open()
    }

    fn base_dn(&self) -> String {
        self.inner.base_dn.clone()
    }
}

struct MemoryConnection {
    inner: Arc<DirectoryInner>,
    closed: bool,
}

impl DirectoryConnection for MemoryConnection {
    fn get_attributes(
        &mut self,
        dn: &str,
        attr_ids: Option<&[String]>,
    ) -> Result<Attributes, LdapError> {
        self.inner.check_available()?;
        self.inner.record(DirectoryOperation::GetAttributes { dn: dn.to_string() });

        let entries = self
            .inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = entries
            .get(&normalize_dn(dn))
            .ok_or_else(|| LdapError::NameNotFound(dn.to_string()))?;

        let mut attributes = self.inner.visible(&entry.attributes);
        if let Some(ids) = attr_ids {
            attributes.retain_ids(ids);
        }
        Ok(attributes)
    }

    fn search(
        &mut self,
        base: &str,
        filter: &str,
        args: &[String],
        controls: &SearchControls,
    ) -> Result<Vec<SearchResult>, LdapError> {
        self.inner.check_available()?;
        self.inner.record(DirectoryOperation::Search {
            base: base.to_string(),
            filter: filter.to_string(),
            args: args.to_vec(),
            scope: controls.scope,
        });

        let parsed = Filter::parse(&format_filter(filter, args))?;
        let base = normalize_dn(base);
        let entries = self
            .inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        if controls.scope == SearchScope::Object && !base.is_empty() && !entries.contains_key(&base)
        {
            return Err(LdapError::NameNotFound(base));
        }

        let results = entries
            .iter()
            .filter(|(key, _)| in_scope(key, &base, controls.scope))
            .filter(|(_, entry)| {
                parsed.matches(&entry.attributes, &self.inner.password_attribute)
            })
            .map(|(_, entry)| {
                let mut attributes = self.inner.visible(&entry.attributes);
                if let Some(ids) = &controls.returning_attributes {
                    attributes.retain_ids(ids);
                }
                SearchResult {
                    name: entry.dn.clone(),
                    attributes,
                }
            })
            .collect();
        Ok(results)
    }

    fn name_in_namespace(&mut self) -> Result<String, LdapError> {
        self.inner.check_available()?;
        Ok(self.inner.base_dn.clone())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.inner.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn normalize_dn(dn: &str) -> String {
    dn.split(',')
        .map(|rdn| rdn.trim())
        .collect::<Vec<_>>()
        .join(",")
        .to_ascii_lowercase()
}

fn parent_dn(dn: &str) -> &str {
    let mut escaped = false;
    for (i, c) in dn.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            ',' if !escaped => return &dn[i + 1..],
            _ => escaped = false,
        }
    }
    ""
}

fn in_scope(dn: &str, base: &str, scope: SearchScope) -> bool {
    match scope {
        SearchScope::Object => dn == base,
        SearchScope::OneLevel => !dn.is_empty() && parent_dn(dn) == base,
        SearchScope::Subtree => {
            base.is_empty()
                || dn == base
                || dn
                    .strip_suffix(base)
                    .is_some_and(|rest| rest.ends_with(','))
        }
    }
}

// =============================================================================
// Filter Evaluation
// =============================================================================

#[derive(Debug)]
enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Present(String),
    /// Value split on unescaped `*`; a single part is an equality match.
    Equal(String, Vec<String>),
}

impl Filter {
    fn parse(input: &str) -> Result<Filter, LdapError> {
        let mut parser = FilterParser { input, pos: 0 };
        let filter = parser.filter()?;
        if parser.pos != input.len() {
            return Err(parser.error());
        }
        Ok(filter)
    }

    fn matches(&self, attributes: &Attributes, exact_attribute: &str) -> bool {
        match self {
            Filter::And(filters) => filters.iter().all(|f| f.matches(attributes, exact_attribute)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(attributes, exact_attribute)),
            Filter::Not(filter) => !filter.matches(attributes, exact_attribute),
            Filter::Present(attr) => attributes.contains(attr),
            Filter::Equal(attr, parts) => {
                let exact = attr.eq_ignore_ascii_case(exact_attribute);
                attributes
                    .get(attr)
                    .unwrap_or_default()
                    .iter()
                    .any(|value| {
                        if exact {
                            wildcard_match(value, parts)
                        } else {
                            let parts: Vec<String> =
                                parts.iter().map(|p| p.to_lowercase()).collect();
                            wildcard_match(&value.to_lowercase(), &parts)
                        }
                    })
            }
        }
    }
}

fn wildcard_match(value: &str, parts: &[String]) -> bool {
    match parts {
        [] => false,
        [only] => value == only,
        [first, middle @ .., last] => {
            let Some(mut rest) = value.strip_prefix(first.as_str()) else {
                return false;
            };
            for part in middle {
                match rest.find(part.as_str()) {
                    Some(i) => rest = &rest[i + part.len()..],
                    None => return false,
                }
            }
            rest.len() >= last.len() && rest.ends_with(last.as_str())
        }
    }
}

struct FilterParser<'a> {
    input: &'a str,
    pos: usize,
}

impl FilterParser<'_> {
    fn error(&self) -> LdapError {
        LdapError::SearchFailed(format!("Invalid filter: {}", self.input))
    }

    fn expect(&mut self, c: char) -> Result<(), LdapError> {
        if self.input[self.pos..].starts_with(c) {
            self.pos += c.len_utf8();
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn filter(&mut self) -> Result<Filter, LdapError> {
        self.expect('(')?;
        let next = self.input[self.pos..].chars().next();
        let filter = match next {
            Some('&') => {
                self.pos += 1;
                Filter::And(self.filter_list()?)
            }
            Some('|') => {
                self.pos += 1;
                Filter::Or(self.filter_list()?)
            }
            Some('!') => {
                self.pos += 1;
                Filter::Not(Box::new(self.filter()?))
            }
            Some(_) => self.item()?,
            None => return Err(self.error()),
        };
        self.expect(')')?;
        Ok(filter)
    }

    fn filter_list(&mut self) -> Result<Vec<Filter>, LdapError> {
        let mut filters = Vec::new();
        while self.input[self.pos..].starts_with('(') {
            filters.push(self.filter()?);
        }
        Ok(filters)
    }

    fn item(&mut self) -> Result<Filter, LdapError> {
        let input = self.input;
        let rest = &input[self.pos..];
        let end = rest.find(')').ok_or_else(|| self.error())?;
        let item = &rest[..end];
        let (attr, value) = item.split_once('=').ok_or_else(|| self.error())?;
        // Extensible match rules such as `member:1.2.840.113556.1.4.1941:` compare by equality.
        let attr = attr.split(':').next().unwrap_or(attr).to_string();
        self.pos += end;

        if value == "*" {
            return Ok(Filter::Present(attr));
        }
        let parts = value.split('*').map(unescape_filter_value).collect();
        Ok(Filter::Equal(attr, parts))
    }
}
