//! Directory (LDAP) credential verification.
//!
//! Two strategies check a username and password against a directory:
//!
//! - [`BindAuthenticator`] binds to the directory as the user.
//! - [`PasswordComparisonAuthenticator`] reads the user's entry and compares
//!   the password locally, or asks the directory to compare it with
//!   `(userPassword={0})`.
//!
//! Users are located through DN patterns such as `uid={0},ou=people` and,
//! failing those, a [`FilterBasedLdapUserSearch`]. [`LdapAuthenticator`]
//! ties verification, group lookup and mapping together.
//!
//! # Spring Security Equivalent
//! `org.springframework.security.ldap.authentication`
//!
//! # Example
//!
//! ```ignore
//! use actix_context_security::http::security::ldap::{
//!     InMemoryDirectory, LdapAuthStrategy, LdapAuthenticator, LdapConfig,
//! };
//!
//! let config = LdapConfig::new("ldap://localhost:389")
//!     .base_dn("dc=example,dc=com")
//!     .user_dn_pattern("uid={0},ou=people")
//!     .strategy(LdapAuthStrategy::PasswordComparison);
//!
//! let authenticator = LdapAuthenticator::new(&config, Arc::new(directory))?;
//! let auth = authenticator.authenticate("bob", "bobspassword")?;
//! ```

pub mod authenticator;
pub mod authorities;
pub mod bind;
pub mod compare;
pub mod config;
pub mod directory;
pub mod error;
pub mod filter;
pub mod memory;
pub mod user_search;

pub use authenticator::{CredentialVerifier, LdapAuthenticator, LdapCredentialVerifier};
pub use authorities::{
    DefaultLdapAuthoritiesPopulator, DefaultLdapContextMapper, LdapAuthoritiesPopulator,
    LdapContextMapper,
};
pub use bind::BindAuthenticator;
pub use compare::PasswordComparisonAuthenticator;
pub use config::{LdapAuthStrategy, LdapConfig, LdapPasswordEncoding};
pub use directory::{
    Attribute, Attributes, ConnectionGuard, ContextSource, DirectoryConnection, DirectoryEntry,
    SearchControls, SearchResult, SearchScope,
};
pub use error::{LdapError, VerificationError};
pub use filter::{escape_dn_value, escape_filter_value, format_filter};
pub use memory::{DirectoryOperation, InMemoryDirectory};
pub use user_search::FilterBasedLdapUserSearch;
