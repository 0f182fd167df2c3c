//! Directory login.
//!
//! # Spring Security Equivalent
//! `LdapAuthenticationProvider`

use std::sync::Arc;

use actix_web::web;
use tracing::{debug, info};

use crate::http::security::authentication::Authentication;
use crate::http::security::ldap::authorities::{
    DefaultLdapAuthoritiesPopulator, DefaultLdapContextMapper, LdapAuthoritiesPopulator,
    LdapContextMapper,
};
use crate::http::security::ldap::bind::{unavailable, BindAuthenticator};
use crate::http::security::ldap::compare::PasswordComparisonAuthenticator;
use crate::http::security::ldap::config::{LdapAuthStrategy, LdapConfig, LdapPasswordEncoding};
use crate::http::security::ldap::directory::{ContextSource, DirectoryEntry};
use crate::http::security::ldap::error::{LdapError, VerificationError};
use crate::http::security::ldap::user_search::FilterBasedLdapUserSearch;

/// Checks a username and password against an identity store.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, username: &str, password: &str) -> Result<DirectoryEntry, VerificationError>;
}

/// The directory verification strategies.
pub enum LdapCredentialVerifier {
    Bind(BindAuthenticator),
    Compare(PasswordComparisonAuthenticator),
}

impl LdapCredentialVerifier {
    /// Builds the strategy selected by `config.strategy`.
    ///
    /// # Errors
    /// [`LdapError::ConfigurationError`] when neither DN patterns nor a user search
    /// are configured.
    pub fn from_config(
        config: &LdapConfig,
        source: Arc<dyn ContextSource>,
    ) -> Result<Self, LdapError> {
        let user_search = config
            .user_search_filter
            .as_ref()
            .map(|filter| FilterBasedLdapUserSearch::new(config.user_search_base.clone(), filter.clone()));

        if config.user_dn_patterns.is_empty() && user_search.is_none() {
            return Err(LdapError::ConfigurationError(
                "Either user DN patterns or a user search filter must be configured".to_string(),
            ));
        }

        let verifier = match config.strategy {
            LdapAuthStrategy::Bind => {
                let mut bind = BindAuthenticator::new(source)
                    .user_dn_patterns(config.user_dn_patterns.clone());
                if let Some(search) = user_search {
                    bind = bind.user_search(search);
                }
                LdapCredentialVerifier::Bind(bind)
            }
            LdapAuthStrategy::PasswordComparison => {
                let mut compare = PasswordComparisonAuthenticator::new(source)
                    .user_dn_patterns(config.user_dn_patterns.clone())
                    .password_attribute(config.password_attribute.clone())
                    .password_compare_filter(config.password_compare_filter.clone())
                    .use_password_attribute_compare(config.use_password_attribute_compare)
                    .boxed_password_encoder(config.password_encoding.encoder());
                if let Some(search) = user_search {
                    compare = compare.user_search(search);
                }
                LdapCredentialVerifier::Compare(compare)
            }
        };
        Ok(verifier)
    }
}

impl CredentialVerifier for LdapCredentialVerifier {
    fn verify(&self, username: &str, password: &str) -> Result<DirectoryEntry, VerificationError> {
        match self {
            LdapCredentialVerifier::Bind(bind) => bind.authenticate(username, password),
            LdapCredentialVerifier::Compare(compare) => compare.authenticate(username, password),
        }
    }
}

struct AuthenticatorInner {
    verifier: Box<dyn CredentialVerifier>,
    populator: Box<dyn LdapAuthoritiesPopulator>,
    mapper: Box<dyn LdapContextMapper>,
}

/// Authenticates users against a directory.
///
/// # Example
/// ```ignore
/// let config = LdapConfig::new("ldap://localhost:389")
///     .base_dn("dc=example,dc=com")
///     .user_dn_pattern("uid={0},ou=people");
/// let authenticator = LdapAuthenticator::new(&config, Arc::new(directory))?;
///
/// let auth = authenticator.authenticate_async(form.username, form.password).await?;
/// holder.set_authentication(Some(auth));
/// ```
#[derive(Clone)]
pub struct LdapAuthenticator {
    inner: Arc<AuthenticatorInner>,
}

impl LdapAuthenticator {
    /// Creates an authenticator with the default populator and context mapper.
    pub fn new(config: &LdapConfig, source: Arc<dyn ContextSource>) -> Result<Self, LdapError> {
        let verifier = LdapCredentialVerifier::from_config(config, Arc::clone(&source))?;
        info!(
            "Directory authentication against {} (base '{}', {:?})",
            config.url, config.base_dn, config.strategy
        );
        Ok(Self::with_parts(
            verifier,
            DefaultLdapAuthoritiesPopulator::from_config(source, config),
            DefaultLdapContextMapper::from_config(config),
        ))
    }

    /// Creates an authenticator from its parts.
    pub fn with_parts<V, P, M>(verifier: V, populator: P, mapper: M) -> Self
    where
        V: CredentialVerifier + 'static,
        P: LdapAuthoritiesPopulator + 'static,
        M: LdapContextMapper + 'static,
    {
        LdapAuthenticator {
            inner: Arc::new(AuthenticatorInner {
                verifier: Box::new(verifier),
                populator: Box::new(populator),
                mapper: Box::new(mapper),
            }),
        }
    }

    /// Verifies the credentials and returns an authenticated token.
    ///
    /// Blocks on directory I/O.
    pub fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Authentication, VerificationError> {
        let entry = match self.inner.verifier.verify(username, password) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Directory authentication failed for {}: {:?}", username, e);
                return Err(e);
            }
        };

        let authorities = self
            .inner
            .populator
            .get_granted_authorities(&entry, username)
            .map_err(unavailable)?;

        info!("Authenticated {} as {}", username, entry.full_dn);
        Ok(self
            .inner
            .mapper
            .map_user_from_context(&entry, username, &authorities))
    }

    /// Runs [`authenticate`](Self::authenticate) on the blocking thread pool.
    pub async fn authenticate_async(
        &self,
        username: String,
        password: String,
    ) -> Result<Authentication, VerificationError> {
        let this = self.clone();
        web::block(move || this.authenticate(&username, &password))
            .await
            .map_err(|e| VerificationError::DirectoryUnavailable(e.to_string()))?
    }
}
