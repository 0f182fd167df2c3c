//! Directory authentication configuration.

use crate::http::security::crypto::{LdapShaPasswordEncoder, NoOpPasswordEncoder, PasswordEncoder};
use crate::http::security::ldap::filter::escape_dn_value;

/// How credentials are checked against the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LdapAuthStrategy {
    /// Bind to the directory as the user.
    ///
    /// # Spring Security Equivalent
    /// `BindAuthenticator`
    #[default]
    Bind,
    /// Compare the password with the one stored in the user's entry.
    ///
    /// # Spring Security Equivalent
    /// `PasswordComparisonAuthenticator`
    PasswordComparison,
}

/// Encoding applied to the presented password before a compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LdapPasswordEncoding {
    /// Unsalted `{SHA256}`. Deterministic, so the directory can match it.
    #[default]
    Sha256,
    /// Salted `{SSHA256}`. Only usable with a local compare.
    SaltedSha256,
    /// Plain text.
    Plaintext,
}

impl LdapPasswordEncoding {
    /// Returns the encoder for this scheme.
    pub fn encoder(self) -> Box<dyn PasswordEncoder> {
        match self {
            LdapPasswordEncoding::Sha256 => Box::new(LdapShaPasswordEncoder::new()),
            LdapPasswordEncoding::SaltedSha256 => Box::new(LdapShaPasswordEncoder::salted()),
            LdapPasswordEncoding::Plaintext => Box::new(NoOpPasswordEncoder),
        }
    }
}

/// LDAP authentication configuration.
///
/// All DNs other than `base_dn` are relative to `base_dn`.
#[derive(Debug, Clone)]
pub struct LdapConfig {
    /// LDAP server URL (e.g., "ldap://localhost:389")
    pub url: String,
    /// Root of the directory tree (e.g., "dc=example,dc=com")
    pub base_dn: String,
    /// User DN patterns tried in order (use {0} for the username)
    pub user_dn_patterns: Vec<String>,
    /// User search base, used when no pattern resolves
    pub user_search_base: String,
    /// User search filter (use {0} for the username)
    pub user_search_filter: Option<String>,
    /// Attribute holding the password
    pub password_attribute: String,
    /// Filter used for a directory-side password compare
    pub password_compare_filter: String,
    /// Compare locally when the entry exposes the password attribute
    pub use_password_attribute_compare: bool,
    /// Encoding of the presented password in a compare
    pub password_encoding: LdapPasswordEncoding,
    /// Group search base (None = no group lookup)
    pub group_search_base: Option<String>,
    /// Group search filter ({0} = user DN, {1} = username)
    pub group_search_filter: String,
    /// Group attribute holding the role name
    pub group_role_attribute: String,
    /// Role prefix (e.g., "ROLE_")
    pub role_prefix: String,
    /// Convert roles to uppercase
    pub convert_to_uppercase: bool,
    /// Verification strategy
    pub strategy: LdapAuthStrategy,
    /// Display name attribute copied into the authentication details
    pub display_name_attribute: String,
    /// Email attribute copied into the authentication details
    pub email_attribute: String,
}

impl Default for LdapConfig {
    fn default() -> Self {
        Self {
            url: "ldap://localhost:389".to_string(),
            base_dn: String::new(),
            user_dn_patterns: Vec::new(),
            user_search_base: String::new(),
            user_search_filter: None,
            password_attribute: "userPassword".to_string(),
            password_compare_filter: "(userPassword={0})".to_string(),
            use_password_attribute_compare: true,
            password_encoding: LdapPasswordEncoding::Sha256,
            group_search_base: Some("ou=groups".to_string()),
            group_search_filter: "(member={0})".to_string(),
            group_role_attribute: "cn".to_string(),
            role_prefix: "ROLE_".to_string(),
            convert_to_uppercase: true,
            strategy: LdapAuthStrategy::Bind,
            display_name_attribute: "cn".to_string(),
            email_attribute: "mail".to_string(),
        }
    }
}

impl LdapConfig {
    /// Create a new LDAP configuration with the server URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Create configuration for Active Directory.
    pub fn active_directory(url: impl Into<String>, domain: impl Into<String>) -> Self {
        let domain = domain.into();
        let base_dn = domain
            .split('.')
            .map(|part| format!("dc={}", part))
            .collect::<Vec<_>>()
            .join(",");

        Self {
            url: url.into(),
            base_dn,
            user_search_filter: Some("(sAMAccountName={0})".to_string()),
            group_search_base: Some(String::new()),
            group_search_filter: "(member:1.2.840.113556.1.4.1941:={0})".to_string(),
            display_name_attribute: "displayName".to_string(),
            ..Default::default()
        }
    }

    /// Set the base DN.
    pub fn base_dn(mut self, dn: impl Into<String>) -> Self {
        self.base_dn = dn.into();
        self
    }

    /// Add a user DN pattern (e.g., "uid={0},ou=people").
    pub fn user_dn_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.user_dn_patterns.push(pattern.into());
        self
    }

    /// Replace the user DN patterns.
    pub fn user_dn_patterns<I, P>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.user_dn_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Set the user search base.
    pub fn user_search_base(mut self, base: impl Into<String>) -> Self {
        self.user_search_base = base.into();
        self
    }

    /// Set the user search filter.
    pub fn user_search_filter(mut self, filter: impl Into<String>) -> Self {
        self.user_search_filter = Some(filter.into());
        self
    }

    /// Set the password attribute.
    pub fn password_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.password_attribute = attribute.into();
        self
    }

    /// Set the filter used by a directory-side password compare.
    pub fn password_compare_filter(mut self, filter: impl Into<String>) -> Self {
        self.password_compare_filter = filter.into();
        self
    }

    /// Set whether a readable password attribute is compared locally.
    pub fn use_password_attribute_compare(mut self, local: bool) -> Self {
        self.use_password_attribute_compare = local;
        self
    }

    /// Set the encoding applied to the presented password in a compare.
    pub fn password_encoding(mut self, encoding: LdapPasswordEncoding) -> Self {
        self.password_encoding = encoding;
        self
    }

    /// Set the group search base.
    pub fn group_search_base(mut self, base: impl Into<String>) -> Self {
        self.group_search_base = Some(base.into());
        self
    }

    /// Disable the group lookup.
    pub fn no_group_search(mut self) -> Self {
        self.group_search_base = None;
        self
    }

    /// Set the group search filter.
    pub fn group_search_filter(mut self, filter: impl Into<String>) -> Self {
        self.group_search_filter = filter.into();
        self
    }

    /// Set the group role attribute.
    pub fn group_role_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.group_role_attribute = attribute.into();
        self
    }

    /// Set the role prefix.
    pub fn role_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.role_prefix = prefix.into();
        self
    }

    /// Set whether to convert roles to uppercase.
    pub fn convert_to_uppercase(mut self, convert: bool) -> Self {
        self.convert_to_uppercase = convert;
        self
    }

    /// Set the verification strategy.
    pub fn strategy(mut self, strategy: LdapAuthStrategy) -> Self {
        self.strategy = strategy;
        self
    }

}

/// Substitutes the escaped username into each DN pattern, keeping pattern order.
pub(crate) fn build_user_dns(patterns: &[String], username: &str) -> Vec<String> {
    let escaped = escape_dn_value(username);
    patterns
        .iter()
        .map(|pattern| pattern.replace("{0}", &escaped))
        .collect()
}

/// Appends `base` to a relative DN.
pub(crate) fn qualify_dn(dn: &str, base: &str) -> String {
    match (dn.is_empty(), base.is_empty()) {
        (_, true) => dn.to_string(),
        (true, false) => base.to_string(),
        (false, false) => format!("{},{}", dn, base),
    }
}
