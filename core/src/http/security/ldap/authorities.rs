//! Authority lookup and mapping of directory users to authentications.
//!
//! # Spring Security Equivalent
//! `DefaultLdapAuthoritiesPopulator` / `UserDetailsContextMapper`

use std::sync::Arc;

use tracing::debug;

use crate::http::security::authentication::Authentication;
use crate::http::security::ldap::config::LdapConfig;
use crate::http::security::ldap::directory::{
    ConnectionGuard, ContextSource, DirectoryEntry, SearchControls,
};
use crate::http::security::ldap::error::LdapError;

/// Loads the authorities of an authenticated user.
pub trait LdapAuthoritiesPopulator: Send + Sync {
    fn get_granted_authorities(
        &self,
        entry: &DirectoryEntry,
        username: &str,
    ) -> Result<Vec<String>, LdapError>;
}

/// Maps group memberships to roles.
///
/// Groups are found below the group search base with a filter where `{0}` is the
/// user's full DN and `{1}` the username. The role attribute of each group becomes
/// `<prefix><ROLE>`.
pub struct DefaultLdapAuthoritiesPopulator {
    source: Arc<dyn ContextSource>,
    group_search_base: Option<String>,
    group_search_filter: String,
    group_role_attribute: String,
    role_prefix: String,
    convert_to_uppercase: bool,
    search_subtree: bool,
    default_role: Option<String>,
}

impl DefaultLdapAuthoritiesPopulator {
    /// Creates a populator searching below `group_search_base` (None = no group search).
    pub fn new(source: Arc<dyn ContextSource>, group_search_base: Option<String>) -> Self {
        DefaultLdapAuthoritiesPopulator {
            source,
            group_search_base,
            group_search_filter: "(member={0})".to_string(),
            group_role_attribute: "cn".to_string(),
            role_prefix: "ROLE_".to_string(),
            convert_to_uppercase: true,
            search_subtree: false,
            default_role: None,
        }
    }

    /// Creates a populator from the group settings of a configuration.
    pub fn from_config(source: Arc<dyn ContextSource>, config: &LdapConfig) -> Self {
        Self::new(source, config.group_search_base.clone())
            .group_search_filter(config.group_search_filter.clone())
            .group_role_attribute(config.group_role_attribute.clone())
            .role_prefix(config.role_prefix.clone())
            .convert_to_uppercase(config.convert_to_uppercase)
    }

    pub fn group_search_filter(mut self, filter: impl Into<String>) -> Self {
        self.group_search_filter = filter.into();
        self
    }

    pub fn group_role_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.group_role_attribute = attribute.into();
        self
    }

    pub fn role_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.role_prefix = prefix.into();
        self
    }

    pub fn convert_to_uppercase(mut self, convert: bool) -> Self {
        self.convert_to_uppercase = convert;
        self
    }

    /// Search the whole subtree below the group base (default: one level).
    pub fn search_subtree(mut self, subtree: bool) -> Self {
        self.search_subtree = subtree;
        self
    }

    /// Authority granted to every user, in addition to group roles.
    pub fn default_role(mut self, role: impl Into<String>) -> Self {
        self.default_role = Some(role.into());
        self
    }

    fn role_name(&self, value: &str) -> String {
        let role = if self.convert_to_uppercase {
            value.to_uppercase()
        } else {
            value.to_string()
        };
        format!("{}{}", self.role_prefix, role)
    }
}

impl LdapAuthoritiesPopulator for DefaultLdapAuthoritiesPopulator {
    fn get_granted_authorities(
        &self,
        entry: &DirectoryEntry,
        username: &str,
    ) -> Result<Vec<String>, LdapError> {
        let mut authorities: Vec<String> = self.default_role.iter().cloned().collect();

        let Some(base) = &self.group_search_base else {
            return Ok(authorities);
        };

        debug!(
            "Searching for roles for user '{}', DN = '{}', with filter {} in search base '{}'",
            username, entry.full_dn, self.group_search_filter, base
        );

        let controls = if self.search_subtree {
            SearchControls::subtree()
        } else {
            SearchControls::one_level()
        };
        let mut conn = ConnectionGuard::new(self.source.read_only_context()?);
        let groups = conn.search(
            base,
            &self.group_search_filter,
            &[entry.full_dn.clone(), username.to_string()],
            &controls,
        )?;

        for group in groups {
            for value in group
                .attributes
                .get(&self.group_role_attribute)
                .unwrap_or_default()
            {
                let role = self.role_name(value);
                if !authorities.contains(&role) {
                    authorities.push(role);
                }
            }
        }

        debug!("Roles from search: {:?}", authorities);
        Ok(authorities)
    }
}

/// Builds the authentication of a verified directory user.
///
/// # Spring Security Equivalent
/// `UserDetailsContextMapper.mapUserFromContext`
pub trait LdapContextMapper: Send + Sync {
    fn map_user_from_context(
        &self,
        entry: &DirectoryEntry,
        username: &str,
        authorities: &[String],
    ) -> Authentication;
}

/// Default context mapper.
///
/// The principal is the username. Details carry the full DN (`dn`) and, when
/// present, the display name (`display_name`) and email (`email`).
#[derive(Debug, Clone)]
pub struct DefaultLdapContextMapper {
    display_name_attribute: String,
    email_attribute: String,
}

impl Default for DefaultLdapContextMapper {
    fn default() -> Self {
        DefaultLdapContextMapper {
            display_name_attribute: "cn".to_string(),
            email_attribute: "mail".to_string(),
        }
    }
}

impl DefaultLdapContextMapper {
    pub fn from_config(config: &LdapConfig) -> Self {
        DefaultLdapContextMapper {
            display_name_attribute: config.display_name_attribute.clone(),
            email_attribute: config.email_attribute.clone(),
        }
    }
}

impl LdapContextMapper for DefaultLdapContextMapper {
    fn map_user_from_context(
        &self,
        entry: &DirectoryEntry,
        username: &str,
        authorities: &[String],
    ) -> Authentication {
        let mut auth = Authentication::authenticated(username)
            .authorities(authorities)
            .detail("dn", entry.full_dn.clone());

        if let Some(name) = entry.attributes.get_first(&self.display_name_attribute) {
            auth = auth.detail("display_name", name);
        }
        if let Some(email) = entry.attributes.get_first(&self.email_attribute) {
            auth = auth.detail("email", email);
        }
        auth
    }
}
