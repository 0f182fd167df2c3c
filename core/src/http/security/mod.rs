//! Security context persistence and authentication.
//!
//! # Spring Equivalent
//! `org.springframework.security` package
//!
//! # Module Structure
//!
//! - `authentication` - Authentication token (principal, authorities, details)
//! - `trust` - Anonymous / remember-me detection
//! - `context` - Security context trait and default implementation
//! - `session` - HTTP session abstraction (in-memory and actix-session stores)
//! - `repository` - Session-backed security context repository
//! - `holder` - Request-scoped access to the current context
//! - `middleware` - Loads the context before a handler and saves it afterwards
//! - `extractor` - Actix Web extractors (AuthenticatedPrincipal, OptionalPrincipal)
//! - `crypto` - Password encoding (Argon2, LDAP SHA, NoOp, Delegating)
//! - `ldap` - Directory credential verification
//!
//! # Feature Flags
//! - `argon2`: Enables `Argon2PasswordEncoder` and `DelegatingPasswordEncoder`
//! - `ldap`: Enables directory authentication
//! - `actix-session`: Enables `ActixSessionStore`

// Re-exports for convenience
pub use authentication::{Authentication, AuthenticationKind};
pub use context::{SecurityContext, SecurityContextImpl};
pub use crypto::{LdapShaPasswordEncoder, NoOpPasswordEncoder, PasswordEncoder};
#[cfg(feature = "argon2")]
pub use crypto::{Argon2PasswordEncoder, DefaultEncoder, DelegatingPasswordEncoder};
pub use extractor::{AuthenticatedPrincipal, OptionalPrincipal, SecurityExt};
pub use holder::SecurityContextHolder;
pub use middleware::SecurityContextPersistence;
pub use repository::{
    HttpSessionSecurityContextRepository, SaveHandle, SecurityContextRepository,
    SPRING_SECURITY_CONTEXT_KEY,
};
#[cfg(feature = "actix-session")]
pub use session::ActixSessionStore;
pub use session::{HttpSession, InMemorySessionStore, SessionError, SessionStore};
pub use trust::{AuthenticationTrustResolver, DefaultTrustResolver};

// Internal modules
mod extractor;

// Public modules
pub mod authentication;
pub mod context;
pub mod crypto;
pub mod holder;
#[cfg(feature = "ldap")]
pub mod ldap;
pub mod middleware;
pub mod repository;
pub mod session;
pub mod trust;
