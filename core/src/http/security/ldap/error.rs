//! Directory errors.

/// Error reported by a directory operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LdapError {
    /// The directory could not be reached
    ConnectionFailed(String),
    /// The directory rejected the bind credentials
    AuthenticationFailed(String),
    /// No entry exists under the requested name
    NameNotFound(String),
    /// Search failed
    SearchFailed(String),
    /// Configuration error
    ConfigurationError(String),
}

impl std::fmt::Display for LdapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LdapError::ConnectionFailed(msg) => write!(f, "LDAP connection failed: {}", msg),
            LdapError::AuthenticationFailed(msg) => write!(f, "Authentication failed: {}", msg),
            LdapError::NameNotFound(msg) => write!(f, "Name not found: {}", msg),
            LdapError::SearchFailed(msg) => write!(f, "LDAP search failed: {}", msg),
            LdapError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for LdapError {}

/// Outcome of a failed credential verification.
///
/// `EntryNotFound` and `InvalidCredentials` both mean "bad credentials" to the
/// caller; only `DirectoryUnavailable` is worth retrying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// The directory could not be used
    DirectoryUnavailable(String),
    /// No entry matched the username
    EntryNotFound,
    /// The password did not match
    InvalidCredentials,
}

impl VerificationError {
    /// Returns `true` for failures of the directory rather than of the credentials.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, VerificationError::DirectoryUnavailable(_))
    }
}

impl std::fmt::Display for VerificationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationError::DirectoryUnavailable(msg) => {
                write!(f, "Directory unavailable: {}", msg)
            }
            VerificationError::EntryNotFound | VerificationError::InvalidCredentials => {
                write!(f, "Bad credentials")
            }
        }
    }
}

impl std::error::Error for VerificationError {}

impl From<LdapError> for VerificationError {
    fn from(err: LdapError) -> Self {
        match err {
            LdapError::AuthenticationFailed(_) => VerificationError::InvalidCredentials,
            LdapError::NameNotFound(_) => VerificationError::EntryNotFound,
            other => VerificationError::DirectoryUnavailable(other.to_string()),
        }
    }
}
