//! Password encoding utilities.
//!
//! # Spring Security Equivalent
//! `org.springframework.security.crypto.password.PasswordEncoder`
//!
//! # Feature Flags
//! - `argon2`: Enables `Argon2PasswordEncoder` and `DelegatingPasswordEncoder` (default)

#[cfg(feature = "argon2")]
use argon2::password_hash::rand_core::OsRng;
#[cfg(feature = "argon2")]
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
#[cfg(feature = "argon2")]
use argon2::Argon2;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};

/// Trait for encoding and verifying passwords.
///
/// # Spring Security Equivalent
/// `PasswordEncoder` interface
pub trait PasswordEncoder: Send + Sync {
    /// Encode the raw password.
    ///
    /// # Spring Equivalent
    /// `PasswordEncoder.encode(CharSequence rawPassword)`
    fn encode(&self, raw_password: &str) -> String;

    /// Verify a raw password against an encoded password.
    ///
    /// # Spring Equivalent
    /// `PasswordEncoder.matches(CharSequence rawPassword, String encodedPassword)`
    fn matches(&self, raw_password: &str, encoded_password: &str) -> bool;

    /// Returns true if the encoded password should be upgraded for better security.
    fn upgrade_encoding(&self, _encoded_password: &str) -> bool {
        false
    }
}

/// No-op password encoder that stores passwords in plain text.
///
/// # Spring Security Equivalent
/// `NoOpPasswordEncoder`
///
/// # Warning
/// **NEVER use this in production!** This is only for testing/development.
///
/// # Example
/// ```
/// use actix_context_security::http::security::crypto::{PasswordEncoder, NoOpPasswordEncoder};
///
/// let encoder = NoOpPasswordEncoder;
/// let encoded = encoder.encode("password");
/// assert_eq!(encoded, "password"); // Plain text!
/// assert!(encoder.matches("password", &encoded));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpPasswordEncoder;

impl PasswordEncoder for NoOpPasswordEncoder {
    fn encode(&self, raw_password: &str) -> String {
        raw_password.to_string()
    }

    fn matches(&self, raw_password: &str, encoded_password: &str) -> bool {
        raw_password == encoded_password
    }
}

const SHA_PREFIX: &str = "{SHA256}";
const SSHA_PREFIX: &str = "{SSHA256}";
const SHA256_LEN: usize = 32;
const SALT_LEN: usize = 8;

/// Directory-style SHA-256 password encoder.
///
/// # Spring Security Equivalent
/// `LdapShaPasswordEncoder`
///
/// Produces `{SHA256}base64(digest)` or, when salted,
/// `{SSHA256}base64(digest || salt)` where `digest = sha256(password || salt)`.
/// Both forms are accepted by [`matches`](PasswordEncoder::matches).
///
/// The unsalted form is deterministic, so it can be sent to the directory for a
/// server-side compare.
///
/// # Example
/// ```
/// use actix_context_security::http::security::crypto::{LdapShaPasswordEncoder, PasswordEncoder};
///
/// let encoder = LdapShaPasswordEncoder::salted();
/// let hash = encoder.encode("bobspassword");
/// assert!(hash.starts_with("{SSHA256}"));
/// assert!(encoder.matches("bobspassword", &hash));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct LdapShaPasswordEncoder {
    salted: bool,
}

impl LdapShaPasswordEncoder {
    /// Creates an unsalted `{SHA256}` encoder.
    pub fn new() -> Self {
        LdapShaPasswordEncoder { salted: false }
    }

    /// Creates a `{SSHA256}` encoder with a random salt per password.
    pub fn salted() -> Self {
        LdapShaPasswordEncoder { salted: true }
    }

    fn digest(raw_password: &str, salt: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(raw_password.as_bytes());
        hasher.update(salt);
        hasher.finalize().to_vec()
    }
}

impl PasswordEncoder for LdapShaPasswordEncoder {
    fn encode(&self, raw_password: &str) -> String {
        if !self.salted {
            return format!("{}{}", SHA_PREFIX, STANDARD.encode(Self::digest(raw_password, &[])));
        }

        let salt: [u8; SALT_LEN] = thread_rng().gen();
        let mut bytes = Self::digest(raw_password, &salt);
        bytes.extend_from_slice(&salt);
        format!("{}{}", SSHA_PREFIX, STANDARD.encode(bytes))
    }

    fn matches(&self, raw_password: &str, encoded_password: &str) -> bool {
        let (encoded, salted) = if let Some(rest) = encoded_password.strip_prefix(SSHA_PREFIX) {
            (rest, true)
        } else if let Some(rest) = encoded_password.strip_prefix(SHA_PREFIX) {
            (rest, false)
        } else {
            return false;
        };

        let Ok(bytes) = STANDARD.decode(encoded) else {
            return false;
        };
        if bytes.len() < SHA256_LEN || (!salted && bytes.len() != SHA256_LEN) {
            return false;
        }

        let (expected, salt) = bytes.split_at(SHA256_LEN);
        constant_time_eq(&Self::digest(raw_password, salt), expected)
    }

    fn upgrade_encoding(&self, encoded_password: &str) -> bool {
        self.salted && !encoded_password.starts_with(SSHA_PREFIX)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Argon2 password encoder - the recommended encoder for new applications.
///
/// # Spring Security Equivalent
/// `Argon2PasswordEncoder`
///
/// # Feature Flag
/// Requires the `argon2` feature (enabled by default).
///
/// # Example
/// ```
/// use actix_context_security::http::security::crypto::{PasswordEncoder, Argon2PasswordEncoder};
///
/// let encoder = Argon2PasswordEncoder::new();
/// let hash = encoder.encode("secret_password");
///
/// assert!(encoder.matches("secret_password", &hash));
/// assert!(!encoder.matches("wrong_password", &hash));
/// ```
#[cfg(feature = "argon2")]
#[derive(Clone)]
pub struct Argon2PasswordEncoder {
    argon2: Argon2<'static>,
}

#[cfg(feature = "argon2")]
impl Argon2PasswordEncoder {
    /// Creates a new Argon2 password encoder with default settings.
    pub fn new() -> Self {
        Argon2PasswordEncoder {
            argon2: Argon2::default(),
        }
    }
}

#[cfg(feature = "argon2")]
impl Default for Argon2PasswordEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "argon2")]
impl PasswordEncoder for Argon2PasswordEncoder {
    fn encode(&self, raw_password: &str) -> String {
        let salt = SaltString::generate(&mut OsRng);
        match self.argon2.hash_password(raw_password.as_bytes(), &salt) {
            Ok(hash) => hash.to_string(),
            Err(e) => {
                // An empty hash never matches.
                tracing::warn!("Failed to hash password: {}", e);
                String::new()
            }
        }
    }

    fn matches(&self, raw_password: &str, encoded_password: &str) -> bool {
        match PasswordHash::new(encoded_password) {
            Ok(parsed_hash) => self
                .argon2
                .verify_password(raw_password.as_bytes(), &parsed_hash)
                .is_ok(),
            Err(_) => false,
        }
    }
}

/// Default encoding algorithm for DelegatingPasswordEncoder.
#[derive(Debug, Clone, Copy, Default)]
pub enum DefaultEncoder {
    /// Use Argon2 (recommended)
    #[default]
    Argon2,
    /// Use salted SHA-256, readable by directory servers
    LdapSsha,
}

/// Delegating password encoder that supports multiple encoding formats.
///
/// # Spring Security Equivalent
/// `DelegatingPasswordEncoder`
///
/// Supported formats:
/// - `{argon2}hash` - Argon2 encoded password
/// - `{SHA256}digest` / `{SSHA256}digest` - directory SHA-256 formats
/// - `{noop}plain` - Plain text (for testing only!)
///
/// # Example
/// ```
/// use actix_context_security::http::security::crypto::{PasswordEncoder, DelegatingPasswordEncoder};
///
/// let encoder = DelegatingPasswordEncoder::new();
///
/// let hash = encoder.encode("password");
/// assert!(hash.starts_with("{argon2}"));
///
/// assert!(encoder.matches("password", &hash));
/// assert!(encoder.matches("plain", "{noop}plain"));
/// ```
#[cfg(feature = "argon2")]
#[derive(Clone)]
pub struct DelegatingPasswordEncoder {
    argon2: Argon2PasswordEncoder,
    ldap_sha: LdapShaPasswordEncoder,
    default_encoder: DefaultEncoder,
}

#[cfg(feature = "argon2")]
impl DelegatingPasswordEncoder {
    /// Creates a new delegating password encoder.
    /// Default encoding is Argon2.
    pub fn new() -> Self {
        DelegatingPasswordEncoder {
            argon2: Argon2PasswordEncoder::new(),
            ldap_sha: LdapShaPasswordEncoder::salted(),
            default_encoder: DefaultEncoder::Argon2,
        }
    }

    /// Set the default encoder to use for new passwords.
    pub fn default_encoder(mut self, encoder: DefaultEncoder) -> Self {
        self.default_encoder = encoder;
        self
    }
}

#[cfg(feature = "argon2")]
impl Default for DelegatingPasswordEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "argon2")]
impl PasswordEncoder for DelegatingPasswordEncoder {
    fn encode(&self, raw_password: &str) -> String {
        match self.default_encoder {
            DefaultEncoder::Argon2 => {
                format!("{{argon2}}{}", self.argon2.encode(raw_password))
            }
            DefaultEncoder::LdapSsha => self.ldap_sha.encode(raw_password),
        }
    }

    fn matches(&self, raw_password: &str, encoded_password: &str) -> bool {
        if let Some(hash) = encoded_password.strip_prefix("{argon2}") {
            self.argon2.matches(raw_password, hash)
        } else if let Some(plain) = encoded_password.strip_prefix("{noop}") {
            raw_password == plain
        } else if encoded_password.starts_with(SHA_PREFIX)
            || encoded_password.starts_with(SSHA_PREFIX)
        {
            self.ldap_sha.matches(raw_password, encoded_password)
        } else {
            false
        }
    }

    fn upgrade_encoding(&self, encoded_password: &str) -> bool {
        match self.default_encoder {
            DefaultEncoder::Argon2 => !encoded_password.starts_with("{argon2}"),
            DefaultEncoder::LdapSsha => !encoded_password.starts_with(SSHA_PREFIX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_encoder() {
        let encoder = NoOpPasswordEncoder;
        let password = "plain_password";

        let encoded = encoder.encode(password);
        assert_eq!(encoded, password);
        assert!(encoder.matches(password, &encoded));
    }

    #[test]
    fn test_ldap_sha_unsalted_is_deterministic() {
        let encoder = LdapShaPasswordEncoder::new();
        let a = encoder.encode("bobspassword");
        let b = encoder.encode("bobspassword");

        assert_eq!(a, b);
        assert!(a.starts_with("{SHA256}"));
        assert!(encoder.matches("bobspassword", &a));
        assert!(!encoder.matches("bobspassword2", &a));
    }

    #[test]
    fn test_ldap_sha_known_digest() {
        // sha256("abc")
        assert_eq!(
            LdapShaPasswordEncoder::new().encode("abc"),
            "{SHA256}ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0="
        );
    }

    #[test]
    fn test_ldap_ssha_is_salted() {
        let encoder = LdapShaPasswordEncoder::salted();
        let a = encoder.encode("bobspassword");
        let b = encoder.encode("bobspassword");

        assert_ne!(a, b);
        assert!(encoder.matches("bobspassword", &a));
        assert!(encoder.matches("bobspassword", &b));
        assert!(!encoder.matches("wrong", &a));

        // Either encoder reads both formats.
        assert!(LdapShaPasswordEncoder::new().matches("bobspassword", &a));
    }

    #[test]
    fn test_ldap_sha_rejects_malformed() {
        let encoder = LdapShaPasswordEncoder::new();
        assert!(!encoder.matches("x", "x"));
        assert!(!encoder.matches("x", "{SHA256}not base64!"));
        assert!(!encoder.matches("x", "{SHA256}AAAA"));
        assert!(!encoder.matches("x", "{SSHA256}"));
    }

    #[test]
    fn test_ldap_sha_upgrade() {
        assert!(LdapShaPasswordEncoder::salted().upgrade_encoding("{SHA256}abc"));
        assert!(!LdapShaPasswordEncoder::new().upgrade_encoding("{SHA256}abc"));
    }

    #[cfg(feature = "argon2")]
    #[test]
    fn test_argon2_encoder() {
        let encoder = Argon2PasswordEncoder::new();
        let password = "test_password_123";

        let hash = encoder.encode(password);
        assert_ne!(hash, password);
        assert!(encoder.matches(password, &hash));
        assert!(!encoder.matches("wrong_password", &hash));
    }

    #[cfg(feature = "argon2")]
    #[test]
    fn test_delegating_encoder() {
        let encoder = DelegatingPasswordEncoder::new();

        let hash = encoder.encode("password");
        assert!(hash.starts_with("{argon2}"));
        assert!(encoder.matches("password", &hash));

        assert!(encoder.matches("plain", "{noop}plain"));
        assert!(!encoder.matches("plain", "plain"));

        let sha = LdapShaPasswordEncoder::new().encode("password");
        assert!(encoder.matches("password", &sha));

        assert!(encoder.upgrade_encoding("{noop}plain"));
        assert!(!encoder.upgrade_encoding(&hash));
    }

    #[cfg(feature = "argon2")]
    #[test]
    fn test_delegating_encoder_ssha_default() {
        let encoder = DelegatingPasswordEncoder::new().default_encoder(DefaultEncoder::LdapSsha);
        let hash = encoder.encode("password");
        assert!(hash.starts_with("{SSHA256}"));
        assert!(encoder.matches("password", &hash));
    }
}
