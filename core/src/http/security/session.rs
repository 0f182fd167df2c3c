//! Server-side session stores.
//!
//! # Spring Security Equivalent
//! The `HttpSession` contract as consumed by `HttpSessionSecurityContextRepository`.
//!
//! # Stores
//! - [`InMemorySessionStore`] - sessions held in process memory, addressed by a
//!   `JSESSIONID` cookie
//! - [`ActixSessionStore`] - adapter over `actix-session` (feature `actix-session`)
//!
//! # Example
//! ```rust,ignore
//! use std::time::Duration;
//! use actix_context_security::http::security::InMemorySessionStore;
//!
//! let store = InMemorySessionStore::new()
//!     .cookie_name("SESSION")
//!     .cookie_secure(true)
//!     .max_inactive_interval(Duration::from_secs(15 * 60));
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use actix_web::cookie::{time, Cookie};
use actix_web::{HttpMessage, HttpRequest};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use serde_json::Value;
use tracing::debug;

// =============================================================================
// Session Contract
// =============================================================================

/// A server-side key/value session.
pub trait HttpSession {
    /// Server-assigned identifier, when the store exposes one.
    fn id(&self) -> Option<String>;

    /// Reads an attribute.
    fn get_attribute(&self, key: &str) -> Option<Value>;

    /// Writes an attribute.
    fn set_attribute(&self, key: &str, value: Value) -> Result<(), SessionError>;

    /// Removes an attribute.
    fn remove_attribute(&self, key: &str);

    /// Destroys the session. Later lookups for the same request find no session.
    fn invalidate(&self);
}

/// Resolves the session of a request.
///
/// # Spring Equivalent
/// `HttpServletRequest.getSession(boolean create)`
pub trait SessionStore {
    type Session: HttpSession;

    /// Returns the request's session. With `create`, a new session is created when none exists.
    ///
    /// # Errors
    /// [`SessionError::ResponseCommitted`] when a session must be created but the
    /// response can no longer carry its identifier.
    fn get_session(
        &self,
        req: &HttpRequest,
        create: bool,
    ) -> Result<Option<Self::Session>, SessionError>;

    /// Cookie the response must carry for a session created or destroyed during this request.
    fn session_cookie(&self, _req: &HttpRequest) -> Option<Cookie<'static>> {
        None
    }
}

// =============================================================================
// Session Error
// =============================================================================

/// Session-related errors.
#[derive(Debug)]
pub enum SessionError {
    /// The response was already committed, so a new session cannot be announced
    ResponseCommitted,
    /// The session was invalidated during this request
    Invalidated,
    /// Error inserting data into session
    InsertError(String),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::ResponseCommitted => write!(f, "Response has already been committed"),
            SessionError::Invalidated => write!(f, "Session was invalidated"),
            SessionError::InsertError(e) => write!(f, "Session insert error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

// =============================================================================
// In-Memory Store
// =============================================================================

/// Request extension recording a session created during the current request.
#[derive(Clone)]
struct CreatedSession(String);

/// Path parameter carrying the session id in rewritten URLs.
pub const PATH_SESSION_PARAMETER: &str = ";jsessionid=";

/// Request extension holding a session id taken from the request path.
#[derive(Clone)]
pub(crate) struct PathSessionId(pub(crate) String);

/// Splits a `;jsessionid=<id>` parameter off a path.
///
/// Returns the path without the parameter, and the id.
pub fn split_path_session_id(path: &str) -> Option<(String, String)> {
    let start = path.find(PATH_SESSION_PARAMETER)?;
    let id_start = start + PATH_SESSION_PARAMETER.len();
    let id_end = path[id_start..]
        .find(&['/', ';'][..])
        .map_or(path.len(), |end| id_start + end);

    let id = &path[id_start..id_end];
    if id.is_empty() {
        return None;
    }
    let stripped = format!("{}{}", &path[..start], &path[id_end..]);
    Some((stripped, id.to_string()))
}

/// Request extension marking the response as committed.
#[derive(Clone, Copy)]
struct ResponseCommitted;

/// Marks the response of `req` as committed.
///
/// Handlers that start streaming a body call this; afterwards no session can be
/// created for the request.
pub fn mark_response_committed(req: &HttpRequest) {
    req.extensions_mut().insert(ResponseCommitted);
}

fn is_response_committed(req: &HttpRequest) -> bool {
    req.extensions().get::<ResponseCommitted>().is_some()
}

struct SessionRecord {
    attributes: HashMap<String, Value>,
    last_accessed: Instant,
}

struct StoreInner {
    sessions: RwLock<HashMap<String, SessionRecord>>,
    cookie_name: String,
    cookie_path: String,
    cookie_secure: bool,
    max_inactive_interval: Option<Duration>,
    id_length: usize,
}

/// Session store keeping sessions in process memory.
///
/// Sessions are addressed by a random alphanumeric id carried in a cookie
/// (`JSESSIONID` by default). Cloning the store shares the sessions, so one
/// store can serve every worker.
#[derive(Clone)]
pub struct InMemorySessionStore {
    inner: Arc<StoreInner>,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySessionStore {
    /// Creates a store with a `JSESSIONID` cookie and a 30 minute inactivity timeout.
    pub fn new() -> Self {
        InMemorySessionStore {
            inner: Arc::new(StoreInner {
                sessions: RwLock::new(HashMap::new()),
                cookie_name: "JSESSIONID".to_string(),
                cookie_path: "/".to_string(),
                cookie_secure: false,
                max_inactive_interval: Some(Duration::from_secs(30 * 60)),
                id_length: 32,
            }),
        }
    }

    fn configure(mut self, f: impl FnOnce(&mut StoreInner)) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => f(inner),
            None => tracing::warn!("InMemorySessionStore is shared; configuration ignored"),
        }
        self
    }

    /// Set the session cookie name.
    pub fn cookie_name(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.configure(|inner| inner.cookie_name = name)
    }

    /// Set the session cookie path.
    pub fn cookie_path(self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.configure(|inner| inner.cookie_path = path)
    }

    /// Set the `Secure` attribute of the session cookie.
    pub fn cookie_secure(self, secure: bool) -> Self {
        self.configure(|inner| inner.cookie_secure = secure)
    }

    /// Set the inactivity timeout (`None` = sessions never expire).
    pub fn max_inactive_interval(self, interval: impl Into<Option<Duration>>) -> Self {
        let interval = interval.into();
        self.configure(|inner| inner.max_inactive_interval = interval)
    }

    /// Get the cookie name.
    pub fn get_cookie_name(&self) -> &str {
        &self.inner.cookie_name
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.read_sessions().len()
    }

    /// Returns `true` if a session with this id exists.
    pub fn contains_session(&self, id: &str) -> bool {
        self.read_sessions().contains_key(id)
    }

    /// Reads an attribute of a session by id.
    pub fn attribute(&self, id: &str, key: &str) -> Option<Value> {
        self.read_sessions()
            .get(id)
            .and_then(|record| record.attributes.get(key).cloned())
    }

    fn read_sessions(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<String, SessionRecord>> {
        self.inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_sessions(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<String, SessionRecord>> {
        self.inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn generate_id(&self) -> String {
        thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.inner.id_length)
            .map(char::from)
            .collect()
    }

    /// Session id of the request: created during the request, else the cookie, else
    /// the path parameter.
    fn requested_id(&self, req: &HttpRequest) -> Option<String> {
        let created = req
            .extensions()
            .get::<CreatedSession>()
            .map(|created| created.0.clone());
        if created.is_some() {
            return created;
        }
        // Parsing cookies writes to the extensions, so no borrow may be held here.
        if let Some(cookie) = req.cookie(&self.inner.cookie_name) {
            return Some(cookie.value().to_string());
        }
        req.extensions().get::<PathSessionId>().map(|id| id.0.clone())
    }

    fn is_expired(&self, record: &SessionRecord) -> bool {
        self.inner
            .max_inactive_interval
            .is_some_and(|max| record.last_accessed.elapsed() > max)
    }

    fn handle(&self, id: String) -> InMemorySession {
        InMemorySession {
            id,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl SessionStore for InMemorySessionStore {
    type Session = InMemorySession;

    fn get_session(
        &self,
        req: &HttpRequest,
        create: bool,
    ) -> Result<Option<InMemorySession>, SessionError> {
        if let Some(id) = self.requested_id(req) {
            let mut sessions = self.write_sessions();
            let expired = match sessions.get_mut(&id) {
                Some(record) => {
                    let expired = self.is_expired(record);
                    if !expired {
                        record.last_accessed = Instant::now();
                        return Ok(Some(self.handle(id)));
                    }
                    true
                }
                None => false,
            };
            if expired {
                debug!("Session {} expired", id);
                sessions.remove(&id);
            }
        }

        if !create {
            return Ok(None);
        }

        if is_response_committed(req) {
            return Err(SessionError::ResponseCommitted);
        }

        let id = self.generate_id();
        {
            let mut sessions = self.write_sessions();
            // Abandoned sessions are never requested again, so expire them here.
            let before = sessions.len();
            sessions.retain(|_, record| !self.is_expired(record));
            if sessions.len() < before {
                debug!("Evicted {} expired sessions", before - sessions.len());
            }
            sessions.insert(
                id.clone(),
                SessionRecord {
                    attributes: HashMap::new(),
                    last_accessed: Instant::now(),
                },
            );
        }
        req.extensions_mut().insert(CreatedSession(id.clone()));
        debug!("Created session {}", id);

        Ok(Some(self.handle(id)))
    }

    fn session_cookie(&self, req: &HttpRequest) -> Option<Cookie<'static>> {
        let created = req
            .extensions()
            .get::<CreatedSession>()
            .map(|created| created.0.clone());

        match created {
            Some(id) if self.contains_session(&id) => Some(
                Cookie::build(self.inner.cookie_name.clone(), id)
                    .path(self.inner.cookie_path.clone())
                    .http_only(true)
                    .secure(self.inner.cookie_secure)
                    .finish(),
            ),
            _ => {
                // The client still presents an id whose session is gone.
                let presented = req.cookie(&self.inner.cookie_name)?;
                if self.contains_session(presented.value()) {
                    return None;
                }
                Some(
                    Cookie::build(self.inner.cookie_name.clone(), "")
                        .path(self.inner.cookie_path.clone())
                        .max_age(time::Duration::ZERO)
                        .finish(),
                )
            }
        }
    }
}

/// Handle to a session of an [`InMemorySessionStore`].
pub struct InMemorySession {
    id: String,
    inner: Arc<StoreInner>,
}

impl HttpSession for InMemorySession {
    fn id(&self) -> Option<String> {
        Some(self.id.clone())
    }

    fn get_attribute(&self, key: &str) -> Option<Value> {
        self.inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&self.id)
            .and_then(|record| record.attributes.get(key).cloned())
    }

    fn set_attribute(&self, key: &str, value: Value) -> Result<(), SessionError> {
        let mut sessions = self
            .inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match sessions.get_mut(&self.id) {
            Some(record) => {
                record.attributes.insert(key.to_string(), value);
                Ok(())
            }
            None => Err(SessionError::Invalidated),
        }
    }

    fn remove_attribute(&self, key: &str) {
        if let Some(record) = self
            .inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&self.id)
        {
            record.attributes.remove(key);
        }
    }

    fn invalidate(&self) {
        self.inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
        debug!("Invalidated session {}", self.id);
    }
}

// =============================================================================
// actix-session Adapter
// =============================================================================

/// Adapter exposing `actix-session` as a [`SessionStore`].
///
/// A session counts as existing once it holds any entry. The `SessionMiddleware`
/// must wrap the security middleware so that it sees the state written on save.
///
/// # Example
/// ```rust,ignore
/// use actix_session::{storage::CookieSessionStore, SessionMiddleware};
///
/// let repository = HttpSessionSecurityContextRepository::<SecurityContextImpl, _>::new(
///     ActixSessionStore,
/// );
///
/// App::new()
///     .wrap(SecurityContextPersistence::new(repository))
///     .wrap(SessionMiddleware::new(CookieSessionStore::default(), key))
/// ```
#[cfg(feature = "actix-session")]
#[derive(Clone, Copy, Debug, Default)]
pub struct ActixSessionStore;

/// Session handle of the [`ActixSessionStore`].
#[cfg(feature = "actix-session")]
pub struct ActixHttpSession(actix_session::Session);

#[cfg(feature = "actix-session")]
impl SessionStore for ActixSessionStore {
    type Session = ActixHttpSession;

    fn get_session(
        &self,
        req: &HttpRequest,
        create: bool,
    ) -> Result<Option<ActixHttpSession>, SessionError> {
        use actix_session::{SessionExt, SessionStatus};

        let session = req.get_session();
        let purged = session.status() == SessionStatus::Purged;
        let exists = !purged && !session.entries().is_empty();

        if exists {
            return Ok(Some(ActixHttpSession(session)));
        }
        if !create {
            return Ok(None);
        }
        if purged {
            return Err(SessionError::Invalidated);
        }
        Ok(Some(ActixHttpSession(session)))
    }
}

#[cfg(feature = "actix-session")]
impl HttpSession for ActixHttpSession {
    fn id(&self) -> Option<String> {
        None
    }

    fn get_attribute(&self, key: &str) -> Option<Value> {
        self.0.get::<Value>(key).ok().flatten()
    }

    fn set_attribute(&self, key: &str, value: Value) -> Result<(), SessionError> {
        self.0
            .insert(key, value)
            .map_err(|e| SessionError::InsertError(e.to_string()))
    }

    fn remove_attribute(&self, key: &str) {
        self.0.remove(key);
    }

    fn invalidate(&self) {
        self.0.purge();
    }
}
