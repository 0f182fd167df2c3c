//! Session-backed security context repository.
//!
//! # Spring Security Equivalent
//! `SecurityContextRepository` / `HttpSessionSecurityContextRepository`
//!
//! # Lifecycle
//! 1. [`load_context`](SecurityContextRepository::load_context) reads the context
//!    stored under [`SPRING_SECURITY_CONTEXT_KEY`] without creating a session, and
//!    returns a [`SaveHandle`] recording the state at the start of the request.
//! 2. Handlers read or replace the context.
//! 3. [`save_context`](SecurityContextRepository::save_context) runs once, on
//!    completion or on error, and stores the context only when it changed. A session
//!    is created only when the context differs from an empty context.
//!
//! Anonymous contexts are never stored.

use actix_web::cookie::Cookie;
use actix_web::HttpRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::http::security::context::SecurityContext;
use crate::http::security::session::{
    HttpSession, SessionError, SessionStore, PATH_SESSION_PARAMETER,
};
use crate::http::security::trust::{AuthenticationTrustResolver, DefaultTrustResolver};

/// Session attribute holding the security context.
pub const SPRING_SECURITY_CONTEXT_KEY: &str = "SPRING_SECURITY_CONTEXT";

/// Strategy for persisting a security context between requests.
///
/// # Spring Security Equivalent
/// `SecurityContextRepository`
pub trait SecurityContextRepository<C> {
    /// Loads the context for a request, or a new empty one.
    fn load_context(&self, req: &HttpRequest) -> (C, SaveHandle);

    /// Persists the context if required. Does nothing once `handle` is saved.
    fn save_context(&self, context: &C, req: &HttpRequest, handle: &mut SaveHandle);

    /// Returns `true` if the request's session holds a value under the context key.
    fn contains_context(&self, req: &HttpRequest) -> bool;

    /// Creates a new empty context.
    fn generate_new_context(&self) -> C;

    /// Identifier of the request's session, if one exists.
    fn session_id(&self, _req: &HttpRequest) -> Option<String> {
        None
    }

    /// Cookie announcing a session created during the request.
    fn session_cookie(&self, _req: &HttpRequest) -> Option<Cookie<'static>> {
        None
    }

    /// Returns `true` if session ids may travel in rewritten URLs.
    fn url_rewriting_enabled(&self) -> bool {
        false
    }
}

// =============================================================================
// Save Handle
// =============================================================================

/// State captured when the context was loaded.
///
/// # Spring Security Equivalent
/// `SaveToSessionResponseWrapper`
#[derive(Debug, Clone)]
pub struct SaveHandle {
    session_existed_at_start: bool,
    fingerprint_before: u64,
    disable_url_rewriting: bool,
    context_saved: bool,
}

impl SaveHandle {
    /// Creates a handle for a request.
    pub fn new(
        session_existed_at_start: bool,
        fingerprint_before: u64,
        disable_url_rewriting: bool,
    ) -> Self {
        SaveHandle {
            session_existed_at_start,
            fingerprint_before,
            disable_url_rewriting,
            context_saved: false,
        }
    }

    /// Whether the request had a session when the context was loaded.
    pub fn session_existed_at_start(&self) -> bool {
        self.session_existed_at_start
    }

    /// Fingerprint of the loaded context.
    pub fn fingerprint_before(&self) -> u64 {
        self.fingerprint_before
    }

    /// Whether the save hook has already run.
    pub fn is_context_saved(&self) -> bool {
        self.context_saved
    }

    /// Adds the session id to a URL as a `;jsessionid=` path parameter.
    ///
    /// Returns the URL unchanged when rewriting is disabled or no id is known.
    pub fn encode_url(&self, url: &str, session_id: Option<&str>) -> String {
        let id = match session_id {
            Some(id) if !self.disable_url_rewriting => id,
            _ => return url.to_string(),
        };
        if url.contains(PATH_SESSION_PARAMETER) {
            return url.to_string();
        }
        let split = url.find(&['?', '#'][..]).unwrap_or(url.len());
        format!("{}{}{}{}", &url[..split], PATH_SESSION_PARAMETER, id, &url[split..])
    }

    fn mark_saved(&mut self) {
        self.context_saved = true;
    }
}

// =============================================================================
// Session Envelope
// =============================================================================

#[derive(Serialize, Deserialize)]
struct ContextEnvelope {
    #[serde(rename = "type")]
    type_name: String,
    context: Value,
}

fn encode_context<C: SecurityContext>(context: &C) -> Result<Value, serde_json::Error> {
    serde_json::to_value(ContextEnvelope {
        type_name: C::TYPE_NAME.to_string(),
        context: serde_json::to_value(context)?,
    })
}

fn decode_context<C: SecurityContext>(value: Value) -> Result<C, String> {
    let envelope: ContextEnvelope = serde_json::from_value(value)
        .map_err(|e| format!("value is not a security context envelope ({})", e))?;
    if envelope.type_name != C::TYPE_NAME {
        return Err(format!(
            "expected a {} but found a {}",
            C::TYPE_NAME,
            envelope.type_name
        ));
    }
    serde_json::from_value(envelope.context)
        .map_err(|e| format!("malformed {} ({})", C::TYPE_NAME, e))
}

// =============================================================================
// HttpSession Repository
// =============================================================================

/// Stores the security context in the server-side session between requests.
///
/// # Spring Security Equivalent
/// `HttpSessionSecurityContextRepository`
///
/// # Example
/// ```ignore
/// let repository = HttpSessionSecurityContextRepository::<SecurityContextImpl, _>::new(
///     InMemorySessionStore::new(),
/// )
/// .allow_session_creation(true)
/// .clone_from_session(false);
/// ```
pub struct HttpSessionSecurityContextRepository<C, S> {
    store: S,
    trust_resolver: Box<dyn AuthenticationTrustResolver>,
    context_factory: Box<dyn Fn() -> C>,
    empty_context: C,
    clone_from_session: bool,
    allow_session_creation: bool,
    disable_url_rewriting: bool,
}

impl<C, S> HttpSessionSecurityContextRepository<C, S>
where
    C: SecurityContext + Default,
    S: SessionStore,
{
    /// Creates a repository producing `C::default()` as the empty context.
    pub fn new(store: S) -> Self {
        Self::with_context_factory(store, C::default)
    }
}

impl<C, S> HttpSessionSecurityContextRepository<C, S>
where
    C: SecurityContext,
    S: SessionStore,
{
    /// Creates a repository producing empty contexts with `factory`.
    ///
    /// The factory runs once here to build the baseline used to decide session creation.
    pub fn with_context_factory(store: S, factory: impl Fn() -> C + 'static) -> Self {
        let empty_context = factory();
        HttpSessionSecurityContextRepository {
            store,
            trust_resolver: Box::new(DefaultTrustResolver),
            context_factory: Box::new(factory),
            empty_context,
            clone_from_session: false,
            allow_session_creation: true,
            disable_url_rewriting: false,
        }
    }

    /// Replace the empty context factory.
    pub fn context_factory(mut self, factory: impl Fn() -> C + 'static) -> Self {
        self.empty_context = factory();
        self.context_factory = Box::new(factory);
        self
    }

    /// Set the trust resolver used to detect anonymous contexts.
    pub fn trust_resolver<R: AuthenticationTrustResolver + 'static>(mut self, resolver: R) -> Self {
        self.trust_resolver = Box::new(resolver);
        self
    }

    /// Return a copy of the stored context instead of the deserialized value (default: false).
    pub fn clone_from_session(mut self, clone: bool) -> Self {
        self.clone_from_session = clone;
        self
    }

    /// Allow creating a session to store a non-empty context (default: true).
    ///
    /// When disabled, contexts are still stored in sessions created by other code.
    pub fn allow_session_creation(mut self, allow: bool) -> Self {
        self.allow_session_creation = allow;
        self
    }

    /// Disable adding session ids to URLs (default: false).
    pub fn disable_url_rewriting(mut self, disable: bool) -> Self {
        self.disable_url_rewriting = disable;
        self
    }

    /// Get the session store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the context used to decide whether a session is worth creating.
    pub fn empty_context(&self) -> &C {
        &self.empty_context
    }

    fn read_security_context_from_session(&self, session: Option<&S::Session>) -> Option<C> {
        let session = match session {
            Some(session) => session,
            None => {
                debug!("No session currently exists");
                return None;
            }
        };

        let value = match session.get_attribute(SPRING_SECURITY_CONTEXT_KEY) {
            Some(value) if !value.is_null() => value,
            _ => {
                debug!(
                    "Session returned null object for {}",
                    SPRING_SECURITY_CONTEXT_KEY
                );
                return None;
            }
        };

        let context = match decode_context::<C>(value) {
            Ok(context) => context,
            Err(reason) => {
                warn!(
                    "{} did not contain a SecurityContext: {}; is the session attribute \
                     reserved for the security context being modified directly?",
                    SPRING_SECURITY_CONTEXT_KEY, reason
                );
                return None;
            }
        };

        let context = if self.clone_from_session {
            context.copy()
        } else {
            context
        };

        debug!(
            "Obtained a valid SecurityContext from {}: {:?}",
            SPRING_SECURITY_CONTEXT_KEY, context
        );
        Some(context)
    }

    fn lookup_session(&self, req: &HttpRequest) -> Option<S::Session> {
        match self.store.get_session(req, false) {
            Ok(session) => session,
            Err(e) => {
                warn!("Failed to look up the session: {}", e);
                None
            }
        }
    }

    fn create_new_session_if_allowed(
        &self,
        context: &C,
        req: &HttpRequest,
        handle: &SaveHandle,
    ) -> Option<S::Session> {
        if handle.session_existed_at_start {
            debug!(
                "Session is now missing, but was present at the start of the request; \
                 it was invalidated, so no new session is created"
            );
            return None;
        }

        if !self.allow_session_creation {
            debug!(
                "No session exists and session creation is disabled; \
                 SecurityContext is not stored for the next request"
            );
            return None;
        }

        if *context == self.empty_context {
            debug!(
                "No session exists and the SecurityContext is still the empty context {:?}; \
                 not creating a session",
                context
            );
            return None;
        }

        debug!("Creating a session because the SecurityContext is non-default");

        match self.store.get_session(req, true) {
            Ok(session) => session,
            Err(SessionError::ResponseCommitted) => {
                warn!(
                    "Failed to create a session, as the response has been committed. \
                     Unable to store SecurityContext."
                );
                None
            }
            Err(e) => {
                warn!("Failed to create a session: {}", e);
                None
            }
        }
    }
}

impl<C, S> SecurityContextRepository<C> for HttpSessionSecurityContextRepository<C, S>
where
    C: SecurityContext,
    S: SessionStore,
{
    fn load_context(&self, req: &HttpRequest) -> (C, SaveHandle) {
        let session = self.lookup_session(req);

        let context = match self.read_security_context_from_session(session.as_ref()) {
            Some(context) => context,
            None => {
                debug!("No SecurityContext was available from the session; a new one will be created");
                self.generate_new_context()
            }
        };

        let handle = SaveHandle::new(
            session.is_some(),
            context.fingerprint(),
            self.disable_url_rewriting,
        );
        (context, handle)
    }

    fn save_context(&self, context: &C, req: &HttpRequest, handle: &mut SaveHandle) {
        if handle.is_context_saved() {
            return;
        }
        handle.mark_saved();

        if self.trust_resolver.is_anonymous(context.authentication()) {
            debug!("SecurityContext contents are anonymous; the context will not be stored in the session");
            return;
        }

        let session = match self.lookup_session(req) {
            Some(session) => Some(session),
            None => self.create_new_session_if_allowed(context, req, handle),
        };

        let Some(session) = session else {
            return;
        };

        if context.fingerprint() == handle.fingerprint_before() {
            debug!("SecurityContext unchanged during the request; nothing to store");
            return;
        }

        let value = match encode_context(context) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to serialize SecurityContext: {}", e);
                return;
            }
        };

        match session.set_attribute(SPRING_SECURITY_CONTEXT_KEY, value) {
            Ok(()) => debug!("SecurityContext stored to session: {:?}", context),
            Err(e) => warn!("Failed to store SecurityContext in the session: {}", e),
        }
    }

    fn contains_context(&self, req: &HttpRequest) -> bool {
        self.lookup_session(req)
            .and_then(|session| session.get_attribute(SPRING_SECURITY_CONTEXT_KEY))
            .is_some_and(|value| !value.is_null())
    }

    fn generate_new_context(&self) -> C {
        (self.context_factory)()
    }

    fn session_id(&self, req: &HttpRequest) -> Option<String> {
        self.lookup_session(req).and_then(|session| session.id())
    }

    fn session_cookie(&self, req: &HttpRequest) -> Option<Cookie<'static>> {
        self.store.session_cookie(req)
    }

    fn url_rewriting_enabled(&self) -> bool {
        !self.disable_url_rewriting
    }
}
