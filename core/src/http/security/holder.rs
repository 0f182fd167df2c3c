//! Request-scoped access to the security context.
//!
//! # Spring Security Equivalent
//! `SecurityContextHolder`
//!
//! The holder lives in the request extensions between the load and the save
//! performed by [`SecurityContextPersistence`](crate::http::security::middleware::SecurityContextPersistence).
//! Handlers take it as an extractor:
//!
//! ```ignore
//! async fn login(holder: SecurityContextHolder, form: web::Form<LoginForm>) -> impl Responder {
//!     let auth = authenticator.authenticate(&form.username, &form.password)?;
//!     holder.set_authentication(Some(auth));
//!     HttpResponse::Ok().finish()
//! }
//! ```

use std::cell::RefCell;
use std::future::{ready, Ready};
use std::rc::Rc;

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpMessage, HttpRequest};

use crate::http::error::AuthError;
use crate::http::security::authentication::Authentication;
use crate::http::security::context::{SecurityContext, SecurityContextImpl};
use crate::http::security::repository::{SaveHandle, SecurityContextRepository};

struct HolderInner<C> {
    context: RefCell<C>,
    handle: RefCell<SaveHandle>,
    repository: Rc<dyn SecurityContextRepository<C>>,
}

/// The security context of the current request.
///
/// Clones share the same context.
pub struct SecurityContextHolder<C = SecurityContextImpl> {
    inner: Rc<HolderInner<C>>,
}

impl<C> Clone for SecurityContextHolder<C> {
    fn clone(&self) -> Self {
        SecurityContextHolder {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Read access to the current authentication without knowing the context type.
pub(crate) trait AuthenticationView {
    fn current_authentication(&self) -> Option<Authentication>;
}

impl<C: SecurityContext> AuthenticationView for HolderInner<C> {
    fn current_authentication(&self) -> Option<Authentication> {
        self.context.borrow().authentication().cloned()
    }
}

/// Request extension exposing the holder to context-agnostic extractors.
#[derive(Clone)]
pub(crate) struct CurrentAuthentication(Rc<dyn AuthenticationView>);

impl CurrentAuthentication {
    pub(crate) fn get(req: &HttpRequest) -> Option<Authentication> {
        let view = req.extensions().get::<CurrentAuthentication>().cloned()?;
        view.0.current_authentication()
    }
}

impl<C: SecurityContext> SecurityContextHolder<C> {
    /// Creates a holder and stores it in the request extensions.
    pub(crate) fn install(
        req: &HttpRequest,
        context: C,
        handle: SaveHandle,
        repository: Rc<dyn SecurityContextRepository<C>>,
    ) -> Self {
        let inner = Rc::new(HolderInner {
            context: RefCell::new(context),
            handle: RefCell::new(handle),
            repository,
        });
        let holder = SecurityContextHolder { inner };

        let mut extensions = req.extensions_mut();
        extensions.insert(holder.clone());
        extensions.insert(CurrentAuthentication(holder.inner.clone()));
        holder
    }

    /// Removes the holder from the request extensions.
    pub(crate) fn uninstall(req: &HttpRequest) {
        let mut extensions = req.extensions_mut();
        extensions.remove::<SecurityContextHolder<C>>();
        extensions.remove::<CurrentAuthentication>();
    }

    /// Returns the holder of a request, if the middleware installed one.
    pub fn of(req: &HttpRequest) -> Option<Self> {
        req.extensions().get::<SecurityContextHolder<C>>().cloned()
    }

    /// Returns a copy of the current context.
    pub fn get_context(&self) -> C {
        self.inner.context.borrow().clone()
    }

    /// Replaces the current context.
    pub fn set_context(&self, context: C) {
        *self.inner.context.borrow_mut() = context;
    }

    /// Runs `f` against the current context.
    pub fn with_context<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        f(&self.inner.context.borrow())
    }

    /// Runs `f` against the current context for in-place changes.
    pub fn with_context_mut<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        f(&mut self.inner.context.borrow_mut())
    }

    pub fn authentication(&self) -> Option<Authentication> {
        self.with_context(|context| context.authentication().cloned())
    }

    pub fn set_authentication(&self, authentication: Option<Authentication>) {
        self.with_context_mut(|context| context.set_authentication(authentication))
    }

    /// Returns `true` for an authenticated, non-anonymous authentication.
    pub fn is_authenticated(&self) -> bool {
        self.with_context(|context| {
            context
                .authentication()
                .is_some_and(|auth| auth.is_authenticated() && !auth.is_anonymous())
        })
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.with_context(|context| {
            context
                .authentication()
                .is_some_and(|auth| auth.has_authority(authority))
        })
    }

    pub fn has_any_authority(&self, authorities: &[&str]) -> bool {
        self.with_context(|context| {
            context
                .authentication()
                .is_some_and(|auth| auth.has_any_authority(authorities))
        })
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.with_context(|context| {
            context
                .authentication()
                .is_some_and(|auth| auth.has_role(role))
        })
    }

    /// Replaces the context with a new empty one.
    ///
    /// # Spring Equivalent
    /// `SecurityContextHolder.clearContext()`
    pub fn clear(&self) {
        let empty = self.inner.repository.generate_new_context();
        self.set_context(empty);
    }

    /// Persists the context now instead of at the end of the request.
    ///
    /// Later calls, including the one made by the middleware, do nothing.
    pub fn save_context(&self, req: &HttpRequest) {
        let context = self.inner.context.borrow();
        let mut handle = self.inner.handle.borrow_mut();
        self.inner.repository.save_context(&context, req, &mut handle);
    }

    /// Returns `true` once the context has been persisted for this request.
    pub fn is_context_saved(&self) -> bool {
        self.inner.handle.borrow().is_context_saved()
    }

    /// Adds the session id to a URL unless URL rewriting is disabled.
    pub fn encode_url(&self, req: &HttpRequest, url: &str) -> String {
        let session_id = self.inner.repository.session_id(req);
        self.inner
            .handle
            .borrow()
            .encode_url(url, session_id.as_deref())
    }
}

impl<C: SecurityContext> FromRequest for SecurityContextHolder<C> {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match Self::of(req) {
            Some(holder) => ready(Ok(holder)),
            None => {
                tracing::warn!("No SecurityContextHolder in request; is SecurityContextPersistence registered?");
                ready(Err(AuthError::MissingContext))
            }
        }
    }
}
