//! Security context persistence middleware for Actix Web.
//!
//! # Spring Equivalent
//! `SecurityContextPersistenceFilter`

use std::marker::PhantomData;
use std::rc::Rc;

use actix_service::{Service, Transform};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::uri::{PathAndQuery, Uri};
use actix_web::{Error, HttpMessage};
use futures_util::future::{ok, LocalBoxFuture, Ready};
use tracing::{debug, warn};

use crate::http::security::context::{SecurityContext, SecurityContextImpl};
use crate::http::security::holder::SecurityContextHolder;
use crate::http::security::repository::SecurityContextRepository;
use crate::http::security::session::{split_path_session_id, PathSessionId};

/// Middleware factory loading the security context before each request and saving
/// it afterwards.
///
/// A `;jsessionid=` path parameter is removed before routing. Its id addresses the
/// session when the repository allows URL rewriting.
///
/// # Spring Equivalent
/// `SecurityContextPersistenceFilter`
///
/// # Example
/// ```ignore
/// let store = InMemorySessionStore::new();
///
/// HttpServer::new(move || {
///     let repository = HttpSessionSecurityContextRepository::<SecurityContextImpl, _>::new(store.clone());
///     App::new()
///         .wrap(SecurityContextPersistence::new(repository))
///         .service(login)
/// })
/// ```
pub struct SecurityContextPersistence<C = SecurityContextImpl> {
    repository: Rc<dyn SecurityContextRepository<C>>,
}

impl<C: SecurityContext> SecurityContextPersistence<C> {
    pub fn new<R>(repository: R) -> Self
    where
        R: SecurityContextRepository<C> + 'static,
    {
        SecurityContextPersistence {
            repository: Rc::new(repository),
        }
    }
}

impl<S, B, C> Transform<S, ServiceRequest> for SecurityContextPersistence<C>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    C: SecurityContext,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = SecurityContextPersistenceService<S, C>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(SecurityContextPersistenceService {
            service: Rc::new(service),
            repository: Rc::clone(&self.repository),
            _context: PhantomData,
        })
    }
}

/// Security context persistence service.
pub struct SecurityContextPersistenceService<S, C> {
    service: Rc<S>,
    repository: Rc<dyn SecurityContextRepository<C>>,
    _context: PhantomData<C>,
}

impl<S, B, C> Service<ServiceRequest> for SecurityContextPersistenceService<S, C>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    C: SecurityContext,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    actix_web::dev::forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let repository = Rc::clone(&self.repository);

        Box::pin(async move {
            if let Some(id) = take_path_session_id(&mut req) {
                if repository.url_rewriting_enabled() {
                    req.extensions_mut().insert(PathSessionId(id));
                }
            }

            // Step 1: Load the context and make it available to handlers
            let (context, handle) = repository.load_context(req.request());
            let holder = SecurityContextHolder::install(
                req.request(),
                context,
                handle,
                Rc::clone(&repository),
            );

            // Step 2: Run the rest of the chain. The router needs the only reference
            // to the request, so none is kept across the call.
            let mut res = match service.call(req).await {
                Ok(res) => res,
                Err(err) => {
                    // Handler errors arrive as responses; this is a failure below us
                    // that left no request to save against.
                    warn!("Request failed before a response was built, security context not saved: {}", err);
                    return Err(err);
                }
            };

            // Step 3: Save once, on success and on error responses alike
            let http_req = res.request();
            holder.save_context(http_req);
            let cookie = repository.session_cookie(http_req);
            SecurityContextHolder::<C>::uninstall(http_req);
            drop(holder);

            if let Some(cookie) = cookie {
                if let Err(e) = res.response_mut().add_cookie(&cookie) {
                    warn!("Failed to set session cookie: {}", e);
                }
            }

            Ok(res)
        })
    }
}

/// Removes a `;jsessionid=` parameter from the request path and returns its id.
fn take_path_session_id(req: &mut ServiceRequest) -> Option<String> {
    let (path, id) = split_path_session_id(req.path())?;
    let path_and_query = match req.query_string() {
        "" => path,
        query => format!("{}?{}", path, query),
    };

    let mut parts = req.head().uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
    let uri = Uri::from_parts(parts).ok()?;

    debug!("Session id found in path, routing {}", uri);
    req.match_info_mut().get_mut().update(&uri);
    req.head_mut().uri = uri;
    Some(id)
}
