//! # Actix Context Security
//!
//! Session-backed security context persistence and directory credential
//! verification for Actix Web.
//!
//! - [`http::security`] - security context, session repository, middleware,
//!   extractors, directory authentication and password encoders
//! - [`http::error`] - HTTP-facing error types
//!
//! ## Example
//!
//! ```rust,ignore
//! use actix_web::{web, App, HttpResponse};
//! use actix_context_security::http::security::{
//!     HttpSessionSecurityContextRepository, InMemorySessionStore, SecurityContextHolder,
//!     SecurityContextImpl, SecurityContextPersistence,
//! };
//!
//! let repository = HttpSessionSecurityContextRepository::<SecurityContextImpl, _>::new(
//!     InMemorySessionStore::new(),
//! );
//!
//! App::new()
//!     .wrap(SecurityContextPersistence::new(repository))
//!     .route("/me", web::get().to(|holder: SecurityContextHolder| async move {
//!         HttpResponse::Ok().body(format!("{:?}", holder.authentication()))
//!     }));
//! ```

pub mod http;
