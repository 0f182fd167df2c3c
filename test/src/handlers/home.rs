//! Routes reading the current authentication.

use actix_web::{get, HttpRequest, HttpResponse, Responder};

use actix_context_security::http::security::{
    AuthenticatedPrincipal, OptionalPrincipal, SecurityContextHolder, SecurityExt,
};

/// Uses AuthenticatedPrincipal (returns 401 if not authenticated).
#[get("/me")]
pub async fn me(principal: AuthenticatedPrincipal) -> impl Responder {
    HttpResponse::Ok().body(format!(
        "Principal: {}\nAuthorities: {:?}\nDN: {}",
        principal.get_principal(),
        principal.get_authorities(),
        principal.get_detail("dn").unwrap_or("-")
    ))
}

/// Uses OptionalPrincipal (never fails).
#[get("/")]
pub async fn index(principal: OptionalPrincipal) -> impl Responder {
    match principal.into_inner() {
        Some(auth) => HttpResponse::Ok().body(format!("Hello, {}", auth.get_principal())),
        None => HttpResponse::Ok().body("Hello, guest - please login"),
    }
}

/// Role check through the request extension.
#[get("/developers")]
pub async fn developers(req: HttpRequest) -> impl Responder {
    if !req.is_authenticated() {
        return HttpResponse::Unauthorized().finish();
    }
    if !req.has_role("DEVELOPERS") {
        return HttpResponse::Forbidden().finish();
    }
    HttpResponse::Ok().body("Developers area")
}

/// Link carrying the session id for clients without cookies.
#[get("/link")]
pub async fn link(req: HttpRequest, holder: SecurityContextHolder) -> impl Responder {
    HttpResponse::Ok().body(holder.encode_url(&req, "/me"))
}
