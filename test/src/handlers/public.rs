//! Public routes (no authentication required).

use actix_web::{get, post, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use actix_context_security::http::error::AuthError;
use actix_context_security::http::security::ldap::LdapAuthenticator;
use actix_context_security::http::security::SecurityContextHolder;

#[derive(Serialize, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[get("/login")]
pub async fn login() -> impl Responder {
    HttpResponse::Ok().body("POST username and password to /login")
}

/// Verifies the credentials against the directory and stores the result in the
/// security context. The middleware persists it to the session afterwards.
#[post("/login")]
pub async fn post_login(
    holder: SecurityContextHolder,
    authenticator: web::Data<LdapAuthenticator>,
    form: web::Form<LoginForm>,
) -> Result<HttpResponse, AuthError> {
    let LoginForm { username, password } = form.into_inner();
    let authentication = authenticator.authenticate_async(username, password).await?;

    let body = format!(
        "Welcome, {}!\nAuthorities: {:?}",
        authentication.get_principal(),
        authentication.get_authorities()
    );
    holder.set_authentication(Some(authentication));
    Ok(HttpResponse::Ok().body(body))
}

#[post("/logout")]
pub async fn logout(holder: SecurityContextHolder) -> impl Responder {
    holder.clear();
    HttpResponse::Ok().body("Logged out")
}
