//! Actix Context Security Demo Application
//!
//! Logs users in against an in-memory directory and keeps the resulting
//! security context in the server-side session.

mod handlers;

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use tracing_subscriber::EnvFilter;

use actix_context_security::http::security::ldap::{
    Attributes, InMemoryDirectory, LdapAuthenticator, LdapConfig,
};
use actix_context_security::http::security::{
    HttpSessionSecurityContextRepository, InMemorySessionStore, LdapShaPasswordEncoder,
    PasswordEncoder, SecurityContextImpl, SecurityContextPersistence,
};

/// Creates the directory with test users and groups.
///
/// # Spring Security Equivalent
/// ```java
/// @Bean
/// public EmbeddedLdapServerContextSourceFactoryBean contextSourceFactoryBean() {
///     EmbeddedLdapServerContextSourceFactoryBean bean =
///         EmbeddedLdapServerContextSourceFactoryBean.fromEmbeddedLdapServer();
///     bean.setLdif("classpath:users.ldif");
///     return bean;
/// }
/// ```
fn directory() -> InMemoryDirectory {
    let encoder = LdapShaPasswordEncoder::salted();

    InMemoryDirectory::new("dc=example,dc=com")
        .with_entry(
            "uid=bob,ou=people",
            Attributes::new()
                .with("objectClass", "person")
                .with("uid", "bob")
                .with("cn", "Bob Hamilton")
                .with("mail", "bob@example.com")
                .with("userPassword", encoder.encode("bobspassword")),
        )
        .with_entry(
            "uid=ann,ou=people",
            Attributes::new()
                .with("objectClass", "person")
                .with("uid", "ann")
                .with("cn", "Ann Smith")
                .with("userPassword", "annspassword"),
        )
        .with_entry(
            "cn=developers,ou=groups",
            Attributes::new()
                .with("objectClass", "groupOfNames")
                .with("cn", "developers")
                .with("member", "uid=bob,ou=people,dc=example,dc=com"),
        )
        .with_entry(
            "cn=managers,ou=groups",
            Attributes::new()
                .with("objectClass", "groupOfNames")
                .with("cn", "managers")
                .with("member", "uid=ann,ou=people,dc=example,dc=com"),
        )
        .hide_attribute("userPassword")
}

/// Creates the directory authenticator.
///
/// # Spring Security Equivalent
/// ```java
/// @Bean
/// AuthenticationManager ldapAuthenticationManager(BaseLdapPathContextSource source) {
///     LdapBindAuthenticationManagerFactory factory = new LdapBindAuthenticationManagerFactory(source);
///     factory.setUserDnPatterns("uid={0},ou=people");
///     return factory.createAuthenticationManager();
/// }
/// ```
fn authenticator() -> std::io::Result<LdapAuthenticator> {
    let config = LdapConfig::new("ldap://localhost:389")
        .base_dn("dc=example,dc=com")
        .user_dn_pattern("uid={0},ou=people");

    LdapAuthenticator::new(&config, Arc::new(directory()))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))
}

fn print_startup_info(addr: &str) {
    println!("=== Actix Context Security Demo ===");
    println!();
    println!("Server: http://{}", addr);
    println!();
    println!("Directory users (dc=example,dc=com):");
    println!("  bob/bobspassword - Groups: [developers]");
    println!("  ann/annspassword - Groups: [managers]");
    println!();
    println!("Routes:");
    println!("  GET  /           - Greeting (optional auth)");
    println!("  POST /login      - Form login (username, password)");
    println!("  POST /logout     - Clears the security context");
    println!("  GET  /me         - Current principal (requires auth)");
    println!("  GET  /developers - DEVELOPERS role");
    println!("  GET  /link       - URL with the session id");
    println!();
    println!("Examples:");
    println!("  curl -c jar -d 'username=bob&password=bobspassword' http://{}/login", addr);
    println!("  curl -b jar http://{}/me", addr);
    println!();
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    print_startup_info(&addr);

    // Shared by every worker
    let store = InMemorySessionStore::new();
    let authenticator = web::Data::new(authenticator()?);

    tracing::info!("Listening on {}", addr);
    HttpServer::new(move || {
        let repository =
            HttpSessionSecurityContextRepository::<SecurityContextImpl, _>::new(store.clone());

        App::new()
            .app_data(authenticator.clone())
            .wrap(SecurityContextPersistence::new(repository))
            .service(handlers::public::login)
            .service(handlers::public::post_login)
            .service(handlers::public::logout)
            .service(handlers::home::index)
            .service(handlers::home::me)
            .service(handlers::home::developers)
            .service(handlers::home::link)
    })
    .bind(addr)?
    .run()
    .await
}
