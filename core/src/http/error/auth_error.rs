use actix_web::{error, http::StatusCode, HttpResponse, HttpResponseBuilder};
use derive_more::{Display, Error};

#[cfg(feature = "ldap")]
use crate::http::security::ldap::VerificationError;

#[derive(Debug, Display, Error)]
pub enum AuthError {
    #[display("unauthorized")]
    Unauthorized,
    #[display("bad credentials")]
    BadCredentials,
    #[display("identity store unavailable")]
    ServiceUnavailable,
    #[display("security context is not available for this request")]
    MissingContext,
}

impl error::ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match *self {
            AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::BadCredentials => StatusCode::UNAUTHORIZED,
            AuthError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::MissingContext => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponseBuilder::new(self.status_code()).body(self.to_string())
    }
}

// Unknown entries and wrong passwords share one response.
#[cfg(feature = "ldap")]
impl From<VerificationError> for AuthError {
    fn from(err: VerificationError) -> Self {
        if err.is_infrastructure() {
            AuthError::ServiceUnavailable
        } else {
            AuthError::BadCredentials
        }
    }
}
