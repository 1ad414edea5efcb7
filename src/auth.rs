use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;

use crate::context::ANONYMOUS;
use crate::error::ApiError;
use crate::settings::Settings;

fn provided_token(auth: Option<&Authorization<Bearer>>, query_token: Option<&str>) -> Option<String> {
    auth.map(|a| a.token().to_string())
        .or_else(|| query_token.map(|s| s.to_string()))
}

/// Checks the admin token and returns the identity the caller acts as.
pub fn verify_token(
    settings: &Settings,
    auth: Option<&Authorization<Bearer>>,
    query_token: Option<&str>,
) -> Result<String, ApiError> {
    match provided_token(auth, query_token) {
        Some(token) if token == settings.auth_token => Ok(settings.admin_user.clone()),
        _ => Err(ApiError::Unauthorized(
            "Invalid authentication token".into(),
        )),
    }
}

/// Identity for public endpoints: the admin user when a valid token is
/// presented, otherwise anonymous.
pub fn identify(
    settings: &Settings,
    auth: Option<&Authorization<Bearer>>,
    query_token: Option<&str>,
) -> String {
    verify_token(settings, auth, query_token).unwrap_or_else(|_| ANONYMOUS.to_string())
}
