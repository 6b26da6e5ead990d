/// Request identity resolution
///
/// Looks for `Authorization: Bearer <token>` first and falls back to the
/// `accessToken` cookie. Machine clients use the header and browser
/// navigations the cookie, so the order matters. Role checks are left to
/// each endpoint.

use actix_web::http::header::AUTHORIZATION;
use actix_web::HttpRequest;

use crate::auth::claims::Claims;
use crate::auth::cookies::ACCESS_TOKEN_COOKIE;
use crate::auth::jwt::TokenService;

/// Token from an `Authorization: Bearer` header, if the header has that shape
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
}

/// Token from the `accessToken` cookie
pub fn cookie_token(req: &HttpRequest) -> Option<String> {
    req.cookie(ACCESS_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .filter(|token| !token.is_empty())
}

/// Resolve the caller's claims, or `None` when no valid token is presented.
///
/// A bearer header that carries an invalid token is not retried against the
/// cookie.
pub fn resolve_identity(req: &HttpRequest, tokens: &TokenService) -> Option<Claims> {
    let token = bearer_token(req).or_else(|| cookie_token(req))?;
    tokens.verify(&token)
}
