//! Session cookie attributes.

use atelier_platform_access::{ONE_YEAR_MS, SESSION_COOKIE_NAME};
use axum::http::{HeaderMap, Uri, uri::Scheme};
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration as TimeDuration;

const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Returns true if the request reached us over HTTPS, directly or through a
/// proxy that reports it in `X-Forwarded-Proto`.
///
/// `axum::serve` on a plain TCP listener sees origin-form URIs, so behind a
/// TLS-terminating proxy only the forwarded header can mark a request secure.
pub fn is_secure_request(uri: &Uri, headers: &HeaderMap) -> bool {
    if uri.scheme() == Some(&Scheme::HTTPS) {
        return true;
    }

    headers
        .get_all(FORWARDED_PROTO)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|proto| proto.trim().eq_ignore_ascii_case("https"))
}

/// Builds the session cookie carrying `token`, valid for one year.
pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::None)
        .max_age(TimeDuration::milliseconds(ONE_YEAR_MS))
        .build()
}

/// Builds a cookie that clears the session cookie.
pub fn removal_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::None)
        .max_age(TimeDuration::ZERO)
        .build()
}
