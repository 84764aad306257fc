//! services/api/src/web/cookies.rs
//!
//! The cookie transport for session tokens.

use axum::http::{header, HeaderMap, HeaderValue};
use chrono::Duration;
use ticketing_core::TokenPair;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// The access cookie outlives its token by a minute.
pub const ACCESS_COOKIE_MAX_AGE: Duration = Duration::minutes(26);
pub const REFRESH_COOKIE_MAX_AGE: Duration = Duration::days(14);

/// Finds the value of cookie `name` in the request's `Cookie` header(s).
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| {
            let (key, value) = c.trim().split_once('=')?;
            (key == name).then_some(value)
        })
}

fn cookie(name: &str, value: &str, max_age: Duration, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}={}; HttpOnly{}; SameSite=Lax; Path=/; Max-Age={}",
        name,
        value,
        secure,
        max_age.num_seconds()
    )
}

/// The two `Set-Cookie` values carrying a freshly issued pair.
pub fn session_cookies(tokens: &TokenPair, secure: bool) -> [String; 2] {
    [
        cookie(ACCESS_COOKIE, &tokens.access_token, ACCESS_COOKIE_MAX_AGE, secure),
        cookie(REFRESH_COOKIE, &tokens.refresh_token, REFRESH_COOKIE_MAX_AGE, secure),
    ]
}

/// The two `Set-Cookie` values that make the client drop its session.
pub fn cleared_cookies(secure: bool) -> [String; 2] {
    [
        cookie(ACCESS_COOKIE, "", Duration::zero(), secure),
        cookie(REFRESH_COOKIE, "", Duration::zero(), secure),
    ]
}

/// Appends both session cookies to an outgoing response's headers.
pub fn append_session_cookies(headers: &mut HeaderMap, tokens: &TokenPair, secure: bool) {
    for cookie in session_cookies(tokens, secure) {
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            headers.append(header::SET_COOKIE, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_named_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; accessToken=abc.def.ghi; refreshToken=xyz"),
        );
        assert_eq!(read_cookie(&headers, ACCESS_COOKIE), Some("abc.def.ghi"));
        assert_eq!(read_cookie(&headers, REFRESH_COOKIE), Some("xyz"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn reads_across_multiple_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("accessToken=a"));
        headers.append(header::COOKIE, HeaderValue::from_static("refreshToken=r"));
        assert_eq!(read_cookie(&headers, REFRESH_COOKIE), Some("r"));
    }

    #[test]
    fn prefix_names_do_not_match() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("accessTokenOld=stale"));
        assert_eq!(read_cookie(&headers, ACCESS_COOKIE), None);
    }

    #[test]
    fn session_cookies_carry_max_ages() {
        let pair = TokenPair {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
        };
        let [access, refresh] = session_cookies(&pair, false);
        assert_eq!(access, "accessToken=a; HttpOnly; SameSite=Lax; Path=/; Max-Age=1560");
        assert_eq!(refresh, "refreshToken=r; HttpOnly; SameSite=Lax; Path=/; Max-Age=1209600");

        let [access, _] = session_cookies(&pair, true);
        assert!(access.contains("; Secure;"));
    }

    #[test]
    fn cleared_cookies_expire_immediately() {
        for cookie in cleared_cookies(false) {
            assert!(cookie.ends_with("Max-Age=0"));
        }
    }
}
