use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use time::{Duration, OffsetDateTime};

pub const SESSION_COOKIE: &str = "_session";
pub const SESSION_TTL_DAYS: i64 = 30;

/// Fixed horizon measured from now; sessions are not sliding.
pub fn session_expiration_date(ttl_days: i64) -> OffsetDateTime {
    OffsetDateTime::now_utc() + Duration::days(ttl_days)
}

pub fn session_cookie(session_id: &str, ttl_days: i64) -> String {
    format!(
        "{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ttl_days * 24 * 60 * 60
    )
}

/// Expire the cookie immediately; used on logout and when the cookie points
/// at a session the database no longer knows.
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Opaque, unguessable session id stored server-side; the cookie value
/// carries no user data.
pub fn generate_session_id() -> String {
    use rand::distributions::Alphanumeric;
    use rand::Rng;

    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    format!("sess_{token}")
}

pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        if name == SESSION_COOKIE && !value.is_empty() {
            Some(value.to_string())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn expiration_is_days_in_the_future() {
        let expires = session_expiration_date(SESSION_TTL_DAYS);
        let delta = expires - OffsetDateTime::now_utc();
        assert!(delta > Duration::days(29) && delta <= Duration::days(30));
    }

    #[test]
    fn cookie_carries_ttl_and_flags() {
        let cookie = session_cookie("abc123", 30);
        assert!(cookie.starts_with("_session=abc123;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=2592000"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }

    #[test]
    fn session_id_parsed_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; _session=sess_42; lang=en"),
        );
        assert_eq!(session_id_from_headers(&headers).as_deref(), Some("sess_42"));
    }

    #[test]
    fn absent_or_empty_cookie_yields_none() {
        assert_eq!(session_id_from_headers(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("_session="));
        assert_eq!(session_id_from_headers(&headers), None);
    }
}
