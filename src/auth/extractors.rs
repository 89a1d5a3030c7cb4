use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{LOCATION, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::auth::repo_types::{Session, User};
use crate::auth::session::{clear_session_cookie, session_id_from_headers};
use crate::state::AppState;

/// The signed-in user, when there is one. A cookie naming a session the
/// database no longer knows is cleared and the client is sent home rather
/// than treated as anonymous.
#[derive(Debug)]
pub struct MaybeSessionUser {
    pub user: Option<User>,
    pub session: Option<Session>,
}

/// A signed-in user, required. Anonymous requests are redirected to the
/// login page with the original location preserved.
#[derive(Debug)]
pub struct SessionUser {
    pub user: User,
    pub session: Session,
}

fn stale_session_redirect() -> Response {
    (
        StatusCode::SEE_OTHER,
        [
            (SET_COOKIE, clear_session_cookie()),
            (LOCATION, "/".to_string()),
        ],
    )
        .into_response()
}

fn login_redirect(parts: &Parts) -> Response {
    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    (
        StatusCode::SEE_OTHER,
        [(
            LOCATION,
            format!("/login?redirectTo={}", urlencoding::encode(target)),
        )],
    )
        .into_response()
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeSessionUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(session_id) = session_id_from_headers(&parts.headers) else {
            return Ok(Self {
                user: None,
                session: None,
            });
        };

        let session = Session::find_active(&state.db, &session_id)
            .await
            .map_err(|err| {
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
            })?;
        let Some(session) = session else {
            return Err(stale_session_redirect());
        };

        let user = User::find_by_id(&state.db, session.user_id)
            .await
            .map_err(|err| {
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
            })?;
        match user {
            Some(user) => Ok(Self {
                user: Some(user),
                session: Some(session),
            }),
            // Session outlived its user; treat it as stale.
            None => Err(stale_session_redirect()),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for SessionUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let maybe = MaybeSessionUser::from_request_parts(parts, state).await?;
        match (maybe.user, maybe.session) {
            (Some(user), Some(session)) => Ok(Self { user, session }),
            _ => Err(login_redirect(parts)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;

    fn parts_for(uri: &str) -> Parts {
        let (parts, _) = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap()
            .into_parts();
        parts
    }

    #[tokio::test]
    async fn no_cookie_means_anonymous_without_db_access() {
        let state = AppState::fake();
        let mut parts = parts_for("/api/v1/plans");
        let maybe = MaybeSessionUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(maybe.user.is_none());
        assert!(maybe.session.is_none());
    }

    #[tokio::test]
    async fn required_user_redirects_to_login_with_return_path() {
        let state = AppState::fake();
        let mut parts = parts_for("/api/v1/account?tab=billing");
        let rejection = SessionUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(rejection.status(), StatusCode::SEE_OTHER);
        let location = rejection.headers().get(LOCATION).unwrap().to_str().unwrap();
        assert!(location.starts_with("/login?redirectTo="));
        assert!(location.contains("%2Fapi%2Fv1%2Faccount%3Ftab%3Dbilling"));
    }

    #[test]
    fn stale_redirect_clears_cookie_and_goes_home() {
        let response = stale_session_redirect();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/");
        let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.contains("Max-Age=0"));
    }
}
