use axum::extract::{Path, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{instrument, warn};

use crate::auth::dto::{
    AuthResponse, LoginRequest, MessageResponse, OauthCallbackRequest, RegisterRequest,
    ResetPasswordRequest,
};
use crate::auth::extractors::{MaybeSessionUser, SessionUser};
use crate::auth::providers::Provider;
use crate::auth::repo_types::User;
use crate::auth::service;
use crate::auth::session::{clear_session_cookie, session_cookie};
use crate::billing::plans::detect_currency;
use crate::state::AppState;

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

const MIN_PASSWORD_LEN: usize = 8;

fn validate_email(email: &str) -> Result<(), (StatusCode, String)> {
    if EMAIL_REGEX.is_match(email) {
        Ok(())
    } else {
        Err((StatusCode::BAD_REQUEST, "Invalid email address".to_string()))
    }
}

fn validate_password(password: &str) -> Result<(), (StatusCode, String)> {
    if password.len() >= MIN_PASSWORD_LEN {
        Ok(())
    } else {
        Err((
            StatusCode::BAD_REQUEST,
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        ))
    }
}

type SetCookie = [(axum::http::HeaderName, String); 1];

/// The duplicate check in `register` races concurrent signups; the unique
/// constraint on `users.email` is the backstop and still answers 409.
fn signup_error(err: anyhow::Error) -> (StatusCode, String) {
    let is_duplicate = err
        .downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .map(|db| db.is_unique_violation())
        .unwrap_or(false);
    if is_duplicate {
        (
            StatusCode::CONFLICT,
            "A user already exists with this email".to_string(),
        )
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

fn set_session_cookie(state: &AppState, session_id: &str) -> SetCookie {
    [(
        SET_COOKIE,
        session_cookie(session_id, state.config.session_ttl_days),
    )]
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, SetCookie, Json<AuthResponse>), (StatusCode, String)> {
    let email = service::normalize_email(&payload.email);
    validate_email(&email)?;
    validate_password(&payload.password)?;
    if User::find_by_email(&state.db, &email)
        .await
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        .is_some()
    {
        return Err((
            StatusCode::CONFLICT,
            "A user already exists with this email".to_string(),
        ));
    }

    let currency = detect_currency(&headers);
    let (user, session) = service::signup(
        &state,
        &email,
        &payload.password,
        payload.name.as_deref(),
        currency,
    )
    .await
    .map_err(signup_error)?;

    Ok((
        StatusCode::CREATED,
        set_session_cookie(&state, &session.id),
        Json(AuthResponse { user: user.into() }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<(SetCookie, Json<AuthResponse>), (StatusCode, String)> {
    let session = service::login(
        &state.db,
        &payload.email,
        &payload.password,
        state.config.session_ttl_days,
    )
    .await
    .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
    .ok_or((StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()))?;

    let user = User::find_by_id(&state.db, session.user_id)
        .await
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        .ok_or((StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()))?;

    Ok((
        set_session_cookie(&state, &session.id),
        Json(AuthResponse { user: user.into() }),
    ))
}

/// Always succeeds for the caller; the session row is removed off the
/// request path.
#[instrument(skip(state, session))]
pub async fn logout(
    State(state): State<AppState>,
    session: MaybeSessionUser,
) -> (SetCookie, Json<MessageResponse>) {
    if let Some(session) = session.session {
        service::delete_session_best_effort(state.db.clone(), session.id);
    }
    (
        [(SET_COOKIE, clear_session_cookie())],
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    )
}

#[instrument(skip(state, session, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    session: SessionUser,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    validate_password(&payload.password)?;
    let updated = service::reset_user_password(&state.db, &session.user.email, &payload.password)
        .await
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    if !updated {
        return Err((
            StatusCode::NOT_FOUND,
            "No password credential for this account".to_string(),
        ));
    }
    Ok(Json(MessageResponse {
        message: "Password updated".to_string(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<OauthCallbackRequest>,
) -> Result<(SetCookie, Json<AuthResponse>), (StatusCode, String)> {
    let provider = state
        .providers
        .get(&provider)
        .ok_or((StatusCode::NOT_FOUND, "Unknown provider".to_string()))?
        .clone();
    validate_email(&payload.email)?;

    let currency = detect_currency(&headers);
    let (user, session) = service::signup_with_connection(
        &state,
        &provider.name,
        &payload.provider_id,
        &payload.email,
        payload.name.as_deref(),
        payload.image_url.as_deref(),
        currency,
    )
    .await
    .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    Ok((
        set_session_cookie(&state, &session.id),
        Json(AuthResponse { user: user.into() }),
    ))
}

/// The providers a client may offer login buttons for.
#[instrument(skip(state))]
pub async fn list_providers(State(state): State<AppState>) -> Json<Vec<Provider>> {
    Json(state.providers.list().into_iter().cloned().collect())
}

#[instrument(skip(session))]
pub async fn get_me(session: SessionUser) -> Json<AuthResponse> {
    Json(AuthResponse {
        user: session.user.into(),
    })
}

/// Delete the account. The Stripe customer is removed best-effort; a
/// processor failure does not keep the local account alive.
#[instrument(skip(state, session))]
pub async fn delete_me(
    State(state): State<AppState>,
    session: SessionUser,
) -> Result<(SetCookie, Json<MessageResponse>), (StatusCode, String)> {
    if let (Some(client), Some(customer_id)) = (&state.billing, &session.user.customer_id) {
        if let Err(err) = client.delete_customer(customer_id).await {
            warn!(user_id = %session.user.id, "failed to delete stripe customer: {err}");
        }
    }
    User::delete(&state.db, session.user.id)
        .await
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    Ok((
        [(SET_COOKIE, clear_session_cookie())],
        Json(MessageResponse {
            message: "Account deleted".to_string(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("two@at@signs.com").is_err());
        assert!(validate_email("spaces in@mail.com").is_err());
    }

    #[test]
    fn password_validation() {
        assert!(validate_password("longenough").is_ok());
        assert!(validate_password("short").is_err());
    }

    #[derive(Debug)]
    struct DuplicateKeyError;

    impl std::fmt::Display for DuplicateKeyError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("duplicate key value violates unique constraint \"users_email_key\"")
        }
    }

    impl std::error::Error for DuplicateKeyError {}

    impl sqlx::error::DatabaseError for DuplicateKeyError {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint \"users_email_key\""
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::UniqueViolation
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }
    }

    #[test]
    fn racing_signup_unique_violation_maps_to_conflict() {
        let err = anyhow::Error::from(sqlx::Error::Database(Box::new(DuplicateKeyError)));
        let (status, message) = signup_error(err);
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(message.contains("already exists"));
    }

    #[test]
    fn other_signup_errors_stay_internal() {
        let (status, _) = signup_error(anyhow::anyhow!("stripe api error: 500 - boom"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
