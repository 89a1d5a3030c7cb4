use anyhow::{bail, Context};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password_or_dummy};
use crate::auth::repo::Password;
use crate::auth::repo_types::{Connection, Session, User};
use crate::auth::session::{generate_session_id, session_expiration_date};
use crate::billing::plans::Currency;
use crate::billing::repo_types::{NewSubscription, Price, Subscription};
use crate::state::AppState;

pub async fn create_session(
    executor: impl sqlx::PgExecutor<'_>,
    user_id: Uuid,
    ttl_days: i64,
) -> anyhow::Result<Session> {
    Session::create(
        executor,
        &generate_session_id(),
        user_id,
        session_expiration_date(ttl_days),
    )
    .await
}

/// Emails are stored and looked up lowercased; `User@X.com` and `user@x.com`
/// are the same account.
pub fn normalize_email(email: &str) -> String {
    email.to_lowercase()
}

/// Password login. `None` means the credentials did not match; callers must
/// not learn whether the account exists.
pub async fn login(
    db: &PgPool,
    email: &str,
    password: &str,
    ttl_days: i64,
) -> anyhow::Result<Option<Session>> {
    let found = Password::find_with_user_by_email(db, &normalize_email(email)).await?;
    let hash = found.as_ref().map(|(_, hash)| hash.as_str());
    if !verify_password_or_dummy(password, hash) {
        return Ok(None);
    }
    let (user_id, _) = found.context("verified credentials without a user")?;
    let session = create_session(db, user_id, ttl_days).await?;
    Ok(Some(session))
}

/// Resolved before the signup transaction so a missing free price aborts
/// signup without leaving a user behind.
async fn free_price_for_signup(
    state: &AppState,
    currency: Currency,
) -> anyhow::Result<Option<Price>> {
    if !state.config.billing_enabled() {
        return Ok(None);
    }
    let price = Price::find(&state.db, "free", "year", currency.as_str())
        .await?
        .with_context(|| format!("no free plan price for currency {}", currency.as_str()))?;
    Ok(Some(price))
}

/// Create the Stripe customer and free subscription for a fresh user. Runs
/// after the local transaction committed; a failure here leaves the account
/// behind but the signup reports it.
async fn provision_free_subscription(
    state: &AppState,
    user: &User,
    price: &Price,
) -> anyhow::Result<Subscription> {
    let client = state
        .billing
        .as_ref()
        .context("billing client not configured")?;
    let name = user.name.clone().unwrap_or_else(|| user.email.clone());
    let customer = client.create_customer(&user.email, &name).await?;
    User::set_customer_id(&state.db, user.id, &customer.id).await?;
    let stripe_subscription = client.create_subscription(&customer.id, &price.id).await?;
    let subscription = Subscription::upsert(
        &state.db,
        &NewSubscription::from_stripe(&stripe_subscription, user.id, price),
    )
    .await?;
    Ok(subscription)
}

/// Password signup: user, credential and session are created atomically,
/// then the account is placed on the free tier when billing is enabled.
pub async fn signup(
    state: &AppState,
    email: &str,
    password: &str,
    name: Option<&str>,
    currency: Currency,
) -> anyhow::Result<(User, Session)> {
    let email = normalize_email(email);
    let free_price = free_price_for_signup(state, currency).await?;
    let hash = hash_password(password)?;

    let mut tx = state.db.begin().await?;
    let user = User::create(&mut *tx, &email, name, None, "user").await?;
    Password::create(&mut *tx, user.id, &hash).await?;
    let session = create_session(&mut *tx, user.id, state.config.session_ttl_days).await?;
    tx.commit().await?;

    if let Some(price) = free_price {
        provision_free_subscription(state, &user, &price)
            .await
            .context("free tier provisioning failed")?;
    }
    Ok((user, session))
}

/// OAuth signup/login. An existing connection logs in; a known email gets
/// the connection linked; otherwise a passwordless account is created.
pub async fn signup_with_connection(
    state: &AppState,
    provider_name: &str,
    provider_id: &str,
    email: &str,
    name: Option<&str>,
    image_url: Option<&str>,
    currency: Currency,
) -> anyhow::Result<(User, Session)> {
    let email = normalize_email(email);
    if let Some(connection) = Connection::find(&state.db, provider_name, provider_id).await? {
        let user = User::find_by_id(&state.db, connection.user_id)
            .await?
            .context("connection references a missing user")?;
        let session = create_session(&state.db, user.id, state.config.session_ttl_days).await?;
        return Ok((user, session));
    }

    if let Some(user) = User::find_by_email(&state.db, &email).await? {
        let mut tx = state.db.begin().await?;
        Connection::create(&mut *tx, provider_name, provider_id, user.id).await?;
        let session = create_session(&mut *tx, user.id, state.config.session_ttl_days).await?;
        tx.commit().await?;
        return Ok((user, session));
    }

    let free_price = free_price_for_signup(state, currency).await?;

    let mut tx = state.db.begin().await?;
    let user = User::create(&mut *tx, &email, name, image_url, "user").await?;
    Connection::create(&mut *tx, provider_name, provider_id, user.id).await?;
    let session = create_session(&mut *tx, user.id, state.config.session_ttl_days).await?;
    tx.commit().await?;

    if let Some(price) = free_price {
        provision_free_subscription(state, &user, &price)
            .await
            .context("free tier provisioning failed")?;
    }
    Ok((user, session))
}

/// Logout must always succeed for the caller; the row delete happens off the
/// request path and a failure only gets logged.
pub fn delete_session_best_effort(db: PgPool, session_id: String) {
    tokio::spawn(async move {
        if let Err(err) = Session::delete(&db, &session_id).await {
            warn!(session_id, "failed to delete session: {err:#}");
        }
    });
}

/// Check a password against a known account, addressed by exactly one of id
/// or email. Both or neither is caller error and fails before any lookup.
/// `None` is returned both for an unknown account and a wrong password.
pub async fn verify_user_password(
    db: &PgPool,
    id: Option<Uuid>,
    email: Option<&str>,
    password: &str,
) -> anyhow::Result<Option<Uuid>> {
    let found = match (id, email) {
        (Some(id), None) => Password::find_with_user_by_id(db, id).await?,
        (None, Some(email)) => {
            Password::find_with_user_by_email(db, &normalize_email(email)).await?
        }
        _ => bail!("either email or id must be provided, but not both"),
    };
    let hash = found.as_ref().map(|(_, hash)| hash.as_str());
    if verify_password_or_dummy(password, hash) {
        Ok(found.map(|(user_id, _)| user_id))
    } else {
        Ok(None)
    }
}

/// Replace the stored hash for an account. Returns false when no such
/// account holds a password credential.
pub async fn reset_user_password(db: &PgPool, email: &str, password: &str) -> anyhow::Result<bool> {
    let hash = hash_password(password)?;
    let rows = Password::replace_by_email(db, &normalize_email(email), &hash).await?;
    Ok(rows > 0)
}
