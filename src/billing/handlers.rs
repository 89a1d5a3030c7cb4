use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

use crate::auth::extractors::{MaybeSessionUser, SessionUser};
use crate::auth::repo_types::User;
use crate::billing::client::StripeClient;
use crate::billing::dto::{
    AccountResponse, CheckoutRequest, CustomerResponse, PlansResponse, RedirectResponse,
};
use crate::billing::plans::{detect_currency, Interval, PlanId, PRICING_PLANS};
use crate::billing::repo::pick_price;
use crate::billing::repo_types::{NewSubscription, Price, Subscription};
use crate::state::AppState;

/// Billing is a capability: without a configured secret key every billing
/// endpoint answers 503 instead of pretending.
fn billing_client(state: &AppState) -> Result<Arc<StripeClient>, (StatusCode, String)> {
    state.billing.clone().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        "Billing is not configured".to_string(),
    ))
}

/// Ensure the user has a Stripe customer, creating one on first use.
async fn ensure_customer(
    state: &AppState,
    client: &StripeClient,
    user: &User,
) -> Result<String, (StatusCode, String)> {
    if let Some(customer_id) = &user.customer_id {
        return Ok(customer_id.clone());
    }
    let name = user.name.clone().unwrap_or_else(|| user.email.clone());
    let customer = client
        .create_customer(&user.email, &name)
        .await
        .map_err(|err| (StatusCode::BAD_GATEWAY, err.to_string()))?;
    User::set_customer_id(&state.db, user.id, &customer.id)
        .await
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    Ok(customer.id)
}

#[instrument(skip(state, session))]
pub async fn get_account(
    State(state): State<AppState>,
    session: SessionUser,
) -> Result<Json<AccountResponse>, (StatusCode, String)> {
    let subscription = Subscription::find_by_user_id(&state.db, session.user.id)
        .await
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    Ok(Json(AccountResponse {
        user: session.user.into(),
        subscription,
    }))
}

#[instrument(skip(state, session, headers))]
pub async fn get_plans(
    State(state): State<AppState>,
    session: MaybeSessionUser,
    headers: HeaderMap,
) -> Result<Json<PlansResponse>, (StatusCode, String)> {
    let subscription = match &session.user {
        Some(user) => Subscription::find_by_user_id(&state.db, user.id)
            .await
            .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?,
        None => None,
    };
    Ok(Json(PlansResponse {
        plans: &PRICING_PLANS,
        subscription,
        default_currency: detect_currency(&headers),
    }))
}

#[instrument(skip(state, session))]
pub async fn create_customer(
    State(state): State<AppState>,
    session: SessionUser,
) -> Result<Json<CustomerResponse>, (StatusCode, String)> {
    let client = billing_client(&state)?;
    let customer_id = ensure_customer(&state, &client, &session.user).await?;
    Ok(Json(CustomerResponse { customer_id }))
}

/// Put a user without any subscription on the free tier. Used by clients
/// that notice the account has no plan yet.
#[instrument(skip(state, session, headers))]
pub async fn create_free_subscription(
    State(state): State<AppState>,
    session: SessionUser,
    headers: HeaderMap,
) -> Result<Json<Subscription>, (StatusCode, String)> {
    let client = billing_client(&state)?;
    if let Some(existing) = Subscription::find_by_user_id(&state.db, session.user.id)
        .await
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
    {
        return Ok(Json(existing));
    }

    let currency = detect_currency(&headers);
    let prices = Price::list_by_plan(&state.db, "free")
        .await
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    let price = pick_price(&prices, "year", currency.as_str()).ok_or((
        StatusCode::INTERNAL_SERVER_ERROR,
        "Free plan price is missing".to_string(),
    ))?;

    let customer_id = ensure_customer(&state, &client, &session.user).await?;
    let stripe_subscription = client
        .create_subscription(&customer_id, &price.id)
        .await
        .map_err(|err| (StatusCode::BAD_GATEWAY, err.to_string()))?;
    let subscription = Subscription::upsert(
        &state.db,
        &NewSubscription::from_stripe(&stripe_subscription, session.user.id, price),
    )
    .await
    .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    Ok(Json(subscription))
}

/// Refresh the local subscription mirror from Stripe.
#[instrument(skip(state, session))]
pub async fn sync_subscription(
    State(state): State<AppState>,
    session: SessionUser,
) -> Result<Json<Subscription>, (StatusCode, String)> {
    let client = billing_client(&state)?;
    let current = Subscription::find_by_user_id(&state.db, session.user.id)
        .await
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "No subscription found".to_string()))?;

    let stripe_subscription = client
        .retrieve_subscription(&current.id)
        .await
        .map_err(|err| (StatusCode::BAD_GATEWAY, err.to_string()))?;
    let price_id = stripe_subscription
        .price()
        .map(|p| p.id.clone())
        .unwrap_or_else(|| current.price_id.clone());
    let price = Price::find_by_id(&state.db, &price_id)
        .await
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        .ok_or((StatusCode::NOT_FOUND, "Unknown price".to_string()))?;

    let subscription = Subscription::upsert(
        &state.db,
        &NewSubscription::from_stripe(&stripe_subscription, session.user.id, &price),
    )
    .await
    .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    Ok(Json(subscription))
}

#[instrument(skip(state, session, headers, payload))]
pub async fn create_checkout(
    State(state): State<AppState>,
    session: SessionUser,
    headers: HeaderMap,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<RedirectResponse>, (StatusCode, String)> {
    let client = billing_client(&state)?;
    let plan = PlanId::parse(&payload.plan_id)
        .ok_or((StatusCode::BAD_REQUEST, "Unknown plan".to_string()))?;
    let interval = Interval::parse(&payload.interval).ok_or((
        StatusCode::BAD_REQUEST,
        "Unknown billing interval".to_string(),
    ))?;

    let currency = detect_currency(&headers);
    let prices = Price::list_by_plan(&state.db, plan.as_str())
        .await
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    let price = pick_price(&prices, interval.as_str(), currency.as_str()).ok_or((
        StatusCode::BAD_REQUEST,
        "Plan is not offered for this interval and currency".to_string(),
    ))?;

    let customer_id = ensure_customer(&state, &client, &session.user).await?;
    let success_url = format!("{}/checkout?success=true", state.config.host_url);
    let cancel_url = format!("{}/plans?canceled=true", state.config.host_url);
    let url = client
        .create_checkout_session(&customer_id, &price.id, &success_url, &cancel_url)
        .await
        .map_err(|err| (StatusCode::BAD_GATEWAY, err.to_string()))?;
    Ok(Json(RedirectResponse { url }))
}

#[instrument(skip(state, session))]
pub async fn create_portal(
    State(state): State<AppState>,
    session: SessionUser,
) -> Result<Json<RedirectResponse>, (StatusCode, String)> {
    let client = billing_client(&state)?;
    let customer_id = ensure_customer(&state, &client, &session.user).await?;
    let return_url = format!("{}/account", state.config.host_url);
    let url = client
        .create_customer_portal_session(&customer_id, &return_url)
        .await
        .map_err(|err| (StatusCode::BAD_GATEWAY, err.to_string()))?;
    Ok(Json(RedirectResponse { url }))
}
