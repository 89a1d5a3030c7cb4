use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::billing::client::StripeSubscription;

/// Local mirror of a Stripe subscription; the read model for UI branching.
/// At most one row per user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: String, // Stripe subscription id
    pub user_id: Uuid,
    pub plan_id: String,
    pub price_id: String,
    pub interval: String,
    pub status: String,
    pub currency: String,
    pub current_period_start: i64, // unix seconds
    pub current_period_end: i64,
    pub cancel_at_period_end: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Insert/update payload for the subscription mirror.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub id: String,
    pub user_id: Uuid,
    pub plan_id: String,
    pub price_id: String,
    pub interval: String,
    pub status: String,
    pub currency: String,
    pub current_period_start: i64,
    pub current_period_end: i64,
    pub cancel_at_period_end: bool,
}

impl NewSubscription {
    /// Combine the processor's response with the known local price row.
    pub fn from_stripe(subscription: &StripeSubscription, user_id: Uuid, price: &Price) -> Self {
        Self {
            id: subscription.id.clone(),
            user_id,
            plan_id: price.plan_id.clone(),
            price_id: price.id.clone(),
            interval: price.interval.clone(),
            status: subscription.status.clone(),
            currency: price.currency.clone(),
            current_period_start: subscription.current_period_start,
            current_period_end: subscription.current_period_end,
            cancel_at_period_end: subscription.cancel_at_period_end,
        }
    }
}

/// A Stripe price created from the static plan catalog.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Price {
    pub id: String, // Stripe price id
    pub plan_id: String,
    pub interval: String,
    pub currency: String,
    pub amount: i64, // minor units
}
