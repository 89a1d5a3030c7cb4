use serde::{Deserialize, Serialize};

use crate::auth::dto::PublicUser;
use crate::billing::plans::{Currency, Plan};
use crate::billing::repo_types::Subscription;

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub user: PublicUser,
    pub subscription: Option<Subscription>,
}

#[derive(Debug, Serialize)]
pub struct PlansResponse {
    pub plans: &'static [Plan],
    pub subscription: Option<Subscription>,
    pub default_currency: Currency,
}

#[derive(Debug, Serialize)]
pub struct CustomerResponse {
    pub customer_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub plan_id: String,
    pub interval: String,
}

#[derive(Debug, Serialize)]
pub struct RedirectResponse {
    pub url: String,
}
