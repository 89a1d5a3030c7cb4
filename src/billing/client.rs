use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::billing::plans::{Currency, Interval, PlanId};
use crate::billing::query::to_query_string;

pub const STRIPE_API_URL: &str = "https://api.stripe.com";

#[derive(Debug, Error)]
pub enum BillingError {
    /// Caller misuse; raised before any network traffic.
    #[error("missing required parameters to {0}")]
    MissingParams(&'static str),
    /// Non-2xx from Stripe; single attempt, never retried here.
    #[error("stripe api error: {status} - {body}")]
    Api { status: u16, body: String },
    #[error("stripe transport error: {0}")]
    Transport(String),
    #[error("unexpected stripe response: {0}")]
    InvalidResponse(String),
    #[error("no redirect url returned for {0}")]
    MissingRedirectUrl(&'static str),
}

pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// One outbound HTTP attempt. Split from the client so tests can observe
/// whether (and what) a call would have sent.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(
        &self,
        method: Method,
        url: &str,
        bearer: &str,
        form_body: Option<String>,
    ) -> Result<TransportResponse, BillingError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(
        &self,
        method: Method,
        url: &str,
        bearer: &str,
        form_body: Option<String>,
    ) -> Result<TransportResponse, BillingError> {
        let mut request = self.client.request(method, url).bearer_auth(bearer);
        if let Some(body) = form_body {
            request = request
                .header(
                    reqwest::header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                )
                .body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BillingError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| BillingError::Transport(e.to_string()))?;
        Ok(TransportResponse { status, body })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeletedCustomer {
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeProduct {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePrice {
    pub id: String,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub unit_amount: Option<i64>,
    #[serde(default)]
    pub recurring: Option<PriceRecurring>,
    #[serde(default)]
    pub product: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceRecurring {
    pub interval: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    pub current_period_start: i64,
    pub current_period_end: i64,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub canceled_at: Option<i64>,
    #[serde(default)]
    pub items: SubscriptionItems,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    pub price: StripePrice,
}

impl StripeSubscription {
    pub fn price(&self) -> Option<&StripePrice> {
        self.items.data.first().map(|item| &item.price)
    }
}

#[derive(Debug, Deserialize)]
struct CheckoutSession {
    #[allow(dead_code)]
    id: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PortalSession {
    #[allow(dead_code)]
    id: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortalConfiguration {
    pub id: String,
}

/// Product/price set offered for plan changes in the customer portal.
#[derive(Debug, Clone)]
pub struct PortalProduct {
    pub product: PlanId,
    pub prices: Vec<String>,
}

/// Narrow Stripe REST client: one method per domain operation, one request
/// per call. Required arguments are checked before anything leaves the
/// process; failures carry the raw status and body back to the caller.
pub struct StripeClient {
    secret_key: String,
    base_url: String,
    transport: Arc<dyn HttpTransport>,
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            base_url: STRIPE_API_URL.to_string(),
            transport: Arc::new(ReqwestTransport::new()),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = transport;
        self
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, BillingError> {
        let url = format!("{}{}", self.base_url, path);
        let form = body.map(to_query_string);
        let response = self
            .transport
            .execute(method, &url, &self.secret_key, form)
            .await?;

        if !(200..300).contains(&response.status) {
            return Err(BillingError::Api {
                status: response.status,
                body: response.body,
            });
        }
        serde_json::from_str(&response.body)
            .map_err(|e| BillingError::InvalidResponse(e.to_string()))
    }

    pub async fn create_customer(
        &self,
        email: &str,
        name: &str,
    ) -> Result<StripeCustomer, BillingError> {
        if email.is_empty() || name.is_empty() {
            return Err(BillingError::MissingParams("create customer"));
        }
        let body = json!({ "email": email, "name": name });
        self.request(Method::POST, "/v1/customers", Some(&body)).await
    }

    pub async fn delete_customer(
        &self,
        customer_id: &str,
    ) -> Result<DeletedCustomer, BillingError> {
        if customer_id.is_empty() {
            return Err(BillingError::MissingParams("delete customer"));
        }
        self.request(Method::DELETE, &format!("/v1/customers/{customer_id}"), None)
            .await
    }

    pub async fn create_product(
        &self,
        id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<StripeProduct, BillingError> {
        if id.is_empty() || name.is_empty() {
            return Err(BillingError::MissingParams("create product"));
        }
        let mut body = json!({ "id": id, "name": name });
        if let Some(description) = description {
            body["description"] = json!(description);
        }
        self.request(Method::POST, "/v1/products", Some(&body)).await
    }

    pub async fn create_price(
        &self,
        product: &str,
        currency: Currency,
        interval: Interval,
        unit_amount: i64,
    ) -> Result<StripePrice, BillingError> {
        if product.is_empty() {
            return Err(BillingError::MissingParams("create price"));
        }
        let body = json!({
            "product": product,
            "currency": currency.as_str(),
            "unit_amount": unit_amount,
            "recurring": { "interval": interval.as_str() },
        });
        self.request(Method::POST, "/v1/prices", Some(&body)).await
    }

    pub async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
    ) -> Result<StripeSubscription, BillingError> {
        if customer_id.is_empty() || price_id.is_empty() {
            return Err(BillingError::MissingParams("create subscription"));
        }
        let body = json!({
            "customer": customer_id,
            "items": [{ "price": price_id }],
        });
        self.request(Method::POST, "/v1/subscriptions", Some(&body)).await
    }

    pub async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscription, BillingError> {
        if subscription_id.is_empty() {
            return Err(BillingError::MissingParams("retrieve subscription"));
        }
        self.request(
            Method::GET,
            &format!("/v1/subscriptions/{subscription_id}"),
            None,
        )
        .await
    }

    /// Returns the hosted checkout URL for a subscription purchase.
    pub async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<String, BillingError> {
        if customer_id.is_empty() || price_id.is_empty() {
            return Err(BillingError::MissingParams("create checkout session"));
        }
        let body = json!({
            "customer": customer_id,
            "line_items": [{ "price": price_id, "quantity": 1 }],
            "mode": "subscription",
            "payment_method_types": ["card"],
            "success_url": success_url,
            "cancel_url": cancel_url,
        });
        let session: CheckoutSession = self
            .request(Method::POST, "/v1/checkout/sessions", Some(&body))
            .await?;
        session
            .url
            .filter(|url| !url.is_empty())
            .ok_or(BillingError::MissingRedirectUrl("checkout session"))
    }

    /// Returns the hosted customer-portal URL.
    pub async fn create_customer_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, BillingError> {
        if customer_id.is_empty() {
            return Err(BillingError::MissingParams("create customer portal session"));
        }
        let body = json!({ "customer": customer_id, "return_url": return_url });
        let session: PortalSession = self
            .request(Method::POST, "/v1/billing_portal/sessions", Some(&body))
            .await?;
        session
            .url
            .filter(|url| !url.is_empty())
            .ok_or(BillingError::MissingRedirectUrl("customer portal session"))
    }

    /// Configures which paid products the customer portal offers; the free
    /// product is never listed as a plan-change target.
    pub async fn configure_customer_portal(
        &self,
        app_name: &str,
        products: &[PortalProduct],
    ) -> Result<PortalConfiguration, BillingError> {
        if products.is_empty() {
            return Err(BillingError::MissingParams("configure customer portal"));
        }
        let paid_products: Vec<Value> = products
            .iter()
            .filter(|p| p.product != PlanId::Free)
            .map(|p| json!({ "product": p.product.as_str(), "prices": p.prices.clone() }))
            .collect();

        let body = json!({
            "business_profile": {
                "headline": format!("{app_name} - Customer Portal"),
            },
            "features": {
                "customer_update": {
                    "enabled": true,
                    "allowed_updates": ["address", "shipping", "tax_id", "email"],
                },
                "invoice_history": { "enabled": true },
                "payment_method_update": { "enabled": true },
                "subscription_cancel": { "enabled": true },
                "subscription_update": {
                    "enabled": true,
                    "default_allowed_updates": ["price"],
                    "proration_behavior": "always_invoice",
                    "products": paid_products,
                },
            },
        });
        self.request(Method::POST, "/v1/billing_portal/configurations", Some(&body))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records every request and answers each with the same canned response.
    struct RecordingTransport {
        status: u16,
        body: String,
        calls: AtomicUsize,
        requests: Mutex<Vec<(Method, String, Option<String>)>>,
    }

    impl RecordingTransport {
        fn respond_with(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                status,
                body: body.to_string(),
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last_request(&self) -> (Method, String, Option<String>) {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl HttpTransport for RecordingTransport {
        async fn execute(
            &self,
            method: Method,
            url: &str,
            _bearer: &str,
            form_body: Option<String>,
        ) -> Result<TransportResponse, BillingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests
                .lock()
                .unwrap()
                .push((method, url.to_string(), form_body));
            Ok(TransportResponse {
                status: self.status,
                body: self.body.clone(),
            })
        }
    }

    fn client_with(transport: Arc<RecordingTransport>) -> StripeClient {
        StripeClient::new("sk_test_key").with_transport(transport)
    }

    const SUBSCRIPTION_JSON: &str = r#"{
        "id": "sub_1",
        "customer": "cus_1",
        "status": "active",
        "current_period_start": 1704067200,
        "current_period_end": 1735689600,
        "cancel_at_period_end": false,
        "items": { "data": [{ "price": { "id": "price_free_usd_year",
            "currency": "usd", "unit_amount": 0,
            "recurring": { "interval": "year" }, "product": "free" } }] }
    }"#;

    #[tokio::test]
    async fn checkout_with_missing_customer_makes_no_call() {
        let transport = RecordingTransport::respond_with(200, "{}");
        let client = client_with(transport.clone());

        let err = client
            .create_checkout_session("", "price_1", "https://x/account", "https://x/plans")
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::MissingParams(_)));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn checkout_with_missing_price_makes_no_call() {
        let transport = RecordingTransport::respond_with(200, "{}");
        let client = client_with(transport.clone());

        let err = client
            .create_checkout_session("cus_1", "", "https://x/account", "https://x/plans")
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::MissingParams(_)));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn create_subscription_validates_before_network() {
        let transport = RecordingTransport::respond_with(200, "{}");
        let client = client_with(transport.clone());

        assert!(matches!(
            client.create_subscription("", "price_1").await.unwrap_err(),
            BillingError::MissingParams(_)
        ));
        assert!(matches!(
            client.create_subscription("cus_1", "").await.unwrap_err(),
            BillingError::MissingParams(_)
        ));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn api_errors_carry_status_and_body() {
        let transport = RecordingTransport::respond_with(402, "card declined");
        let client = client_with(transport);

        let err = client.create_customer("a@b.com", "Ada").await.unwrap_err();
        match err {
            BillingError::Api { status, body } => {
                assert_eq!(status, 402);
                assert_eq!(body, "card declined");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn checkout_without_redirect_url_fails() {
        let transport = RecordingTransport::respond_with(200, r#"{"id":"cs_1"}"#);
        let client = client_with(transport);

        let err = client
            .create_checkout_session("cus_1", "price_1", "https://x/account", "https://x/plans")
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::MissingRedirectUrl(_)));
    }

    #[tokio::test]
    async fn checkout_returns_session_url_and_encodes_body() {
        let transport = RecordingTransport::respond_with(
            200,
            r#"{"id":"cs_1","url":"https://checkout.stripe.com/c/pay/cs_1"}"#,
        );
        let client = client_with(transport.clone());

        let url = client
            .create_checkout_session("cus_1", "price_1", "https://x/account", "https://x/plans")
            .await
            .unwrap();
        assert_eq!(url, "https://checkout.stripe.com/c/pay/cs_1");

        let (method, request_url, form) = transport.last_request();
        assert_eq!(method, Method::POST);
        assert!(request_url.ends_with("/v1/checkout/sessions"));
        let form = form.unwrap();
        assert!(form.contains("customer=cus_1"));
        assert!(form.contains("line_items%5B0%5D%5Bprice%5D=price_1"));
        assert!(form.contains("mode=subscription"));
        assert!(form.contains("payment_method_types%5B0%5D=card"));
    }

    #[tokio::test]
    async fn delete_customer_issues_delete() {
        let transport =
            RecordingTransport::respond_with(200, r#"{"id":"cus_1","deleted":true}"#);
        let client = client_with(transport.clone());

        let deleted = client.delete_customer("cus_1").await.unwrap();
        assert!(deleted.deleted);

        let (method, url, form) = transport.last_request();
        assert_eq!(method, Method::DELETE);
        assert!(url.ends_with("/v1/customers/cus_1"));
        assert!(form.is_none());
    }

    #[tokio::test]
    async fn retrieve_subscription_parses_nested_price() {
        let transport = RecordingTransport::respond_with(200, SUBSCRIPTION_JSON);
        let client = client_with(transport.clone());

        let subscription = client.retrieve_subscription("sub_1").await.unwrap();
        assert_eq!(subscription.status, "active");
        assert!(!subscription.cancel_at_period_end);
        assert_eq!(subscription.price().unwrap().id, "price_free_usd_year");

        let (method, url, _) = transport.last_request();
        assert_eq!(method, Method::GET);
        assert!(url.ends_with("/v1/subscriptions/sub_1"));
    }

    #[tokio::test]
    async fn portal_configuration_excludes_free_product() {
        let transport = RecordingTransport::respond_with(200, r#"{"id":"bpc_1"}"#);
        let client = client_with(transport.clone());

        let products = vec![
            PortalProduct {
                product: PlanId::Free,
                prices: vec!["price_free".into()],
            },
            PortalProduct {
                product: PlanId::Pro,
                prices: vec!["price_pro_m".into(), "price_pro_y".into()],
            },
        ];
        client
            .configure_customer_portal("Launchbase", &products)
            .await
            .unwrap();

        let (_, _, form) = transport.last_request();
        let form = form.unwrap();
        assert!(!form.contains("price_free"));
        assert!(!form.contains("%5Bproduct%5D=free"));
        assert!(form.contains("price_pro_m"));
    }

    #[tokio::test]
    async fn invalid_json_is_an_invalid_response() {
        let transport = RecordingTransport::respond_with(200, "not json");
        let client = client_with(transport);

        let err = client.create_customer("a@b.com", "Ada").await.unwrap_err();
        assert!(matches!(err, BillingError::InvalidResponse(_)));
    }
}
