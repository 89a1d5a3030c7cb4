use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub image_url: Option<String>,
    /// Stripe customer id, set on first billing interaction.
    pub customer_id: Option<String>,
    pub role: String,
    pub created_at: OffsetDateTime,
}

/// Opaque server-side session; the cookie carries only the id.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: Uuid,
    pub expiration_date: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

/// Link between a local user and an external identity provider account.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Connection {
    pub id: Uuid,
    pub provider_name: String,
    pub provider_id: String,
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
}
