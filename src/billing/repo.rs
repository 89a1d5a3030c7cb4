use sqlx::PgPool;
use uuid::Uuid;

use crate::billing::repo_types::{NewSubscription, Price, Subscription};

impl Subscription {
    /// The current subscription for a user, if any.
    pub async fn find_by_user_id(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<Subscription>> {
        let row = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT id, user_id, plan_id, price_id, "interval", status, currency,
                   current_period_start, current_period_end, cancel_at_period_end,
                   created_at, updated_at
            FROM subscriptions
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    /// Insert or replace the user's subscription mirror. The unique user_id
    /// constraint keeps it to one active subscription per user.
    pub async fn upsert(db: &PgPool, new: &NewSubscription) -> anyhow::Result<Subscription> {
        let row = sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions
                (id, user_id, plan_id, price_id, "interval", status, currency,
                 current_period_start, current_period_end, cancel_at_period_end)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (user_id) DO UPDATE SET
                id = EXCLUDED.id,
                plan_id = EXCLUDED.plan_id,
                price_id = EXCLUDED.price_id,
                "interval" = EXCLUDED."interval",
                status = EXCLUDED.status,
                currency = EXCLUDED.currency,
                current_period_start = EXCLUDED.current_period_start,
                current_period_end = EXCLUDED.current_period_end,
                cancel_at_period_end = EXCLUDED.cancel_at_period_end,
                updated_at = now()
            RETURNING id, user_id, plan_id, price_id, "interval", status, currency,
                      current_period_start, current_period_end, cancel_at_period_end,
                      created_at, updated_at
            "#,
        )
        .bind(&new.id)
        .bind(new.user_id)
        .bind(&new.plan_id)
        .bind(&new.price_id)
        .bind(&new.interval)
        .bind(&new.status)
        .bind(&new.currency)
        .bind(new.current_period_start)
        .bind(new.current_period_end)
        .bind(new.cancel_at_period_end)
        .fetch_one(db)
        .await?;
        Ok(row)
    }
}

impl Price {
    pub async fn find(
        db: &PgPool,
        plan_id: &str,
        interval: &str,
        currency: &str,
    ) -> anyhow::Result<Option<Price>> {
        let row = sqlx::query_as::<_, Price>(
            r#"
            SELECT id, plan_id, "interval", currency, amount
            FROM prices
            WHERE plan_id = $1 AND "interval" = $2 AND currency = $3
            "#,
        )
        .bind(plan_id)
        .bind(interval)
        .bind(currency)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn find_by_id(db: &PgPool, id: &str) -> anyhow::Result<Option<Price>> {
        let row = sqlx::query_as::<_, Price>(
            r#"
            SELECT id, plan_id, "interval", currency, amount
            FROM prices
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn list_by_plan(db: &PgPool, plan_id: &str) -> anyhow::Result<Vec<Price>> {
        let rows = sqlx::query_as::<_, Price>(
            r#"
            SELECT id, plan_id, "interval", currency, amount
            FROM prices
            WHERE plan_id = $1
            "#,
        )
        .bind(plan_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn upsert(db: &PgPool, price: &Price) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO prices (id, plan_id, "interval", currency, amount)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                plan_id = EXCLUDED.plan_id,
                "interval" = EXCLUDED."interval",
                currency = EXCLUDED.currency,
                amount = EXCLUDED.amount
            "#,
        )
        .bind(&price.id)
        .bind(&price.plan_id)
        .bind(&price.interval)
        .bind(&price.currency)
        .bind(price.amount)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn count(db: &PgPool) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM prices")
            .fetch_one(db)
            .await?;
        Ok(count)
    }
}

/// Select the price for an interval/currency pair from an already-fetched
/// set. Returns `None` when the combination is not offered, which is a hard
/// failure for free-tier assignment at signup.
pub fn pick_price<'a>(prices: &'a [Price], interval: &str, currency: &str) -> Option<&'a Price> {
    prices
        .iter()
        .find(|p| p.interval == interval && p.currency == currency)
}
