use sqlx::PgPool;
use tracing::{debug, info};

use crate::billing::client::{PortalProduct, StripeClient};
use crate::billing::plans::PRICING_PLANS;
use crate::billing::repo_types::Price;

/// Push the static plan catalog to Stripe: one product per plan, one price
/// per (currency, interval), then a customer-portal configuration offering
/// the paid products. Runs once; a populated price table means the catalog
/// was already synced.
pub async fn sync_catalog(db: &PgPool, client: &StripeClient, app_name: &str) -> anyhow::Result<()> {
    if Price::count(db).await? > 0 {
        debug!("billing catalog already synced");
        return Ok(());
    }

    let mut portal_products = Vec::with_capacity(PRICING_PLANS.len());
    for plan in &PRICING_PLANS {
        let product = client
            .create_product(plan.id.as_str(), plan.name, Some(plan.description))
            .await?;

        let mut price_ids = Vec::with_capacity(plan.prices.len());
        for plan_price in plan.prices {
            let created = client
                .create_price(
                    &product.id,
                    plan_price.currency,
                    plan_price.interval,
                    plan_price.amount,
                )
                .await?;
            Price::upsert(
                db,
                &Price {
                    id: created.id.clone(),
                    plan_id: plan.id.as_str().to_string(),
                    interval: plan_price.interval.as_str().to_string(),
                    currency: plan_price.currency.as_str().to_string(),
                    amount: plan_price.amount,
                },
            )
            .await?;
            price_ids.push(created.id);
        }

        portal_products.push(PortalProduct {
            product: plan.id,
            prices: price_ids,
        });
    }

    client
        .configure_customer_portal(app_name, &portal_products)
        .await?;
    info!("billing catalog synced to stripe");
    Ok(())
}
