use launchbase::{app, billing, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "launchbase=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let state = AppState::init().await?;

    if let Err(e) = sqlx::migrate!("./migrations").run(&state.db).await {
        tracing::warn!(error = %e, "migration failed; continuing");
    }

    // One-time Stripe catalog sync: creates products and prices for the
    // static plan catalog and configures the customer portal. No-op once
    // the price table is populated.
    if let Some(client) = &state.billing {
        if let Err(e) =
            billing::sync::sync_catalog(&state.db, client, &state.config.app_name).await
        {
            tracing::warn!(error = %e, "billing catalog sync failed; continuing");
        }
    }

    let app = app::build_app(state);
    app::serve(app).await
}
