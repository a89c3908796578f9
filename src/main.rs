mod api;
mod app;
mod auth;
mod client;
mod config;
mod db;
mod domain;
mod error;
mod logging;
mod middleware;
mod routes;
mod seed;
mod services;

use anyhow::{bail, Context, Result};

use client::Client;
use domain::UserUnique;
use services::RedisCache;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let settings = config::Settings::from_env()?;
    logging::init_logging(&settings.env);

    let pool = db::create_pool(&settings).await?;
    db::migrate(&pool).await?;
    let client = Client::new(pool);
    client
        .connect()
        .await
        .context("Database is not reachable")?;

    // `sitebuild-backend issue-token <email>` prints a token for local use
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Some(command) = args.first() {
        return match (command.as_str(), args.get(1)) {
            ("issue-token", Some(email)) => issue_token(&client, &settings, email).await,
            ("seed", None) => seed::seed_users(&client).await.map(|_| ()),
            _ => bail!("usage: sitebuild-backend [seed | issue-token <email>]"),
        };
    }

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        "Starting sitebuild backend"
    );

    if settings.seed_on_start {
        seed::seed_users(&client).await?;
    }

    // Caching is optional; the API works against the database alone
    let cache = match &settings.redis_url {
        Some(url) => match RedisCache::new(url, settings.redis_cache_ttl_seconds).await {
            Ok(cache) => Some(cache),
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable - caching disabled");
                None
            }
        },
        None => {
            tracing::info!("REDIS_URL not set - caching disabled");
            None
        }
    };

    let state = app::AppState::new(client.clone(), settings.clone(), cache);
    let app = app::create_app(state);

    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    client.disconnect().await;
    Ok(())
}

async fn issue_token(client: &Client, settings: &config::Settings, email: &str) -> Result<()> {
    let user = client
        .user()
        .find_unique(UserUnique::Email(email.trim().to_lowercase()))
        .await?
        .with_context(|| format!("No user with email {}", email))?;

    let keys = auth::JwtKeys::new(
        &settings.jwt_secret,
        &settings.jwt_issuer,
        settings.jwt_ttl_seconds,
    );
    println!("{}", keys.issue(&user)?);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
