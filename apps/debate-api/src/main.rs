use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use debate_api::config::Config;
use debate_api::db::kv::{KeyValueStore, RedisStore};
use debate_api::gateway::fanout::RoomBroadcast;
use debate_api::AppState;
use debate_common::SnowflakeGenerator;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // .env is optional; variables may come from the environment.
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path(Path::new(env!("CARGO_MANIFEST_DIR")).join(".env"));
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    let db = debate_api::db::pool::connect(&config.database_url).expect("failed to build pool");

    // Shared with the identity issuer and `debate-setup`.
    let kv: Arc<dyn KeyValueStore> = Arc::new(
        RedisStore::connect(&config.redis_url)
            .await
            .expect("failed to connect to redis"),
    );

    let snowflake = SnowflakeGenerator::new(config.snowflake_worker_id)
        .expect("SNOWFLAKE_WORKER_ID must be below 1024");

    tracing::info!(
        default_team_capacity = config.default_team_capacity,
        max_team_capacity = config.max_team_capacity,
        "debate-api configured"
    );

    let state = AppState {
        db,
        kv,
        broadcast: Arc::new(RoomBroadcast::new(config.room_channel_capacity)),
        snowflake: Arc::new(snowflake),
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(debate_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "debate-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(?err, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutting down");
}
