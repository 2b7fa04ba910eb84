use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

use common_auth::{InMemoryRevocationRegistry, RevocationRegistry, TokenCodec};
use ordering_service::metrics::OrderingMetrics;
use ordering_service::{api_router, config, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let config = config::load_config()?;
    let pool = PgPool::connect(&config.database_url).await?;
    db::initialize(&pool, &config).await?;

    let codec = Arc::new(TokenCodec::new(config.token_config()));
    let revocations: Arc<dyn RevocationRegistry> = Arc::new(InMemoryRevocationRegistry::new());
    let metrics = Arc::new(OrderingMetrics::new()?);

    let state = AppState {
        db: pool,
        codec,
        revocations,
        config: Arc::new(config.clone()),
        metrics,
    };

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://localhost:5173"),
        ]))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION]);

    let app = api_router(state).layer(cors);

    let ip: std::net::IpAddr = config.host.parse()?;
    let addr = SocketAddr::from((ip, config.port));
    info!(%addr, "starting ordering-service");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
