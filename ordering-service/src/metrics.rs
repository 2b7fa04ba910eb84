use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct OrderingMetrics {
    registry: Registry,
    login_attempts: IntCounterVec,
    token_revocations: IntCounter,
    orders_created: IntCounter,
}

impl OrderingMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let login_attempts = IntCounterVec::new(
            Opts::new(
                "auth_login_attempts_total",
                "Count of login attempts grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(login_attempts.clone()))?;

        let token_revocations = IntCounter::new(
            "auth_token_revocations_total",
            "Count of tokens revoked via logout or rotation",
        )?;
        registry.register(Box::new(token_revocations.clone()))?;

        let orders_created = IntCounter::new("orders_created_total", "Count of orders placed")?;
        registry.register(Box::new(orders_created.clone()))?;

        Ok(Self {
            registry,
            login_attempts,
            token_revocations,
            orders_created,
        })
    }

    pub fn login_attempt(&self, outcome: &str) {
        self.login_attempts.with_label_values(&[outcome]).inc();
    }

    pub fn token_revoked(&self) {
        self.token_revocations.inc();
    }

    pub fn order_created(&self) {
        self.orders_created.inc();
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}
