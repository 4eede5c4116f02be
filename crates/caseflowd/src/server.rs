//! HTTP server for caseflowd

use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::dispatcher::NotificationDispatcher;
use crate::engine::LifecycleEngine;
use crate::routes;
use crate::store::CaseStore;

/// Request body cap; workflow payloads are small JSON records
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Application state shared across handlers
pub struct AppState {
    pub engine: LifecycleEngine,
    pub store: CaseStore,
    pub dispatcher: NotificationDispatcher,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(engine: LifecycleEngine, store: CaseStore, dispatcher: NotificationDispatcher) -> Self {
        Self {
            engine,
            store,
            dispatcher,
            start_time: Instant::now(),
        }
    }
}

/// Run the HTTP server
pub async fn run(state: AppState, bind_addr: &str) -> Result<()> {
    let state = Arc::new(state);

    let app = Router::new()
        .merge(routes::case_routes())
        .merge(routes::report_routes())
        .merge(routes::user_routes())
        .merge(routes::health_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
                .layer(TimeoutLayer::new(Duration::from_secs(30))),
        );

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
