//! Caseflow Daemon - case record workflow service
//!
//! Tracks criminal case records from OB intake through station review,
//! investigation, and court disposition.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use caseflow_common::CaseflowConfig;
use caseflowd::dispatcher::{LogSink, NotificationDispatcher};
use caseflowd::engine::LifecycleEngine;
use caseflowd::server::{self, AppState};
use caseflowd::store::CaseStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("caseflowd v{} starting", env!("CARGO_PKG_VERSION"));

    let config = CaseflowConfig::load()?;
    let store = CaseStore::open(&config.db_path).await?;
    let engine = LifecycleEngine::new(store.clone(), config.clone());
    let dispatcher = NotificationDispatcher::new(Arc::new(LogSink));

    let state = AppState::new(engine, store, dispatcher);
    server::run(state, &config.bind_addr).await
}
