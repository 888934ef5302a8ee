//! HTTP API server for the budget service.

pub mod routes;

use crate::service::BudgetService;
use std::sync::Arc;
use tracing::info;

/// Start the HTTP server on `addr`, serving the given service.
pub async fn start(addr: &str, service: Arc<BudgetService>) -> anyhow::Result<()> {
    let app = routes::create_router(service);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("server listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
