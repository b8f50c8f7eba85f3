//! HTTP binding of the simulation control plane.
//!
//! All routes share one [`SimulationControl`]. [`router`] mounts them at the
//! root; [`app`] nests them under `/simulation` the way the binary serves them.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    routing::{get, post},
};
use needle_sim::SimulationControl;
use tokio::net::TcpListener;
use tracing::info;

mod error;
pub mod routes;

pub use error::{ApiError, ErrorResponse};

/// Path prefix the control routes are served under.
pub const CONTROL_PREFIX: &str = "/simulation";

/// Control routes mounted at the root.
pub fn router(control: Arc<SimulationControl>) -> Router {
    Router::new()
        .route("/status", get(routes::status))
        .route("/metrics", get(routes::metrics).post(routes::metrics))
        .route(
            "/config",
            get(routes::get_config).post(routes::set_config),
        )
        .route("/reset", post(routes::reset))
        .route("/enable", post(routes::enable))
        .route("/disable", post(routes::disable))
        .with_state(control)
}

/// Control routes nested under [`CONTROL_PREFIX`].
pub fn app(control: Arc<SimulationControl>) -> Router {
    Router::new().nest(CONTROL_PREFIX, router(control))
}

/// Binds `addr` and serves [`app`] until the process exits.
pub async fn serve(addr: SocketAddr, control: Arc<SimulationControl>) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, prefix = CONTROL_PREFIX, "simulation control plane listening");

    axum::serve(listener, app(control)).await?;
    Ok(())
}
