use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::{prelude::*, state::AppState};

#[derive(Debug, Serialize)]
pub struct Health {
  status: &'static str,
  version: &'static str,
  agents: u64,
  pending_payouts: usize,
}

pub async fn health(
  State(app): State<Arc<AppState>>,
) -> (StatusCode, Json<Health>) {
  let sv = app.sv();

  let counts = async {
    let agents = sv.agent.count().await?;
    let pending = sv.payout.pending().await?.len();
    Ok::<_, Error>((agents, pending))
  }
  .await;

  match counts {
    Ok((agents, pending_payouts)) => (
      StatusCode::OK,
      Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        agents,
        pending_payouts,
      }),
    ),
    Err(e) => {
      error!("health check failed: {e}");
      (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(Health {
          status: "degraded",
          version: env!("CARGO_PKG_VERSION"),
          agents: 0,
          pending_payouts: 0,
        }),
      )
    }
  }
}
