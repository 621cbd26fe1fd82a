use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::post,
};
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::data::{AllocationRequest, AllocationSummary, DistributionStrategy, SeatAssignment};
use crate::engine;
use crate::error::AllocationError;
use crate::report::{RoomReport, build_report};
use crate::store::{InMemorySeatStore, SeatStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SeatStore>,
    pub default_strategy: DistributionStrategy,
}

impl AppState {
    pub fn new(store: Arc<dyn SeatStore>, config: &AppConfig) -> Self {
        Self {
            store,
            default_strategy: config.default_strategy,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationResponse {
    pub allocation_id: String,
    pub summary: AllocationSummary,
    pub assignments: Vec<SeatAssignment>,
    pub rooms: Vec<RoomReport>,
}

fn status_for(err: &AllocationError) -> StatusCode {
    match err {
        AllocationError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        e if e.is_validation() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn allocate_handler(
    State(state): State<AppState>,
    Path(allocation_id): Path<String>,
    payload: Result<Json<AllocationRequest>, JsonRejection>,
) -> Result<Json<AllocationResponse>, (StatusCode, String)> {
    // malformed bodies are input errors like any other failed validation
    let Json(mut request) = payload.map_err(|rejection| {
        warn!("Allocation {allocation_id} rejected: {}", rejection.body_text());
        (StatusCode::BAD_REQUEST, rejection.body_text())
    })?;
    request.config.strategy.get_or_insert(state.default_strategy);

    match engine::allocate_and_store(state.store.as_ref(), &allocation_id, &request) {
        Ok(output) => {
            let rooms = build_report(&request.rooms, &output.assignments, request.config.flip_lr);
            Ok(Json(AllocationResponse {
                allocation_id,
                summary: output.summary,
                assignments: output.assignments,
                rooms,
            }))
        }
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                error!("Allocation {allocation_id} failed: {e}");
            } else {
                warn!("Allocation {allocation_id} rejected: {e}");
            }
            Err((status, e.to_string()))
        }
    }
}

async fn fetch_handler(
    State(state): State<AppState>,
    Path(allocation_id): Path<String>,
) -> Result<Json<Vec<SeatAssignment>>, (StatusCode, String)> {
    match state.store.load_allocation(&allocation_id) {
        Ok(Some(assignments)) => Ok(Json(assignments)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            format!("allocation `{allocation_id}` not found"),
        )),
        Err(e) => Err((StatusCode::SERVICE_UNAVAILABLE, e.to_string())),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/seating/allocations/:allocation_id",
            post(allocate_handler).get(fetch_handler),
        )
        .with_state(state)
}

pub async fn run_server(config: AppConfig) -> std::io::Result<()> {
    let state = AppState::new(Arc::new(InMemorySeatStore::new()), &config);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, app).await
}
