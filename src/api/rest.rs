// REST API endpoints

use axum::{extract::State, response::Json, routing::post, Router};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tracing::Instrument;
use uuid::Uuid;

use super::{TraceRouteRequest, TraceRouteResponse};
use crate::error::TargetError;
use crate::routes::{assembler::RouteAssembler, Route};
use crate::trace::TraceTarget;

#[derive(Clone)]
pub struct AppState {
    pub assembler: RouteAssembler,
}

impl AppState {
    pub fn new(assembler: RouteAssembler) -> Self {
        AppState { assembler }
    }
}

/// `POST /trace_route` plus the visualization page at `/` and `/static`
pub fn create_api_router(state: Arc<AppState>, static_dir: &Path, cors: bool) -> Router {
    let router = Router::new()
        .route("/trace_route", post(trace_route))
        .with_state(state)
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir));

    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

async fn trace_route(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TraceRouteRequest>,
) -> Json<TraceRouteResponse> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("trace_route", %request_id, target = ?request.target);

    async move {
        let target = match TraceTarget::parse(&request.target) {
            Ok(target) => target,
            Err(TargetError::Empty) => {
                tracing::info!("Empty target, nothing to trace");
                return Json(Route::default());
            }
            Err(e) => {
                // refused targets never reach the trace utility
                tracing::warn!("Rejected trace target: {}", e);
                return Json(Route::default());
            }
        };

        let route = state.assembler.assemble(&target).await;
        if route.is_empty() {
            tracing::info!("No hops located for {}", target);
        }

        Json(route)
    }
    .instrument(span)
    .await
}
