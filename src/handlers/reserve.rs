use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::catalog::Identity;
use crate::metrics::{RESERVATIONS_DENIED, RESERVATIONS_TOTAL, RESERVE_LATENCY};
use crate::models::{ErrorResponse, ReserveRequest, ReserveResponse, Status};
use crate::state::AppState;

// Field checks the engine relies on - it assumes non-negative integers and
// never re-validates
fn validate(request: &ReserveRequest) -> Result<(), &'static str> {
    if request.client_id.is_empty() {
        return Err("ClientID is required");
    }
    if request.api_key.is_empty() {
        return Err("APIKey is required");
    }
    if request.target_endpoint.is_empty() {
        return Err("TargetEndpoint is required");
    }
    if request.tokens < 0 {
        return Err("Tokens must be non-negative");
    }
    if request.requests < 0 {
        return Err("Requests must be non-negative");
    }
    Ok(())
}

fn bad_request(error: &str) -> Response {
    let body = ErrorResponse {
        status: Status {
            code: StatusCode::BAD_REQUEST.as_u16(),
            message: "Error".to_string(),
        },
        error: error.to_string(),
    };
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

pub async fn reserve_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ReserveRequest>, JsonRejection>,
) -> Response {
    RESERVATIONS_TOTAL.inc();

    let Ok(Json(request)) = payload else {
        return bad_request("Invalid request format");
    };

    if let Err(reason) = validate(&request) {
        return bad_request(reason);
    }

    let start_time = Instant::now();

    // clientID rides along as metadata only - it never affects admission
    let identity = Identity::new(request.api_key.clone(), request.target_endpoint.clone());
    let reservation = state
        .engine
        .reserve(&identity, request.tokens as u64, request.requests as u64);

    RESERVE_LATENCY.observe(start_time.elapsed().as_secs_f64());

    info!(
        client_id = %request.client_id,
        api_key = %request.api_key,
        endpoint = %request.target_endpoint,
        allowed = reservation.allowed,
        "reservation decision"
    );

    if reservation.allowed {
        let body = ReserveResponse {
            status: Status {
                code: StatusCode::OK.as_u16(),
                message: "Success".to_string(),
            },
            data: reservation,
        };
        (StatusCode::OK, Json(body)).into_response()
    } else {
        RESERVATIONS_DENIED.inc();
        let body = ReserveResponse {
            status: Status {
                code: StatusCode::TOO_MANY_REQUESTS.as_u16(),
                message: "Rate limit exceeded".to_string(),
            },
            data: reservation,
        };
        (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response()
    }
}
