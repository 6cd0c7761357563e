use serde::{Deserialize, Serialize};

use crate::limiter::Reservation;

// Reservation request wire format. Missing numeric fields read as zero,
// matching the original wire behavior; empty strings are caught by the
// handler's validation
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveRequest {
    #[serde(rename = "clientID", default)]
    pub client_id: String,
    #[serde(default)]
    pub tokens: i64,
    #[serde(default)]
    pub requests: i64,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub target_endpoint: String,
}

#[derive(Debug, Serialize)]
pub struct Status {
    pub code: u16,
    pub message: String,
}

// Success/denial envelope - the reservation rides in `data` either way
#[derive(Debug, Serialize)]
pub struct ReserveResponse {
    pub status: Status,
    pub data: Reservation,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: Status,
    pub error: String,
}
