use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct AppCheckRequest {
    pub url: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
