use serde::Serialize;
use utoipa::ToSchema;

/// Payload of the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" or "degraded".
    pub status: String,
    /// Player engines currently hosted by this process.
    pub engines: usize,
}

impl HealthResponse {
    /// Report built from the degraded flag and the hosted engine count.
    pub fn new(degraded: bool, engines: usize) -> Self {
        let status = if degraded { "degraded" } else { "ok" };
        Self {
            status: status.to_string(),
            engines,
        }
    }
}
