use crate::dto::HealthRes;

/// Liveness reporting for the REST API.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "eGFR REST API is alive".into(),
        }
    }
}
