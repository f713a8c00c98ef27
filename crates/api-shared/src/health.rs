use crate::HealthRes;

/// Simple health service used by the REST API and the root binary.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    pub fn new() -> Self {
        Self
    }

    /// Static method to check health without creating an instance.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "RadTrack is alive".into(),
        }
    }
}
