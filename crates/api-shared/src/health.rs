use crate::HealthRes;

/// Liveness reporting for the shelf service.
///
/// Stateless: the process answering is the only thing checked, since the upload root is
/// verified once at startup.
#[derive(Clone, Copy, Debug, Default)]
pub struct HealthService;

impl HealthService {
    /// Returns the liveness response, naming the running crate version.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: format!("shelf {} is alive", env!("CARGO_PKG_VERSION")),
        }
    }
}
