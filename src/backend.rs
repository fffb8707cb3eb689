use crate::{error::StartError, level::FemtoLevel};

/// Plugin contract consumed by a logging facility.
///
/// The facility owns level filtering, tag routing and formatting. A backend
/// only receives the finished bytes of each record and must never fail or
/// block the caller while forwarding them.
pub trait FemtoBackend: Send + Sync {
    /// Start any background work the backend needs.
    fn init(&self) -> Result<(), StartError>;

    /// Release every resource held by the backend.
    fn deinit(&self);

    /// Forward one formatted record. Delivery is best effort.
    fn output(&self, level: FemtoLevel, tag: &str, is_raw: bool, log: &[u8]);

    /// Report anything the backend has been holding back.
    fn flush(&self) {}
}
