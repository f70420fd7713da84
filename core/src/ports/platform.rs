//! Platform port (interface).

use crate::domain::ProcessRecord;
use crate::error::Result;

/// Port for OS-specific process discovery and termination.
///
/// There is one implementation per OS family, selected once at startup.
/// All shell invocation details stay behind this trait so the application
/// layer can be tested with fakes.
pub trait Platform: Send + Sync {
    /// Short name of the platform family (`unix`, `windows`, ...).
    fn name(&self) -> &'static str;

    /// Discover basic records bound to `port`, or to every port when `port` is 0.
    ///
    /// Every returned record satisfies `record.port == port` when `port > 0`.
    fn discover(
        &self,
        port: u16,
    ) -> impl std::future::Future<Output = Result<Vec<ProcessRecord>>> + Send;

    /// Terminate a process. `force` selects the non-graceful variant
    /// (SIGKILL, `taskkill /F`).
    fn kill(&self, pid: u32, force: bool) -> impl std::future::Future<Output = Result<()>> + Send;
}
