//! Platform adapters.
//!
//! One [`Platform`] implementation per OS family. [`NativePlatform`] picks
//! the right one for the running OS once, at startup.

mod unix;
mod windows;

pub use unix::UnixPlatform;
pub use windows::WindowsPlatform;

use crate::domain::ProcessRecord;
use crate::error::{Error, Result};
use crate::ports::Platform;

/// OS identifiers (as in `std::env::consts::OS`) handled by [`UnixPlatform`].
const UNIX_FAMILY: &[&str] = &[
    "linux", "macos", "freebsd", "openbsd", "netbsd", "dragonfly", "solaris", "illumos", "android",
];

/// The platform implementation for the running OS.
pub enum NativePlatform {
    Unix(UnixPlatform),
    Windows(WindowsPlatform),
    /// Discovery and termination always fail on this OS.
    Unsupported(String),
}

impl NativePlatform {
    /// Select the implementation for the current OS.
    pub fn detect() -> Self {
        Self::for_os(std::env::consts::OS)
    }

    /// Select the implementation for an OS identifier.
    pub fn for_os(os: &str) -> Self {
        if os == "windows" {
            NativePlatform::Windows(WindowsPlatform::new())
        } else if UNIX_FAMILY.contains(&os) {
            NativePlatform::Unix(UnixPlatform::new())
        } else {
            NativePlatform::Unsupported(os.to_string())
        }
    }
}

impl Default for NativePlatform {
    fn default() -> Self {
        Self::detect()
    }
}

impl Platform for NativePlatform {
    fn name(&self) -> &'static str {
        match self {
            NativePlatform::Unix(p) => p.name(),
            NativePlatform::Windows(p) => p.name(),
            NativePlatform::Unsupported(_) => "unsupported",
        }
    }

    async fn discover(&self, port: u16) -> Result<Vec<ProcessRecord>> {
        match self {
            NativePlatform::Unix(p) => p.discover(port).await,
            NativePlatform::Windows(p) => p.discover(port).await,
            NativePlatform::Unsupported(os) => Err(Error::UnsupportedPlatform(os.clone())),
        }
    }

    async fn kill(&self, pid: u32, force: bool) -> Result<()> {
        match self {
            NativePlatform::Unix(p) => p.kill(pid, force).await,
            NativePlatform::Windows(p) => p.kill(pid, force).await,
            NativePlatform::Unsupported(os) => Err(Error::UnsupportedPlatform(os.clone())),
        }
    }
}
