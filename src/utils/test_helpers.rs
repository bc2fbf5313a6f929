//! Helpers shared by the unit tests of the engine and the commands.

use std::fs;
use std::path::Path;
use std::sync::Once;

static LOGGING_INIT: Once = Once::new();

/// Installs a test-writer tracing subscriber once per test binary.
///
/// Honours `RUST_LOG`, so `RUST_LOG=fsmatch=debug cargo test` shows walker
/// and command decisions next to the failing assertion.
pub fn setup_test_logging() {
    LOGGING_INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Creates every `(relative path, content)` pair below `root`, parents included.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) -> std::io::Result<()> {
    for (relative, content) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
    }
    Ok(())
}

/// Returns true when the current process runs as root (UID 0), where
/// permission-denied scenarios cannot be reproduced.
#[cfg(any(test, doctest))]
#[inline]
pub fn running_as_root() -> bool {
    #[cfg(unix)]
    {
        // SAFETY: geteuid has no side effects.
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}
