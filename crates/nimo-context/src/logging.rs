//! Logging init, shared by every nImO binary so they all behave the
//! same way under `RUST_LOG` (§6 ambient stack). Mirrors the teacher's
//! `spec-subject::main` initialization verbatim: stderr, `EnvFilter`,
//! defaulting to `info` when `RUST_LOG` is unset.

use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// For short-lived CLI tools: a harness or terminal already has its own
/// sense of time, so timestamps are suppressed.
pub fn init_for_tool() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

/// For long-running services (Registry, Launcher, data-plane nodes):
/// timestamps matter since log lines outlive any single invocation.
pub fn init_for_service() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}
