//! Structured logging initialization via `tracing`.

/// Install a plain subscriber filtered by `RUST_LOG`.
///
/// Used by tools and tests; a second call is a no-op.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
