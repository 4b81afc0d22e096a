//! # Logging
//!
//! [`setup_tracing`] installs a compact `tracing-subscriber` formatter filtered by `RUST_LOG`.
//!
//! ## What Gets Logged
//!
//! - **Registry**: module resolution, cycle warnings
//! - **Overlays**: show/hide transitions and hook failures
//! - **Store**: restored state, persistence failures, failing subscribers
//! - **HTTP**: every attempt, retries with their delay, exhausted failures
//!
//! ```bash
//! RUST_LOG=info cargo run -p category-admin
//!
//! # Request payloads and state keys
//! RUST_LOG=debug cargo run -p category-admin
//!
//! # Only the retry client
//! RUST_LOG=admin_runtime::http=debug cargo run -p category-admin
//! ```
//!
//! The output keeps span names inline, so an operation reads as
//! `INFO refresh_statistics:request: Request ok status=200`.

/// Install the global subscriber. Call once, from `main`.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
