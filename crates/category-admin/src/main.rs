//! Headless run of the category admin: refresh the statistics, export the CSV, save state.
//!
//! ```bash
//! CATEGORY_ADMIN_API_URL=http://127.0.0.1:8000 RUST_LOG=info cargo run -p category-admin
//! ```

use admin_runtime::tracing::setup_tracing;
use category_admin::config::AdminConfig;
use category_admin::page::HeadlessPage;
use category_admin::system::AdminSystem;
use tracing::{error, info, Instrument};

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    let config = AdminConfig::from_env();
    info!(api = %config.api_url, "Starting category admin");

    let page = HeadlessPage::new();
    let system = AdminSystem::start(config, page.page())
        .await
        .map_err(|e| e.to_string())?;

    let statistics = system
        .coordinator
        .refresh_statistics()
        .instrument(tracing::info_span!("statistics"))
        .await;
    match statistics {
        Ok(Some(stats)) => info!(
            total = stats.total_products,
            uncategorized = stats.uncategorized_products,
            categories = stats.total_categories,
            "Statistics"
        ),
        Ok(None) => info!("Statistics refresh skipped"),
        Err(e) => error!(error = %e, "Statistics unavailable"),
    }

    let export = system
        .coordinator
        .export_csv()
        .instrument(tracing::info_span!("export"))
        .await;
    match export {
        Ok(Some(csv)) => info!(rows = csv.rows(), bytes = csv.len(), "CSV exported"),
        Ok(None) => info!("Export skipped"),
        Err(e) => error!(error = %e, "Export failed"),
    }

    info!(status = %system.coordinator.summary().current().status_line(), "Summary");

    system.shutdown().map_err(|e| {
        error!(error = %e, "Shutdown failed");
        e.to_string()
    })?;

    Ok(())
}
