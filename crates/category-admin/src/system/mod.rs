use crate::api::CategoryApi;
use crate::config::AdminConfig;
use crate::coordinator::Coordinator;
use crate::error::AdminError;
use crate::events::AdminEvents;
use crate::notify::{Notifier, TracingNotifier};
use crate::page::AdminPage;
use admin_runtime::http::{HttpTransport, ResilientClient, Transport};
use admin_runtime::registry::ModuleRegistry;
use admin_runtime::store::{FileStorage, MemoryStorage, ReactiveStore, SelectionCoordinator, Storage};
use admin_runtime::RegistryError;
use std::sync::Arc;
use tracing::{info, warn};

/// One admin session: the module registry and the coordinator resolved from it.
///
/// `AdminSystem` is responsible for:
/// - **Module wiring**: every service is registered by name with its dependencies and built
///   by the [`ModuleRegistry`] on first use
/// - **Startup checks**: dependency cycles are reported before anything is resolved
/// - **Restore**: a selection restored from storage gets its category levels back
/// - **Shutdown**: the store is flushed so the session can be restored
///
/// # Modules
///
/// | Name | Depends on |
/// |------|------------|
/// | `config`, `page`, `transport`, `notifier`, `events` | (values) |
/// | `storage` | `config` |
/// | `http` | `transport`, `config` |
/// | `api` | `http`, `config` |
/// | `store` | `storage`, `config` |
/// | `selection` | `store` |
/// | `coordinator` | `api`, `selection`, `notifier`, `events`, `page`, `config` |
///
/// # Example
///
/// ```ignore
/// let page = HeadlessPage::new();
/// let system = AdminSystem::start(AdminConfig::from_env(), page.page()).await?;
///
/// system.coordinator.refresh_statistics().await?;
///
/// system.shutdown()?;
/// ```
pub struct AdminSystem {
    pub coordinator: Arc<Coordinator>,
    pub events: AdminEvents,
    config: AdminConfig,
    registry: ModuleRegistry,
}

impl AdminSystem {
    /// Start against the real server, logging notifications.
    pub async fn start(config: AdminConfig, page: AdminPage) -> Result<Self, AdminError> {
        let transport = HttpTransport::new(config.request_timeout())
            .map_err(|e| AdminError::Config(format!("HTTP client: {e}")))?;
        Self::start_with(config, page, Arc::new(transport), Arc::new(TracingNotifier)).await
    }

    /// Start with the given transport and notifier.
    pub async fn start_with(
        config: AdminConfig,
        page: AdminPage,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, AdminError> {
        let events = AdminEvents::new();
        let registry = ModuleRegistry::new();
        register_modules(&registry, &config, page, transport, notifier, events.clone())?;

        let cycles = registry.detect_cycles();
        if !cycles.is_empty() {
            warn!(count = cycles.len(), "Module graph has cycles");
        }

        let coordinator = (*registry.require::<Arc<Coordinator>>("coordinator").await?).clone();
        if let Err(e) = coordinator.restore().await {
            warn!(error = %e, "Category tree unavailable, restored selection is unchecked");
        }
        info!(api = %config.api_url, modules = registry.names().len(), "Admin system started");

        Ok(Self {
            coordinator,
            events,
            config,
            registry,
        })
    }

    pub fn config(&self) -> &AdminConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Persist the session state.
    pub fn shutdown(self) -> Result<(), AdminError> {
        self.coordinator.store().flush()?;
        info!("Admin system stopped");
        Ok(())
    }
}

fn register_modules(
    registry: &ModuleRegistry,
    config: &AdminConfig,
    page: AdminPage,
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn Notifier>,
    events: AdminEvents,
) -> Result<(), RegistryError> {
    // =====================================================================
    // Values
    // =====================================================================
    registry.define_value("config", config.clone())?;
    registry.define_value("page", page)?;
    registry.define_value("transport", transport)?;
    registry.define_value("notifier", notifier)?;
    registry.define_value("events", events)?;

    // =====================================================================
    // Services
    // =====================================================================
    registry.define("storage", &["config"], |deps| async move {
        let config = deps.get::<AdminConfig>("config").map_err(|e| e.to_string())?;
        let storage: Arc<dyn Storage> = match &config.state_dir {
            Some(dir) => Arc::new(
                FileStorage::new(dir.clone())
                    .map_err(|e| format!("state directory {}: {e}", dir.display()))?,
            ),
            None => Arc::new(MemoryStorage::new()),
        };
        Ok::<_, String>(storage)
    })?;

    registry.define("http", &["transport", "config"], |deps| async move {
        let transport = deps
            .get::<Arc<dyn Transport>>("transport")
            .map_err(|e| e.to_string())?;
        let config = deps.get::<AdminConfig>("config").map_err(|e| e.to_string())?;
        Ok::<_, String>(ResilientClient::with_policy(
            (*transport).clone(),
            config.retry_policy(),
        ))
    })?;

    registry.define("api", &["http", "config"], |deps| async move {
        let client = deps.get::<ResilientClient>("http").map_err(|e| e.to_string())?;
        let config = deps.get::<AdminConfig>("config").map_err(|e| e.to_string())?;
        Ok::<_, String>(CategoryApi::new((*client).clone(), config.api_url.clone()))
    })?;

    registry.define("store", &["storage", "config"], |deps| async move {
        let storage = deps
            .get::<Arc<dyn Storage>>("storage")
            .map_err(|e| e.to_string())?;
        let config = deps.get::<AdminConfig>("config").map_err(|e| e.to_string())?;
        Ok::<_, String>(ReactiveStore::load(
            (*storage).clone(),
            config.state_key.clone(),
        ))
    })?;

    registry.define("selection", &["store"], |deps| async move {
        let store = deps.get::<ReactiveStore>("store").map_err(|e| e.to_string())?;
        Ok::<_, String>(SelectionCoordinator::new((*store).clone()))
    })?;

    registry.define(
        "coordinator",
        &["api", "selection", "notifier", "events", "page", "config"],
        |deps| async move {
            let api = deps.get::<CategoryApi>("api").map_err(|e| e.to_string())?;
            let selection = deps
                .get::<SelectionCoordinator>("selection")
                .map_err(|e| e.to_string())?;
            let notifier = deps
                .get::<Arc<dyn Notifier>>("notifier")
                .map_err(|e| e.to_string())?;
            let events = deps.get::<AdminEvents>("events").map_err(|e| e.to_string())?;
            let page = deps.get::<AdminPage>("page").map_err(|e| e.to_string())?;
            let config = deps.get::<AdminConfig>("config").map_err(|e| e.to_string())?;
            Ok::<_, String>(Arc::new(Coordinator::new(
                (*api).clone(),
                (*selection).clone(),
                (*notifier).clone(),
                (*events).clone(),
                &page,
                config.validation_debounce(),
            )))
        },
    )?;

    Ok(())
}
