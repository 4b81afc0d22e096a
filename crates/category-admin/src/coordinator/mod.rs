//! # Coordinator
//!
//! Glue between the page, the two dialogs, the store and the category API. It holds no
//! business rules of its own: validation lives in [`model`](crate::model), selection rules in
//! the [`SelectionCoordinator`], retries in the [`ResilientClient`].
//!
//! ## Operation contract
//!
//! | Step | Success | Failure |
//! |------|---------|---------|
//! | re-entrancy | second call while running returns `Ok(None)` | |
//! | local checks | | inline feedback, no request sent |
//! | request | store updated, success notification, dialog closed | error notification with retry, store untouched |
//!
//! Loads that fill one logical slot (a product's categories, the statistics) are tagged with
//! a [`Generation`]. Only the response of the most recently started load is applied.
//!
//! [`ResilientClient`]: admin_runtime::http::ResilientClient
//! [`Generation`]: admin_runtime::scheduler::Generation

mod in_flight;

pub use in_flight::{InFlight, InFlightGuard};

use crate::api::CategoryApi;
use crate::error::{AdminError, ValidationError};
use crate::events::{AdminEvent, AdminEvents};
use crate::modals::{
    CreationModal, CreationOutcome, CreationPrefill, DeletionModal, DeletionOutcome,
    DeletionTarget,
};
use crate::model::{
    BulkStats, Category, CsvExport, DeletionReport, ProductAssignment, ProductStatistics,
};
use crate::notify::{Notification, Notifier, Operation};
use crate::page::AdminPage;
use crate::views::SummaryView;
use admin_runtime::lifecycle::{Key, KeyOutcome, Overlay, OverlayConfig, ScrollLock, Transition};
use admin_runtime::scheduler::GenerationCounter;
use admin_runtime::store::{
    BulkCategorySelection, ReactiveStore, SelectionCoordinator, SelectionOutcome, StateChange,
};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub struct Coordinator {
    api: CategoryApi,
    selection: SelectionCoordinator,
    notifier: Arc<dyn Notifier>,
    events: AdminEvents,
    creation: Overlay<CreationModal>,
    deletion: Overlay<DeletionModal>,
    in_flight: InFlight,
    product_loads: GenerationCounter,
    statistics_loads: GenerationCounter,
    /// Name of the category the deletion dialog was last asked for.
    pending_delete: Mutex<Option<String>>,
    summary: SummaryView,
}

impl Coordinator {
    pub fn new(
        api: CategoryApi,
        selection: SelectionCoordinator,
        notifier: Arc<dyn Notifier>,
        events: AdminEvents,
        page: &AdminPage,
        validation_debounce: Duration,
    ) -> Self {
        let scroll = ScrollLock::new(page.document.clone());
        let creation = Overlay::new(
            Arc::new(CreationModal::new(
                selection.clone(),
                events.clone(),
                validation_debounce,
            )),
            page.creation_modal.clone(),
            page.document.clone(),
            scroll.clone(),
            OverlayConfig::default(),
        );
        let deletion = Overlay::new(
            Arc::new(DeletionModal::new(events.clone())),
            page.deletion_modal.clone(),
            page.document.clone(),
            scroll,
            OverlayConfig::default(),
        );
        let summary = SummaryView::attach(selection.store());

        Self {
            api,
            selection,
            notifier,
            events,
            creation,
            deletion,
            in_flight: InFlight::new(),
            product_loads: GenerationCounter::new(),
            statistics_loads: GenerationCounter::new(),
            pending_delete: Mutex::new(None),
            summary,
        }
    }

    pub fn store(&self) -> &ReactiveStore {
        self.selection.store()
    }

    pub fn selection(&self) -> &SelectionCoordinator {
        &self.selection
    }

    pub fn api(&self) -> &CategoryApi {
        &self.api
    }

    pub fn events(&self) -> &AdminEvents {
        &self.events
    }

    pub fn creation(&self) -> &Overlay<CreationModal> {
        &self.creation
    }

    pub fn deletion(&self) -> &Overlay<DeletionModal> {
        &self.deletion
    }

    pub fn summary(&self) -> &SummaryView {
        &self.summary
    }

    pub fn is_running(&self, operation: Operation) -> bool {
        self.in_flight.is_running(operation)
    }

    // =====================================================================
    // Categories
    // =====================================================================

    /// Replace the known category tree with the server's.
    #[instrument(skip(self))]
    pub async fn load_categories(&self) -> Result<Vec<Category>, AdminError> {
        match self.api.list_categories().await {
            Ok(categories) => {
                self.selection.replace_known(categories.clone());
                info!(count = categories.len(), "Categories loaded");
                Ok(categories)
            }
            Err(e) => Err(self.failed(Operation::LoadCategories, e.into())),
        }
    }

    /// Load the category tree when the restored selection names categories not known yet,
    /// so cross-level picks on it are checked.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<(), AdminError> {
        let unresolved = self.selection.unresolved();
        if unresolved.is_empty() {
            return Ok(());
        }
        debug!(count = unresolved.len(), "Restored selection needs the category tree");
        self.load_categories().await.map(drop)
    }

    pub async fn open_create(&self, prefill: CreationPrefill) -> Result<Transition, AdminError> {
        Ok(self.creation.show(prefill).await?)
    }

    /// Submit the open creation dialog.
    #[instrument(skip(self))]
    pub async fn submit_create(&self) -> Result<Option<Category>, AdminError> {
        let Some(_guard) = self.in_flight.try_begin(Operation::CreateCategory) else {
            debug!("Create already running");
            return Ok(None);
        };
        if !self.creation.is_visible() {
            return Err(AdminError::NotOpen("creation"));
        }
        let modal = self.creation.component();
        let draft = modal.validate()?;
        if !modal.begin_submit() {
            return Ok(None);
        }

        let result = self.api.create_category(&draft).await;
        modal.end_submit();
        let category = match result {
            Ok(category) => category,
            Err(e) => return Err(self.failed(Operation::CreateCategory, e.into())),
        };

        self.selection.register([category.clone()]);
        self.category_tree_changed();
        info!(category = %category.name, level = category.level, "Category created");
        self.notifier.notify(Notification::success(format!(
            "Category \"{}\" created",
            category.name
        )));
        self.creation
            .hide(CreationOutcome::Created(category.clone()))
            .await?;
        Ok(Some(category))
    }

    /// Fetch the category's info and open the deletion dialog with it.
    #[instrument(skip(self))]
    pub async fn open_delete(&self, name: &str) -> Result<Transition, AdminError> {
        if self.deletion.is_visible() {
            debug!(category = name, "Deletion dialog already open");
            return Ok(Transition::Ignored);
        }
        *lock(&self.pending_delete) = Some(name.to_string());
        let info = match self.api.category_info(name).await {
            Ok(info) => info,
            Err(e) => return Err(self.failed(Operation::DeleteCategory, e.into())),
        };
        let target = DeletionTarget {
            category: name.to_string(),
            info,
        };
        Ok(self.deletion.show(target).await?)
    }

    /// Confirm the open deletion dialog.
    #[instrument(skip(self))]
    pub async fn confirm_delete(&self) -> Result<Option<DeletionReport>, AdminError> {
        let Some(_guard) = self.in_flight.try_begin(Operation::DeleteCategory) else {
            debug!("Delete already running");
            return Ok(None);
        };
        if !self.deletion.is_visible() {
            return Err(AdminError::NotOpen("deletion"));
        }
        let modal = self.deletion.component();
        let name = modal.validate()?;
        if !modal.begin_submit() {
            return Ok(None);
        }

        let result = self.api.delete_category(&name).await;
        modal.end_submit();
        let report = match result {
            Ok(report) => report,
            Err(e) => return Err(self.failed(Operation::DeleteCategory, e.into())),
        };

        let removed: Vec<String> = self
            .selection
            .known_categories()
            .into_iter()
            .filter(|c| c.name == name || c.id == name)
            .map(|c| c.id)
            .collect();
        for id in &removed {
            self.selection.deselect(id);
            self.selection.forget(id);
        }
        self.category_tree_changed();
        lock(&self.pending_delete).take();
        info!(
            category = %name,
            removed_from_products = report.removed_from_products,
            "Category deleted"
        );
        self.notifier.notify(Notification::success(format!(
            "Category \"{name}\" deleted, removed from {} products",
            report.removed_from_products
        )));
        self.deletion
            .hide(DeletionOutcome::Deleted {
                name,
                report: report.clone(),
            })
            .await?;
        Ok(Some(report))
    }

    // =====================================================================
    // Products
    // =====================================================================

    /// Switch to `product_id` and load its categories into the selection.
    ///
    /// Returns `Ok(None)` when a later switch superseded this one before its response came in.
    #[instrument(skip(self))]
    pub async fn select_product(&self, product_id: &str) -> Result<Option<Vec<Category>>, AdminError> {
        self.selection.change_product(Some(product_id.to_string()));
        let generation = self.product_loads.begin();

        let result = self.api.product_categories(product_id).await;
        if !self.product_loads.is_current(generation) {
            debug!(product = product_id, "Discarding stale product categories");
            return Ok(None);
        }
        let categories = match result {
            Ok(categories) => categories,
            Err(e) => return Err(self.failed(Operation::LoadProductCategories, e.into())),
        };

        self.selection.register(categories.clone());
        let ids: BTreeSet<String> = categories.iter().map(|c| c.id.clone()).collect();
        self.store().set(StateChange::SelectedCategories(ids.clone()));
        self.events.publish(AdminEvent::ProductCategoriesLoaded {
            product_id: product_id.to_string(),
            categories: ids.into_iter().collect(),
        });
        Ok(Some(categories))
    }

    /// Add a category to the current product's selection, warning on a cross-level pick.
    ///
    /// Selected categories of unknown level are listed in the outcome; [`restore`] registers
    /// them after a session restore.
    ///
    /// [`restore`]: Self::restore
    pub fn select_category(&self, category: &Category) -> SelectionOutcome {
        let outcome = self.selection.select(category);
        if let Some(warning) = &outcome.warning {
            self.notifier.notify(Notification::warning(warning.to_string()));
        }
        outcome
    }

    pub fn deselect_category(&self, category_id: &str) -> bool {
        self.selection.deselect(category_id)
    }

    /// Save the current product's selection. The server adds missing ancestors and the
    /// selection is replaced with what it reports back.
    #[instrument(skip(self))]
    pub async fn save_product_categories(&self) -> Result<Option<ProductAssignment>, AdminError> {
        let Some(_guard) = self.in_flight.try_begin(Operation::SaveProductCategories) else {
            debug!("Save already running");
            return Ok(None);
        };
        let (product, ids) = self.store().read(|s| {
            (
                s.current_product_id.clone(),
                s.selected_categories.iter().cloned().collect::<Vec<_>>(),
            )
        });
        let Some(product) = product else {
            return Err(ValidationError::NoProduct.into());
        };
        if ids.is_empty() {
            return Err(ValidationError::NoCategories.into());
        }

        let saved = match self.api.assign_product_categories(&product, &ids).await {
            Ok(saved) => saved,
            Err(e) => return Err(self.failed(Operation::SaveProductCategories, e.into())),
        };

        let still_current = self
            .store()
            .read(|s| s.current_product_id.as_deref() == Some(product.as_str()));
        if still_current && !saved.categories.is_empty() {
            self.store().set(StateChange::SelectedCategories(
                saved.categories.iter().cloned().collect(),
            ));
        }
        self.assignments_changed();
        info!(
            product = %product,
            added = saved.added_categories.len(),
            parents = saved.parent_categories_added,
            "Product categories saved"
        );
        self.events.publish(AdminEvent::ProductCategoriesSaved {
            product_id: product.clone(),
            categories: saved.categories.clone(),
        });
        self.notifier.notify(Notification::success(format!(
            "Saved {} categories for {product}",
            saved.categories.len()
        )));
        Ok(Some(saved))
    }

    // =====================================================================
    // Bulk assignment
    // =====================================================================

    /// Pick the category the bulk buttons apply to.
    pub fn choose_bulk_category(&self, category: &Category) {
        self.store().set_last_bulk_category(Some(BulkCategorySelection {
            id: category.id.clone(),
            name: category.name.clone(),
            level: category.level,
        }));
    }

    /// Assign the chosen bulk category to every ticked product, then clear the ticks.
    pub async fn bulk_assign(&self) -> Result<Option<BulkStats>, AdminError> {
        self.bulk_update(Operation::BulkAssign).await
    }

    /// Remove the chosen bulk category from every ticked product, then clear the ticks.
    pub async fn bulk_remove(&self) -> Result<Option<BulkStats>, AdminError> {
        self.bulk_update(Operation::BulkRemove).await
    }

    #[instrument(skip(self))]
    async fn bulk_update(&self, operation: Operation) -> Result<Option<BulkStats>, AdminError> {
        let Some(_guard) = self.in_flight.try_begin(operation) else {
            debug!(%operation, "Bulk update already running");
            return Ok(None);
        };
        let (products, category) = self.store().read(|s| {
            (
                s.bulk_selected_products.iter().cloned().collect::<Vec<_>>(),
                s.last_selected_bulk_category.clone(),
            )
        });
        if products.is_empty() {
            return Err(ValidationError::NoProducts.into());
        }
        let Some(category) = category else {
            return Err(ValidationError::NoCategories.into());
        };

        let ids = [category.id.clone()];
        let removing = operation == Operation::BulkRemove;
        let result = if removing {
            self.api.bulk_remove(&products, &ids).await
        } else {
            self.api.bulk_assign(&products, &ids).await
        };
        let stats = match result {
            Ok(stats) => stats,
            Err(e) => return Err(self.failed(operation, e.into())),
        };

        self.store().clear_bulk_selection();
        self.assignments_changed();
        info!(
            %operation,
            category = %category.id,
            products = products.len(),
            updated = stats.products_updated,
            "Bulk update done"
        );
        let (event, message) = if removing {
            (
                AdminEvent::BulkRemoved {
                    category: category.id.clone(),
                    products_updated: stats.products_updated,
                },
                format!(
                    "Removed \"{}\" from {} products",
                    category.name, stats.products_updated
                ),
            )
        } else {
            (
                AdminEvent::BulkAssigned {
                    category: category.id.clone(),
                    products_updated: stats.products_updated,
                },
                format!(
                    "Assigned \"{}\" to {} products",
                    category.name, stats.products_updated
                ),
            )
        };
        self.events.publish(event);
        self.notifier.notify(Notification::success(message));
        Ok(Some(stats))
    }

    // =====================================================================
    // Statistics & export
    // =====================================================================

    #[instrument(skip(self))]
    pub async fn refresh_statistics(&self) -> Result<Option<ProductStatistics>, AdminError> {
        let Some(_guard) = self.in_flight.try_begin(Operation::RefreshStatistics) else {
            debug!("Statistics refresh already running");
            return Ok(None);
        };
        let generation = self.statistics_loads.begin();

        let result = self.api.statistics().await;
        if !self.statistics_loads.is_current(generation) {
            debug!("Discarding stale statistics");
            return Ok(None);
        }
        let statistics = match result {
            Ok(statistics) => statistics,
            Err(e) => return Err(self.failed(Operation::RefreshStatistics, e.into())),
        };

        self.store().set_statistics(statistics);
        self.events
            .publish(AdminEvent::StatisticsRefreshed(statistics));
        info!(
            total = statistics.total_products,
            categorized = statistics.categorized_products,
            "Statistics refreshed"
        );
        Ok(Some(statistics))
    }

    #[instrument(skip(self))]
    pub async fn export_csv(&self) -> Result<Option<CsvExport>, AdminError> {
        let Some(_guard) = self.in_flight.try_begin(Operation::ExportCsv) else {
            debug!("Export already running");
            return Ok(None);
        };
        let export = match self.api.export_csv().await {
            Ok(export) => export,
            Err(e) => return Err(self.failed(Operation::ExportCsv, e.into())),
        };

        let rows = export.rows();
        self.events.publish(AdminEvent::CsvExported { rows });
        self.notifier
            .notify(Notification::success(format!("Exported {rows} products")));
        Ok(Some(export))
    }

    /// Run `operation` again, as offered by an error notification.
    pub async fn retry(&self, operation: Operation) -> Result<(), AdminError> {
        info!(%operation, "Retrying");
        match operation {
            Operation::CreateCategory => self.submit_create().await.map(drop),
            Operation::DeleteCategory => {
                if self.deletion.is_visible() {
                    return self.confirm_delete().await.map(drop);
                }
                let pending = lock(&self.pending_delete).clone();
                match pending {
                    Some(name) => self.open_delete(&name).await.map(drop),
                    None => Err(AdminError::NotOpen("deletion")),
                }
            }
            Operation::ExportCsv => self.export_csv().await.map(drop),
            Operation::RefreshStatistics => self.refresh_statistics().await.map(drop),
            Operation::LoadCategories => self.load_categories().await.map(drop),
            Operation::SaveProductCategories => self.save_product_categories().await.map(drop),
            Operation::BulkAssign => self.bulk_assign().await.map(drop),
            Operation::BulkRemove => self.bulk_remove().await.map(drop),
            Operation::LoadProductCategories => {
                let product = self.store().read(|s| s.current_product_id.clone());
                match product {
                    Some(product) => self.select_product(&product).await.map(drop),
                    None => Ok(()),
                }
            }
        }
    }

    // =====================================================================
    // Input routing
    // =====================================================================

    /// Route a key press to the open dialog. Enter runs the dialog's primary action.
    pub async fn handle_key(&self, key: Key) -> Result<KeyOutcome, AdminError> {
        if self.deletion.is_visible() {
            let outcome = self.deletion.handle_key(key).await?;
            if outcome == KeyOutcome::PrimaryAction {
                self.confirm_delete().await?;
            }
            return Ok(outcome);
        }
        if self.creation.is_visible() {
            let outcome = self.creation.handle_key(key).await?;
            if outcome == KeyOutcome::PrimaryAction {
                self.submit_create().await?;
            }
            return Ok(outcome);
        }
        Ok(KeyOutcome::Ignored)
    }

    pub async fn handle_outside_click(&self) -> Result<KeyOutcome, AdminError> {
        if self.deletion.is_visible() {
            return Ok(self.deletion.handle_outside_click().await?);
        }
        Ok(self.creation.handle_outside_click().await?)
    }

    pub fn handle_resize(&self) {
        self.creation.handle_resize();
        self.deletion.handle_resize();
    }

    /// Close whichever dialog is open without acting on it. Both are closed even when the
    /// first fails; the first error is returned.
    pub async fn cancel(&self) -> Result<(), AdminError> {
        let deletion = self.deletion.hide(DeletionOutcome::Cancelled).await;
        let creation = self.creation.hide(CreationOutcome::Cancelled).await;
        deletion?;
        creation?;
        Ok(())
    }

    /// The tree changed on the server: bump the revision and drop statistics that predate it.
    fn category_tree_changed(&self) {
        self.store().bump_category_revision();
        self.assignments_changed();
    }

    /// Statistics fetched before now count stale assignments.
    fn assignments_changed(&self) {
        self.statistics_loads.invalidate();
        self.store().set(StateChange::Statistics(None));
    }

    /// Log and surface a failed operation, then hand the error back.
    fn failed(&self, operation: Operation, error: AdminError) -> AdminError {
        warn!(%operation, error = %error, "Operation failed");
        self.notifier
            .notify(Notification::error(error.to_string(), Some(operation)));
        error
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
