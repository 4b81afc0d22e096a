use admin_runtime::http::{Method, ResilientClient, RetryPolicy};
use admin_runtime::lifecycle::Transition;
use admin_runtime::mock::MockTransport;
use admin_runtime::store::{MemoryStorage, ReactiveStore, SelectionCoordinator, DEFAULT_STATE_KEY};
use admin_runtime::HttpError;
use category_admin::api::CategoryApi;
use category_admin::coordinator::Coordinator;
use category_admin::events::{AdminEvent, AdminEvents};
use category_admin::modals::CreationPrefill;
use category_admin::model::Category;
use category_admin::notify::{NotificationKind, Operation, RecordingNotifier};
use category_admin::page::HeadlessPage;
use category_admin::{AdminError, ValidationError};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const BASE: &str = "http://admin.test";

struct Fixture {
    coordinator: Coordinator,
    mock: MockTransport,
    notifier: Arc<RecordingNotifier>,
    events: AdminEvents,
    page: HeadlessPage,
}

fn fixture() -> Fixture {
    let mock = MockTransport::new();
    let client = ResilientClient::with_policy(
        Arc::new(mock.clone()),
        RetryPolicy::new(3, Duration::from_millis(100)),
    );
    let store = ReactiveStore::load(Arc::new(MemoryStorage::new()), DEFAULT_STATE_KEY);
    let notifier = Arc::new(RecordingNotifier::new());
    let events = AdminEvents::new();
    let page = HeadlessPage::new();
    let coordinator = Coordinator::new(
        CategoryApi::new(client, BASE),
        SelectionCoordinator::new(store),
        notifier.clone(),
        events.clone(),
        &page.page(),
        Duration::from_millis(300),
    );
    Fixture {
        coordinator,
        mock,
        notifier,
        events,
        page,
    }
}

fn url(path: &str) -> String {
    format!("{BASE}{path}")
}

fn info(name: &str, children: &[&str]) -> serde_json::Value {
    json!({
        "name": name,
        "level": "Level 1 Category",
        "parent": "None",
        "product_count": 3,
        "child_count": children.len(),
        "child_categories": children,
    })
}

#[tokio::test(start_paused = true)]
async fn test_delete_rejected_with_409_surfaces_exact_message_without_retry() {
    let f = fixture();
    f.mock
        .expect(Method::Get, url("/api/categories/Shoes/info"))
        .return_json(info("Shoes", &[]));
    f.mock
        .expect(Method::Delete, url("/api/categories/delete"))
        .return_status(409, json!({"error": "has child categories"}));

    f.coordinator.open_delete("Shoes").await.unwrap();
    let before = f.coordinator.store().snapshot();
    let result = f.coordinator.confirm_delete().await;

    match result {
        Err(AdminError::Http(HttpError::Rejected { status, message })) => {
            assert_eq!(status, 409);
            assert_eq!(message, "has child categories");
        }
        other => panic!("expected a rejection, got {other:?}"),
    }
    assert_eq!(f.mock.call_count(), 2, "one info call, one delete, no retries");
    assert_eq!(
        f.mock.calls()[1].body,
        Some(json!({"category_name": "Shoes"}))
    );

    let errors = f.notifier.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "has child categories");
    assert_eq!(errors[0].retry(), Some(Operation::DeleteCategory));

    assert!(f.coordinator.deletion().is_visible(), "dialog stays open for a retry");
    assert_eq!(f.coordinator.store().snapshot(), before);
    f.mock.verify();
}

#[tokio::test]
async fn test_validation_failure_never_reaches_the_network() {
    let f = fixture();
    f.coordinator
        .open_create(CreationPrefill {
            level: Some(2),
            parent: None,
        })
        .await
        .unwrap();
    f.coordinator.creation().component().set_name("Trail");

    let result = f.coordinator.submit_create().await;

    assert!(matches!(
        result,
        Err(AdminError::Validation(ValidationError::MissingParent { level: 2 }))
    ));
    assert_eq!(
        f.coordinator.creation().component().feedback(),
        Some(ValidationError::MissingParent { level: 2 })
    );
    assert_eq!(f.mock.call_count(), 0);
    assert!(f.notifier.notifications().is_empty());
    assert!(f.coordinator.creation().is_visible());
}

#[tokio::test(start_paused = true)]
async fn test_create_failure_leaves_store_untouched_and_can_be_retried() {
    let f = fixture();
    f.mock
        .expect(Method::Post, url("/api/categories/create"))
        .return_status(500, json!({"error": "database locked"}))
        .return_status(500, json!({"error": "database locked"}))
        .return_status(500, json!({"error": "database locked"}));
    f.mock
        .expect(Method::Post, url("/api/categories/create"))
        .return_json(json!({
            "message": "Category created successfully",
            "category": {"category_name": "Boots", "category_level": "Level 1 Category", "connected_to": null}
        }));

    f.coordinator.open_create(CreationPrefill::default()).await.unwrap();
    f.coordinator.creation().component().set_name("Boots");
    let before = f.coordinator.store().snapshot();

    let result = f.coordinator.submit_create().await;
    assert!(matches!(
        result,
        Err(AdminError::Http(HttpError::Transient { status: Some(500), .. }))
    ));
    assert_eq!(f.mock.call_count(), 3);
    assert_eq!(f.coordinator.store().snapshot(), before);

    let error = f.notifier.errors().pop().unwrap();
    assert_eq!(error.message, "database locked");
    assert_eq!(
        error.kind,
        NotificationKind::Error {
            retry: Some(Operation::CreateCategory)
        }
    );

    f.coordinator.retry(error.retry().unwrap()).await.unwrap();

    assert!(!f.coordinator.creation().is_visible());
    assert_eq!(f.coordinator.store().read(|s| s.category_revision), 1);
    assert_eq!(f.notifier.successes().len(), 1);
    f.mock.verify();
}

#[tokio::test(start_paused = true)]
async fn test_stale_product_load_is_discarded() {
    let f = fixture();
    let mut events = f.events.subscribe();
    f.mock
        .expect(Method::Get, url("/api/products/SKU-1/categories"))
        .after(Duration::from_millis(500))
        .return_json(json!([
            {"id": "Shoes", "name": "Shoes", "level": "Level 1 Category", "parent": null}
        ]));
    f.mock
        .expect(Method::Get, url("/api/products/SKU-2/categories"))
        .return_json(json!([
            {"id": "Hats", "name": "Hats", "level": "Level 1 Category", "parent": null}
        ]));

    let (slow, fast) = tokio::join!(
        f.coordinator.select_product("SKU-1"),
        f.coordinator.select_product("SKU-2")
    );

    assert!(slow.unwrap().is_none(), "superseded load must not apply");
    assert_eq!(fast.unwrap().unwrap().len(), 1);

    let state = f.coordinator.store().snapshot();
    assert_eq!(state.current_product_id.as_deref(), Some("SKU-2"));
    assert_eq!(f.coordinator.selection().selected(), vec!["Hats".to_string()]);

    assert_eq!(
        events.try_recv().unwrap(),
        AdminEvent::ProductCategoriesLoaded {
            product_id: "SKU-2".into(),
            categories: vec!["Hats".into()],
        }
    );
    assert!(events.try_recv().is_err());
    f.mock.verify();
}

#[tokio::test]
async fn test_cross_level_selection_is_kept_and_warned_once() {
    let f = fixture();
    let a = Category::new("A", "Apparel", 1, None);
    let b = Category::new("B", "Trail", 3, Some("Running"));

    assert!(f.coordinator.select_category(&a).warning.is_none());
    let outcome = f.coordinator.select_category(&b);

    assert!(outcome.added);
    assert_eq!(outcome.warning.unwrap().max_distance(), 2);
    assert!(f.coordinator.selection().is_selected("A"));
    assert!(f.coordinator.selection().is_selected("B"));
    assert_eq!(f.notifier.warnings().len(), 1);
    assert!(f.notifier.errors().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_second_refresh_while_pending_is_ignored() {
    let f = fixture();
    f.mock
        .expect(Method::Get, url("/api/products/statistics"))
        .after(Duration::from_millis(200))
        .return_json(json!({
            "total_products": 12, "categorized_products": 9,
            "uncategorized_products": 3, "total_categories": 5
        }));

    let (first, second) = tokio::join!(
        f.coordinator.refresh_statistics(),
        f.coordinator.refresh_statistics()
    );

    assert_eq!(first.unwrap().unwrap().total_products, 12);
    assert!(second.unwrap().is_none());
    assert_eq!(f.mock.call_count(), 1);
    assert_eq!(
        f.coordinator.summary().current().statistics.map(|s| s.total_categories),
        Some(5)
    );
}

#[tokio::test(start_paused = true)]
async fn test_statistics_fetched_before_a_create_are_dropped() {
    let f = fixture();
    f.mock
        .expect(Method::Get, url("/api/products/statistics"))
        .after(Duration::from_millis(200))
        .return_json(json!({
            "total_products": 12, "categorized_products": 9,
            "uncategorized_products": 3, "total_categories": 5
        }));
    f.mock
        .expect(Method::Post, url("/api/categories/create"))
        .return_json(json!({
            "message": "Category created successfully",
            "category": {"category_name": "Boots", "category_level": "Level 1 Category", "connected_to": null}
        }));

    f.coordinator.open_create(CreationPrefill::default()).await.unwrap();
    f.coordinator.creation().component().set_name("Boots");

    let (refreshed, created) = tokio::join!(
        f.coordinator.refresh_statistics(),
        f.coordinator.submit_create()
    );

    assert!(created.unwrap().is_some());
    assert!(refreshed.unwrap().is_none());
    assert_eq!(f.coordinator.store().read(|s| s.statistics), None);
    f.mock.verify();
}

#[tokio::test]
async fn test_parent_category_is_refused_before_delete_request() {
    let f = fixture();
    f.mock
        .expect(Method::Get, url("/api/categories/Shoes/info"))
        .return_json(info("Shoes", &["Running"]));

    f.coordinator.open_delete("Shoes").await.unwrap();
    assert!(!f.coordinator.deletion().component().can_confirm());

    let result = f.coordinator.confirm_delete().await;

    assert!(matches!(
        result,
        Err(AdminError::Validation(ValidationError::HasChildren { .. }))
    ));
    assert_eq!(f.mock.call_count(), 1);
    assert!(f.notifier.errors().is_empty());
    f.mock.verify();
}

#[tokio::test]
async fn test_info_failure_offers_retry_that_reopens_dialog() {
    let f = fixture();
    f.mock
        .expect(Method::Get, url("/api/categories/Shoes/info"))
        .return_status(404, json!({"error": "Category not found"}));
    f.mock
        .expect(Method::Get, url("/api/categories/Shoes/info"))
        .return_json(info("Shoes", &[]));

    assert!(f.coordinator.open_delete("Shoes").await.is_err());
    assert!(!f.page.deletion_modal.is_visible());
    let retry = f.notifier.errors()[0].retry().unwrap();

    f.coordinator.retry(retry).await.unwrap();

    assert!(f.page.deletion_modal.is_visible());
    assert!(f.page.document.is_scroll_locked());
    f.mock.verify();
}

fn trail() -> Category {
    Category::new("Trail", "Trail", 3, Some("Running"))
}

#[tokio::test(start_paused = true)]
async fn test_bulk_assign_failure_keeps_ticks_and_retry_clears_them() {
    let f = fixture();
    f.mock
        .expect(Method::Post, url("/api/products/bulk-assign-categories"))
        .return_status(500, json!({"error": "database locked"}))
        .return_status(500, json!({"error": "database locked"}))
        .return_status(500, json!({"error": "database locked"}));
    f.mock
        .expect(Method::Post, url("/api/products/bulk-assign-categories"))
        .return_json(json!({
            "message": "Successfully assigned 1 categories to 2 products",
            "stats": {"total_products": 2, "total_categories": 1, "categories_added": 2,
                      "parent_categories_added": 0, "products_updated": 2},
            "assigned_categories": ["Trail"]
        }));
    f.coordinator.choose_bulk_category(&trail());
    f.coordinator.store().select_all_bulk(["SKU-1", "SKU-2"]);

    let result = f.coordinator.bulk_assign().await;

    assert!(matches!(
        result,
        Err(AdminError::Http(HttpError::Transient { status: Some(500), .. }))
    ));
    assert_eq!(
        f.coordinator.store().read(|s| s.bulk_selected_products.len()),
        2,
        "ticks survive a failed request"
    );
    let error = f.notifier.errors().pop().unwrap();
    assert_eq!(error.retry(), Some(Operation::BulkAssign));

    f.coordinator.retry(Operation::BulkAssign).await.unwrap();

    assert!(f.coordinator.store().read(|s| s.bulk_selected_products.is_empty()));
    assert_eq!(
        f.notifier.successes()[0].message,
        "Assigned \"Trail\" to 2 products"
    );
    assert_eq!(f.mock.call_count(), 4);
    f.mock.verify();
}

#[tokio::test]
async fn test_bulk_remove_announces_updated_products() {
    let f = fixture();
    let mut events = f.events.subscribe();
    f.mock
        .expect(Method::Post, url("/api/products/bulk-remove-categories"))
        .return_json(json!({
            "message": "Successfully removed 1 categories from 1 products",
            "stats": {"total_products": 2, "total_categories": 1,
                      "categories_removed": 1, "products_updated": 1},
            "removed_categories": ["Trail"]
        }));
    f.coordinator.choose_bulk_category(&trail());
    f.coordinator.store().select_all_bulk(["SKU-1", "SKU-2"]);

    let stats = f.coordinator.bulk_remove().await.unwrap().unwrap();

    assert_eq!(stats.categories_removed, 1);
    assert_eq!(
        events.try_recv().unwrap(),
        AdminEvent::BulkRemoved {
            category: "Trail".into(),
            products_updated: 1,
        }
    );
    assert_eq!(
        f.notifier.successes()[0].message,
        "Removed \"Trail\" from 1 products"
    );
    f.mock.verify();
}

#[tokio::test]
async fn test_save_and_bulk_need_a_target_before_any_request() {
    let f = fixture();

    assert!(matches!(
        f.coordinator.save_product_categories().await,
        Err(AdminError::Validation(ValidationError::NoProduct))
    ));
    f.coordinator.store().set_current_product(Some("SKU-1".into()));
    assert!(matches!(
        f.coordinator.save_product_categories().await,
        Err(AdminError::Validation(ValidationError::NoCategories))
    ));
    assert!(matches!(
        f.coordinator.bulk_assign().await,
        Err(AdminError::Validation(ValidationError::NoProducts))
    ));
    f.coordinator.store().toggle_bulk_product("SKU-1");
    assert!(matches!(
        f.coordinator.bulk_remove().await,
        Err(AdminError::Validation(ValidationError::NoCategories))
    ));

    assert_eq!(f.mock.call_count(), 0);
    assert!(f.notifier.notifications().is_empty());
}

#[tokio::test]
async fn test_save_failure_offers_retry_and_keeps_selection() {
    let f = fixture();
    f.mock
        .expect(Method::Post, url("/api/products/SKU-1/categories"))
        .return_status(400, json!({"error": "No categories provided"}));
    f.coordinator.store().set_current_product(Some("SKU-1".into()));
    f.coordinator.select_category(&trail());

    let result = f.coordinator.save_product_categories().await;

    match result {
        Err(AdminError::Http(HttpError::Rejected { status, message })) => {
            assert_eq!(status, 400);
            assert_eq!(message, "No categories provided");
        }
        other => panic!("expected a rejection, got {other:?}"),
    }
    assert_eq!(f.coordinator.selection().selected(), vec!["Trail".to_string()]);
    assert_eq!(
        f.notifier.errors()[0].retry(),
        Some(Operation::SaveProductCategories)
    );
    f.mock.verify();
}

#[tokio::test]
async fn test_open_delete_while_open_keeps_first_target() {
    let f = fixture();
    f.mock
        .expect(Method::Get, url("/api/categories/Shoes/info"))
        .return_json(info("Shoes", &[]));
    f.mock
        .expect(Method::Delete, url("/api/categories/delete"))
        .return_json(json!({
            "message": "Category 'Shoes' deleted successfully",
            "details": {"category": "Shoes", "removed_from_products": 3, "removed_from_categories_table": 1}
        }));

    f.coordinator.open_delete("Shoes").await.unwrap();
    let second = f.coordinator.open_delete("Boots").await.unwrap();
    assert_eq!(second, Transition::Ignored);
    assert_eq!(f.mock.call_count(), 1, "no info request for the second target");

    f.coordinator.retry(Operation::DeleteCategory).await.unwrap();

    assert_eq!(
        f.mock.calls()[1].body,
        Some(json!({"category_name": "Shoes"}))
    );
    assert!(!f.coordinator.deletion().is_visible());
    f.mock.verify();
}

#[tokio::test]
async fn test_cancel_closes_both_dialogs() {
    let f = fixture();
    f.mock
        .expect(Method::Get, url("/api/categories/Shoes/info"))
        .return_json(info("Shoes", &[]));
    f.coordinator.open_create(CreationPrefill::default()).await.unwrap();
    f.coordinator.open_delete("Shoes").await.unwrap();

    f.coordinator.cancel().await.unwrap();

    assert!(!f.page.creation_modal.is_visible());
    assert!(!f.page.deletion_modal.is_visible());
    assert!(!f.page.document.is_scroll_locked());
    assert_eq!(f.mock.call_count(), 1);
}
