//! # Category API
//!
//! Typed wrapper over the admin's HTTP endpoints. Every call goes through the
//! [`ResilientClient`], so 4xx responses come back as [`HttpError::Rejected`] carrying the
//! server's own message, and 5xx/network failures are retried before they surface.
//!
//! | Call | Endpoint |
//! |------|----------|
//! | [`list_categories`](CategoryApi::list_categories) | `GET /api/categories` |
//! | [`product_categories`](CategoryApi::product_categories) | `GET /api/products/{id}/categories` |
//! | [`assign_product_categories`](CategoryApi::assign_product_categories) | `POST /api/products/{id}/categories` |
//! | [`bulk_assign`](CategoryApi::bulk_assign) | `POST /api/products/bulk-assign-categories` |
//! | [`bulk_remove`](CategoryApi::bulk_remove) | `POST /api/products/bulk-remove-categories` |
//! | [`create_category`](CategoryApi::create_category) | `POST /api/categories/create` |
//! | [`delete_category`](CategoryApi::delete_category) | `DELETE /api/categories/delete` |
//! | [`category_info`](CategoryApi::category_info) | `GET /api/categories/{name}/info` |
//! | [`statistics`](CategoryApi::statistics) | `GET /api/products/statistics` |
//! | [`export_csv`](CategoryApi::export_csv) | `GET /api/export/csv` |

use crate::model::{
    BulkResponse, BulkStats, Category, CategoryCreate, CategoryInfo, CategoryListing,
    CreateResponse, CsvExport, DeleteResponse, DeletionReport, ProductAssignment,
    ProductStatistics,
};
use admin_runtime::http::{ApiResponse, ResilientClient};
use admin_runtime::HttpError;
use serde_json::json;
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct CategoryApi {
    client: ResilientClient,
    base_url: String,
}

impl CategoryApi {
    pub fn new(client: ResilientClient, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<Category>, HttpError> {
        let listings: Vec<CategoryListing> = self.client.get_json(&self.url("/api/categories")).await?;
        debug!(count = listings.len(), "Categories listed");
        Ok(listings.into_iter().map(Category::from).collect())
    }

    #[instrument(skip(self))]
    pub async fn product_categories(&self, product_id: &str) -> Result<Vec<Category>, HttpError> {
        let url = self.url(&format!(
            "/api/products/{}/categories",
            encode_path_segment(product_id)
        ));
        let listings: Vec<CategoryListing> = self.client.get_json(&url).await?;
        Ok(listings.into_iter().map(Category::from).collect())
    }

    #[instrument(skip(self, category_ids), fields(categories = category_ids.len()))]
    pub async fn assign_product_categories(
        &self,
        product_id: &str,
        category_ids: &[String],
    ) -> Result<ProductAssignment, HttpError> {
        let url = self.url(&format!(
            "/api/products/{}/categories",
            encode_path_segment(product_id)
        ));
        self.client
            .post(&url, json!({"category_ids": category_ids}))
            .await?
            .parse()
    }

    #[instrument(skip_all, fields(products = product_ids.len(), categories = category_ids.len()))]
    pub async fn bulk_assign(
        &self,
        product_ids: &[String],
        category_ids: &[String],
    ) -> Result<BulkStats, HttpError> {
        self.bulk("/api/products/bulk-assign-categories", product_ids, category_ids)
            .await
    }

    #[instrument(skip_all, fields(products = product_ids.len(), categories = category_ids.len()))]
    pub async fn bulk_remove(
        &self,
        product_ids: &[String],
        category_ids: &[String],
    ) -> Result<BulkStats, HttpError> {
        self.bulk("/api/products/bulk-remove-categories", product_ids, category_ids)
            .await
    }

    async fn bulk(
        &self,
        path: &str,
        product_ids: &[String],
        category_ids: &[String],
    ) -> Result<BulkStats, HttpError> {
        let body = json!({"product_ids": product_ids, "category_ids": category_ids});
        let response: BulkResponse = self.client.post(&self.url(path), body).await?.parse()?;
        debug!(updated = response.stats.products_updated, "Bulk update done");
        Ok(response.stats)
    }

    #[instrument(skip(self, draft), fields(name = %draft.name, level = draft.level))]
    pub async fn create_category(&self, draft: &CategoryCreate) -> Result<Category, HttpError> {
        let mut body = json!({"name": draft.trimmed_name(), "level": draft.level});
        if let Some(parent) = &draft.parent {
            body["parent_id"] = json!(parent);
        }
        let response: CreateResponse = self
            .client
            .post(&self.url("/api/categories/create"), body)
            .await?
            .parse()?;
        Ok(response.category.into())
    }

    #[instrument(skip(self))]
    pub async fn delete_category(&self, name: &str) -> Result<DeletionReport, HttpError> {
        let response = self
            .client
            .delete(
                &self.url("/api/categories/delete"),
                Some(json!({"category_name": name})),
            )
            .await?;
        match response {
            ApiResponse::NoContent => Ok(DeletionReport::default()),
            other => Ok(other.parse::<DeleteResponse>()?.details),
        }
    }

    #[instrument(skip(self))]
    pub async fn category_info(&self, name: &str) -> Result<CategoryInfo, HttpError> {
        let url = self.url(&format!(
            "/api/categories/{}/info",
            encode_path_segment(name)
        ));
        self.client.get_json(&url).await
    }

    #[instrument(skip(self))]
    pub async fn statistics(&self) -> Result<ProductStatistics, HttpError> {
        self.client
            .get_json(&self.url("/api/products/statistics"))
            .await
    }

    #[instrument(skip(self))]
    pub async fn export_csv(&self) -> Result<CsvExport, HttpError> {
        let content = match self.client.get(&self.url("/api/export/csv")).await? {
            ApiResponse::Raw(response) => response.text(),
            ApiResponse::NoContent => String::new(),
            ApiResponse::Json(value) => {
                return Err(HttpError::Decode(format!(
                    "expected CSV, got JSON: {value}"
                )))
            }
        };
        debug!(bytes = content.len(), "CSV downloaded");
        Ok(CsvExport { content })
    }
}

/// Percent-encode one path segment. Category names may contain spaces and `&`.
fn encode_path_segment(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use admin_runtime::http::Method;
    use admin_runtime::mock::MockTransport;
    use serde_json::json;
    use std::sync::Arc;

    const BASE: &str = "http://admin.test";

    fn api(mock: &MockTransport) -> CategoryApi {
        CategoryApi::new(ResilientClient::new(Arc::new(mock.clone())), format!("{BASE}/"))
    }

    #[test]
    fn test_encode_path_segment() {
        assert_eq!(encode_path_segment("Shoes & Boots"), "Shoes%20%26%20Boots");
        assert_eq!(encode_path_segment("Café"), "Caf%C3%A9");
    }

    #[tokio::test]
    async fn test_create_sends_form_and_maps_response() {
        let mock = MockTransport::new();
        mock.expect(Method::Post, format!("{BASE}/api/categories/create"))
            .return_json(json!({
                "message": "Category created successfully",
                "category": {
                    "category_name": "Trail",
                    "category_level": "Level 2 Category",
                    "connected_to": "Shoes"
                }
            }));

        let created = api(&mock)
            .create_category(&CategoryCreate::child(" Trail ", 2, "Shoes"))
            .await
            .unwrap();

        assert_eq!(created, Category::new("Trail", "Trail", 2, Some("Shoes")));
        assert_eq!(
            mock.calls()[0].body,
            Some(json!({"name": "Trail", "level": 2, "parent_id": "Shoes"}))
        );
        mock.verify();
    }

    #[tokio::test]
    async fn test_assign_sends_category_ids() {
        let mock = MockTransport::new();
        mock.expect(Method::Post, format!("{BASE}/api/products/SKU%201/categories"))
            .return_json(json!({
                "message": "Categories assigned successfully",
                "added_categories": ["Trail", "Shoes"],
                "parent_categories_added": 1,
                "categories": ["Shoes", "Trail"]
            }));

        let saved = api(&mock)
            .assign_product_categories("SKU 1", &["Trail".to_string()])
            .await
            .unwrap();

        assert_eq!(saved.parent_categories_added, 1);
        assert_eq!(saved.categories, vec!["Shoes".to_string(), "Trail".to_string()]);
        assert_eq!(mock.calls()[0].body, Some(json!({"category_ids": ["Trail"]})));
        mock.verify();
    }

    #[tokio::test]
    async fn test_info_url_is_encoded() {
        let mock = MockTransport::new();
        mock.expect(Method::Get, format!("{BASE}/api/categories/Shoes%20%26%20Boots/info"))
            .return_json(json!({
                "name": "Shoes & Boots",
                "level": "Level 1 Category",
                "parent": "None",
                "product_count": 0,
                "child_count": 0,
                "child_categories": []
            }));

        let info = api(&mock).category_info("Shoes & Boots").await.unwrap();
        assert!(!info.has_children());
    }

    #[tokio::test]
    async fn test_delete_reports_removed_products() {
        let mock = MockTransport::new();
        mock.expect(Method::Delete, format!("{BASE}/api/categories/delete"))
            .return_json(json!({
                "message": "Category deleted successfully",
                "details": {"removed_from_products": 4, "removed_from_categories_table": 1}
            }));

        let report = api(&mock).delete_category("Road").await.unwrap();
        assert_eq!(report.removed_from_products, 4);
    }
}
