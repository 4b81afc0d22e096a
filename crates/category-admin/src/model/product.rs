use serde::Deserialize;

pub use admin_runtime::store::ProductStatistics;

/// `POST /api/products/{id}/categories` response. The server adds the ancestors of every
/// assigned category on its own.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ProductAssignment {
    #[serde(default)]
    pub added_categories: Vec<String>,
    #[serde(default)]
    pub parent_categories_added: u64,
    /// Every category the product has after the save.
    #[serde(default)]
    pub categories: Vec<String>,
}

/// `stats` of a bulk assign or bulk remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct BulkStats {
    #[serde(default)]
    pub total_products: u64,
    #[serde(default)]
    pub total_categories: u64,
    #[serde(default)]
    pub categories_added: u64,
    #[serde(default)]
    pub parent_categories_added: u64,
    #[serde(default)]
    pub categories_removed: u64,
    #[serde(default)]
    pub products_updated: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BulkResponse {
    #[serde(default)]
    pub stats: BulkStats,
}

/// A downloaded CSV export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub content: String,
}

impl CsvExport {
    /// Data rows, not counting the header.
    pub fn rows(&self) -> usize {
        self.content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .count()
            .saturating_sub(1)
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
