//! Category payloads as the server sends and accepts them.
//!
//! The server is inconsistent about levels: the category list sends `1`, the info and
//! product endpoints send `"Level 1 Category"`. [`level`] accepts both.

pub use admin_runtime::store::Category;
use serde::{Deserialize, Serialize};

/// Deepest level of the category tree.
pub const MAX_LEVEL: u8 = 3;

/// Fields of the creation form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryCreate {
    pub name: String,
    pub level: u8,
    #[serde(rename = "parent_id", skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl CategoryCreate {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: 1,
            parent: None,
        }
    }

    pub fn child(name: impl Into<String>, level: u8, parent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level,
            parent: Some(parent.into()),
        }
    }

    /// The name as it will be sent.
    pub fn trimmed_name(&self) -> &str {
        self.name.trim()
    }
}

/// One entry of `GET /api/categories` or `GET /api/products/{id}/categories`.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryListing {
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "level::deserialize")]
    pub level: u8,
    #[serde(default)]
    pub parent: Option<String>,
}

impl From<CategoryListing> for Category {
    /// The category list spells nested names as `Parent > Child`; the last segment is the
    /// name and the one before it the parent.
    fn from(listing: CategoryListing) -> Self {
        let mut segments: Vec<&str> = listing.name.split(" > ").collect();
        let name = segments.pop().unwrap_or_default().to_string();
        let parent = listing
            .parent
            .filter(|p| !p.is_empty() && p != "None")
            .or_else(|| segments.pop().map(str::to_string));
        Category {
            id: listing.id,
            name,
            level: listing.level,
            parent,
        }
    }
}

/// The `category` object in a successful create response.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedCategory {
    pub category_name: String,
    #[serde(deserialize_with = "level::deserialize")]
    pub category_level: u8,
    #[serde(default)]
    pub connected_to: Option<String>,
}

impl From<CreatedCategory> for Category {
    fn from(created: CreatedCategory) -> Self {
        Category {
            id: created.category_name.clone(),
            name: created.category_name,
            level: created.category_level,
            parent: created.connected_to,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CreateResponse {
    pub category: CreatedCategory,
}

/// `GET /api/categories/{name}/info`, shown in the deletion modal.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryInfo {
    pub name: String,
    #[serde(deserialize_with = "level::deserialize")]
    pub level: u8,
    #[serde(default, deserialize_with = "level::parent")]
    pub parent: Option<String>,
    #[serde(default)]
    pub product_count: u64,
    #[serde(default)]
    pub child_count: u64,
    #[serde(default)]
    pub child_categories: Vec<String>,
}

impl CategoryInfo {
    pub fn has_children(&self) -> bool {
        self.child_count > 0 || !self.child_categories.is_empty()
    }
}

/// What a successful delete removed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct DeletionReport {
    #[serde(default)]
    pub removed_from_products: u64,
    #[serde(default)]
    pub removed_from_categories_table: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DeleteResponse {
    #[serde(default)]
    pub details: DeletionReport,
}

pub mod level {
    use serde::de::{self, Deserializer};
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u8),
        Label(String),
    }

    /// Parse `2`, `"2"` or `"Level 2 Category"`.
    pub fn parse(label: &str) -> Option<u8> {
        let label = label.trim();
        let digits = label
            .strip_prefix("Level ")
            .map(|rest| rest.trim_end_matches(" Category"))
            .unwrap_or(label);
        digits.trim().parse().ok()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(n),
            Raw::Label(label) => parse(&label)
                .ok_or_else(|| de::Error::custom(format!("unrecognised category level `{label}`"))),
        }
    }

    /// The info endpoint sends the string `"None"` for root categories.
    pub fn parent<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        let parent = Option::<String>::deserialize(deserializer)?;
        Ok(parent.filter(|p| !p.is_empty() && p != "None"))
    }
}
