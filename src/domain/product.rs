use serde::{Deserialize, Serialize};

/// A catalog entry. A missing price means the product is displayed but not
/// purchasable; `deleted` hides it from new carts while historic order items
/// keep referencing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub image: Option<Vec<u8>>,
    pub price: Option<i64>,
    pub deleted: bool,
}

impl Product {
    pub fn new(id: u64, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            image: None,
            price: None,
            deleted: false,
        }
    }

    pub fn purchasable(&self) -> bool {
        self.price.is_some() && !self.deleted
    }
}
