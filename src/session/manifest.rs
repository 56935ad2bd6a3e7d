//! The order manifest a work unit is packed against.

use crate::error::{PackError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Manifest as produced by the catalog parser, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkManifest {
    pub orders: Vec<ManifestOrder>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestOrder {
    pub order_id: String,
    pub items: Vec<ManifestItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestItem {
    pub identifier: String,
    pub quantity: u32,
}

/// Normalize a scanned or listed identifier: trim, drop inner whitespace,
/// ASCII uppercase.
pub fn normalize_identifier(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// A validated manifest with normalized, merged item lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    orders: Vec<ManifestOrder>,
    index: HashMap<String, usize>,
}

impl Manifest {
    /// Load and validate a manifest from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PackError::UserError(format!(
                "failed to read manifest '{}': {}",
                path.display(),
                e
            ))
        })?;
        let raw: WorkManifest = serde_json::from_str(&content).map_err(|e| {
            PackError::UserError(format!(
                "failed to parse manifest '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_raw(raw)
    }

    /// Validate and normalize a raw manifest.
    ///
    /// Lines within an order that normalize to the same identifier are merged
    /// by summing quantities; the first spelling is kept for display.
    pub fn from_raw(raw: WorkManifest) -> Result<Self> {
        let mut orders = Vec::with_capacity(raw.orders.len());
        let mut index = HashMap::new();

        for order in raw.orders {
            let order_id = order.order_id.trim().to_string();
            let key = normalize_identifier(&order_id);
            if key.is_empty() {
                return Err(PackError::UserError(
                    "manifest contains an order with an empty order_id".to_string(),
                ));
            }
            if index.contains_key(&key) {
                return Err(PackError::UserError(format!(
                    "manifest lists order '{}' more than once",
                    order_id
                )));
            }

            let mut items: Vec<ManifestItem> = Vec::new();
            for item in order.items {
                let normalized = normalize_identifier(&item.identifier);
                if normalized.is_empty() {
                    return Err(PackError::UserError(format!(
                        "order '{}' has an item with an empty identifier",
                        order_id
                    )));
                }
                if item.quantity == 0 {
                    return Err(PackError::UserError(format!(
                        "order '{}' lists item '{}' with quantity 0",
                        order_id, item.identifier
                    )));
                }

                match items
                    .iter_mut()
                    .find(|i| normalize_identifier(&i.identifier) == normalized)
                {
                    Some(existing) => {
                        existing.quantity =
                            existing.quantity.checked_add(item.quantity).ok_or_else(|| {
                                PackError::UserError(format!(
                                    "order '{}' item '{}' quantity overflows",
                                    order_id, item.identifier
                                ))
                            })?;
                    }
                    None => items.push(ManifestItem {
                        identifier: item.identifier.trim().to_string(),
                        quantity: item.quantity,
                    }),
                }
            }

            if items.is_empty() {
                return Err(PackError::UserError(format!(
                    "order '{}' has no items",
                    order_id
                )));
            }

            index.insert(key, orders.len());
            orders.push(ManifestOrder { order_id, items });
        }

        Ok(Self { orders, index })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: WorkManifest = serde_json::from_str(json)
            .map_err(|e| PackError::UserError(format!("failed to parse manifest: {}", e)))?;
        Self::from_raw(raw)
    }

    /// Look up an order by a scanned order id.
    pub fn find_order(&self, order_id: &str) -> Option<&ManifestOrder> {
        self.index
            .get(&normalize_identifier(order_id))
            .map(|&i| &self.orders[i])
    }

    pub fn orders(&self) -> &[ManifestOrder] {
        &self.orders
    }

    pub fn total_items(&self) -> u64 {
        self.orders
            .iter()
            .flat_map(|o| o.items.iter())
            .map(|i| u64::from(i.quantity))
            .sum()
    }
}
