//! Per-player item container with insertion-ordered listing.
use log::warn;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::item::{ItemInstance, SavedItem};

/// A player's owned items, keyed by unique id.
///
/// Backed by a vector so listing preserves insertion order for stable UI
/// display. Capacity is not enforced here; the session coordinator gates
/// additions against the effective capacity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    items: Vec<ItemInstance>,
}

/// Serialized inventory snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedInventory {
    #[serde(default)]
    pub items: Vec<SavedItem>,
}

impl Inventory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items currently held.
    #[must_use]
    pub fn count(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add an instance. Returns false and leaves the inventory untouched if
    /// an instance with the same unique id is already present; duplicate
    /// ids are an invariant violation and are never silently overwritten.
    pub fn add_item(&mut self, instance: ItemInstance) -> bool {
        if self.get_item(&instance.unique_id).is_some() {
            warn!(
                "rejected duplicate item instance {} ({})",
                instance.unique_id, instance.item_id
            );
            return false;
        }
        self.items.push(instance);
        true
    }

    /// Remove and return the instance with the given unique id, if present.
    pub fn remove_item(&mut self, unique_id: &str) -> Option<ItemInstance> {
        let idx = self.items.iter().position(|i| i.unique_id == unique_id)?;
        Some(self.items.remove(idx))
    }

    /// Borrow the instance with the given unique id, if present.
    #[must_use]
    pub fn get_item(&self, unique_id: &str) -> Option<&ItemInstance> {
        self.items.iter().find(|i| i.unique_id == unique_id)
    }

    /// Snapshot of all items in insertion order. Later mutations of the
    /// inventory do not affect an already-taken snapshot.
    #[must_use]
    pub fn all_items(&self) -> Vec<ItemInstance> {
        self.items.clone()
    }

    /// Items of the given rarity, in insertion order.
    #[must_use]
    pub fn items_by_rarity(&self, rarity: &str) -> Vec<&ItemInstance> {
        self.items.iter().filter(|i| i.rarity == rarity).collect()
    }

    /// Items minted from the given definition, in insertion order.
    #[must_use]
    pub fn items_by_item_id(&self, item_id: &str) -> Vec<&ItemInstance> {
        self.items.iter().filter(|i| i.item_id == item_id).collect()
    }

    /// Death penalty: removes and returns every item that is not of the
    /// permanent top tier. Permanent-tier items are untouched.
    pub fn clear_non_legendary(&mut self, catalog: &Catalog) -> Vec<ItemInstance> {
        let permanent = catalog.highest_tier().name.clone();
        let mut removed = Vec::new();
        self.items.retain(|item| {
            if item.rarity == permanent {
                true
            } else {
                removed.push(item.clone());
                false
            }
        });
        removed
    }

    /// Project into the persistable form. Power-up payloads are dropped;
    /// they are catalog state and get re-derived on load.
    #[must_use]
    pub fn serialize(&self) -> SavedInventory {
        SavedInventory {
            items: self.items.iter().map(ItemInstance::to_saved).collect(),
        }
    }

    /// Rebuild from a saved snapshot, re-deriving power-ups from the
    /// catalog. Duplicate saved ids are dropped with a warning rather than
    /// overwriting.
    #[must_use]
    pub fn deserialize(saved: SavedInventory, catalog: &Catalog) -> Self {
        let mut inventory = Self::new();
        for item in saved.items {
            inventory.add_item(ItemInstance::from_saved(item, catalog));
        }
        inventory
    }
}
