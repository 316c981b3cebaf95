//! Concrete player-owned item instances.
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::catalog::{Catalog, PowerUp};

/// A concrete item owned by exactly one inventory at a time.
///
/// Created by the loot generator or the trade-up engine; destroyed on sale,
/// drop, trade-up consumption, or the death wipe (permanent-tier instances
/// survive the wipe and refuse sale).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemInstance {
    /// Globally unique per instance.
    pub unique_id: String,
    /// Catalog definition this instance was minted from.
    pub item_id: String,
    pub display_name: String,
    /// Denormalized copy of the definition's rarity name.
    pub rarity: String,
    /// Sale value rolled at creation; 0 for non-sellable tiers.
    pub value: i64,
    #[serde(default)]
    pub is_follower: bool,
    /// Catalog-defined payload; never serialized, re-derived on load.
    #[serde(skip)]
    pub power_up: Option<PowerUp>,
}

/// Serialized form of an item instance. The power-up payload is catalog
/// state, not instance state, so it is intentionally absent here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedItem {
    pub unique_id: String,
    pub item_id: String,
    pub display_name: String,
    pub rarity: String,
    pub value: i64,
    #[serde(default)]
    pub is_follower: bool,
}

impl ItemInstance {
    /// Rebuild an instance from its saved form, re-deriving the power-up
    /// payload from the catalog. Unknown item ids still restore (the saved
    /// fields are authoritative); they just carry no payload.
    #[must_use]
    pub fn from_saved(saved: SavedItem, catalog: &Catalog) -> Self {
        let power_up = catalog
            .item_by_id(&saved.item_id)
            .and_then(|def| def.power_up.clone());
        Self {
            unique_id: saved.unique_id,
            item_id: saved.item_id,
            display_name: saved.display_name,
            rarity: saved.rarity,
            value: saved.value,
            is_follower: saved.is_follower,
            power_up,
        }
    }

    /// Project this instance into its persistable form.
    #[must_use]
    pub fn to_saved(&self) -> SavedItem {
        SavedItem {
            unique_id: self.unique_id.clone(),
            item_id: self.item_id.clone(),
            display_name: self.display_name.clone(),
            rarity: self.rarity.clone(),
            value: self.value,
            is_follower: self.is_follower,
        }
    }
}

/// Mint a fresh unique id: a per-process random salt plus a monotonically
/// increasing counter. Saved ids are restored verbatim on hydration, while
/// fresh mints get a new salt each process, so collisions across sessions
/// are not a practical concern.
#[must_use]
pub fn mint_unique_id() -> String {
    static SALT: OnceLock<u64> = OnceLock::new();
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    let salt = SALT.get_or_init(rand::random::<u64>);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{salt:016x}-{n:x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::catalog;

    #[test]
    fn minted_ids_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(mint_unique_id()));
        }
    }

    #[test]
    fn saved_round_trip_rederives_power_up() {
        let cat = catalog();
        let def = cat.item_by_id("lantern").unwrap();
        let instance = ItemInstance {
            unique_id: mint_unique_id(),
            item_id: def.id.clone(),
            display_name: def.name.clone(),
            rarity: def.rarity.clone(),
            value: 80,
            is_follower: def.is_follower,
            power_up: def.power_up.clone(),
        };

        let restored = ItemInstance::from_saved(instance.to_saved(), cat);
        assert_eq!(restored.unique_id, instance.unique_id);
        assert_eq!(restored.item_id, instance.item_id);
        assert_eq!(restored.rarity, instance.rarity);
        assert_eq!(restored.value, instance.value);
        assert_eq!(restored.power_up, def.power_up);
    }

    #[test]
    fn unknown_item_id_restores_without_payload() {
        let saved = SavedItem {
            unique_id: "x-1".to_string(),
            item_id: "retired_item".to_string(),
            display_name: "Retired".to_string(),
            rarity: "Common".to_string(),
            value: 7,
            is_follower: false,
        };
        let restored = ItemInstance::from_saved(saved, catalog());
        assert_eq!(restored.item_id, "retired_item");
        assert!(restored.power_up.is_none());
    }
}
