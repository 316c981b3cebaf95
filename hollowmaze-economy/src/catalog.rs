//! Static rarity and item registries loaded once at startup.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;

/// A single rarity tier in the loot table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RarityTier {
    pub name: String,
    /// Position in the tier ladder; contiguous starting at 1.
    pub order: u32,
    /// Lowest sale value rolled for items of this tier.
    pub min_value: i64,
    /// Highest sale value rolled for items of this tier.
    pub max_value: i64,
    /// Whether five identical items of this tier may be fused upward.
    pub can_trade_up_from: bool,
    /// Whether a fusion may produce an item of this tier.
    pub can_trade_up_to: bool,
    /// Base weight used by the rarity roll.
    pub spawn_weight: f64,
}

impl RarityTier {
    /// Tiers with a zero value range never enter the fragment economy.
    #[must_use]
    pub fn is_sellable(&self) -> bool {
        self.min_value > 0 && self.max_value > 0
    }
}

/// Power-up payload granted while the item is held.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PowerUp {
    Speed { multiplier: f64, duration_secs: u32 },
    Luck { multiplier: f64 },
    Stamina { bonus: i64 },
    Light { radius: f64 },
}

/// Metadata for follower items (permanent companions).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowerInfo {
    pub species: String,
    #[serde(default)]
    pub luck_bonus: f64,
}

/// A single item definition in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub id: String,
    pub name: String,
    /// Rarity name; must resolve against the rarity table.
    pub rarity: String,
    #[serde(default)]
    pub is_follower: bool,
    #[serde(default)]
    pub power_up: Option<PowerUp>,
    #[serde(default)]
    pub follower_info: Option<FollowerInfo>,
}

/// Raw catalog document as it appears on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogDoc {
    rarities: Vec<RarityTier>,
    items: Vec<ItemDefinition>,
}

/// Errors raised while loading catalog data. All of these are fatal at
/// startup; none can occur once a catalog has been constructed.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog JSON failed to parse: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("catalog defines no rarity tiers")]
    NoTiers,
    #[error("duplicate rarity tier '{0}'")]
    DuplicateTier(String),
    #[error("rarity tier orders are not contiguous from 1 (found {found} at position {position})")]
    NonContiguousOrder { found: u32, position: u32 },
    #[error("rarity tier '{tier}' has an inverted value range [{min}, {max}]")]
    BadValueRange { tier: String, min: i64, max: i64 },
    #[error("duplicate item id '{0}'")]
    DuplicateItemId(String),
    #[error("item '{item}' references unknown rarity '{rarity}'")]
    UnknownRarity { item: String, rarity: String },
}

/// Immutable registry of rarity tiers and item definitions.
///
/// Constructed once from JSON and never mutated afterwards; lookups hand
/// out shared references only.
#[derive(Debug, Clone)]
pub struct Catalog {
    /// Tiers sorted ascending by `order`.
    tiers: Vec<RarityTier>,
    items: Vec<ItemDefinition>,
    items_by_id: HashMap<String, usize>,
    items_by_rarity: HashMap<String, Vec<usize>>,
}

impl Catalog {
    /// Parse and validate a catalog from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] when the document fails to parse or
    /// violates a startup invariant (duplicate item ids, unresolvable
    /// rarity references, non-contiguous tier orders).
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDoc = serde_json::from_str(json)?;
        Self::from_parts(doc.rarities, doc.items)
    }

    /// Build a catalog from already-parsed tables, enforcing invariants.
    ///
    /// # Errors
    ///
    /// Same invariant failures as [`Catalog::from_json`].
    pub fn from_parts(
        mut tiers: Vec<RarityTier>,
        items: Vec<ItemDefinition>,
    ) -> Result<Self, CatalogError> {
        if tiers.is_empty() {
            return Err(CatalogError::NoTiers);
        }
        tiers.sort_by_key(|t| t.order);
        for (idx, tier) in tiers.iter().enumerate() {
            let expected = u32::try_from(idx).unwrap_or(u32::MAX).saturating_add(1);
            if tier.order != expected {
                return Err(CatalogError::NonContiguousOrder {
                    found: tier.order,
                    position: expected,
                });
            }
            if tiers[..idx].iter().any(|t| t.name == tier.name) {
                return Err(CatalogError::DuplicateTier(tier.name.clone()));
            }
            // Value rolls draw from min..=max, so an inverted range would
            // panic at roll time; reject it at load instead.
            if tier.min_value > tier.max_value {
                return Err(CatalogError::BadValueRange {
                    tier: tier.name.clone(),
                    min: tier.min_value,
                    max: tier.max_value,
                });
            }
        }

        let mut items_by_id = HashMap::new();
        let mut items_by_rarity: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, item) in items.iter().enumerate() {
            if !tiers.iter().any(|t| t.name == item.rarity) {
                return Err(CatalogError::UnknownRarity {
                    item: item.id.clone(),
                    rarity: item.rarity.clone(),
                });
            }
            if items_by_id.insert(item.id.clone(), idx).is_some() {
                return Err(CatalogError::DuplicateItemId(item.id.clone()));
            }
            items_by_rarity.entry(item.rarity.clone()).or_default().push(idx);
        }

        Ok(Self {
            tiers,
            items,
            items_by_id,
            items_by_rarity,
        })
    }

    /// Look up a tier by name.
    #[must_use]
    pub fn tier(&self, name: &str) -> Option<&RarityTier> {
        self.tiers.iter().find(|t| t.name == name)
    }

    /// The tier exactly one order above the named tier, if any.
    #[must_use]
    pub fn next_tier(&self, name: &str) -> Option<&RarityTier> {
        let current = self.tier(name)?;
        self.tiers.iter().find(|t| t.order == current.order + 1)
    }

    /// All tiers in ascending order.
    #[must_use]
    pub fn tiers(&self) -> &[RarityTier] {
        &self.tiers
    }

    /// The lowest-order tier. Catalog construction rejects empty tier
    /// tables, so this always resolves.
    #[must_use]
    pub fn lowest_tier(&self) -> &RarityTier {
        &self.tiers[0]
    }

    /// The highest-order tier (the permanent, non-sellable rarity).
    #[must_use]
    pub fn highest_tier(&self) -> &RarityTier {
        &self.tiers[self.tiers.len() - 1]
    }

    /// Whether the named rarity is the permanent top tier that survives
    /// death and refuses sale.
    #[must_use]
    pub fn is_permanent(&self, rarity: &str) -> bool {
        self.highest_tier().name == rarity
    }

    /// Look up an item definition by its id.
    #[must_use]
    pub fn item_by_id(&self, item_id: &str) -> Option<&ItemDefinition> {
        self.items_by_id.get(item_id).map(|&idx| &self.items[idx])
    }

    /// All item definitions tagged with the given rarity.
    #[must_use]
    pub fn items_of_rarity(&self, rarity: &str) -> Vec<&ItemDefinition> {
        self.items_by_rarity
            .get(rarity)
            .map(|indices| indices.iter().map(|&idx| &self.items[idx]).collect())
            .unwrap_or_default()
    }

    /// All item definitions.
    #[must_use]
    pub fn items(&self) -> &[ItemDefinition] {
        &self.items
    }
}

/// Embedded default catalog data.
const DEFAULT_CATALOG_JSON: &str = include_str!("../data/catalog.json");

/// Process-wide default catalog, parsed on first access.
///
/// # Panics
///
/// Panics if the embedded catalog data violates a startup invariant; this
/// halts startup rather than running with a broken economy.
#[must_use]
pub fn catalog() -> &'static Catalog {
    static CATALOG: OnceLock<Catalog> = OnceLock::new();
    CATALOG.get_or_init(|| {
        Catalog::from_json(DEFAULT_CATALOG_JSON)
            .unwrap_or_else(|err| panic!("embedded catalog is invalid: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(name: &str, order: u32) -> RarityTier {
        RarityTier {
            name: name.to_string(),
            order,
            min_value: 1,
            max_value: 10,
            can_trade_up_from: true,
            can_trade_up_to: true,
            spawn_weight: 10.0,
        }
    }

    fn item(id: &str, rarity: &str) -> ItemDefinition {
        ItemDefinition {
            id: id.to_string(),
            name: id.to_string(),
            rarity: rarity.to_string(),
            is_follower: false,
            power_up: None,
            follower_info: None,
        }
    }

    #[test]
    fn default_catalog_loads_and_resolves() {
        let cat = catalog();
        assert!(!cat.tiers().is_empty());
        for def in cat.items() {
            let tier = cat.tier(&def.rarity);
            assert!(tier.is_some(), "item {} has unresolvable rarity", def.id);
        }
    }

    #[test]
    fn next_tier_walks_the_ladder() {
        let cat = catalog();
        assert_eq!(cat.next_tier("Common").map(|t| t.name.as_str()), Some("Rare"));
        assert_eq!(cat.next_tier("Rare").map(|t| t.name.as_str()), Some("Epic"));
        assert_eq!(cat.next_tier("Epic").map(|t| t.name.as_str()), Some("Legendary"));
        assert!(cat.next_tier("Legendary").is_none());
        assert!(cat.next_tier("Mythic").is_none());
    }

    #[test]
    fn duplicate_item_id_is_fatal() {
        let result = Catalog::from_parts(
            vec![tier("Common", 1)],
            vec![item("pen", "Common"), item("pen", "Common")],
        );
        assert!(matches!(result, Err(CatalogError::DuplicateItemId(id)) if id == "pen"));
    }

    #[test]
    fn unknown_rarity_reference_is_fatal() {
        let result = Catalog::from_parts(vec![tier("Common", 1)], vec![item("pen", "Mythic")]);
        assert!(matches!(result, Err(CatalogError::UnknownRarity { .. })));
    }

    #[test]
    fn non_contiguous_orders_are_fatal() {
        let result = Catalog::from_parts(vec![tier("Common", 1), tier("Rare", 3)], Vec::new());
        assert!(matches!(
            result,
            Err(CatalogError::NonContiguousOrder { found: 3, position: 2 })
        ));
    }

    #[test]
    fn inverted_value_range_is_fatal() {
        let mut bad = tier("Common", 1);
        bad.min_value = 20;
        bad.max_value = 5;
        let result = Catalog::from_parts(vec![bad], Vec::new());
        assert!(matches!(
            result,
            Err(CatalogError::BadValueRange { min: 20, max: 5, .. })
        ));
    }

    #[test]
    fn legendary_is_permanent_and_unsellable() {
        let cat = catalog();
        assert!(cat.is_permanent("Legendary"));
        assert!(!cat.is_permanent("Epic"));
        let legendary = cat.tier("Legendary").unwrap();
        assert!(!legendary.is_sellable());
    }

    #[test]
    fn items_of_rarity_filters() {
        let cat = catalog();
        let commons = cat.items_of_rarity("Common");
        assert!(!commons.is_empty());
        assert!(commons.iter().all(|d| d.rarity == "Common"));
        assert!(cat.items_of_rarity("Mythic").is_empty());
    }

    #[test]
    fn follower_items_carry_follower_info() {
        let cat = catalog();
        let wisp = cat.item_by_id("lantern_wisp").unwrap();
        assert!(wisp.is_follower);
        assert!(wisp.follower_info.is_some());
    }
}
