//! Weighted rarity rolling and item generation.
use log::error;
use rand::Rng;
use thiserror::Error;

use crate::catalog::Catalog;
use crate::constants::DEFAULT_LUCK;
use crate::item::{ItemInstance, mint_unique_id};

/// Failures surfaced by the generator. These are typed results for the
/// caller to handle, never panics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LootError {
    #[error("no items configured for rarity '{0}'")]
    EmptyRarityPool(String),
    #[error("unknown rarity '{0}'")]
    UnknownRarity(String),
    #[error("batch count must be at least 1, got {0}")]
    InvalidCount(i64),
}

/// Rolls rarities and mints item instances against a fixed catalog.
#[derive(Debug, Clone, Copy)]
pub struct LootGenerator {
    catalog: &'static Catalog,
}

impl LootGenerator {
    #[must_use]
    pub fn new(catalog: &'static Catalog) -> Self {
        Self { catalog }
    }

    /// The catalog this generator rolls against.
    #[must_use]
    pub fn catalog(&self) -> &'static Catalog {
        self.catalog
    }

    /// Roll a rarity name from the weighted pool.
    ///
    /// Luck perturbs the pool only above 1.0: every tier except the lowest
    /// has its weight multiplied by `luck`, while the lowest tier's weight
    /// is divided by it. At exactly 1.0 the pool is the configured weights.
    /// The roll walks tiers in ascending order and returns the first tier
    /// whose cumulative weight covers the draw.
    pub fn roll_rarity<R: Rng + ?Sized>(&self, rng: &mut R, luck: f64) -> String {
        let luck = if luck >= 1.0 { luck } else { DEFAULT_LUCK };
        let tiers = self.catalog.tiers();
        let lowest_order = self.catalog.lowest_tier().order;

        let weights: Vec<f64> = tiers
            .iter()
            .map(|tier| {
                if tier.order == lowest_order {
                    tier.spawn_weight / luck
                } else {
                    tier.spawn_weight * luck
                }
            })
            .collect();
        let total: f64 = weights.iter().sum();
        if !(total > 0.0) {
            error!("rarity pool has no positive weight (total={total})");
            return self.catalog.lowest_tier().name.clone();
        }

        let draw = rng.gen_range(0.0..total);
        let mut cumulative = 0.0;
        for (tier, weight) in tiers.iter().zip(&weights) {
            cumulative += weight;
            if draw < cumulative {
                return tier.name.clone();
            }
        }

        // Unreachable short of floating-point edge failure; treated as a
        // bug signal rather than a designed fallback.
        error!("rarity roll fell through cumulative walk (draw={draw}, total={total})");
        self.catalog.lowest_tier().name.clone()
    }

    /// Mint one concrete item instance.
    ///
    /// With `rarity_override` set the roll is skipped entirely (luck does
    /// not apply); otherwise a rarity is rolled first. The definition is
    /// picked uniformly from the rarity's pool and the value uniformly from
    /// the tier's range, or 0 when the tier is non-sellable.
    ///
    /// # Errors
    ///
    /// [`LootError::UnknownRarity`] for an override naming no tier, and
    /// [`LootError::EmptyRarityPool`] when the catalog holds no items of
    /// the resolved rarity.
    pub fn generate_item<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        rarity_override: Option<&str>,
        luck: f64,
    ) -> Result<ItemInstance, LootError> {
        let rarity = match rarity_override {
            Some(name) => {
                if self.catalog.tier(name).is_none() {
                    return Err(LootError::UnknownRarity(name.to_string()));
                }
                name.to_string()
            }
            None => self.roll_rarity(rng, luck),
        };

        let pool = self.catalog.items_of_rarity(&rarity);
        if pool.is_empty() {
            return Err(LootError::EmptyRarityPool(rarity));
        }
        let def = pool[rng.gen_range(0..pool.len())];

        // Lookup cannot fail: the rarity came from the catalog or was
        // validated above.
        let tier = self
            .catalog
            .tier(&rarity)
            .ok_or_else(|| LootError::UnknownRarity(rarity.clone()))?;
        let value = if tier.min_value > 0 && tier.max_value > 0 {
            rng.gen_range(tier.min_value..=tier.max_value)
        } else {
            0
        };

        Ok(ItemInstance {
            unique_id: mint_unique_id(),
            item_id: def.id.clone(),
            display_name: def.name.clone(),
            rarity,
            value,
            is_follower: def.is_follower,
            power_up: def.power_up.clone(),
        })
    }

    /// Mint `count` independently rolled instances.
    ///
    /// # Errors
    ///
    /// [`LootError::InvalidCount`] when `count` is zero, plus any error
    /// from the individual rolls.
    pub fn generate_batch<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        count: usize,
        luck: f64,
    ) -> Result<Vec<ItemInstance>, LootError> {
        if count == 0 {
            return Err(LootError::InvalidCount(0));
        }
        let mut batch = Vec::with_capacity(count);
        for _ in 0..count {
            batch.push(self.generate_item(rng, None, luck)?);
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::catalog;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::collections::HashMap;

    #[test]
    fn neutral_luck_tracks_spawn_weights() {
        let generator = LootGenerator::new(catalog());
        let mut rng = ChaCha20Rng::seed_from_u64(7);

        let rolls = 20_000;
        let mut counts: HashMap<String, u32> = HashMap::new();
        for _ in 0..rolls {
            *counts.entry(generator.roll_rarity(&mut rng, 1.0)).or_default() += 1;
        }

        let total_weight: f64 = catalog().tiers().iter().map(|t| t.spawn_weight).sum();
        for tier in catalog().tiers() {
            let expected = tier.spawn_weight / total_weight;
            let observed =
                f64::from(counts.get(&tier.name).copied().unwrap_or(0)) / f64::from(rolls);
            assert!(
                (observed - expected).abs() < 0.02,
                "{}: observed {observed:.4}, expected {expected:.4}",
                tier.name
            );
        }
    }

    #[test]
    fn luck_shifts_rolls_away_from_the_lowest_tier() {
        let generator = LootGenerator::new(catalog());
        let lowest = catalog().lowest_tier().name.clone();

        let count_lowest = |luck: f64, seed: u64| {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            (0..10_000)
                .filter(|_| generator.roll_rarity(&mut rng, luck) == lowest)
                .count()
        };

        let neutral = count_lowest(1.0, 11);
        let lucky = count_lowest(4.0, 11);
        assert!(
            lucky < neutral,
            "luck 4.0 should drop lowest-tier rolls: {lucky} vs {neutral}"
        );
    }

    #[test]
    fn sub_one_luck_is_clamped_to_neutral() {
        let generator = LootGenerator::new(catalog());
        let mut a = ChaCha20Rng::seed_from_u64(3);
        let mut b = ChaCha20Rng::seed_from_u64(3);
        for _ in 0..100 {
            assert_eq!(
                generator.roll_rarity(&mut a, 0.25),
                generator.roll_rarity(&mut b, 1.0)
            );
        }
    }

    #[test]
    fn override_pins_rarity_and_value_range() {
        let generator = LootGenerator::new(catalog());
        let mut rng = ChaCha20Rng::seed_from_u64(42);

        for _ in 0..200 {
            let item = generator.generate_item(&mut rng, Some("Rare"), 1.0).unwrap();
            assert_eq!(item.rarity, "Rare");
            let tier = catalog().tier("Rare").unwrap();
            assert!(item.value >= tier.min_value && item.value <= tier.max_value);
        }
    }

    #[test]
    fn non_sellable_tier_rolls_zero_value() {
        let generator = LootGenerator::new(catalog());
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        let item = generator
            .generate_item(&mut rng, Some("Legendary"), 1.0)
            .unwrap();
        assert_eq!(item.value, 0);
        assert!(item.is_follower);
    }

    #[test]
    fn empty_rarity_pool_is_surfaced() {
        use crate::catalog::{Catalog, ItemDefinition, RarityTier};

        let tier = |name: &str, order: u32| RarityTier {
            name: name.to_string(),
            order,
            min_value: 1,
            max_value: 10,
            can_trade_up_from: true,
            can_trade_up_to: true,
            spawn_weight: 10.0,
        };
        // "Rare" exists as a tier but has no items configured.
        let sparse = Catalog::from_parts(
            vec![tier("Common", 1), tier("Rare", 2)],
            vec![ItemDefinition {
                id: "pebble".to_string(),
                name: "Pebble".to_string(),
                rarity: "Common".to_string(),
                is_follower: false,
                power_up: None,
                follower_info: None,
            }],
        )
        .unwrap();
        let generator = LootGenerator::new(Box::leak(Box::new(sparse)));

        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let err = generator.generate_item(&mut rng, Some("Rare"), 1.0);
        assert_eq!(err, Err(LootError::EmptyRarityPool("Rare".to_string())));
    }

    #[test]
    fn unknown_override_is_rejected() {
        let generator = LootGenerator::new(catalog());
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let err = generator.generate_item(&mut rng, Some("Mythic"), 1.0);
        assert_eq!(err, Err(LootError::UnknownRarity("Mythic".to_string())));
    }

    #[test]
    fn zero_batch_is_rejected() {
        let generator = LootGenerator::new(catalog());
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        assert_eq!(
            generator.generate_batch(&mut rng, 0, 1.0),
            Err(LootError::InvalidCount(0))
        );
    }

    #[test]
    fn batch_rolls_independently() {
        let generator = LootGenerator::new(catalog());
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let batch = generator.generate_batch(&mut rng, 50, 1.0).unwrap();
        assert_eq!(batch.len(), 50);
        let mut ids: Vec<&str> = batch.iter().map(|i| i.unique_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 50, "unique ids must not repeat within a batch");
    }
}
