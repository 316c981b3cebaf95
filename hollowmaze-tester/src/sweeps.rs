//! Statistical and behavioral sweeps over the economy engine.
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use hollowmaze_economy::{
    EconomyCoordinator, LootGenerator, MemoryStore, SaveStore, TRADE_UP_INPUT_COUNT, catalog,
    spawn_session,
};

/// One pass/fail observation from a sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweepResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl SweepResult {
    fn pass(name: &str, detail: String) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            detail,
        }
    }

    fn fail(name: &str, detail: String) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            detail,
        }
    }
}

/// Roll the rarity table `rolls` times per luck value and compare the
/// neutral-luck distribution against the configured spawn weights.
pub fn distribution_sweep(seed: u64, rolls: u32, lucks: &[f64], tolerance: f64) -> Vec<SweepResult> {
    let generator = LootGenerator::new(catalog());
    let mut results = Vec::new();

    for &luck in lucks {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut counts: HashMap<String, u32> = HashMap::new();
        for _ in 0..rolls {
            *counts.entry(generator.roll_rarity(&mut rng, luck)).or_default() += 1;
        }

        let total_weight: f64 = catalog().tiers().iter().map(|t| t.spawn_weight).sum();
        let mut lines = Vec::new();
        let mut worst_error: f64 = 0.0;
        for tier in catalog().tiers() {
            let observed =
                f64::from(counts.get(&tier.name).copied().unwrap_or(0)) / f64::from(rolls);
            let expected = tier.spawn_weight / total_weight;
            if (luck - 1.0).abs() < f64::EPSILON {
                worst_error = worst_error.max((observed - expected).abs());
            }
            lines.push(format!("{}={:.2}%", tier.name, observed * 100.0));
        }

        let name = format!("distribution luck={luck}");
        let detail = lines.join(" ");
        if (luck - 1.0).abs() < f64::EPSILON && worst_error > tolerance {
            results.push(SweepResult::fail(
                &name,
                format!("{detail} (worst error {worst_error:.4} > {tolerance})"),
            ));
        } else {
            results.push(SweepResult::pass(&name, detail));
        }
    }
    results
}

/// Fill an inventory with generated commons and greedily fuse until no
/// group remains eligible, checking the count arithmetic at each step.
pub fn tradeup_sweep(seed: u64, batches: u32) -> Vec<SweepResult> {
    let generator = LootGenerator::new(catalog());
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut coord = EconomyCoordinator::new("sweep", generator, seed);
    let mut results = Vec::new();

    let mut generated = 0usize;
    for _ in 0..batches {
        match generator.generate_batch(&mut rng, 8, 1.0) {
            Ok(batch) => {
                for item in batch {
                    if coord.add_item(item) {
                        generated += 1;
                    } else {
                        // Capacity reached; drain value into the ledger.
                        coord.sell_all();
                    }
                }
            }
            Err(err) => {
                results.push(SweepResult::fail("tradeup generate", err.to_string()));
                return results;
            }
        }
    }

    let mut fusions = 0usize;
    loop {
        let candidates = coord.available_trade_ups();
        let Some(candidate) = candidates.first().cloned() else {
            break;
        };
        let ids: Vec<String> = coord
            .inventory()
            .items_by_item_id(&candidate.item_id)
            .iter()
            .take(TRADE_UP_INPUT_COUNT)
            .map(|i| i.unique_id.clone())
            .collect();
        let before = coord.inventory().count();
        match coord.trade_up(&ids) {
            Ok(new_item) => {
                fusions += 1;
                let after = coord.inventory().count();
                if before - after != TRADE_UP_INPUT_COUNT - 1 {
                    results.push(SweepResult::fail(
                        "tradeup net count",
                        format!("expected -4, got {before} -> {after}"),
                    ));
                    return results;
                }
                let expected_next = catalog()
                    .next_tier(&candidate.rarity)
                    .map(|t| t.name.clone())
                    .unwrap_or_default();
                if new_item.rarity != expected_next {
                    results.push(SweepResult::fail(
                        "tradeup output tier",
                        format!("{} fused into {}", candidate.rarity, new_item.rarity),
                    ));
                    return results;
                }
            }
            Err(err) => {
                results.push(SweepResult::fail("tradeup execute", err.to_string()));
                return results;
            }
        }
    }

    results.push(SweepResult::pass(
        "tradeup greedy fusion",
        format!(
            "{generated} items generated, {fusions} fusions, balance {}",
            coord.balance()
        ),
    ));
    results
}

/// End-to-end actor smoke: spawn a session against an in-memory store,
/// run the lobby/expedition/death cycle, shut down, and verify the
/// persisted slice.
pub async fn session_smoke(seed: u64) -> Vec<SweepResult> {
    let generator = LootGenerator::new(catalog());
    let store = Arc::new(MemoryStore::new());
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut results = Vec::new();

    let session = spawn_session("smoke", generator, Arc::clone(&store) as _, seed).await;
    let handle = &session.handle;

    let run = async {
        let capacity = handle.set_expedition_mode(true).await?;
        for _ in 0..capacity {
            let item = generator
                .generate_item(&mut rng, Some("Common"), 1.0)
                .expect("common pool is configured");
            handle.add_item(item).await?;
        }
        let legendary = generator
            .generate_item(&mut rng, Some("Legendary"), 1.0)
            .expect("legendary pool is configured");
        let overflowed = !handle.add_item(legendary.clone()).await?;

        handle.set_expedition_mode(false).await?;
        let accepted_after = handle.add_item(legendary).await?;
        let removed = handle.on_death().await?;
        let balance = handle.balance().await?;
        Ok::<_, hollowmaze_economy::SessionClosed>((capacity, overflowed, accepted_after, removed, balance))
    }
    .await;

    match run {
        Ok((capacity, overflowed, accepted_after, removed, _balance)) => {
            if !overflowed {
                results.push(SweepResult::fail(
                    "session capacity gate",
                    format!("item accepted beyond expedition capacity {capacity}"),
                ));
            }
            if !accepted_after {
                results.push(SweepResult::fail(
                    "session capacity restore",
                    "full capacity did not admit the held item".to_string(),
                ));
            }
            if removed.len() != capacity {
                results.push(SweepResult::fail(
                    "session death wipe",
                    format!("expected {capacity} wiped, got {}", removed.len()),
                ));
            }
        }
        Err(err) => results.push(SweepResult::fail("session ops", err.to_string())),
    }

    session.shutdown().await;

    match store.load("smoke") {
        Ok(Some(saved)) => {
            if saved.legendary_items.len() == 1 {
                results.push(SweepResult::pass(
                    "session persistence",
                    format!(
                        "balance {} with {} legendary item(s) saved",
                        saved.balance,
                        saved.legendary_items.len()
                    ),
                ));
            } else {
                results.push(SweepResult::fail(
                    "session persistence",
                    format!("expected 1 legendary item, got {}", saved.legendary_items.len()),
                ));
            }
        }
        Ok(None) => results.push(SweepResult::fail(
            "session persistence",
            "no save written on shutdown".to_string(),
        )),
        Err(err) => results.push(SweepResult::fail("session persistence", err.to_string())),
    }

    results
}
