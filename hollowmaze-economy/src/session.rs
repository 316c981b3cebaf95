//! Per-player economic session: capacity rules, orchestration, events.
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::catalog::Catalog;
use crate::constants::{EXPEDITION_CAPACITY, FULL_CAPACITY};
use crate::fragments::{BulkSaleOutcome, FragmentLedger, SaleOutcome};
use crate::inventory::Inventory;
use crate::item::ItemInstance;
use crate::loot::LootGenerator;
use crate::persist::SaveData;
use crate::tradeup::{TradeUpCandidate, TradeUpEngine, TradeUpError};

/// Push-style notification for the presentation collaborator. Plain data;
/// the core never formats UI text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum EconomyEvent {
    BalanceChanged { balance: i64, delta: i64 },
    ItemAdded { item: ItemInstance },
    ItemRemoved { unique_id: String },
    SaleCompleted { earned: i64, sold_count: usize },
    TradeUpCompleted { consumed_item_id: String, new_item: ItemInstance },
    DeathWipe { removed_count: usize },
    ExpeditionChanged { active: bool, capacity: usize },
}

/// Pending notifications for one session; most operations emit one or two.
pub type EventQueue = SmallVec<[EconomyEvent; 4]>;

/// The mutable economic slice owned by one player session.
#[derive(Debug, Clone, Default)]
pub struct PlayerEconomyState {
    pub ledger: FragmentLedger,
    pub inventory: Inventory,
    pub total_runs: u32,
    pub level: u32,
    pub prestige: u32,
}

/// Orchestrates one player's inventory, ledger, and capacity rules.
///
/// Owned exclusively by the player's session; under the `async` feature a
/// session actor wraps one coordinator and serializes all access, so none
/// of these methods need internal locking.
#[derive(Debug)]
pub struct EconomyCoordinator {
    player_key: String,
    state: PlayerEconomyState,
    tradeup: TradeUpEngine,
    rng: ChaCha20Rng,
    expedition: bool,
    events: EventQueue,
}

impl EconomyCoordinator {
    /// Fresh session with an empty state.
    #[must_use]
    pub fn new(player_key: impl Into<String>, generator: LootGenerator, seed: u64) -> Self {
        Self {
            player_key: player_key.into(),
            state: PlayerEconomyState::default(),
            tradeup: TradeUpEngine::new(generator),
            rng: ChaCha20Rng::seed_from_u64(seed),
            expedition: false,
            events: EventQueue::new(),
        }
    }

    /// Session hydrated from persisted data: balance plus permanent-tier
    /// items. Non-permanent inventory is session-only and starts empty.
    #[must_use]
    pub fn hydrate(
        player_key: impl Into<String>,
        generator: LootGenerator,
        seed: u64,
        saved: SaveData,
    ) -> Self {
        let mut coordinator = Self::new(player_key, generator, seed);
        coordinator.state.ledger = FragmentLedger::with_balance(saved.balance);
        let catalog = coordinator.catalog();
        for item in saved.legendary_items {
            coordinator
                .state
                .inventory
                .add_item(ItemInstance::from_saved(item, catalog));
        }
        coordinator
    }

    #[must_use]
    pub fn player_key(&self) -> &str {
        &self.player_key
    }

    #[must_use]
    pub fn state(&self) -> &PlayerEconomyState {
        &self.state
    }

    #[must_use]
    pub fn inventory(&self) -> &Inventory {
        &self.state.inventory
    }

    #[must_use]
    pub fn balance(&self) -> i64 {
        self.state.ledger.balance()
    }

    fn catalog(&self) -> &'static Catalog {
        self.tradeup_generator().catalog()
    }

    fn tradeup_generator(&self) -> LootGenerator {
        // The engine owns the injected generator; reuse it for hydration
        // lookups so the whole session shares one catalog.
        self.tradeup.generator()
    }

    /// Capacity currently in force: restricted while on an expedition,
    /// full otherwise.
    #[must_use]
    pub fn effective_capacity(&self) -> usize {
        if self.expedition {
            EXPEDITION_CAPACITY
        } else {
            FULL_CAPACITY
        }
    }

    /// Whether the session is currently in expedition (restricted) mode.
    #[must_use]
    pub fn expedition_mode(&self) -> bool {
        self.expedition
    }

    /// Switch between full and expedition capacity. Idempotent; switching
    /// back to full never evicts items even if the inventory exceeds the
    /// new limit.
    pub fn set_expedition_mode(&mut self, active: bool) {
        if self.expedition == active {
            return;
        }
        self.expedition = active;
        self.events.push(EconomyEvent::ExpeditionChanged {
            active,
            capacity: self.effective_capacity(),
        });
    }

    /// Add an item, enforcing the effective capacity. Returns false with
    /// no mutation when the inventory is full or the id is a duplicate.
    pub fn add_item(&mut self, item: ItemInstance) -> bool {
        if self.state.inventory.count() >= self.effective_capacity() {
            return false;
        }
        let accepted = self.state.inventory.add_item(item.clone());
        if accepted {
            self.events.push(EconomyEvent::ItemAdded { item });
        }
        accepted
    }

    /// Remove an item by unique id (drop, hand-off to another system).
    pub fn remove_item(&mut self, unique_id: &str) -> Option<ItemInstance> {
        let removed = self.state.inventory.remove_item(unique_id)?;
        self.events.push(EconomyEvent::ItemRemoved {
            unique_id: removed.unique_id.clone(),
        });
        Some(removed)
    }

    /// Sell one owned item. `None` when the id is not in the inventory;
    /// a permanent-tier item stays owned and reports `(0, not sold)`.
    pub fn sell_item(&mut self, unique_id: &str) -> Option<SaleOutcome> {
        let item = self.state.inventory.get_item(unique_id)?.clone();
        let outcome = self.state.ledger.sell(&item, self.catalog());
        if outcome.sold {
            self.state.inventory.remove_item(unique_id);
            self.events.push(EconomyEvent::SaleCompleted {
                earned: outcome.earned,
                sold_count: 1,
            });
            self.events.push(EconomyEvent::BalanceChanged {
                balance: self.balance(),
                delta: outcome.earned,
            });
        }
        Some(outcome)
    }

    /// Sell every sellable item, leaving permanent-tier items owned.
    pub fn sell_all(&mut self) -> BulkSaleOutcome {
        let items = self.state.inventory.all_items();
        let outcome = self.state.ledger.sell_bulk(&items, self.catalog());
        let catalog = self.catalog();
        for item in &items {
            if !catalog.is_permanent(&item.rarity) {
                self.state.inventory.remove_item(&item.unique_id);
            }
        }
        if outcome.sold_count > 0 {
            self.events.push(EconomyEvent::SaleCompleted {
                earned: outcome.total_earned,
                sold_count: outcome.sold_count,
            });
            self.events.push(EconomyEvent::BalanceChanged {
                balance: self.balance(),
                delta: outcome.total_earned,
            });
        }
        outcome
    }

    /// Execute a five-to-one fusion on owned items.
    ///
    /// # Errors
    ///
    /// Any [`TradeUpError`]; the inventory is unchanged on failure.
    pub fn trade_up(&mut self, unique_ids: &[String]) -> Result<ItemInstance, TradeUpError> {
        let consumed_item_id = self
            .state
            .inventory
            .get_item(unique_ids.first().map_or("", String::as_str))
            .map(|i| i.item_id.clone())
            .unwrap_or_default();
        let new_item =
            self.tradeup
                .execute_trade_up(&mut self.state.inventory, unique_ids, &mut self.rng)?;
        self.events.push(EconomyEvent::TradeUpCompleted {
            consumed_item_id,
            new_item: new_item.clone(),
        });
        Ok(new_item)
    }

    /// Fusable groups for eligibility display.
    #[must_use]
    pub fn available_trade_ups(&self) -> Vec<TradeUpCandidate> {
        self.tradeup.available_trade_ups(&self.state.inventory)
    }

    /// Death penalty: wipe everything below the permanent tier and return
    /// the removed items for the caller's presentation.
    pub fn on_death(&mut self) -> Vec<ItemInstance> {
        let removed = self.state.inventory.clear_non_legendary(self.catalog());
        self.state.total_runs += 1;
        if !removed.is_empty() {
            self.events.push(EconomyEvent::DeathWipe {
                removed_count: removed.len(),
            });
        }
        removed
    }

    /// Mark a completed expedition run for the level/prestige bookkeeping.
    pub fn on_run_completed(&mut self) {
        self.state.total_runs += 1;
        self.state.level = self.state.total_runs / 5 + 1;
    }

    /// Take all pending notifications, leaving the queue empty.
    pub fn drain_events(&mut self) -> Vec<EconomyEvent> {
        self.events.drain(..).collect()
    }

    /// The persisted slice of this session: balance plus permanent items.
    #[must_use]
    pub fn snapshot(&self) -> SaveData {
        let permanent = &self.catalog().highest_tier().name;
        SaveData {
            balance: self.balance(),
            legendary_items: self
                .state
                .inventory
                .items_by_rarity(permanent)
                .into_iter()
                .map(ItemInstance::to_saved)
                .collect(),
        }
    }
}
