//! Hollowmaze Economy Engine
//!
//! Platform-agnostic loot economy for the Hollowmaze horror-maze game:
//! weighted rarity rolling, item generation, inventories, the fragment
//! currency, five-to-one trade-up fusion, and per-session coordination.
//! World generation, entity AI, rendering, and networking live in the host
//! runtime and talk to this crate through plain data at the seams.

pub mod catalog;
pub mod constants;
pub mod fragments;
pub mod inventory;
pub mod item;
pub mod loot;
pub mod persist;
pub mod session;
pub mod tradeup;

#[cfg(feature = "async")]
pub mod actor;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogError, FollowerInfo, ItemDefinition, PowerUp, RarityTier, catalog};
pub use fragments::{BulkSaleOutcome, FragmentLedger, LedgerError, SaleOutcome};
pub use inventory::{Inventory, SavedInventory};
pub use item::{ItemInstance, SavedItem, mint_unique_id};
pub use loot::{LootError, LootGenerator};
pub use persist::{MemoryStore, PersistError, SaveData, SaveStore};
pub use session::{EconomyCoordinator, EconomyEvent, EventQueue, PlayerEconomyState};
pub use tradeup::{
    TRADE_UP_INPUT_COUNT, TradeUpBlock, TradeUpCandidate, TradeUpEngine, TradeUpError,
};

#[cfg(feature = "async")]
pub use actor::{Session, SessionClosed, SessionHandle, spawn_session};

#[cfg(feature = "async")]
pub use persist::{load_with_retry, save_with_retry};
