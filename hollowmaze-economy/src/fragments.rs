//! Fragment currency ledger and sale rules.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Catalog;
use crate::item::ItemInstance;

/// Validation failures for ledger operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("fragment amount must not be negative, got {0}")]
    InvalidAmount(i64),
}

/// Outcome of a single sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleOutcome {
    /// Fragments credited; 0 when the item refused sale.
    pub earned: i64,
    /// Whether the item was actually sold.
    pub sold: bool,
}

/// Outcome of a bulk sale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkSaleOutcome {
    pub total_earned: i64,
    pub sold_count: usize,
}

/// A non-negative fragment balance with credit/debit/sale operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentLedger {
    balance: i64,
}

impl FragmentLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hydrate a ledger from a persisted balance, clamped to non-negative.
    #[must_use]
    pub fn with_balance(balance: i64) -> Self {
        Self {
            balance: balance.max(0),
        }
    }

    #[must_use]
    pub fn balance(&self) -> i64 {
        self.balance
    }

    /// Add fragments, returning the new balance.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidAmount`] for negative amounts.
    pub fn credit(&mut self, amount: i64) -> Result<i64, LedgerError> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        self.balance = self.balance.saturating_add(amount);
        Ok(self.balance)
    }

    /// Spend fragments. Returns true and decrements only when the balance
    /// covers the amount; otherwise the balance is untouched.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidAmount`] for negative amounts.
    pub fn debit(&mut self, amount: i64) -> Result<bool, LedgerError> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        if self.balance < amount {
            return Ok(false);
        }
        self.balance -= amount;
        Ok(true)
    }

    /// Sell one item. Permanent-tier items refuse sale as a business rule
    /// (earned 0, not sold, balance untouched), never as an error.
    pub fn sell(&mut self, item: &ItemInstance, catalog: &Catalog) -> SaleOutcome {
        if catalog.is_permanent(&item.rarity) {
            return SaleOutcome {
                earned: 0,
                sold: false,
            };
        }
        // Rolled values are non-negative by construction.
        self.balance = self.balance.saturating_add(item.value.max(0));
        SaleOutcome {
            earned: item.value.max(0),
            sold: true,
        }
    }

    /// Sell a batch, silently skipping permanent-tier items. The total is
    /// computed over the whole slice before the single credit, so no
    /// partial-credit state is ever observable.
    pub fn sell_bulk(&mut self, items: &[ItemInstance], catalog: &Catalog) -> BulkSaleOutcome {
        let mut outcome = BulkSaleOutcome::default();
        for item in items {
            if catalog.is_permanent(&item.rarity) {
                continue;
            }
            outcome.total_earned = outcome.total_earned.saturating_add(item.value.max(0));
            outcome.sold_count += 1;
        }
        self.balance = self.balance.saturating_add(outcome.total_earned);
        outcome
    }
}
