//! Single actor per player session.
//!
//! One task owns the coordinator and processes commands one at a time, so
//! validate-then-execute sequences (trade-up, capacity check then insert)
//! cannot interleave. Persistence runs on the same task with bounded
//! retries; a shutdown stops new commands but lets the final save finish.
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::constants::AUTOSAVE_INTERVAL_SECS;
use crate::fragments::{BulkSaleOutcome, SaleOutcome};
use crate::item::ItemInstance;
use crate::loot::LootGenerator;
use crate::persist::{SaveStore, load_with_retry, save_with_retry};
use crate::session::{EconomyCoordinator, EconomyEvent};
use crate::tradeup::{TradeUpCandidate, TradeUpError};

/// The session has begun teardown and accepts no further commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("economy session is shut down")]
pub struct SessionClosed;

enum Command {
    AddItem(ItemInstance, oneshot::Sender<bool>),
    RemoveItem(String, oneshot::Sender<Option<ItemInstance>>),
    SellItem(String, oneshot::Sender<Option<SaleOutcome>>),
    SellAll(oneshot::Sender<BulkSaleOutcome>),
    TradeUp(Vec<String>, oneshot::Sender<Result<ItemInstance, TradeUpError>>),
    AvailableTradeUps(oneshot::Sender<Vec<TradeUpCandidate>>),
    SetExpedition(bool, oneshot::Sender<usize>),
    Death(oneshot::Sender<Vec<ItemInstance>>),
    Balance(oneshot::Sender<i64>),
    DrainEvents(oneshot::Sender<Vec<EconomyEvent>>),
    Shutdown,
}

/// Cheap cloneable handle to one player's session actor.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
}

/// A spawned session: the command handle plus the join handle used to
/// await teardown.
pub struct Session {
    pub handle: SessionHandle,
    task: JoinHandle<()>,
}

impl Session {
    /// Begin teardown: stop accepting commands, run the final save, and
    /// wait for the actor task to finish. Queued commands behind the
    /// shutdown marker are discarded; commands sent through surviving
    /// handle clones fail with [`SessionClosed`].
    pub async fn shutdown(self) {
        let Session { handle, task } = self;
        let _ = handle.tx.send(Command::Shutdown).await;
        drop(handle);
        if task.await.is_err() {
            warn!("session task panicked during shutdown");
        }
    }
}

/// Spawn the actor for one player, hydrating from the store first.
///
/// The load is retried with bounded attempts; gameplay is never blocked
/// on the store. If the load still fails after retries the session runs
/// unhydrated and all of its saves are suppressed, so a transient outage
/// can never overwrite a player's persisted balance and permanent items
/// with an empty snapshot.
#[must_use]
pub async fn spawn_session(
    player_key: &str,
    generator: LootGenerator,
    store: Arc<dyn SaveStore>,
    seed: u64,
) -> Session {
    let (coordinator, hydrated) = match load_with_retry(store.as_ref(), player_key).await {
        Ok(Some(saved)) => (
            EconomyCoordinator::hydrate(player_key, generator, seed, saved),
            true,
        ),
        Ok(None) => (EconomyCoordinator::new(player_key, generator, seed), true),
        Err(err) => {
            warn!("load for {player_key} failed, running unhydrated without saves: {err}");
            (EconomyCoordinator::new(player_key, generator, seed), false)
        }
    };

    let (tx, rx) = mpsc::channel(32);
    let task = tokio::spawn(run_session(coordinator, store, rx, hydrated));
    Session {
        handle: SessionHandle { tx },
        task,
    }
}

async fn run_session(
    mut coordinator: EconomyCoordinator,
    store: Arc<dyn SaveStore>,
    mut rx: mpsc::Receiver<Command>,
    hydrated: bool,
) {
    let mut autosave = tokio::time::interval(Duration::from_secs(AUTOSAVE_INTERVAL_SECS));
    autosave.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick fires immediately; swallow it so autosaves are spaced.
    autosave.tick().await;

    loop {
        tokio::select! {
            command = rx.recv() => {
                match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => apply(&mut coordinator, command),
                }
            }
            _ = autosave.tick() => {
                if hydrated {
                    let snapshot = coordinator.snapshot();
                    if save_with_retry(store.as_ref(), coordinator.player_key(), &snapshot)
                        .await
                        .is_err()
                    {
                        // Already logged; in-memory state stays authoritative.
                    }
                }
            }
        }
    }

    if hydrated {
        // Best-effort final save; failures are logged by the saver.
        let snapshot = coordinator.snapshot();
        let _ = save_with_retry(store.as_ref(), coordinator.player_key(), &snapshot).await;
    } else {
        warn!(
            "session for {} was never hydrated; skipping final save to protect stored data",
            coordinator.player_key()
        );
    }
    info!("session for {} torn down", coordinator.player_key());
}

fn apply(coordinator: &mut EconomyCoordinator, command: Command) {
    // A dropped reply receiver just means the caller gave up waiting.
    match command {
        Command::AddItem(item, reply) => {
            let _ = reply.send(coordinator.add_item(item));
        }
        Command::RemoveItem(id, reply) => {
            let _ = reply.send(coordinator.remove_item(&id));
        }
        Command::SellItem(id, reply) => {
            let _ = reply.send(coordinator.sell_item(&id));
        }
        Command::SellAll(reply) => {
            let _ = reply.send(coordinator.sell_all());
        }
        Command::TradeUp(ids, reply) => {
            let _ = reply.send(coordinator.trade_up(&ids));
        }
        Command::AvailableTradeUps(reply) => {
            let _ = reply.send(coordinator.available_trade_ups());
        }
        Command::SetExpedition(active, reply) => {
            coordinator.set_expedition_mode(active);
            let _ = reply.send(coordinator.effective_capacity());
        }
        Command::Death(reply) => {
            let _ = reply.send(coordinator.on_death());
        }
        Command::Balance(reply) => {
            let _ = reply.send(coordinator.balance());
        }
        Command::DrainEvents(reply) => {
            let _ = reply.send(coordinator.drain_events());
        }
        // Intercepted by the actor loop before dispatch.
        Command::Shutdown => {}
    }
}

impl SessionHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionClosed> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| SessionClosed)?;
        reply_rx.await.map_err(|_| SessionClosed)
    }

    /// Add an item, subject to the effective capacity.
    ///
    /// # Errors
    ///
    /// [`SessionClosed`] once teardown has begun.
    pub async fn add_item(&self, item: ItemInstance) -> Result<bool, SessionClosed> {
        self.request(|reply| Command::AddItem(item, reply)).await
    }

    /// Remove an item by unique id.
    ///
    /// # Errors
    ///
    /// [`SessionClosed`] once teardown has begun.
    pub async fn remove_item(&self, unique_id: &str) -> Result<Option<ItemInstance>, SessionClosed> {
        let id = unique_id.to_string();
        self.request(|reply| Command::RemoveItem(id, reply)).await
    }

    /// Sell one owned item.
    ///
    /// # Errors
    ///
    /// [`SessionClosed`] once teardown has begun.
    pub async fn sell_item(&self, unique_id: &str) -> Result<Option<SaleOutcome>, SessionClosed> {
        let id = unique_id.to_string();
        self.request(|reply| Command::SellItem(id, reply)).await
    }

    /// Sell everything sellable.
    ///
    /// # Errors
    ///
    /// [`SessionClosed`] once teardown has begun.
    pub async fn sell_all(&self) -> Result<BulkSaleOutcome, SessionClosed> {
        self.request(Command::SellAll).await
    }

    /// Fuse five identical items into one of the next tier.
    ///
    /// # Errors
    ///
    /// [`SessionClosed`] once teardown has begun.
    pub async fn trade_up(
        &self,
        unique_ids: Vec<String>,
    ) -> Result<Result<ItemInstance, TradeUpError>, SessionClosed> {
        self.request(|reply| Command::TradeUp(unique_ids, reply)).await
    }

    /// Fusable groups for display.
    ///
    /// # Errors
    ///
    /// [`SessionClosed`] once teardown has begun.
    pub async fn available_trade_ups(&self) -> Result<Vec<TradeUpCandidate>, SessionClosed> {
        self.request(Command::AvailableTradeUps).await
    }

    /// Flip expedition mode; resolves to the new effective capacity.
    ///
    /// # Errors
    ///
    /// [`SessionClosed`] once teardown has begun.
    pub async fn set_expedition_mode(&self, active: bool) -> Result<usize, SessionClosed> {
        self.request(|reply| Command::SetExpedition(active, reply)).await
    }

    /// Apply the death penalty; resolves to the removed items.
    ///
    /// # Errors
    ///
    /// [`SessionClosed`] once teardown has begun.
    pub async fn on_death(&self) -> Result<Vec<ItemInstance>, SessionClosed> {
        self.request(Command::Death).await
    }

    /// Current fragment balance.
    ///
    /// # Errors
    ///
    /// [`SessionClosed`] once teardown has begun.
    pub async fn balance(&self) -> Result<i64, SessionClosed> {
        self.request(Command::Balance).await
    }

    /// Take pending presentation notifications.
    ///
    /// # Errors
    ///
    /// [`SessionClosed`] once teardown has begun.
    pub async fn drain_events(&self) -> Result<Vec<EconomyEvent>, SessionClosed> {
        self.request(Command::DrainEvents).await
    }
}
