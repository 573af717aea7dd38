//! The pull engine.
//!
//! One pull is a bounded single-entity transaction: validate, debit
//! tickets, draw, persist once. Everything that touches the entity's
//! record runs under that entity's lock in the vault.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. resolve pool, check activity window, check count
//!   2. consume the pool's participation window, if configured
//!   3. debit tickets, all or nothing
//!   4. draw `count` rewards, advancing the pity counter per draw
//!   5. persist counters and balance in a single save

use crate::{
    clock::Clock,
    config::WishConfig,
    dispatch::RewardDispatcher,
    error::{CoreError, CoreResult},
    rng::{RandomSource, SeededRng},
    store::StateVault,
    tree::RewardResult,
    window::{EntitlementWindowLimiter, ThresholdReached, WindowedCounter},
};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

pub fn pity_key(counts_name: &str) -> String {
    format!("wish.counts.{counts_name}")
}

pub fn ticket_key(ticket_id: &str) -> String {
    format!("wish.tickets.{ticket_id}")
}

fn pool_limit_prefix(pool_id: &str) -> String {
    format!("wish.limits.{pool_id}")
}

/// Snapshot of an entity's standing on one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WishStatus {
    pub pool: String,
    pub pity_count: i64,
    pub tickets: i64,
}

pub struct WishEngine {
    config: Arc<WishConfig>,
    vault: Arc<StateVault>,
    dispatcher: Arc<dyn RewardDispatcher>,
    clock: Arc<dyn Clock>,
    rng: Mutex<Box<dyn RandomSource + Send>>,
}

impl WishEngine {
    pub fn new(
        config: Arc<WishConfig>,
        vault: Arc<StateVault>,
        dispatcher: Arc<dyn RewardDispatcher>,
        clock: Arc<dyn Clock>,
        seed: u64,
    ) -> Self {
        Self::with_random_source(
            config,
            vault,
            dispatcher,
            clock,
            Box::new(SeededRng::seed_from(seed)),
        )
    }

    /// Build with an explicit draw source. Tests use this to rig
    /// specific outcomes.
    pub fn with_random_source(
        config: Arc<WishConfig>,
        vault: Arc<StateVault>,
        dispatcher: Arc<dyn RewardDispatcher>,
        clock: Arc<dyn Clock>,
        rng: Box<dyn RandomSource + Send>,
    ) -> Self {
        Self { config, vault, dispatcher, clock, rng: Mutex::new(rng) }
    }

    /// Perform `count` draws on a pool for one entity.
    ///
    /// Results come back in draw order. Each result has already been
    /// handed to the dispatcher; dispatch is not transactional with
    /// persistence.
    pub fn pull(
        &self,
        entity: &str,
        pool_id: &str,
        count: i64,
    ) -> CoreResult<Vec<RewardResult>> {
        let pool = self
            .config
            .pools
            .get(pool_id)
            .ok_or_else(|| CoreError::PoolNotFound { pool: pool_id.to_string() })?;
        let now = self.clock.now_millis();
        if !pool.is_active(now) {
            return Err(CoreError::PoolInactive { pool: pool_id.to_string() });
        }
        if count <= 0 {
            return Err(CoreError::InvalidCount { count });
        }

        let ticket_rule = self.config.find_ticket(pool_id);

        self.vault.update(entity, |record| {
            if let Some(limit) = &pool.limit {
                let admitted = EntitlementWindowLimiter::try_consume(
                    record,
                    &pool_limit_prefix(pool_id),
                    limit.count as i64,
                    limit.window_ms,
                    now,
                    count,
                );
                if !admitted {
                    return Err(CoreError::LimitReached { key: pool_id.to_string() });
                }
            }

            if let Some(rule) = ticket_rule {
                let key = ticket_key(&rule.id);
                let owned = record.get_int(&key);
                let needed = rule.deduct_count as i64 * count;
                if owned < needed {
                    return Err(CoreError::InsufficientTickets { owned, needed });
                }
                record.set_int(&key, owned - needed);
            }

            let key = pity_key(&pool.counts_name);
            let mut pity = WindowedCounter::load_scalar(record, &key);
            let threshold = ThresholdReached { max: pool.max_pity as i64 };

            let mut rng = self.rng.lock();
            let mut results = Vec::with_capacity(count as usize);
            for _ in 0..count {
                pity.used += 1;
                let reward = if pity.reset_if_expired(&threshold, now) {
                    log::debug!(
                        "guarantee fired for '{entity}' on counts '{}'",
                        pool.counts_name
                    );
                    pool.guarantee_items
                        .as_ref()
                        .unwrap_or(&pool.items)
                        .sample(&mut **rng)
                } else {
                    pool.items.sample(&mut **rng)
                };
                self.dispatcher.dispatch(entity, &reward);
                results.push(reward);
            }
            pity.store_scalar(record, &key);
            Ok(results)
        })
    }

    /// Current pity counter and ticket balance for a pool.
    pub fn query_status(&self, entity: &str, pool_id: &str) -> CoreResult<WishStatus> {
        let pool = self
            .config
            .pools
            .get(pool_id)
            .ok_or_else(|| CoreError::PoolNotFound { pool: pool_id.to_string() })?;
        let ticket_rule = self.config.find_ticket(pool_id);
        self.vault.read(entity, |record| WishStatus {
            pool: pool_id.to_string(),
            pity_count: record.get_int(&pity_key(&pool.counts_name)),
            tickets: ticket_rule
                .map(|rule| record.get_int(&ticket_key(&rule.id)))
                .unwrap_or(0),
        })
    }

    /// Credit tickets. Used by ops tooling and grant commands.
    /// Returns the new balance.
    pub fn grant_tickets(
        &self,
        entity: &str,
        ticket_id: &str,
        amount: i64,
    ) -> CoreResult<i64> {
        self.vault.update(entity, |record| {
            let key = ticket_key(ticket_id);
            let balance = record.get_int(&key) + amount;
            record.set_int(&key, balance);
            Ok(balance)
        })
    }
}
