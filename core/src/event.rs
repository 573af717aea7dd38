//! One-shot event participation.
//!
//! Participation is admitted by the windowed limiter and persisted
//! before any reward is computed, so a crash between the two costs
//! the entity a participation rather than minting free rewards.

use crate::{
    clock::Clock,
    config::WishConfig,
    dispatch::RewardDispatcher,
    error::{CoreError, CoreResult},
    rng::{RandomSource, SeededRng},
    store::StateVault,
    tree::RewardResult,
    window::EntitlementWindowLimiter,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

fn event_limit_prefix(event_id: &str) -> String {
    format!("event.limits.{event_id}")
}

/// One row of the availability listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventAvailability {
    pub event: String,
    pub name: String,
    pub can_participate: bool,
    /// Milliseconds until the limit window admits again; 0 when it
    /// already does.
    pub refresh_in_ms: i64,
}

pub struct EventEngine {
    config: Arc<WishConfig>,
    vault: Arc<StateVault>,
    dispatcher: Arc<dyn RewardDispatcher>,
    clock: Arc<dyn Clock>,
    rng: Mutex<Box<dyn RandomSource + Send>>,
}

impl EventEngine {
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

    /// Participate once in an event, returning the dispatched rewards
    /// in draw order.
    pub fn participate(
        &self,
        entity: &str,
        event_id: &str,
    ) -> CoreResult<Vec<RewardResult>> {
        let event = self
            .config
            .events
            .get(event_id)
            .ok_or_else(|| CoreError::EventNotFound { event: event_id.to_string() })?;
        let now = self.clock.now_millis();
        if !event.enabled || !event.is_active(now) {
            return Err(CoreError::EventClosed { event: event_id.to_string() });
        }

        let (limit_count, window_ms) = event
            .limit
            .map(|l| (l.count as i64, l.window_ms))
            .unwrap_or((0, 0));

        // Mark the participation first; the save happens inside the
        // vault update, before any reward exists.
        self.vault.update(entity, |record| {
            let admitted = EntitlementWindowLimiter::try_consume(
                record,
                &event_limit_prefix(event_id),
                limit_count,
                window_ms,
                now,
                1,
            );
            if !admitted {
                return Err(CoreError::LimitReached { key: event_id.to_string() });
            }
            Ok(())
        })?;

        let results = {
            let mut rng = self.rng.lock();
            if event.grant_all {
                event.rewards.grant_all(&mut **rng)
            } else {
                let rolls = event.reward_rolls.max(1);
                (0..rolls)
                    .map(|_| event.rewards.sample(&mut **rng))
                    .collect()
            }
        };

        for reward in &results {
            self.dispatcher.dispatch(entity, reward);
        }
        Ok(results)
    }

    /// Enabled, in-window events with the entity's standing on each.
    /// Sorted by event id for stable output.
    pub fn list_available(&self, entity: &str) -> CoreResult<Vec<EventAvailability>> {
        let now = self.clock.now_millis();
        self.vault.read(entity, |record| {
            let mut out: Vec<EventAvailability> = self
                .config
                .events
                .values()
                .filter(|event| event.enabled && event.is_active(now))
                .map(|event| {
                    let (limit_count, window_ms) = event
                        .limit
                        .map(|l| (l.count as i64, l.window_ms))
                        .unwrap_or((0, 0));
                    let refresh = EntitlementWindowLimiter::refresh_in_ms(
                        record,
                        &event_limit_prefix(&event.id),
                        limit_count,
                        window_ms,
                        now,
                    );
                    EventAvailability {
                        event: event.id.clone(),
                        name: event.name.clone(),
                        can_participate: refresh == 0,
                        refresh_in_ms: refresh,
                    }
                })
                .collect();
            out.sort_by(|a, b| a.event.cmp(&b.event));
            out
        })
    }
}
