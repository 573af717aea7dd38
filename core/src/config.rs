//! Configuration loading.
//!
//! Definitions are immutable after load. A reload builds a fresh
//! WishConfig and swaps the Arc; nothing mutates in place.
//!
//! RULE: a malformed entry is skipped with a warning. One bad pool,
//! ticket or event never takes down the rest of the file.

use crate::{
    error::{CoreError, CoreResult},
    tree::{RewardLeaf, RewardNode, WeightedRewardTree, MAX_TREE_DEPTH},
    types::{EpochMillis, EventId, PoolId, TicketId},
};
use serde_json::Value;
use std::collections::HashMap;

const MILLIS_PER_HOUR: i64 = 3_600_000;
const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;
const DAYS_PER_WEEK: i64 = 7;
const DAYS_PER_MONTH: i64 = 30;
const DAYS_PER_YEAR: i64 = 365;

// ── Time windows ───────────────────────────────────────────────────

/// Activity window with independently optional bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Option<EpochMillis>,
    pub end: Option<EpochMillis>,
}

impl TimeWindow {
    /// Half-open containment: [start, end).
    pub fn contains(&self, now: EpochMillis) -> bool {
        if let Some(start) = self.start {
            if now < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if now >= end {
                return false;
            }
        }
        true
    }

    fn from_value(value: Option<&Value>, context: &str) -> Option<Self> {
        let section = value?.as_object()?;
        let start = parse_instant_millis(section.get("startDate"), context);
        let end = parse_instant_millis(section.get("endDate"), context);
        if start.is_none() && end.is_none() {
            return None;
        }
        Some(Self { start, end })
    }
}

fn parse_instant_millis(value: Option<&Value>, context: &str) -> Option<EpochMillis> {
    let raw = value?.as_str()?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc().timestamp_millis());
    }
    log::warn!("{context}: unparseable date '{raw}', bound ignored");
    None
}

// ── Limit rules ────────────────────────────────────────────────────

/// Windowed participation limit: at most `count` units per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitRule {
    pub count: u32,
    pub window_ms: i64,
}

impl LimitRule {
    fn from_value(value: Option<&Value>, context: &str) -> Option<Self> {
        let section = value?.as_object()?;
        let count = section.get("count").and_then(Value::as_i64).unwrap_or(0);
        let window_ms = section
            .get("time")
            .and_then(Value::as_str)
            .map(|raw| parse_duration_millis(raw, context))
            .unwrap_or(0);
        if count <= 0 || window_ms <= 0 {
            return None;
        }
        Some(Self { count: count as u32, window_ms })
    }
}

/// Parse "<N><h|d|w|m|y>" into milliseconds. Unparseable input yields
/// 0, which disables the rule.
fn parse_duration_millis(raw: &str, context: &str) -> i64 {
    let raw = raw.trim();
    let Some(unit) = raw.chars().last() else {
        return 0;
    };
    let digits = &raw[..raw.len() - unit.len_utf8()];
    let value: i64 = match digits.parse() {
        Ok(v) => v,
        Err(_) => {
            log::warn!("{context}: unparseable duration '{raw}'");
            return 0;
        }
    };
    match unit.to_ascii_lowercase() {
        'h' => value * MILLIS_PER_HOUR,
        'd' => value * MILLIS_PER_DAY,
        'w' => value * DAYS_PER_WEEK * MILLIS_PER_DAY,
        'm' => value * DAYS_PER_MONTH * MILLIS_PER_DAY,
        'y' => value * DAYS_PER_YEAR * MILLIS_PER_DAY,
        _ => {
            log::warn!("{context}: unknown duration unit in '{raw}'");
            0
        }
    }
}

// ── Reward tables ──────────────────────────────────────────────────

fn tree_from_value(value: &Value, depth: usize, context: &str) -> CoreResult<WeightedRewardTree> {
    if depth > MAX_TREE_DEPTH {
        return Err(CoreError::CyclicConfig { max: MAX_TREE_DEPTH });
    }
    let Some(section) = value.as_object() else {
        log::warn!("{context}: reward table is not an object, treating as empty");
        return Ok(WeightedRewardTree::default());
    };
    let mut entries = Vec::with_capacity(section.len());
    for (name, raw) in section {
        match node_from_value(name, raw, depth, context)? {
            Some(node) => entries.push(node),
            None => log::warn!("{context}: skipping malformed entry '{name}'"),
        }
    }
    Ok(WeightedRewardTree::new(entries))
}

/// Entry shapes: a bare weight number (or numeric string), or an
/// object with probability / amount / command / name / subList.
fn node_from_value(
    name: &str,
    raw: &Value,
    depth: usize,
    context: &str,
) -> CoreResult<Option<RewardNode>> {
    match raw {
        Value::Number(n) => Ok(n.as_f64().map(|weight| simple_leaf(name, weight))),
        Value::String(s) => Ok(s.trim().parse::<f64>().ok().map(|weight| simple_leaf(name, weight))),
        Value::Object(section) => {
            let weight = section
                .get("probability")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            if let Some(sub) = section.get("subList") {
                let tree = tree_from_value(sub, depth + 1, context)?;
                return Ok(Some(RewardNode::Branch { weight, tree }));
            }
            let (amount_min, amount_max) = parse_amount(section.get("amount"));
            let command = section
                .get("command")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string);
            let display = section
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or(name);
            Ok(Some(RewardNode::Leaf(RewardLeaf {
                name: display.to_string(),
                amount_min,
                amount_max,
                command,
                weight,
            })))
        }
        _ => Ok(None),
    }
}

fn simple_leaf(name: &str, weight: f64) -> RewardNode {
    RewardNode::Leaf(RewardLeaf {
        name: name.to_string(),
        amount_min: 1,
        amount_max: 1,
        command: None,
        weight,
    })
}

/// Amounts come as an int or a "min-max" string. Minimum floor is 1;
/// an inverted range collapses to the minimum.
fn parse_amount(value: Option<&Value>) -> (i64, i64) {
    let (mut min, mut max) = match value {
        Some(Value::Number(n)) => {
            let v = n.as_i64().unwrap_or(1);
            (v, v)
        }
        Some(Value::String(s)) => match s.split_once('-') {
            Some((lo, hi)) => (
                lo.trim().parse().unwrap_or(1),
                hi.trim().parse().unwrap_or(1),
            ),
            None => {
                let v = s.trim().parse().unwrap_or(1);
                (v, v)
            }
        },
        _ => (1, 1),
    };
    if min <= 0 {
        min = 1;
    }
    if max < min {
        max = min;
    }
    (min, max)
}

// ── Definitions ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PoolDefinition {
    pub id: PoolId,
    /// Pity bucket key. Pools sharing a counts name share pity state.
    pub counts_name: String,
    /// Guarantee threshold; 0 disables the pity mechanism.
    pub max_pity: u32,
    pub items: WeightedRewardTree,
    pub guarantee_items: Option<WeightedRewardTree>,
    pub window: Option<TimeWindow>,
    pub limit: Option<LimitRule>,
}

impl PoolDefinition {
    fn from_value(id: &str, value: &Value) -> CoreResult<Self> {
        let section = value
            .as_object()
            .ok_or_else(|| anyhow::anyhow!("pool '{id}' is not an object"))?;
        let context = format!("pool '{id}'");
        let counts_name = section
            .get("counts_name")
            .and_then(Value::as_str)
            .unwrap_or(id)
            .to_string();
        let max_pity = section
            .get("max_count")
            .and_then(Value::as_i64)
            .unwrap_or(0)
            .max(0) as u32;
        let items = match section.get("items") {
            Some(raw) => tree_from_value(raw, 1, &context)?,
            None => WeightedRewardTree::default(),
        };
        let guarantee_items = match section.get("guarantee_items") {
            Some(raw) => Some(tree_from_value(raw, 1, &context)?),
            None => None,
        };
        Ok(Self {
            id: id.to_string(),
            counts_name,
            max_pity,
            items,
            guarantee_items,
            window: TimeWindow::from_value(section.get("duration"), &context),
            limit: LimitRule::from_value(section.get("limit_modes"), &context),
        })
    }

    pub fn is_active(&self, now: EpochMillis) -> bool {
        self.window.map_or(true, |w| w.contains(now))
    }
}

/// Gate on pulls: the first rule (declaration order) whose pool set
/// contains the pool applies. At most one rule per pool is an
/// authoring constraint, not something this crate arbitrates.
#[derive(Debug, Clone)]
pub struct TicketRule {
    pub id: TicketId,
    pub applicable_pools: Vec<PoolId>,
    pub deduct_count: u32,
}

impl TicketRule {
    fn from_value(value: &Value) -> CoreResult<Self> {
        let section = value
            .as_object()
            .ok_or_else(|| anyhow::anyhow!("ticket rule is not an object"))?;
        let id = section
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("ticket rule has no id"))?
            .to_string();
        let applicable_pools = section
            .get("applicable_pools")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let deduct_count = section
            .get("deduct_count")
            .and_then(Value::as_i64)
            .unwrap_or(1)
            .max(1) as u32;
        Ok(Self { id, applicable_pools, deduct_count })
    }
}

#[derive(Debug, Clone)]
pub struct EventDefinition {
    pub id: EventId,
    pub name: String,
    pub enabled: bool,
    pub window: Option<TimeWindow>,
    pub limit: Option<LimitRule>,
    pub rewards: WeightedRewardTree,
    /// Independent Bernoulli trial per entry instead of weighted draws.
    pub grant_all: bool,
    /// Number of weighted draws when grant_all is off. Floor 1.
    pub reward_rolls: u32,
}

impl EventDefinition {
    fn from_value(id: &str, value: &Value) -> CoreResult<Self> {
        let section = value
            .as_object()
            .ok_or_else(|| anyhow::anyhow!("event '{id}' is not an object"))?;
        let context = format!("event '{id}'");
        let rewards = match section.get("rewards") {
            Some(raw) => tree_from_value(raw, 1, &context)?,
            None => WeightedRewardTree::default(),
        };
        Ok(Self {
            id: id.to_string(),
            name: section
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or(id)
                .to_string(),
            enabled: section
                .get("enabled")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            window: TimeWindow::from_value(section.get("duration"), &context),
            limit: LimitRule::from_value(section.get("limit_modes"), &context),
            rewards,
            grant_all: section
                .get("grant_all")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            reward_rolls: section
                .get("reward_rolls")
                .and_then(Value::as_i64)
                .unwrap_or(1)
                .max(1) as u32,
        })
    }

    pub fn is_active(&self, now: EpochMillis) -> bool {
        self.window.map_or(true, |w| w.contains(now))
    }
}

// ── The full config ────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct WishConfig {
    pub pools: HashMap<PoolId, PoolDefinition>,
    pub tickets: Vec<TicketRule>,
    pub events: HashMap<EventId, EventDefinition>,
}

impl WishConfig {
    /// Load from a JSON file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read {path}: {e}"))?;
        let root: Value = serde_json::from_str(&content)?;
        Ok(Self::from_value(&root))
    }

    /// Build from an already-parsed document, skipping malformed
    /// entries with a warning.
    pub fn from_value(root: &Value) -> Self {
        let mut config = Self::default();

        if let Some(pools) = root.get("pools").and_then(Value::as_object) {
            for (id, raw) in pools {
                match PoolDefinition::from_value(id, raw) {
                    Ok(pool) => {
                        config.pools.insert(id.clone(), pool);
                    }
                    Err(e) => log::warn!("skipping pool '{id}': {e}"),
                }
            }
        }

        if let Some(tickets) = root.get("tickets").and_then(Value::as_array) {
            for raw in tickets {
                match TicketRule::from_value(raw) {
                    Ok(rule) => config.tickets.push(rule),
                    Err(e) => log::warn!("skipping ticket rule: {e}"),
                }
            }
        }

        if let Some(events) = root.get("events").and_then(Value::as_object) {
            for (id, raw) in events {
                match EventDefinition::from_value(id, raw) {
                    Ok(event) => {
                        config.events.insert(id.clone(), event);
                    }
                    Err(e) => log::warn!("skipping event '{id}': {e}"),
                }
            }
        }

        config
    }

    /// First ticket rule claiming this pool, in declaration order.
    pub fn find_ticket(&self, pool: &str) -> Option<&TicketRule> {
        self.tickets
            .iter()
            .find(|rule| rule.applicable_pools.iter().any(|p| p == pool))
    }

    /// Config with hardcoded defaults for use in tests and demos.
    pub fn default_test() -> Self {
        let root = serde_json::json!({
            "pools": {
                "standard": {
                    "counts_name": "standard",
                    "max_count": 10,
                    "items": {
                        "iron_ingot": { "probability": 70.0, "amount": "2-5" },
                        "gold_ingot": {
                            "probability": 25.0,
                            "amount": 2,
                            "command": "give {player} {item} {amount}"
                        },
                        "relic_crate": {
                            "probability": 5.0,
                            "subList": {
                                "relic_sword": 1.0,
                                "relic_totem": 1.0
                            }
                        }
                    },
                    "guarantee_items": {
                        "starlight_blade": {
                            "probability": 1.0,
                            "command": "give {player} {item} 1"
                        }
                    }
                }
            },
            "tickets": [
                {
                    "id": "standard_ticket",
                    "applicable_pools": ["standard"],
                    "deduct_count": 1
                }
            ],
            "events": {
                "daily_blessing": {
                    "name": "Daily Blessing",
                    "enabled": true,
                    "limit_modes": { "count": 1, "time": "1d" },
                    "rewards": { "coin_pouch": 0.9, "lucky_charm": 0.1 },
                    "grant_all": false,
                    "reward_rolls": 1
                }
            }
        });
        Self::from_value(&root)
    }
}
