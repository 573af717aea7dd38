//! Reward hand-off.
//!
//! The engines resolve rewards; executing the grant belongs to an
//! external collaborator. Dispatch is fire and forget: a dispatcher
//! must never fail the pull that produced the reward.

use crate::tree::RewardResult;

pub trait RewardDispatcher: Send + Sync {
    fn dispatch(&self, entity: &str, reward: &RewardResult);
}

/// Render a command template for a reward.
///
/// Substitutes {player}, {amount} and {item}. A leading slash is
/// stripped so the result can go straight to a console executor.
pub fn render_command(template: &str, entity: &str, reward: &RewardResult) -> String {
    let item = sanitize_item_name(&reward.name);
    let cmd = template
        .replace("{player}", entity)
        .replace("{amount}", &reward.amount.to_string())
        .replace("{item}", &item);
    cmd.strip_prefix('/').unwrap_or(&cmd).to_string()
}

/// Item names are reduced to [A-Za-z0-9:_.-] before they reach a
/// command line; an empty result becomes "unknown_reward".
pub fn sanitize_item_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '_' | '.' | '-'))
        .collect();
    if cleaned.is_empty() {
        "unknown_reward".to_string()
    } else {
        cleaned
    }
}

/// Logs rendered grants. Stands in for the console executor in
/// headless runs.
pub struct LoggingDispatcher;

impl RewardDispatcher for LoggingDispatcher {
    fn dispatch(&self, entity: &str, reward: &RewardResult) {
        match &reward.command {
            Some(template) => {
                log::info!("grant {entity}: {}", render_command(template, entity, reward));
            }
            None => {
                log::info!("grant {entity}: {} x{}", reward.name, reward.amount);
            }
        }
    }
}

/// Swallows everything. For wiring where grants do not matter.
pub struct NullDispatcher;

impl RewardDispatcher for NullDispatcher {
    fn dispatch(&self, _entity: &str, _reward: &RewardResult) {}
}
