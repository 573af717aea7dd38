//! wish-runner: headless driver for the reward distribution core.
//!
//! Usage:
//!   wish-runner --config wish_config.json --db wishes.db --entity Alice pull standard 10
//!   wish-runner --entity Alice participate daily_blessing
//!   wish-runner --entity Alice status standard
//!   wish-runner --entity Alice events
//!   wish-runner --entity Alice grant-tickets standard_ticket 10
//!   wish-runner --demo
//!
//! Without --config the built-in test config is used; without --db the
//! store lives in memory and vanishes at exit.

use anyhow::Result;
use std::env;
use std::sync::Arc;
use wishwell_core::{
    clock::SystemClock,
    config::WishConfig,
    dispatch::LoggingDispatcher,
    event::EventEngine,
    store::{SqliteStateStore, StateVault},
    wish::WishEngine,
};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let entity = parse_str_arg(&args, "--entity").unwrap_or_else(|| "demo_player".to_string());
    let db = parse_str_arg(&args, "--db");
    let config_path = parse_str_arg(&args, "--config");
    let demo = args.iter().any(|a| a == "--demo");

    let config = match &config_path {
        Some(path) => WishConfig::load(path)?,
        None => WishConfig::default_test(),
    };

    let store = match &db {
        Some(path) => SqliteStateStore::open(path)?,
        None => SqliteStateStore::in_memory()?,
    };
    store.migrate()?;

    let config = Arc::new(config);
    let vault = Arc::new(StateVault::new(Arc::new(store)));
    let dispatcher = Arc::new(LoggingDispatcher);
    let clock = Arc::new(SystemClock);

    let wishes = WishEngine::new(
        config.clone(),
        vault.clone(),
        dispatcher.clone(),
        clock.clone(),
        seed,
    );
    let events = EventEngine::new(config.clone(), vault, dispatcher, clock, seed ^ 1);

    if demo {
        return run_demo(&wishes, &events, &entity);
    }

    let positional = positionals(&args);
    match positional.first().map(String::as_str) {
        Some("pull") => {
            let pool = positional.get(1).map(String::as_str).unwrap_or("standard");
            let count: i64 = positional.get(2).and_then(|c| c.parse().ok()).unwrap_or(1);
            let results = wishes.pull(&entity, pool, count)?;
            for (i, r) in results.iter().enumerate() {
                println!("  draw {:>2}: {} x{}", i + 1, r.name, r.amount);
            }
            let status = wishes.query_status(&entity, pool)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Some("participate") => {
            let event = positional
                .get(1)
                .map(String::as_str)
                .unwrap_or("daily_blessing");
            let results = events.participate(&entity, event)?;
            if results.is_empty() {
                println!("  nothing granted");
            }
            for r in &results {
                println!("  reward: {} x{}", r.name, r.amount);
            }
        }
        Some("status") => {
            let pool = positional.get(1).map(String::as_str).unwrap_or("standard");
            let status = wishes.query_status(&entity, pool)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Some("events") => {
            for row in events.list_available(&entity)? {
                println!("{}", serde_json::to_string(&row)?);
            }
        }
        Some("grant-tickets") => {
            let ticket = positional
                .get(1)
                .map(String::as_str)
                .unwrap_or("standard_ticket");
            let amount: i64 = positional.get(2).and_then(|c| c.parse().ok()).unwrap_or(1);
            let balance = wishes.grant_tickets(&entity, ticket, amount)?;
            println!("  {ticket}: {balance}");
        }
        Some(other) => {
            anyhow::bail!("unknown command '{other}' (pull | participate | status | events | grant-tickets)");
        }
        None => {
            println!("wish-runner: no command given, running demo");
            run_demo(&wishes, &events, &entity)?;
        }
    }

    Ok(())
}

/// Scripted pass over the built-in config: fund tickets, pull through
/// a guarantee, participate in the daily event.
fn run_demo(wishes: &WishEngine, events: &EventEngine, entity: &str) -> Result<()> {
    println!("=== WISH DEMO ({entity}) ===");
    let balance = wishes.grant_tickets(entity, "standard_ticket", 15)?;
    println!("  funded tickets: {balance}");

    let results = wishes.pull(entity, "standard", 12)?;
    for (i, r) in results.iter().enumerate() {
        println!("  draw {:>2}: {} x{}", i + 1, r.name, r.amount);
    }

    let status = wishes.query_status(entity, "standard")?;
    println!(
        "  after 12 draws: pity={} tickets={}",
        status.pity_count, status.tickets
    );

    match events.participate(entity, "daily_blessing") {
        Ok(rewards) => {
            for r in &rewards {
                println!("  daily reward: {} x{}", r.name, r.amount);
            }
        }
        Err(e) => println!("  daily blessing: {e}"),
    }

    for row in events.list_available(entity)? {
        println!(
            "  event {} can_participate={} refresh_in_ms={}",
            row.event, row.can_participate, row.refresh_in_ms
        );
    }
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].clone())
}

fn positionals(args: &[String]) -> Vec<String> {
    const VALUE_FLAGS: [&str; 4] = ["--config", "--db", "--seed", "--entity"];
    let mut out = Vec::new();
    let mut i = 1;
    while i < args.len() {
        let arg = &args[i];
        if VALUE_FLAGS.contains(&arg.as_str()) {
            i += 2;
            continue;
        }
        if arg.starts_with("--") {
            i += 1;
            continue;
        }
        out.push(arg.clone());
        i += 1;
    }
    out
}
