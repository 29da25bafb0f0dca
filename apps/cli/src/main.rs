#![deny(warnings)]

//! Headless driver: loads (or seeds) the player's session, lets timers run,
//! optionally plays greedily, and saves on exit or Ctrl-C.

mod format;
mod scenario;

use anyhow::Result;
use format::format_amount;
use idle_ai::Action;
use idle_core::Business;
use idle_econ::CooldownPhase;
use idle_runtime::{end_session, load_session, Engine};
use persistence::{load_or_create_user_id, JsonFileStore, DEFAULT_DATA_DIR};
use scenario::Scenario;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const STEP: Duration = Duration::from_millis(100);
const MAX_ACTIONS_PER_STEP: usize = 1_000;

#[derive(Debug, Default)]
struct Args {
    scenario: Option<PathBuf>,
    seconds: Option<u64>,
    data_dir: Option<PathBuf>,
    autoplay: bool,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--scenario" => args.scenario = it.next().map(PathBuf::from),
            "--seconds" => args.seconds = it.next().and_then(|s| s.parse().ok()),
            "--data-dir" => args.data_dir = it.next().map(PathBuf::from),
            "--autoplay" => args.autoplay = true,
            other => warn!(arg = other, "ignoring unknown argument"),
        }
    }
    args
}

fn apply(engine: &mut Engine, action: &Action) -> bool {
    match action {
        Action::Collect(name) => engine.collect(name),
        Action::HireManager(name) => engine.hire_manager(name),
        Action::Unlock(name) => engine.unlock(name),
        Action::Upgrade(name) => engine.upgrade(name),
    }
}

/// Apply greedy actions until none is affordable.
fn autoplay(engine: &mut Engine) -> usize {
    let mut applied = 0;
    while applied < MAX_ACTIONS_PER_STEP {
        let Some(action) = idle_ai::next_action(engine.session()) else {
            break;
        };
        if !apply(engine, &action) {
            break;
        }
        if !matches!(action, Action::Collect(_)) {
            info!(
                business = action.business(),
                ?action,
                capital = %format_amount(engine.capital()),
                "autoplay"
            );
        }
        applied += 1;
    }
    applied
}

async fn run(engine: &mut Engine, seconds: Option<u64>, play: bool) {
    let started = tokio::time::Instant::now();
    loop {
        if let Some(limit) = seconds {
            if started.elapsed() >= Duration::from_secs(limit) {
                break;
            }
        }
        if play {
            autoplay(engine);
        }
        engine.run_for(STEP).await;
    }
}

fn cooldown_status(b: &Business) -> String {
    match idle_econ::phase(b) {
        CooldownPhase::Idle => "idle".to_string(),
        CooldownPhase::CoolingDown { progress_ms } => format!(
            "cooling {:>3.0}% ({progress_ms}ms)",
            b.cooldown_fraction() * 100.0
        ),
    }
}

fn print_summary(engine: &Engine) {
    println!("Capital: {}", format_amount(engine.capital()));
    for b in &engine.session().businesses {
        if !b.is_unlocked() {
            println!(
                "  {:<20} locked | unlock: {}",
                b.name,
                format_amount(b.unlocking_price)
            );
            continue;
        }
        println!(
            "  {:<20} level {:>4} | rewards: {} ({}/s) | upgrade: {} | {} | {}",
            b.name,
            b.current_level,
            format_amount(b.rewards),
            format_amount(idle_econ::income_rate(b)),
            format_amount(b.upgrading_price),
            if b.is_managed {
                "managed".to_string()
            } else {
                format!("manager: {}", format_amount(b.manager_cost))
            },
            cooldown_status(b)
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = parse_args();
    info!(?args, "starting idle-tycoon");

    let scenario = match &args.scenario {
        Some(path) => Scenario::load(path)?,
        None => Scenario::classic()?,
    };
    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let user_id = load_or_create_user_id(&data_dir).await?;
    let store = JsonFileStore::new(&data_dir, scenario.catalog, scenario.config.clone())?;
    let mut engine = load_session(&store, user_id, scenario.config).await?;

    tokio::select! {
        _ = run(&mut engine, args.seconds, args.autoplay) => {}
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }

    print_summary(&engine);
    end_session(&store, &mut engine).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn cooldown_status_shows_progress() {
        let mut b = Business::new(
            "Shop",
            Decimal::ONE,
            Decimal::ONE,
            Decimal::ONE,
            Decimal::ONE,
            Decimal::ONE,
        );
        b.current_level = 1;
        assert_eq!(cooldown_status(&b), "idle");
        b.is_cooling_down = true;
        b.cooldown_progress = 250;
        assert_eq!(cooldown_status(&b), "cooling  25% (250ms)");
    }
}
