//! escalation-runner: runs the complaint escalation engine against a database.
//!
//! Usage:
//!   escalation-runner --db grievance.db --data-dir ./data
//!   escalation-runner --db grievance.db --once
//!   escalation-runner --db grievance.db --max-cycles 3 --skip-rule-sync

use anyhow::Result;
use grievance_core::{
    config::EngineConfig,
    engine::EscalationEngine,
    notification::{ChannelNotifier, EscalationNotice},
    rule::RuleCatalog,
    store::Store,
};
use std::env;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let once = args.iter().any(|a| a == "--once");
    let skip_rule_sync = args.iter().any(|a| a == "--skip-rule-sync");
    let max_cycles = args
        .windows(2)
        .find(|w| w[0] == "--max-cycles")
        .and_then(|w| w[1].parse::<u64>().ok());
    let db = string_arg(&args, "--db", ":memory:");
    let data_dir = string_arg(&args, "--data-dir", "./data");

    let config = EngineConfig::load(data_dir)?;

    if !once {
        println!("Complaint escalation runner");
        println!("  db:         {db}");
        println!("  data_dir:   {data_dir}");
        println!("  interval:   {}s", config.cycle_interval_secs);
        match config.sla_override() {
            Some((mode, minutes)) => println!("  sla:        {minutes} min ({})", mode.label()),
            None => println!("  sla:        per rule"),
        }
        println!("  dry_run:    {}", config.dry_run);
        println!();
    }

    let store = Store::open(db)?;
    store.migrate()?;

    let (tx, rx) = mpsc::channel::<EscalationNotice>();
    let worker = thread::spawn(move || {
        for notice in rx {
            log::info!(
                "deliver: {:?} {} to dept={} officer={} at L{}",
                notice.kind,
                notice.complaint_number,
                notice.department_id.as_deref().unwrap_or("-"),
                notice.officer_id.as_deref().unwrap_or("vacant"),
                u32::from(notice.level) + 1,
            );
        }
    });

    let engine = EscalationEngine::new(store, config)
        .with_notifier(Arc::new(ChannelNotifier::new(tx)));

    if !skip_rule_sync {
        let catalog = RuleCatalog::load(data_dir)?;
        engine.sync_rule_catalog(&catalog)?;
    }

    if once {
        let report = engine.run_cycle()?;
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let stop = AtomicBool::new(false);
        engine.run_loop(&stop, max_cycles);
        print_summary(&engine)?;
    }

    // Dropping the engine closes the channel; the worker drains and exits.
    drop(engine);
    if worker.join().is_err() {
        log::error!("notification worker panicked");
    }
    Ok(())
}

fn print_summary(engine: &EscalationEngine) -> Result<()> {
    let cycles = engine.store().metric_count("cycle_completed")?;
    let escalations = engine.store().escalation_count()?;

    println!("=== RUN SUMMARY ===");
    println!("  cycles recorded:    {cycles}");
    println!("  escalations total:  {escalations}");
    Ok(())
}

fn string_arg<'a>(args: &'a [String], flag: &str, default: &'a str) -> &'a str {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
        .unwrap_or(default)
}
