//! Paintbucket CLI - apply a pixel transform to an image with a worker pool.

use anyhow::{bail, Context, Result};
use paintbucket::prelude::*;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("paintbucket");

    if args.len() < 2 {
        print_usage(program);
        return Ok(());
    }

    match args[1].as_str() {
        "transforms" | "list" => list_transforms(),
        "apply" => {
            if args.len() < 6 {
                eprintln!("Error: apply needs an input, an output, a transform and an amount");
                eprintln!("Usage: {} apply <input> <output> <transform> <amount> [options]", program);
                std::process::exit(2);
            }
            apply(&args[2..])?;
        }
        "help" | "--help" | "-h" => print_usage(program),
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage(program);
            std::process::exit(2);
        }
    }
    Ok(())
}

fn print_usage(program: &str) {
    println!("Paintbucket v{}", paintbucket::VERSION);
    println!();
    println!("Usage: {} <command> [options]", program);
    println!();
    println!("Commands:");
    println!("  transforms                                List registered transforms");
    println!("  apply <in> <out> <transform> <amount>     Transform an image");
    println!("  help                                      Show this help message");
    println!();
    println!("Apply options:");
    println!("  --workers <n>       Number of worker threads (default: 4)");
    println!("  --config <file>     Scheduler config (.toml or .json)");
    println!("  --timeout <secs>    Give up after this long (default: 300)");
    println!();
    println!("Set RUST_LOG=debug for scheduling detail.");
}

fn list_transforms() {
    let registry = TransformRegistry::with_builtins();
    println!("Available transforms ({} total):", registry.len());
    println!();
    for entry in registry.entries() {
        println!("  {:<12} {}", entry.name, entry.description);
    }
}

fn apply(args: &[String]) -> Result<()> {
    let input = &args[0];
    let output = &args[1];
    let transform = &args[2];
    let amount = Parameter::from(args[3].as_str());

    let mut config = SchedulerConfig::default();
    let mut workers: Option<usize> = None;
    let mut timeout = Duration::from_secs(300);

    let mut i = 4;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--workers", Some(value)) => {
                workers = Some(value.parse().with_context(|| format!("invalid worker count '{}'", value))?);
            }
            ("--config", Some(value)) => {
                config = SchedulerConfig::load(value).with_context(|| format!("failed to load config {}", value))?;
            }
            ("--timeout", Some(value)) => {
                let secs: u64 = value.parse().with_context(|| format!("invalid timeout '{}'", value))?;
                timeout = Duration::from_secs(secs);
            }
            (flag, _) => bail!("unknown or incomplete option '{}'", flag),
        }
        i += 2;
    }
    if let Some(workers) = workers {
        config = config.with_workers(workers);
    }

    let mut scheduler = Scheduler::with_builtins(config)?;
    let region_id = scheduler
        .add_region(Region::from_file(input))
        .with_context(|| format!("failed to load {}", input))?;

    let (width, height) = scheduler.canvas_extent();
    println!("Loaded {} ({}x{})", input, width, height);

    scheduler.events().on(SchedulerEventKind::RegionJobComplete, |event| {
        if let SchedulerEvent::RegionJobComplete { outcome, .. } = event {
            if outcome.partial {
                log::warn!("Some workers never reported; part of the image may be untransformed");
            }
        }
    });
    scheduler.apply(region_id, transform, amount)?;
    let started = std::time::Instant::now();
    if !scheduler.run_until_idle(timeout) {
        bail!("job did not finish within {:?}", timeout);
    }

    let region = scheduler
        .region(region_id)
        .context("region disappeared")?;
    let buffer = region.buffer().context("region has no buffer")?;
    buffer.save(output).with_context(|| format!("failed to save {}", output))?;

    println!(
        "Applied '{}' with {} workers in {:.2?} -> {}",
        transform,
        scheduler.live_workers(),
        started.elapsed(),
        output
    );
    scheduler.shutdown();
    Ok(())
}
