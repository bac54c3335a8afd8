//! RailView Simulator CLI
//!
//! Run corridor scenarios headlessly (virtual clock) or in real time.

use clap::Parser;
use railview_core::config::{RuntimeConfig, RuntimeMode, ScenarioConfig};
use railview_core::railview_view::ViewContext;
use railview_core::sim_runtime::{RuntimeError, SimulationRuntime};
use railview_env::TokioContext;
use railview_sim::scenarios::ScenarioId;
use railview_sim::{MemorySurface, ScenarioResult, ScenarioRunner};
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// RailView corridor simulation CLI
#[derive(Parser, Debug)]
#[command(name = "railview-sim")]
#[command(about = "Run RailView corridor scenarios", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (corridor, overtake, express, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Load the scenario from a JSON file instead of the built-in catalog
    #[arg(short, long)]
    config: Option<String>,

    /// Virtual seconds per real second
    #[arg(long, default_value = "1.0")]
    speed: f64,

    /// Tick interval in milliseconds
    #[arg(long, default_value = "100")]
    tick_ms: u64,

    /// Real seconds to run
    #[arg(short, long, default_value = "60")]
    duration: f64,

    /// Drive the overlay from the synthetic live feed
    #[arg(long)]
    live: bool,

    /// Run against the wall clock with the runtime's own periodic tasks
    /// (simulated mode only; nothing feeds a live runtime here)
    #[arg(long, conflicts_with = "live")]
    realtime: bool,

    /// List built-in scenarios and exit
    #[arg(long)]
    list: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export rendered frames to a JSON file
    #[arg(long)]
    export: Option<String>,
}

/// Runs one scenario on tokio time, cycling through the view contexts.
async fn run_realtime(name: &str, config: &ScenarioConfig, args: &Args) -> Result<(), RuntimeError> {
    let ctx = TokioContext::shared();
    let surface = MemorySurface::shared();
    let runtime_config = RuntimeConfig {
        tick_interval: Duration::from_millis(args.tick_ms),
        speed_factor: args.speed,
        mode: RuntimeMode::Simulated,
        ..RuntimeConfig::default()
    };

    let mut runtime = SimulationRuntime::new(ctx, &surface, config, runtime_config)?;
    runtime.start()?;

    let views = ViewContext::all();
    let slice = Duration::from_secs_f64((args.duration / views.len() as f64).max(0.0));
    for view in views.iter().cycle().skip(1).take(views.len()) {
        tokio::time::sleep(slice).await;
        runtime.focus(view.name())?;
        info!(
            "  {} t={:.1}s loops={} view={}",
            name,
            runtime.now(),
            runtime.loops(),
            runtime.active_view()
        );
    }

    let metrics = runtime.metrics();
    runtime.shutdown().await;

    info!(
        "✓ {} realtime run: {} passes applied, {} blink toggles, {} flights",
        name,
        metrics.passes_applied,
        metrics.blink_toggles,
        surface.flights().len()
    );
    Ok(())
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if args.list {
        for scenario in ScenarioId::all() {
            println!("{:<10} {}", scenario.name(), scenario.description());
        }
        return;
    }

    if !args.json {
        info!("RailView Simulator v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Resolve scenarios: (name, config, expected passes)
    let scenarios: Vec<(String, ScenarioConfig, Option<usize>)> = if let Some(path) = &args.config {
        match ScenarioConfig::from_json_file(path) {
            Ok(config) => vec![(config.name.clone(), config, None)],
            Err(e) => {
                error!("Failed to load {}: {}", path, e);
                std::process::exit(1);
            }
        }
    } else if args.scenario == "all" {
        ScenarioId::all()
            .into_iter()
            .map(|id| (id.name().to_string(), id.config(), Some(id.expected_passes())))
            .collect()
    } else {
        match args.scenario.parse::<ScenarioId>() {
            Ok(id) => vec![(id.name().to_string(), id.config(), Some(id.expected_passes()))],
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!("Available scenarios: corridor, overtake, express, all");
                std::process::exit(1);
            }
        }
    };

    if (args.realtime || args.export.is_some()) && scenarios.len() > 1 {
        eprintln!("Error: --realtime and --export only support a single scenario, not 'all'");
        std::process::exit(1);
    }

    if args.realtime {
        let (name, config, _) = &scenarios[0];
        let outcome = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt.block_on(run_realtime(name, config, &args)),
            Err(e) => {
                error!("Failed to start tokio runtime: {}", e);
                std::process::exit(1);
            }
        };
        if let Err(e) = outcome {
            error!("✗ {} FAILED: {}", name, e);
            std::process::exit(1);
        }
        return;
    }

    // Determine seed
    let seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    let mut runner = ScenarioRunner::new(seed)
        .with_duration(args.duration)
        .with_speed(args.speed)
        .with_tick_interval(Duration::from_millis(args.tick_ms))
        .live(args.live);
    if args.export.is_some() {
        runner = runner.with_export(10);
    }

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for (name, config, expected_passes) in &scenarios {
        let result = runner.run_config(name, config, *expected_passes);

        if !args.json {
            if result.passed {
                info!("✓ {} (seed={}) PASSED", name, seed);
            } else {
                error!(
                    "✗ {} (seed={}) FAILED: {}",
                    name,
                    seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }

        if let (Some(path), Some(export)) = (&args.export, &result.export) {
            if let Err(e) = export.write_to_file(path) {
                error!("Failed to write export: {:?}", e);
            } else {
                info!("Exported {} frames to {}", export.frames.len(), path);
            }
        }

        if !result.passed {
            failed_count += 1;
        }
        all_results.push(result);
    }

    // Summary
    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to serialize results: {}", e),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
