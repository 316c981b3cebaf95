mod sweeps;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use colored::Colorize;

use sweeps::{SweepResult, distribution_sweep, session_smoke, tradeup_sweep};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SweepMode {
    /// Rarity distribution against configured spawn weights
    Distribution,
    /// Greedy trade-up fusion over generated inventories
    Tradeup,
    /// Session actor smoke run with in-memory persistence
    Session,
    /// Run every sweep
    All,
}

#[derive(Debug, Parser)]
#[command(name = "hollowmaze-tester", version)]
#[command(about = "Automated QA sweeps for the Hollowmaze economy engine")]
struct Args {
    /// Which sweep to run
    #[arg(long, value_enum, default_value_t = SweepMode::All)]
    mode: SweepMode,

    /// Base RNG seed
    #[arg(long, default_value_t = 1337)]
    seed: u64,

    /// Rarity rolls per luck value (distribution sweep)
    #[arg(long, default_value_t = 50_000)]
    rolls: u32,

    /// Luck multipliers to sweep, comma-separated
    #[arg(long, default_value = "1.0,2.0,4.0")]
    lucks: String,

    /// Allowed absolute frequency error at neutral luck
    #[arg(long, default_value_t = 0.01)]
    tolerance: f64,

    /// Item batches to generate for the trade-up sweep
    #[arg(long, default_value_t = 40)]
    batches: u32,

    /// Emit results as JSON instead of the console report
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if !args.json {
        println!("{}", "Hollowmaze Economy Tester".bright_cyan().bold());
        println!("{}", "=========================".cyan());
    }

    let lucks = parse_lucks(&args.lucks)?;
    let mut results: Vec<SweepResult> = Vec::new();

    if matches!(args.mode, SweepMode::Distribution | SweepMode::All) {
        results.extend(distribution_sweep(args.seed, args.rolls, &lucks, args.tolerance));
    }
    if matches!(args.mode, SweepMode::Tradeup | SweepMode::All) {
        results.extend(tradeup_sweep(args.seed, args.batches));
    }
    if matches!(args.mode, SweepMode::Session | SweepMode::All) {
        results.extend(session_smoke(args.seed).await);
    }

    report(&args, &results)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }
    Ok(())
}

fn parse_lucks(raw: &str) -> Result<Vec<f64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|err| anyhow::anyhow!("bad luck value '{s}': {err}"))
        })
        .collect()
}

fn report(args: &Args, results: &[SweepResult]) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }

    for result in results {
        let status = if result.passed {
            "PASS".green().bold()
        } else {
            "FAIL".red().bold()
        };
        println!("  [{status}] {:28} {}", result.name, result.detail);
    }

    let failed = results.iter().filter(|r| !r.passed).count();
    if failed == 0 {
        println!("{}", format!("{} sweep(s) passed", results.len()).green());
    } else {
        println!("{}", format!("{failed}/{} sweep(s) failed", results.len()).red());
    }
    Ok(())
}
