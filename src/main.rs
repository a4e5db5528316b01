use anyhow::Result;
use dispatch_engine::ScenarioSet;
use std::path::{Path, PathBuf};

mod backtest;
mod report;

use backtest::BacktestMode;

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn print_usage() {
    println!("Usage: bess_backtest <--hourly|--co-optimized> <price_dir> [--scenarios <csv>] [--output <dir>]");
    println!("Example: bess_backtest --co-optimized rt_days --scenarios scenarios.csv --output results");
}

fn run(
    mode: BacktestMode,
    data_dir: &Path,
    scenarios: Option<&str>,
    output_dir: &Path,
) -> Result<()> {
    println!("🔋 BESS Dispatch Backtest ({})", mode.name());
    println!("Using {} CPU cores", num_cpus::get());
    println!("{}", "=".repeat(60));

    let scenarios = match scenarios {
        Some(path) => ScenarioSet::from_csv(Path::new(path))?,
        None => backtest::default_scenarios()?,
    };
    let days = backtest::discover_day_files(data_dir)?;
    println!("Found {} daily price files, {} scenario(s)", days.len(), scenarios.len());

    let start = std::time::Instant::now();
    let outcome = backtest::run_backtest(&days, &scenarios, mode)?;

    std::fs::create_dir_all(output_dir)?;
    let results_path = output_dir.join("daily_results.csv");
    backtest::write_daily_results(&results_path, &outcome.results)?;

    report::print_monthly_summary(&report::summarize_monthly(&outcome.results));

    println!(
        "\n✅ {} days processed, {} skipped in {:?}",
        outcome.processed_days,
        outcome.skipped_days,
        start.elapsed()
    );
    println!("Daily results saved to: {}", results_path.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    rayon::ThreadPoolBuilder::new()
        .num_threads(num_cpus::get())
        .build_global()?;

    let args: Vec<String> = std::env::args().collect();
    let mode = match args.get(1).map(String::as_str) {
        Some("--hourly") => BacktestMode::Hourly,
        Some("--co-optimized") => BacktestMode::CoOptimized,
        _ => {
            print_usage();
            return Ok(());
        }
    };
    let Some(data_dir) = args.get(2) else {
        print_usage();
        return Ok(());
    };

    let output_dir = PathBuf::from(flag_value(&args, "--output").unwrap_or("backtest_output"));
    run(mode, Path::new(data_dir), flag_value(&args, "--scenarios"), &output_dir)
}
