use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use dispatch_engine::models::{AsProduct, CoOptimizedResult, CycleSelection, HourlyRevenueResult};
use dispatch_engine::{DataLoader, Scenario, ScenarioSet};
use log::info;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dispatch_engine")]
#[command(about = "Simulate one day of BESS dispatch and attribute its revenue")]
struct Args {
    /// Optimizer to run
    #[arg(short, long, value_enum, default_value = "hourly")]
    mode: Mode,

    /// Price file: 24 hourly prices, or 288 five-minute intervals for co-optimized mode
    #[arg(long)]
    prices: PathBuf,

    /// Battery preset; sets the duration and overrides --duration-hours
    #[arg(long, value_enum)]
    preset: Option<Preset>,

    /// Battery power in MW
    #[arg(short, long, default_value = "100.0")]
    power_mw: f64,

    /// Battery duration in hours
    #[arg(short, long, default_value = "2.0")]
    duration_hours: f64,

    /// Round-trip efficiency (0-1]
    #[arg(short, long, default_value = "0.85")]
    efficiency: f64,

    /// Maximum cycles per day (hourly mode)
    #[arg(short, long, default_value = "1")]
    cycles: u32,

    /// Variable O&M cost in $/MWh
    #[arg(long, default_value = "0.0")]
    vom: f64,

    /// Minimum state of charge as a fraction (co-optimized mode)
    #[arg(long, default_value = "0.05")]
    min_soc: f64,

    /// Hour selection strategy (hourly mode)
    #[arg(long, value_enum, default_value = "greedy")]
    selection: Selection,

    /// CSV of battery scenarios to sweep instead of the single battery above
    #[arg(long)]
    scenarios: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    output: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Hourly,
    CoOptimized,
}

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    TB1,
    TB2,
    TB4,
}

impl Preset {
    fn duration_hours(self) -> f64 {
        match self {
            Preset::TB1 => 1.0,
            Preset::TB2 => 2.0,
            Preset::TB4 => 4.0,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Preset::TB1 => "TB1",
            Preset::TB2 => "TB2",
            Preset::TB4 => "TB4",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Selection {
    Greedy,
    Chronological,
}

impl From<Selection> for CycleSelection {
    fn from(selection: Selection) -> Self {
        match selection {
            Selection::Greedy => CycleSelection::Greedy,
            Selection::Chronological => CycleSelection::Chronological,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
    Summary,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScenarioRun<'a, T> {
    scenario: &'a str,
    #[serde(flatten)]
    result: &'a T,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let scenarios = match &args.scenarios {
        Some(path) => ScenarioSet::from_csv(path)?,
        None => {
            let (name, duration) = match args.preset {
                Some(preset) => (preset.name(), preset.duration_hours()),
                None => ("custom", args.duration_hours),
            };
            ScenarioSet::single(Scenario::new(
                name,
                args.power_mw,
                duration,
                args.efficiency,
                args.cycles,
                args.vom,
                args.min_soc,
            )?)
        }
    }
    .with_selection(args.selection.into());

    if scenarios.is_empty() {
        bail!("No battery scenarios to run");
    }
    info!("Running {} scenario(s) against {}", scenarios.len(), args.prices.display());

    let loader = DataLoader::new();
    match args.mode {
        Mode::Hourly => {
            let prices = loader.load_hourly_prices(&args.prices)?;
            let runs = scenarios.sweep_hourly(&prices)?;
            print_hourly(&runs, args.output)?;
        }
        Mode::CoOptimized => {
            let intervals = loader.load_intervals(&args.prices)?;
            let runs = scenarios.sweep_co_optimized(&intervals)?;
            print_co_optimized(&runs, args.output)?;
        }
    }

    Ok(())
}

fn to_json<T: Serialize>(runs: &[(String, T)]) -> Result<String> {
    let rows: Vec<_> = runs
        .iter()
        .map(|(scenario, result)| ScenarioRun { scenario, result })
        .collect();
    Ok(serde_json::to_string_pretty(&rows)?)
}

fn print_hourly(runs: &[(String, HourlyRevenueResult)], output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", to_json(runs)?),
        OutputFormat::Csv => {
            println!("Scenario,Hour,Label,Price,Action,SoC");
            for (scenario, result) in runs {
                for h in &result.hourly_dispatch {
                    println!(
                        "{},{},{},{:.2},{},{:.1}",
                        scenario,
                        h.hour,
                        h.label,
                        h.price,
                        h.action.as_str(),
                        h.soc
                    );
                }
            }
        }
        OutputFormat::Summary => {
            println!("Hourly Dispatch Summary");
            println!("=======================");
            for (scenario, result) in runs {
                println!();
                println!("{}: {} cycle(s)", scenario, result.cycles_executed);
                println!("  Charge hours:      {:?}", result.charge_hours);
                println!("  Discharge hours:   {:?}", result.discharge_hours);
                println!("  Gross revenue:     ${:.2}", result.gross_revenue);
                println!("  Charging cost:     ${:.2}", result.charging_cost);
                println!("  Efficiency loss:   ${:.2}", result.efficiency_loss);
                println!("  VOM cost:          ${:.2}", result.vom_cost);
                println!("  Net P&L:           ${:.2}", result.net_pnl);
                println!(
                    "  Captured spread:   ${:.2}/MWh (charge ${:.2}, discharge ${:.2})",
                    result.daily_captured_spread,
                    result.avg_charge_price,
                    result.avg_discharge_price
                );
            }
        }
    }
    Ok(())
}

fn print_co_optimized(runs: &[(String, CoOptimizedResult)], output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", to_json(runs)?),
        OutputFormat::Csv => {
            println!("Scenario,Interval,Time,LMP,DischargeMW,ChargeMW,ASMW,SoC,SoCReserved,EnergyRevenue,ASRevenue,VOMCost");
            for (scenario, result) in runs {
                for d in &result.dispatch {
                    println!(
                        "{},{},{},{:.2},{:.3},{:.3},{:.3},{:.2},{:.2},{:.2},{:.2},{:.2}",
                        scenario,
                        d.interval.interval,
                        d.interval.time,
                        d.interval.lmp,
                        d.discharge_mw,
                        d.charge_mw,
                        d.awards.total_mw(),
                        d.soc,
                        d.soc_reserved,
                        d.energy_revenue,
                        d.as_revenue,
                        d.vom_cost
                    );
                }
            }
        }
        OutputFormat::Summary => {
            println!("Co-Optimized Dispatch Summary");
            println!("=============================");
            for (scenario, result) in runs {
                println!();
                println!(
                    "{}: charge below ${:.2}, discharge above ${:.2}",
                    scenario, result.charge_threshold, result.break_even
                );
                println!(
                    "  Energy:            {:.1} MWh charged, {:.1} MWh discharged",
                    result.energy_charged_mwh, result.energy_discharged_mwh
                );
                println!("  Discharge revenue: ${:.2}", result.discharge_revenue);
                for product in AsProduct::ALL {
                    println!("  {:<18} ${:.2}", format!("{}:", product.name()), result.revenue_for(product));
                }
                println!("  Gross revenue:     ${:.2}", result.gross_revenue);
                println!("  Charging cost:     ${:.2}", result.charging_cost);
                println!("  VOM cost:          ${:.2}", result.vom_cost);
                println!("  Net revenue:       ${:.2}", result.net_revenue);
                println!("  Net energy:        ${:.2}", result.energy_revenue);
                println!("  AS share:          {:.1}%", result.as_share() * 100.0);
            }
        }
    }
    Ok(())
}
