use anyhow::{Context, Result};
use chrono::NaiveDate;
use dispatch_engine::models::{AsProduct, CoOptimizedResult, HourlyRevenueResult};
use dispatch_engine::{DataLoader, Scenario, ScenarioSet};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacktestMode {
    /// Files hold 24 hourly prices.
    Hourly,
    /// Files hold 288 five-minute intervals with AS clearing prices.
    CoOptimized,
}

impl BacktestMode {
    pub fn name(self) -> &'static str {
        match self {
            BacktestMode::Hourly => "hourly",
            BacktestMode::CoOptimized => "co_optimized",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DayFile {
    pub date: NaiveDate,
    pub path: PathBuf,
}

/// One row of `daily_results.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyResult {
    pub date: NaiveDate,
    pub scenario: String,
    pub mode: &'static str,
    /// Executed cycles (hourly) or equivalent full discharges (co-optimized).
    pub cycles: f64,
    pub energy_revenue: f64,
    pub discharge_revenue: f64,
    pub reg_up_revenue: f64,
    pub reg_down_revenue: f64,
    pub rrs_revenue: f64,
    pub ecrs_revenue: f64,
    pub non_spin_revenue: f64,
    pub as_revenue: f64,
    pub gross_revenue: f64,
    pub charging_cost: f64,
    pub efficiency_loss: f64,
    pub vom_cost: f64,
    pub net_revenue: f64,
}

impl DailyResult {
    pub fn from_hourly(date: NaiveDate, scenario: &str, result: &HourlyRevenueResult) -> Self {
        Self {
            date,
            scenario: scenario.to_string(),
            mode: BacktestMode::Hourly.name(),
            cycles: result.cycles_executed as f64,
            energy_revenue: result.gross_revenue - result.charging_cost,
            discharge_revenue: result.gross_revenue,
            reg_up_revenue: 0.0,
            reg_down_revenue: 0.0,
            rrs_revenue: 0.0,
            ecrs_revenue: 0.0,
            non_spin_revenue: 0.0,
            as_revenue: 0.0,
            gross_revenue: result.gross_revenue,
            charging_cost: result.charging_cost,
            efficiency_loss: result.efficiency_loss,
            vom_cost: result.vom_cost,
            net_revenue: result.net_pnl,
        }
    }

    pub fn from_co_optimized(
        date: NaiveDate,
        scenario: &Scenario,
        result: &CoOptimizedResult,
    ) -> Self {
        Self {
            date,
            scenario: scenario.name.clone(),
            mode: BacktestMode::CoOptimized.name(),
            cycles: result.energy_discharged_mwh / scenario.battery.energy_capacity_mwh(),
            energy_revenue: result.energy_revenue,
            discharge_revenue: result.discharge_revenue,
            reg_up_revenue: result.revenue_for(AsProduct::RegUp),
            reg_down_revenue: result.revenue_for(AsProduct::RegDown),
            rrs_revenue: result.revenue_for(AsProduct::Rrs),
            ecrs_revenue: result.revenue_for(AsProduct::Ecrs),
            non_spin_revenue: result.revenue_for(AsProduct::NonSpin),
            as_revenue: result.as_revenue,
            gross_revenue: result.gross_revenue,
            charging_cost: result.charging_cost,
            efficiency_loss: 0.0,
            vom_cost: result.vom_cost,
            net_revenue: result.net_revenue,
        }
    }
}

#[derive(Debug, Default)]
pub struct BacktestOutcome {
    pub results: Vec<DailyResult>,
    pub processed_days: usize,
    pub skipped_days: usize,
}

/// 100 MW TB1/TB2/TB4 batteries, used when no scenario file is given.
pub fn default_scenarios() -> Result<ScenarioSet> {
    let mut set = ScenarioSet::new();
    for (name, hours) in [("TB1", 1.0), ("TB2", 2.0), ("TB4", 4.0)] {
        set.add(Scenario::new(name, 100.0, hours, 0.85, 1, 0.0, 0.05)?);
    }
    Ok(set)
}

/// Date embedded in a file name as `YYYYMMDD` or `YYYY-MM-DD`.
pub fn date_from_filename(re: &Regex, filename: &str) -> Option<NaiveDate> {
    let captures = re.captures(filename)?;
    let year = captures.get(1)?.as_str().parse().ok()?;
    let month = captures.get(2)?.as_str().parse().ok()?;
    let day = captures.get(3)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn date_regex() -> Result<Regex> {
    Ok(Regex::new(r"(\d{4})-?(\d{2})-?(\d{2})")?)
}

/// Price files in `dir`, sorted by date. Files without a date in their name
/// are ignored.
pub fn discover_day_files(dir: &Path) -> Result<Vec<DayFile>> {
    let re = date_regex()?;
    let mut files = Vec::new();

    for extension in ["csv", "parquet", "json"] {
        let pattern = dir.join(format!("*.{}", extension));
        let pattern = pattern
            .to_str()
            .with_context(|| format!("Non UTF-8 path {}", dir.display()))?;

        for path in glob::glob(pattern)?.filter_map(|entry| entry.ok()) {
            let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            match date_from_filename(&re, filename) {
                Some(date) => files.push(DayFile { date, path }),
                None => warn!("Ignoring {}: no date in file name", path.display()),
            }
        }
    }

    files.sort();
    Ok(files)
}

fn run_day(
    loader: &DataLoader,
    day: &DayFile,
    scenarios: &ScenarioSet,
    mode: BacktestMode,
) -> Result<Vec<DailyResult>> {
    let rows = match mode {
        BacktestMode::Hourly => {
            let prices = loader.load_hourly_prices(&day.path)?;
            scenarios
                .sweep_hourly(&prices)?
                .iter()
                .map(|(name, result)| DailyResult::from_hourly(day.date, name, result))
                .collect()
        }
        BacktestMode::CoOptimized => {
            let intervals = loader.load_intervals(&day.path)?;
            scenarios
                .sweep_co_optimized(&intervals)?
                .iter()
                .zip(scenarios.iter())
                .map(|((_, result), scenario)| {
                    DailyResult::from_co_optimized(day.date, scenario, result)
                })
                .collect()
        }
    };
    Ok(rows)
}

/// Run every scenario over every day. Days that fail to load or validate are
/// logged and counted as skipped.
pub fn run_backtest(
    days: &[DayFile],
    scenarios: &ScenarioSet,
    mode: BacktestMode,
) -> Result<BacktestOutcome> {
    let loader = DataLoader::new();
    let pb = ProgressBar::new(days.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} days")?,
    );

    let per_day: Vec<Option<Vec<DailyResult>>> = days
        .par_iter()
        .map(|day| {
            let rows = match run_day(&loader, day, scenarios, mode) {
                Ok(rows) => Some(rows),
                Err(e) => {
                    warn!("Skipping {} ({}): {:#}", day.date, day.path.display(), e);
                    None
                }
            };
            pb.inc(1);
            rows
        })
        .collect();
    pb.finish_and_clear();

    let mut outcome = BacktestOutcome::default();
    for rows in per_day {
        match rows {
            Some(rows) => {
                outcome.processed_days += 1;
                outcome.results.extend(rows);
            }
            None => outcome.skipped_days += 1,
        }
    }

    info!(
        "Backtest complete: {} days processed, {} skipped, {} rows",
        outcome.processed_days,
        outcome.skipped_days,
        outcome.results.len()
    );
    Ok(outcome)
}

pub fn write_daily_results(path: &Path, results: &[DailyResult]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in results {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_hourly(dir: &Path, name: &str, prices: &[f64]) {
        let mut csv = String::from("hour,price\n");
        for (hour, price) in prices.iter().enumerate() {
            csv.push_str(&format!("{},{}\n", hour, price));
        }
        std::fs::write(dir.join(name), csv).unwrap();
    }

    fn spike_day(peak: f64) -> Vec<f64> {
        let mut prices = vec![30.0; 24];
        prices[2] = 10.0;
        prices[18] = peak;
        prices
    }

    #[test]
    fn test_date_from_filename() {
        let re = date_regex().unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 7, 15);
        assert_eq!(date_from_filename(&re, "rt_prices_20240715.csv"), expected);
        assert_eq!(date_from_filename(&re, "2024-07-15_hourly.parquet"), expected);
        assert_eq!(date_from_filename(&re, "prices.csv"), None);
        assert_eq!(date_from_filename(&re, "day_20241315.csv"), None);
    }

    #[test]
    fn test_discover_sorts_by_date_and_ignores_undated() {
        let dir = tempfile::tempdir().unwrap();
        write_hourly(dir.path(), "da_20240102.csv", &spike_day(110.0));
        write_hourly(dir.path(), "da_2024-01-01.csv", &spike_day(110.0));
        write_hourly(dir.path(), "notes.csv", &spike_day(110.0));
        std::fs::write(dir.path().join("readme_20240103.txt"), "ignored").unwrap();

        let files = discover_day_files(dir.path()).unwrap();
        let dates: Vec<_> = files.iter().map(|f| f.date.to_string()).collect();
        assert_eq!(dates, vec!["2024-01-01", "2024-01-02"]);
    }

    #[test]
    fn test_hourly_backtest_skips_bad_days() {
        let dir = tempfile::tempdir().unwrap();
        write_hourly(dir.path(), "day_20240101.csv", &spike_day(110.0));
        write_hourly(dir.path(), "day_20240102.csv", &spike_day(60.0));
        write_hourly(dir.path(), "day_20240103.csv", &[25.0; 23]);

        let mut scenarios = ScenarioSet::new();
        scenarios.add(Scenario::new("TB1", 10.0, 1.0, 1.0, 1, 0.0, 0.05).unwrap());

        let days = discover_day_files(dir.path()).unwrap();
        let outcome = run_backtest(&days, &scenarios, BacktestMode::Hourly).unwrap();

        assert_eq!(outcome.processed_days, 2);
        assert_eq!(outcome.skipped_days, 1);
        assert_eq!(outcome.results.len(), 2);

        let first = &outcome.results[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(first.scenario, "TB1");
        assert!((first.gross_revenue - 1100.0).abs() < 1e-9);
        assert!((first.charging_cost - 100.0).abs() < 1e-9);
        assert!((first.net_revenue - 1000.0).abs() < 1e-9);
        assert!((outcome.results[1].net_revenue - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_default_scenarios_run_in_set_order() {
        let dir = tempfile::tempdir().unwrap();
        write_hourly(dir.path(), "day_20240601.csv", &spike_day(110.0));

        let scenarios = default_scenarios().unwrap();
        let days = discover_day_files(dir.path()).unwrap();
        let outcome = run_backtest(&days, &scenarios, BacktestMode::Hourly).unwrap();

        let names: Vec<_> = outcome.results.iter().map(|r| r.scenario.as_str()).collect();
        assert_eq!(names, vec!["TB1", "TB2", "TB4"]);
        assert!(outcome.results.iter().all(|r| r.mode == "hourly"));
    }

    #[test]
    fn test_write_daily_results_csv() {
        let dir = tempfile::tempdir().unwrap();
        write_hourly(dir.path(), "day_20240101.csv", &spike_day(110.0));
        let mut scenarios = ScenarioSet::new();
        scenarios.add(Scenario::new("TB1", 10.0, 1.0, 1.0, 1, 0.0, 0.05).unwrap());
        let days = discover_day_files(dir.path()).unwrap();
        let outcome = run_backtest(&days, &scenarios, BacktestMode::Hourly).unwrap();

        let path = dir.path().join("daily_results.csv");
        write_daily_results(&path, &outcome.results).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("date,scenario,mode,cycles,energy_revenue"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("2024-01-01,TB1,hourly,1.0,1000.0"));
        assert!(lines.next().is_none());
    }
}
