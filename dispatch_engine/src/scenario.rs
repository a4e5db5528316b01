use crate::co_optimizer::simulate_co_optimized;
use crate::data_loader::{f64_column, str_column, usize_column};
use crate::error::Result as DispatchResult;
use crate::hourly_optimizer::simulate_hourly;
use crate::models::{
    BatteryConfig, CoOptimizedResult, CycleSelection, HourlyBatteryConfig, HourlyRevenueResult,
    RtInterval,
};
use anyhow::{Context, Result};
use polars::prelude::*;
use rayon::prelude::*;
use std::path::Path;

/// One named battery build, expressed for both optimizers.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub name: String,
    pub hourly: HourlyBatteryConfig,
    pub battery: BatteryConfig,
}

impl Scenario {
    pub fn new(
        name: &str,
        power_mw: f64,
        duration_hours: f64,
        rte: f64,
        cycles_per_day: u32,
        vom: f64,
        min_soc: f64,
    ) -> DispatchResult<Self> {
        Ok(Self {
            name: name.to_string(),
            hourly: HourlyBatteryConfig::new(power_mw, duration_hours, rte, cycles_per_day, vom)?,
            battery: BatteryConfig::new(power_mw, power_mw * duration_hours, rte, min_soc, vom)?,
        })
    }

    pub fn with_selection(mut self, selection: CycleSelection) -> Self {
        self.hourly = self.hourly.with_selection(selection);
        self
    }
}

/// Ordered set of scenarios swept over the same prices.
#[derive(Debug, Clone, Default)]
pub struct ScenarioSet {
    scenarios: Vec<Scenario>,
}

impl ScenarioSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(scenario: Scenario) -> Self {
        Self {
            scenarios: vec![scenario],
        }
    }

    /// Load scenarios from a CSV with columns
    /// `name,power_mw,duration_hours,rte,cycles_per_day,vom,min_soc`.
    pub fn from_csv(path: &Path) -> Result<Self> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()
            .with_context(|| format!("Failed to read scenarios from {}", path.display()))?;

        let names = str_column(&df, "name")?;
        let power = f64_column(&df, "power_mw")?;
        let duration = f64_column(&df, "duration_hours")?;
        let rte = f64_column(&df, "rte")?;
        let cycles = usize_column(&df, "cycles_per_day")?;
        let vom = f64_column(&df, "vom")?;
        let min_soc = f64_column(&df, "min_soc")?;

        let mut set = Self::new();
        for row in 0..df.height() {
            let scenario = Scenario::new(
                &names[row],
                power[row],
                duration[row],
                rte[row],
                u32::try_from(cycles[row]).unwrap_or(u32::MAX),
                vom[row],
                min_soc[row],
            )
            .with_context(|| format!("Scenario '{}' in {}", names[row], path.display()))?;
            set.add(scenario);
        }

        log::info!("Loaded {} scenarios from {}", set.len(), path.display());
        Ok(set)
    }

    /// Add a scenario, replacing any existing one with the same name.
    pub fn add(&mut self, scenario: Scenario) {
        match self.scenarios.iter_mut().find(|s| s.name == scenario.name) {
            Some(existing) => *existing = scenario,
            None => self.scenarios.push(scenario),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.iter()
    }

    pub fn as_slice(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn with_selection(mut self, selection: CycleSelection) -> Self {
        self.scenarios = self
            .scenarios
            .into_iter()
            .map(|s| s.with_selection(selection))
            .collect();
        self
    }

    /// Run the hourly optimizer for every scenario in parallel. Results keep
    /// the set's order.
    pub fn sweep_hourly(
        &self,
        prices: &[f64],
    ) -> DispatchResult<Vec<(String, HourlyRevenueResult)>> {
        self.scenarios
            .par_iter()
            .map(|s| -> DispatchResult<_> {
                Ok((s.name.clone(), simulate_hourly(prices, &s.hourly)?))
            })
            .collect()
    }

    /// Run the co-optimizer for every scenario in parallel. Results keep the
    /// set's order.
    pub fn sweep_co_optimized(
        &self,
        intervals: &[RtInterval],
    ) -> DispatchResult<Vec<(String, CoOptimizedResult)>> {
        self.scenarios
            .par_iter()
            .map(|s| -> DispatchResult<_> {
                Ok((s.name.clone(), simulate_co_optimized(intervals, &s.battery)?))
            })
            .collect()
    }
}
