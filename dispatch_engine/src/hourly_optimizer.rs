use crate::error::{DispatchError, Result};
use crate::models::{
    CycleSelection, DispatchAction, HourlyBatteryConfig, HourlyDispatch, HourlyRevenueResult,
    HOURS_PER_DAY,
};
use crate::stats::{clamp, mean};
use log::{debug, info};

/// Hourly single-commodity arbitrage. Each cycle charges in its cheapest
/// hours and discharges in its most expensive ones, and is kept only if it
/// clears a net profit.
pub struct HourlyOptimizer {
    config: HourlyBatteryConfig,
}

/// Candidate charge/discharge hour sets for one cycle and their economics.
#[derive(Debug, Clone)]
struct CyclePlan {
    charge_hours: Vec<usize>,
    discharge_hours: Vec<usize>,
    gross_revenue: f64,
    charge_cost: f64,
    vom_cost: f64,
}

impl CyclePlan {
    fn net_profit(&self) -> f64 {
        self.gross_revenue - self.charge_cost - self.vom_cost
    }
}

/// Running totals of committed cycles.
struct CycleLedger {
    actions: [DispatchAction; HOURS_PER_DAY],
    used: [bool; HOURS_PER_DAY],
    charge_prices: Vec<f64>,
    discharge_prices: Vec<f64>,
    gross_revenue: f64,
    charging_cost: f64,
    vom_cost: f64,
    cycles_executed: u32,
}

impl CycleLedger {
    fn new() -> Self {
        Self {
            actions: [DispatchAction::Idle; HOURS_PER_DAY],
            used: [false; HOURS_PER_DAY],
            charge_prices: Vec::new(),
            discharge_prices: Vec::new(),
            gross_revenue: 0.0,
            charging_cost: 0.0,
            vom_cost: 0.0,
            cycles_executed: 0,
        }
    }

    fn unused_from(&self, start_hour: usize) -> Vec<usize> {
        (start_hour..HOURS_PER_DAY).filter(|&h| !self.used[h]).collect()
    }

    fn commit(&mut self, plan: &CyclePlan, prices: &[f64]) {
        for &h in &plan.charge_hours {
            self.actions[h] = DispatchAction::Charge;
            self.used[h] = true;
            self.charge_prices.push(prices[h]);
        }
        for &h in &plan.discharge_hours {
            self.actions[h] = DispatchAction::Discharge;
            self.used[h] = true;
            self.discharge_prices.push(prices[h]);
        }
        self.gross_revenue += plan.gross_revenue;
        self.charging_cost += plan.charge_cost;
        self.vom_cost += plan.vom_cost;
        self.cycles_executed += 1;
    }

    fn hours_with(&self, action: DispatchAction) -> Vec<usize> {
        (0..HOURS_PER_DAY).filter(|&h| self.actions[h] == action).collect()
    }
}

impl HourlyOptimizer {
    pub fn new(config: HourlyBatteryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HourlyBatteryConfig {
        &self.config
    }

    /// Dispatch one day of 24 hourly prices. An empty slice yields an empty,
    /// all-zero result.
    pub fn simulate(&self, prices: &[f64]) -> Result<HourlyRevenueResult> {
        if prices.is_empty() {
            return Ok(HourlyRevenueResult::empty());
        }
        validate_prices(prices)?;

        let ledger = match self.config.selection() {
            CycleSelection::Greedy => self.run_greedy(prices),
            CycleSelection::Chronological => self.run_chronological(prices),
        };

        let result = self.build_result(prices, &ledger);
        info!(
            "Hourly dispatch: {} cycle(s), net ${:.2}, spread ${:.2}/MWh",
            result.cycles_executed, result.net_pnl, result.daily_captured_spread
        );
        Ok(result)
    }

    fn run_greedy(&self, prices: &[f64]) -> CycleLedger {
        let hours = self.config.hours_per_cycle();
        let mut ledger = CycleLedger::new();

        for cycle in 0..self.config.cycles_per_day() {
            let available = ledger.unused_from(0);
            if available.len() < hours.saturating_mul(2) {
                break;
            }

            let charge_hours = cheapest(prices, &available, hours);
            let remaining: Vec<usize> = available
                .iter()
                .copied()
                .filter(|h| !charge_hours.contains(h))
                .collect();
            let discharge_hours = most_expensive(prices, &remaining, hours);
            let plan = self.price_cycle(prices, charge_hours, discharge_hours);

            if plan.net_profit() <= 0.0 {
                debug!("Cycle {} skipped, net ${:.2}", cycle + 1, plan.net_profit());
                continue;
            }
            debug!(
                "Cycle {} committed: charge {:?}, discharge {:?}, net ${:.2}",
                cycle + 1,
                plan.charge_hours,
                plan.discharge_hours,
                plan.net_profit()
            );
            ledger.commit(&plan, prices);
        }

        ledger
    }

    fn run_chronological(&self, prices: &[f64]) -> CycleLedger {
        let hours = self.config.hours_per_cycle();
        let mut ledger = CycleLedger::new();
        let mut start_hour = 0;

        for cycle in 0..self.config.cycles_per_day() {
            let available = ledger.unused_from(start_hour);
            if available.len() < hours.saturating_mul(2) {
                break;
            }

            let plan = match self.best_split(prices, &available, start_hour, hours) {
                Some(plan) if plan.net_profit() > 0.0 => plan,
                _ => {
                    debug!("No profitable split for cycle {}, stopping", cycle + 1);
                    break;
                }
            };

            debug!(
                "Cycle {} committed: charge {:?}, discharge {:?}, net ${:.2}",
                cycle + 1,
                plan.charge_hours,
                plan.discharge_hours,
                plan.net_profit()
            );
            ledger.commit(&plan, prices);
            start_hour = plan.discharge_hours.iter().max().map_or(HOURS_PER_DAY, |h| h + 1);
        }

        ledger
    }

    /// Try every split hour: charge before it, discharge at or after it.
    /// Earliest split wins ties.
    fn best_split(
        &self,
        prices: &[f64],
        available: &[usize],
        start_hour: usize,
        hours: usize,
    ) -> Option<CyclePlan> {
        let mut best: Option<CyclePlan> = None;

        for split in start_hour.saturating_add(hours)..=HOURS_PER_DAY.saturating_sub(hours) {
            let (left, right): (Vec<usize>, Vec<usize>) =
                available.iter().partition(|&&h| h < split);
            if left.len() < hours || right.len() < hours {
                continue;
            }

            let plan = self.price_cycle(
                prices,
                cheapest(prices, &left, hours),
                most_expensive(prices, &right, hours),
            );
            if best.as_ref().map_or(true, |b| plan.net_profit() > b.net_profit()) {
                best = Some(plan);
            }
        }

        best
    }

    fn price_cycle(
        &self,
        prices: &[f64],
        charge_hours: Vec<usize>,
        discharge_hours: Vec<usize>,
    ) -> CyclePlan {
        let power = self.config.power_mw();
        let hours = self.config.hours_per_cycle() as f64;
        let avg_charge = mean(&charge_hours.iter().map(|&h| prices[h]).collect::<Vec<_>>());
        let avg_discharge = mean(&discharge_hours.iter().map(|&h| prices[h]).collect::<Vec<_>>());

        // Charging buys the full round-trip loss up front.
        CyclePlan {
            gross_revenue: power * avg_discharge * hours,
            charge_cost: power / self.config.round_trip_efficiency() * avg_charge * hours,
            vom_cost: power * hours * self.config.vom(),
            charge_hours,
            discharge_hours,
        }
    }

    fn build_result(&self, prices: &[f64], ledger: &CycleLedger) -> HourlyRevenueResult {
        let soc_step = self.config.power_mw() / self.config.energy_capacity_mwh() * 100.0;
        let mut soc = 0.0;

        let hourly_dispatch = (0..HOURS_PER_DAY)
            .map(|hour| {
                let action = ledger.actions[hour];
                match action {
                    DispatchAction::Charge => soc = clamp(soc + soc_step, 0.0, 100.0),
                    DispatchAction::Discharge => soc = clamp(soc - soc_step, 0.0, 100.0),
                    DispatchAction::Idle => {}
                }
                HourlyDispatch {
                    hour,
                    label: format!("{:02}:00", hour),
                    price: prices[hour],
                    action,
                    soc,
                }
            })
            .collect();

        let avg_charge_price = mean(&ledger.charge_prices);
        let avg_discharge_price = mean(&ledger.discharge_prices);

        HourlyRevenueResult {
            hourly_dispatch,
            gross_revenue: ledger.gross_revenue,
            charging_cost: ledger.charging_cost,
            efficiency_loss: ledger.charging_cost * (1.0 - self.config.round_trip_efficiency()),
            vom_cost: ledger.vom_cost,
            net_pnl: ledger.gross_revenue - ledger.charging_cost - ledger.vom_cost,
            daily_captured_spread: avg_discharge_price - avg_charge_price,
            avg_charge_price,
            avg_discharge_price,
            cycles_executed: ledger.cycles_executed,
            charge_hours: ledger.hours_with(DispatchAction::Charge),
            discharge_hours: ledger.hours_with(DispatchAction::Discharge),
        }
    }
}

/// Convenience wrapper around [`HourlyOptimizer::simulate`].
pub fn simulate_hourly(
    prices: &[f64],
    config: &HourlyBatteryConfig,
) -> Result<HourlyRevenueResult> {
    HourlyOptimizer::new(config.clone()).simulate(prices)
}

fn validate_prices(prices: &[f64]) -> Result<()> {
    if prices.len() != HOURS_PER_DAY {
        return Err(DispatchError::input(format!(
            "expected {} hourly prices, got {}",
            HOURS_PER_DAY,
            prices.len()
        )));
    }
    if let Some((hour, price)) = prices
        .iter()
        .enumerate()
        .find(|(_, p)| !p.is_finite() || **p < 0.0)
    {
        return Err(DispatchError::input(format!(
            "price for hour {} must be a non-negative number, got {}",
            hour, price
        )));
    }
    Ok(())
}

/// `count` cheapest hours, ties broken by earlier hour.
fn cheapest(prices: &[f64], hours: &[usize], count: usize) -> Vec<usize> {
    let mut sorted = hours.to_vec();
    sorted.sort_by(|&a, &b| prices[a].total_cmp(&prices[b]));
    sorted.truncate(count);
    sorted
}

/// `count` most expensive hours, ties broken by earlier hour.
fn most_expensive(prices: &[f64], hours: &[usize], count: usize) -> Vec<usize> {
    let mut sorted = hours.to_vec();
    sorted.sort_by(|&a, &b| prices[b].total_cmp(&prices[a]));
    sorted.truncate(count);
    sorted
}
