use crate::commitment::CommitmentPlan;
use crate::error::{DispatchError, Result};
use crate::models::{
    AsProduct, BatteryConfig, CoOptimizedResult, DispatchInterval, RtInterval, INTERVALS_PER_DAY,
    INTERVALS_PER_HOUR, INTERVAL_HOURS,
};
use crate::stats::clamp;
use chrono::{NaiveTime, Timelike};
use log::{debug, info};

/// State of charge at midnight before any dispatch, percent.
pub const INITIAL_SOC_PERCENT: f64 = 50.0;

/// Five-minute energy + ancillary-service co-optimization.
///
/// Pass 1 ([`CommitmentPlan`]) awards AS capacity hour by hour and reserves
/// energy for products with a hold duration. Pass 2 walks the day interval by
/// interval and runs threshold arbitrage on whatever SoC is left above the
/// floor and the reservation. AS revenue is capacity payment only: committed
/// capacity is never called, so it does not move SoC.
pub struct CoOptimizer {
    config: BatteryConfig,
}

#[derive(Default)]
struct Totals {
    energy_revenue: f64,
    discharge_revenue: f64,
    charging_cost: f64,
    vom_cost: f64,
    as_revenue: [f64; 5],
    energy_charged_mwh: f64,
    energy_discharged_mwh: f64,
}

impl Totals {
    fn add_as(&mut self, product: AsProduct, revenue: f64) {
        self.as_revenue[product.slot()] += revenue;
    }

    fn as_for(&self, product: AsProduct) -> f64 {
        self.as_revenue[product.slot()]
    }
}

impl CoOptimizer {
    pub fn new(config: BatteryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BatteryConfig {
        &self.config
    }

    /// VOM amortised over the full round trip, $/MWh.
    pub fn break_even(&self) -> f64 {
        self.config.variable_om() / self.config.rte()
    }

    /// Dispatch one day of 288 five-minute intervals. An empty slice yields an
    /// empty, all-zero result.
    pub fn simulate(&self, intervals: &[RtInterval]) -> Result<CoOptimizedResult> {
        if intervals.is_empty() {
            return Ok(CoOptimizedResult::empty());
        }
        validate_intervals(intervals)?;

        let plan = CommitmentPlan::build(intervals, &self.config);
        debug!(
            "AS plan: {} hour commitments, charge threshold ${:.2}, peak reservation {:.2} MWh",
            plan.commitments().len(),
            plan.charge_threshold(),
            plan.max_reserved_mwh()
        );

        let (dispatch, totals) = self.dispatch_energy(intervals, &plan);

        let as_revenue: f64 = totals.as_revenue.iter().sum();
        let gross_revenue = totals.discharge_revenue + as_revenue;
        let result = CoOptimizedResult {
            dispatch,
            energy_revenue: totals.energy_revenue,
            reg_up_revenue: totals.as_for(AsProduct::RegUp),
            reg_down_revenue: totals.as_for(AsProduct::RegDown),
            rrs_revenue: totals.as_for(AsProduct::Rrs),
            ecrs_revenue: totals.as_for(AsProduct::Ecrs),
            non_spin_revenue: totals.as_for(AsProduct::NonSpin),
            discharge_revenue: totals.discharge_revenue,
            as_revenue,
            gross_revenue,
            charging_cost: totals.charging_cost,
            vom_cost: totals.vom_cost,
            net_revenue: gross_revenue - totals.charging_cost - totals.vom_cost,
            energy_charged_mwh: totals.energy_charged_mwh,
            energy_discharged_mwh: totals.energy_discharged_mwh,
            charge_threshold: plan.charge_threshold(),
            break_even: self.break_even(),
        };

        info!(
            "Co-optimized dispatch: gross ${:.2}, net ${:.2}, AS share {:.1}%",
            result.gross_revenue,
            result.net_revenue,
            result.as_share() * 100.0
        );
        Ok(result)
    }

    fn dispatch_energy(
        &self,
        intervals: &[RtInterval],
        plan: &CommitmentPlan,
    ) -> (Vec<DispatchInterval>, Totals) {
        let power = self.config.power_capacity_mw();
        let energy = self.config.energy_capacity_mwh();
        let efficiency = self.config.one_way_efficiency();
        let vom = self.config.variable_om();
        let floor = self.config.min_soc() * 100.0;
        let break_even = self.break_even();
        let charge_threshold = plan.charge_threshold();

        let mut soc = clamp(INITIAL_SOC_PERCENT, floor, 100.0);
        let mut totals = Totals::default();
        let mut dispatch = Vec::with_capacity(intervals.len());

        for (i, iv) in intervals.iter().enumerate() {
            let reserved = plan.reserved_percent(i);
            let awards = plan.awards(i);

            let above_floor = soc / 100.0 - self.config.min_soc() - reserved / 100.0;
            let discharge_mwh = (above_floor * energy).max(0.0);
            let available_discharge =
                clamp(discharge_mwh * efficiency / INTERVAL_HOURS, 0.0, power);

            let headroom_mwh = ((1.0 - soc / 100.0) * energy).max(0.0);
            let available_charge = clamp(headroom_mwh / efficiency / INTERVAL_HOURS, 0.0, power);

            // Discharge is checked first so overlapping thresholds favour selling.
            let (discharge_mw, charge_mw) = if iv.lmp > break_even && available_discharge > 0.0 {
                (available_discharge, 0.0)
            } else if iv.lmp < charge_threshold && available_charge > 0.0 {
                (0.0, available_charge)
            } else {
                (0.0, 0.0)
            };

            soc += charge_mw * efficiency * INTERVAL_HOURS / energy * 100.0;
            soc -= discharge_mw / efficiency * INTERVAL_HOURS / energy * 100.0;
            soc = clamp(soc, floor, 100.0);

            let energy_revenue = (discharge_mw - charge_mw) * iv.lmp * INTERVAL_HOURS;
            let vom_cost = (discharge_mw + charge_mw) * vom * INTERVAL_HOURS;
            let mut as_revenue = 0.0;
            for product in AsProduct::ALL {
                let revenue = awards.get(product) * iv.mcpc(product) * INTERVAL_HOURS;
                totals.add_as(product, revenue);
                as_revenue += revenue;
            }

            totals.energy_revenue += energy_revenue;
            totals.discharge_revenue += discharge_mw * iv.lmp * INTERVAL_HOURS;
            totals.charging_cost += charge_mw * iv.lmp * INTERVAL_HOURS;
            totals.vom_cost += vom_cost;
            totals.energy_charged_mwh += charge_mw * INTERVAL_HOURS;
            totals.energy_discharged_mwh += discharge_mw * INTERVAL_HOURS;

            dispatch.push(DispatchInterval {
                interval: iv.clone(),
                discharge_mw,
                charge_mw,
                awards,
                soc,
                soc_reserved: reserved,
                energy_revenue,
                as_revenue,
                vom_cost,
            });
        }

        (dispatch, totals)
    }
}

/// Convenience wrapper around [`CoOptimizer::simulate`].
pub fn simulate_co_optimized(
    intervals: &[RtInterval],
    config: &BatteryConfig,
) -> Result<CoOptimizedResult> {
    CoOptimizer::new(config.clone()).simulate(intervals)
}

/// A day must be exactly 288 consecutive intervals with consistent hour and
/// "HH:MM" labels and non-negative finite prices.
pub fn validate_intervals(intervals: &[RtInterval]) -> Result<()> {
    if intervals.len() != INTERVALS_PER_DAY {
        return Err(DispatchError::input(format!(
            "expected {} five-minute intervals, got {}",
            INTERVALS_PER_DAY,
            intervals.len()
        )));
    }

    for (i, iv) in intervals.iter().enumerate() {
        if iv.interval != i {
            return Err(DispatchError::input(format!(
                "record at position {} carries interval index {}",
                i, iv.interval
            )));
        }
        if iv.hour != i / INTERVALS_PER_HOUR {
            return Err(DispatchError::input(format!(
                "interval {} is labelled hour {}, expected {}",
                i,
                iv.hour,
                i / INTERVALS_PER_HOUR
            )));
        }

        let time = NaiveTime::parse_from_str(&iv.time, "%H:%M")
            .map_err(|e| {
                DispatchError::input(format!("interval {} time '{}': {}", i, iv.time, e))
            })?;
        let minute_of_day = (time.hour() * 60 + time.minute()) as usize;
        if minute_of_day != i * 5 {
            return Err(DispatchError::input(format!(
                "interval {} has time {}, expected {}",
                i,
                iv.time,
                RtInterval::time_label(i)
            )));
        }

        let prices = [
            ("lmp", iv.lmp),
            ("regUpMCPC", iv.reg_up_mcpc),
            ("regDownMCPC", iv.reg_down_mcpc),
            ("rrsMCPC", iv.rrs_mcpc),
            ("ecrsMCPC", iv.ecrs_mcpc),
            ("nonSpinMCPC", iv.non_spin_mcpc),
        ];
        if let Some((name, value)) = prices.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
            return Err(DispatchError::input(format!(
                "interval {} {} must be a non-negative number, got {}",
                i, name, value
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AsPrices, DispatchAction};

    fn day(lmp: impl Fn(usize) -> f64, prices: impl Fn(usize) -> AsPrices) -> Vec<RtInterval> {
        (0..INTERVALS_PER_DAY)
            .map(|i| RtInterval::new(i, lmp(i), prices(i / INTERVALS_PER_HOUR)))
            .collect()
    }

    /// Overnight valley, midday plateau and an evening peak.
    fn summer_day() -> Vec<RtInterval> {
        day(
            |i| {
                let hour = i as f64 / 12.0;
                match i / 12 {
                    0..=4 => 20.0 - 5.0 * (hour / 5.0 * std::f64::consts::PI).sin(),
                    5..=7 => 25.0 + (hour - 5.0) * 10.0,
                    8..=15 => 65.0 + 15.0 * ((hour - 8.0) / 8.0 * std::f64::consts::PI).sin(),
                    16..=19 => 80.0 + 100.0 * ((hour - 16.0) / 4.0 * std::f64::consts::PI).sin(),
                    _ => 38.0,
                }
            },
            |hour| {
                let load = if (15..=20).contains(&hour) { 1.4 } else { 0.8 };
                AsPrices {
                    reg_up: 12.0 * load,
                    reg_down: 6.0,
                    rrs: 14.0 * load,
                    ecrs: 30.0 * load,
                    non_spin: 4.0,
                }
            },
        )
    }

    #[test]
    fn test_constant_lmp_discharges_without_as_revenue() {
        let config = BatteryConfig::new(10.0, 40.0, 0.81, 0.0, 2.0).unwrap();
        let intervals = day(|_| 30.0, |_| AsPrices::default());
        let result = simulate_co_optimized(&intervals, &config).unwrap();

        assert!((result.break_even - 2.0 / 0.81).abs() < 1e-12);
        assert_eq!(result.charge_threshold, 30.0);
        assert_eq!(result.dispatch.len(), INTERVALS_PER_DAY);
        assert_eq!(result.dispatch[0].action(), DispatchAction::Discharge);
        assert_eq!(result.dispatch[0].discharge_mw, 10.0);
        for interval in &result.dispatch {
            assert!(interval.charge_mw == 0.0 || interval.discharge_mw == 0.0);
            assert_eq!(interval.charge_mw, 0.0);
            assert_eq!(interval.as_revenue, 0.0);
            assert_eq!(interval.awards.total_mw(), 0.0);
        }
        assert_eq!(result.as_revenue, 0.0);
        assert_eq!(result.energy_charged_mwh, 0.0);
        // Half the battery is sold through the one-way efficiency.
        assert!((result.energy_discharged_mwh - 20.0 * 0.9).abs() < 1e-6);
        assert!(result.dispatch.last().unwrap().soc < 1e-6);
    }

    #[test]
    fn test_soc_respects_floor_and_reservation() {
        let config = BatteryConfig::new(50.0, 200.0, 0.85, 0.1, 1.5).unwrap();
        let result = simulate_co_optimized(&summer_day(), &config).unwrap();

        assert!(result.ecrs_revenue > 0.0);
        let reservable = (1.0 - config.min_soc()) * config.energy_capacity_mwh();
        for interval in &result.dispatch {
            assert!(interval.soc >= 10.0 - 1e-9 && interval.soc <= 100.0 + 1e-9);
            let reserved_mwh = interval.soc_reserved / 100.0 * config.energy_capacity_mwh();
            assert!(reserved_mwh <= reservable + 1e-9);
            assert!(interval.charge_mw == 0.0 || interval.discharge_mw == 0.0);
            assert!(interval.charge_mw <= 50.0 && interval.discharge_mw <= 50.0);
            if interval.discharge_mw > 0.0 {
                assert!(interval.soc >= 10.0 + interval.soc_reserved - 1e-9);
            }
        }
    }

    #[test]
    fn test_revenue_waterfall_adds_up() {
        let config = BatteryConfig::new(50.0, 200.0, 0.85, 0.05, 3.0).unwrap();
        let result = simulate_co_optimized(&summer_day(), &config).unwrap();

        let by_product: f64 = AsProduct::ALL.iter().map(|p| result.revenue_for(*p)).sum();
        assert!((result.as_revenue - by_product).abs() < 1e-6);
        let gross = result.discharge_revenue + result.as_revenue;
        assert!((result.gross_revenue - gross).abs() < 1e-6);
        let net = result.gross_revenue - result.charging_cost - result.vom_cost;
        assert!((result.net_revenue - net).abs() < 1e-9);
        assert!(
            (result.energy_revenue - (result.discharge_revenue - result.charging_cost)).abs() < 1e-6
        );
        let per_interval: f64 = result.dispatch.iter().map(|d| d.energy_revenue).sum();
        assert!((per_interval - result.energy_revenue).abs() < 1e-6);
        let vom: f64 = result.dispatch.iter().map(|d| d.vom_cost).sum();
        assert!((vom - result.vom_cost).abs() < 1e-6);
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let config = BatteryConfig::from_duration(25.0, 2.0).unwrap();
        let intervals = summer_day();
        let first = simulate_co_optimized(&intervals, &config).unwrap();
        let second = simulate_co_optimized(&intervals, &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rising_prices_never_create_energy() {
        let config = BatteryConfig::new(10.0, 40.0, 0.81, 0.0, 20.0).unwrap();
        let intervals = day(|i| (i + 1) as f64, |_| AsPrices::default());
        let result = simulate_co_optimized(&intervals, &config).unwrap();

        let efficiency = config.one_way_efficiency();
        assert!(result.energy_charged_mwh > 0.0);
        let stored = result.energy_charged_mwh * efficiency * efficiency;
        assert!(stored <= result.energy_discharged_mwh + 1e-9);
        // Cheap early intervals charge, later ones sell.
        assert_eq!(result.dispatch[0].action(), DispatchAction::Charge);
        assert_eq!(result.dispatch[30].action(), DispatchAction::Discharge);
    }

    #[test]
    fn test_initial_soc_raised_to_floor() {
        let config = BatteryConfig::new(10.0, 40.0, 0.81, 0.6, 0.0).unwrap();
        let intervals = day(|_| 30.0, |_| AsPrices::default());
        let result = simulate_co_optimized(&intervals, &config).unwrap();

        assert_eq!(result.energy_discharged_mwh, 0.0);
        assert!(result.dispatch.iter().all(|d| (d.soc - 60.0).abs() < 1e-9));
    }

    #[test]
    fn test_empty_day_gives_empty_result() {
        let config = BatteryConfig::from_duration(10.0, 4.0).unwrap();
        assert_eq!(simulate_co_optimized(&[], &config).unwrap(), CoOptimizedResult::empty());
    }

    #[test]
    fn test_malformed_intervals_rejected() {
        let config = BatteryConfig::from_duration(10.0, 4.0).unwrap();
        let good = day(|_| 30.0, |_| AsPrices::default());

        assert!(matches!(
            simulate_co_optimized(&good[..287], &config),
            Err(DispatchError::MalformedInput(_))
        ));

        let mut shuffled = good.clone();
        shuffled.swap(3, 4);
        assert!(simulate_co_optimized(&shuffled, &config).is_err());

        let mut bad_time = good.clone();
        bad_time[5].time = "00:26".to_string();
        assert!(simulate_co_optimized(&bad_time, &config).is_err());

        let mut garbled = good.clone();
        garbled[5].time = "five past".to_string();
        assert!(simulate_co_optimized(&garbled, &config).is_err());

        let mut negative = good.clone();
        negative[100].lmp = -12.0;
        assert!(simulate_co_optimized(&negative, &config).is_err());

        let mut nan = good;
        nan[200].rrs_mcpc = f64::NAN;
        assert!(simulate_co_optimized(&nan, &config).is_err());
    }
}
