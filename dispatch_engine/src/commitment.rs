//! First pass of the co-optimizer: hourly ancillary-service commitments.
//!
//! Each hour is judged on its median LMP and its flat clearing prices.
//! Products that must be able to deliver energy (ECRS, RRS) hold back stored
//! energy for their full hold window, and are only awarded when that energy
//! fits under the reservable headroom at every interval of the window.

use crate::models::{AsAwards, AsProduct, BatteryConfig, RtInterval, INTERVALS_PER_HOUR};
use crate::stats::{median, percentile};
use log::debug;

/// Percentile of the day's LMPs below which the battery is considered to be charging.
pub const CHARGE_PERCENTILE: f64 = 25.0;

/// One product awarded for one hour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourCommitment {
    pub hour: usize,
    pub product: AsProduct,
    pub mw: f64,
    /// Energy held back over the hold window, zero for non-depleting products.
    pub reserved_mwh: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommitmentPlan {
    awards: Vec<AsAwards>,
    reserved_mwh: Vec<f64>,
    commitments: Vec<HourCommitment>,
    charge_threshold: f64,
    energy_capacity_mwh: f64,
}

impl CommitmentPlan {
    /// `intervals` must already be a validated day of five-minute records.
    pub fn build(intervals: &[RtInterval], config: &BatteryConfig) -> Self {
        let lmps: Vec<f64> = intervals.iter().map(|iv| iv.lmp).collect();
        let mut plan = Self {
            awards: vec![AsAwards::default(); intervals.len()],
            reserved_mwh: vec![0.0; intervals.len()],
            commitments: Vec::new(),
            charge_threshold: percentile(&lmps, CHARGE_PERCENTILE),
            energy_capacity_mwh: config.energy_capacity_mwh(),
        };

        for (hour, hour_intervals) in intervals.chunks(INTERVALS_PER_HOUR).enumerate() {
            let hour_lmps: Vec<f64> = hour_intervals.iter().map(|iv| iv.lmp).collect();
            let median_lmp = median(&hour_lmps);
            let start = hour * INTERVALS_PER_HOUR;

            for product in AsProduct::ALL {
                let mcpc = hour_intervals[0].mcpc(product);
                if !plan.is_economic(product, mcpc, median_lmp, config) {
                    continue;
                }
                plan.try_commit(hour, start, product, config);
            }
        }

        plan
    }

    fn is_economic(
        &self,
        product: AsProduct,
        mcpc: f64,
        median_lmp: f64,
        config: &BatteryConfig,
    ) -> bool {
        match product {
            // Energy-holding reserves must beat a share of the energy they lock up.
            AsProduct::Ecrs => mcpc > median_lmp * config.rte() * 0.5,
            AsProduct::Rrs => mcpc > median_lmp * config.rte() * 0.4,
            AsProduct::RegUp => mcpc > config.variable_om(),
            AsProduct::NonSpin => mcpc > config.variable_om() * 0.5,
            AsProduct::RegDown => median_lmp < self.charge_threshold,
        }
    }

    fn try_commit(
        &mut self,
        hour: usize,
        start: usize,
        product: AsProduct,
        config: &BatteryConfig,
    ) {
        let mw = config.power_capacity_mw() * product.capacity_share();
        let hold = product.hold_intervals();

        if hold == 0 {
            let end = (start + INTERVALS_PER_HOUR).min(self.awards.len());
            for award in &mut self.awards[start..end] {
                award.set(product, mw);
            }
            self.record(hour, product, mw, 0.0);
            return;
        }

        let needed_mwh = mw * hold as f64 / INTERVALS_PER_HOUR as f64;
        let end = (start + hold).min(self.awards.len());
        let reservable = (1.0 - config.min_soc()) * config.energy_capacity_mwh();
        let fits = self.reserved_mwh[start..end]
            .iter()
            .all(|reserved| needed_mwh <= reservable - reserved);
        if !fits {
            debug!(
                "{} hour {} skipped: no headroom for {:.2} MWh",
                product.name(),
                hour,
                needed_mwh
            );
            return;
        }

        for k in start..end {
            self.awards[k].set(product, mw);
            self.reserved_mwh[k] += needed_mwh;
        }
        self.record(hour, product, mw, needed_mwh);
    }

    fn record(&mut self, hour: usize, product: AsProduct, mw: f64, reserved_mwh: f64) {
        debug!("{} committed for hour {}: {:.2} MW", product.name(), hour, mw);
        self.commitments.push(HourCommitment {
            hour,
            product,
            mw,
            reserved_mwh,
        });
    }

    pub fn charge_threshold(&self) -> f64 {
        self.charge_threshold
    }

    pub fn awards(&self, interval: usize) -> AsAwards {
        self.awards.get(interval).copied().unwrap_or_default()
    }

    pub fn reserved_mwh(&self, interval: usize) -> f64 {
        self.reserved_mwh.get(interval).copied().unwrap_or(0.0)
    }

    /// Reserved energy as a percentage of energy capacity.
    pub fn reserved_percent(&self, interval: usize) -> f64 {
        self.reserved_mwh(interval) / self.energy_capacity_mwh * 100.0
    }

    pub fn commitments(&self) -> &[HourCommitment] {
        &self.commitments
    }

    pub fn committed_hours(&self, product: AsProduct) -> Vec<usize> {
        self.commitments
            .iter()
            .filter(|c| c.product == product)
            .map(|c| c.hour)
            .collect()
    }

    pub fn max_reserved_mwh(&self) -> f64 {
        self.reserved_mwh.iter().copied().fold(0.0, f64::max)
    }
}
