use crate::error::{DispatchError, Result};
use serde::{Deserialize, Serialize};

pub const HOURS_PER_DAY: usize = 24;
pub const INTERVALS_PER_HOUR: usize = 12;
pub const INTERVALS_PER_DAY: usize = HOURS_PER_DAY * INTERVALS_PER_HOUR;

/// Length of one five-minute interval in hours.
pub const INTERVAL_HOURS: f64 = 1.0 / INTERVALS_PER_HOUR as f64;

fn check_positive(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(DispatchError::config(
            field,
            format!("must be a positive number, got {}", value),
        ));
    }
    Ok(())
}

fn check_non_negative(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(DispatchError::config(field, format!("must be non-negative, got {}", value)));
    }
    Ok(())
}

fn check_efficiency(value: f64) -> Result<()> {
    if value == 0.0 {
        return Err(DispatchError::ArithmeticDegenerate(
            "round-trip efficiency of 0 would divide charging cost by zero".to_string(),
        ));
    }
    if !value.is_finite() || value < 0.0 || value > 1.0 {
        return Err(DispatchError::config(
            "round_trip_efficiency",
            format!("must be in (0, 1], got {}", value),
        ));
    }
    Ok(())
}

/// How the hourly optimizer picks the hours of each cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleSelection {
    /// Cheapest unused hours charge, most expensive remaining hours discharge.
    /// Unprofitable cycles are skipped and the loop carries on.
    #[default]
    Greedy,
    /// Charge strictly before a split hour and discharge after it; the next
    /// cycle starts after the last discharge hour and the loop stops at the
    /// first unprofitable cycle.
    Chronological,
}

/// Battery parameters for the hourly single-commodity optimizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyBatteryConfig {
    power_mw: f64,
    duration_hours: f64,
    round_trip_efficiency: f64,
    cycles_per_day: u32,
    vom: f64,
    selection: CycleSelection,
}

impl HourlyBatteryConfig {
    /// `cycles_per_day` of 0 is raised to 1.
    pub fn new(
        power_mw: f64,
        duration_hours: f64,
        round_trip_efficiency: f64,
        cycles_per_day: u32,
        vom: f64,
    ) -> Result<Self> {
        check_positive("power_mw", power_mw)?;
        check_positive("duration_hours", duration_hours)?;
        check_efficiency(round_trip_efficiency)?;
        check_non_negative("vom", vom)?;

        Ok(Self {
            power_mw,
            duration_hours,
            round_trip_efficiency,
            cycles_per_day: cycles_per_day.max(1),
            vom,
            selection: CycleSelection::default(),
        })
    }

    pub fn tb1(power_mw: f64) -> Result<Self> {
        Self::new(power_mw, 1.0, 0.85, 1, 0.0)
    }

    pub fn tb2(power_mw: f64) -> Result<Self> {
        Self::new(power_mw, 2.0, 0.85, 1, 0.0)
    }

    pub fn tb4(power_mw: f64) -> Result<Self> {
        Self::new(power_mw, 4.0, 0.85, 1, 0.0)
    }

    pub fn with_selection(mut self, selection: CycleSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn power_mw(&self) -> f64 {
        self.power_mw
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration_hours
    }

    pub fn round_trip_efficiency(&self) -> f64 {
        self.round_trip_efficiency
    }

    pub fn cycles_per_day(&self) -> u32 {
        self.cycles_per_day
    }

    pub fn vom(&self) -> f64 {
        self.vom
    }

    pub fn selection(&self) -> CycleSelection {
        self.selection
    }

    pub fn energy_capacity_mwh(&self) -> f64 {
        self.power_mw * self.duration_hours
    }

    /// Whole hours charged (and discharged) per cycle, between one and a full day.
    pub fn hours_per_cycle(&self) -> usize {
        (self.duration_hours.round().min(HOURS_PER_DAY as f64) as usize).max(1)
    }
}

/// Battery parameters for the five-minute multi-commodity co-optimizer.
/// Power and energy are independent so any duration can be modelled.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryConfig {
    power_capacity_mw: f64,
    energy_capacity_mwh: f64,
    rte: f64,
    min_soc: f64,
    variable_om: f64,
}

impl BatteryConfig {
    pub fn new(
        power_capacity_mw: f64,
        energy_capacity_mwh: f64,
        rte: f64,
        min_soc: f64,
        variable_om: f64,
    ) -> Result<Self> {
        check_positive("power_capacity_mw", power_capacity_mw)?;
        check_positive("energy_capacity_mwh", energy_capacity_mwh)?;
        check_efficiency(rte)?;
        if !min_soc.is_finite() || !(0.0..1.0).contains(&min_soc) {
            return Err(DispatchError::config(
                "min_soc",
                format!("must be in [0, 1), got {}", min_soc),
            ));
        }
        check_non_negative("variable_om", variable_om)?;

        Ok(Self {
            power_capacity_mw,
            energy_capacity_mwh,
            rte,
            min_soc,
            variable_om,
        })
    }

    /// Battery sized by power and duration, 85% RTE, 5% SoC floor, zero VOM.
    pub fn from_duration(power_mw: f64, duration_hours: f64) -> Result<Self> {
        check_positive("duration_hours", duration_hours)?;
        Self::new(power_mw, power_mw * duration_hours, 0.85, 0.05, 0.0)
    }

    pub fn power_capacity_mw(&self) -> f64 {
        self.power_capacity_mw
    }

    pub fn energy_capacity_mwh(&self) -> f64 {
        self.energy_capacity_mwh
    }

    pub fn rte(&self) -> f64 {
        self.rte
    }

    pub fn min_soc(&self) -> f64 {
        self.min_soc
    }

    pub fn variable_om(&self) -> f64 {
        self.variable_om
    }

    /// Applied once per direction so that charge then discharge loses exactly `rte`.
    pub fn one_way_efficiency(&self) -> f64 {
        self.rte.sqrt()
    }
}

/// Ancillary-service products the co-optimizer can hold capacity for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AsProduct {
    RegUp,
    RegDown,
    Rrs,
    Ecrs,
    NonSpin,
}

impl AsProduct {
    pub const ALL: [AsProduct; 5] = [
        AsProduct::Ecrs,
        AsProduct::Rrs,
        AsProduct::RegUp,
        AsProduct::NonSpin,
        AsProduct::RegDown,
    ];

    /// Fraction of power capacity offered when the product is committed.
    pub fn capacity_share(self) -> f64 {
        match self {
            AsProduct::Ecrs => 0.15,
            AsProduct::Rrs => 0.10,
            AsProduct::RegUp => 0.10,
            AsProduct::NonSpin => 0.08,
            AsProduct::RegDown => 0.08,
        }
    }

    /// Intervals of stored energy that must be held back per committed hour.
    /// Zero for products treated as symmetric or non-depleting.
    pub fn hold_intervals(self) -> usize {
        match self {
            AsProduct::Ecrs => 2 * INTERVALS_PER_HOUR,
            AsProduct::Rrs => INTERVALS_PER_HOUR,
            AsProduct::RegUp | AsProduct::RegDown | AsProduct::NonSpin => 0,
        }
    }

    /// Position of the product in [`AsProduct::ALL`].
    pub fn slot(self) -> usize {
        match self {
            AsProduct::Ecrs => 0,
            AsProduct::Rrs => 1,
            AsProduct::RegUp => 2,
            AsProduct::NonSpin => 3,
            AsProduct::RegDown => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AsProduct::RegUp => "RegUp",
            AsProduct::RegDown => "RegDown",
            AsProduct::Rrs => "RRS",
            AsProduct::Ecrs => "ECRS",
            AsProduct::NonSpin => "NonSpin",
        }
    }
}

/// Hourly clearing prices of all AS products, $/MW-h.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AsPrices {
    pub reg_up: f64,
    pub reg_down: f64,
    pub rrs: f64,
    pub ecrs: f64,
    pub non_spin: f64,
}

/// One five-minute price observation. AS prices are flat across the hour
/// and repeated on each of its intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RtInterval {
    pub interval: usize,
    pub time: String,
    pub hour: usize,
    pub lmp: f64,
    #[serde(rename = "regUpMCPC")]
    pub reg_up_mcpc: f64,
    #[serde(rename = "regDownMCPC")]
    pub reg_down_mcpc: f64,
    #[serde(rename = "rrsMCPC")]
    pub rrs_mcpc: f64,
    #[serde(rename = "ecrsMCPC")]
    pub ecrs_mcpc: f64,
    #[serde(rename = "nonSpinMCPC")]
    pub non_spin_mcpc: f64,
}

impl RtInterval {
    /// Interval `index` of the day with its derived hour and "HH:MM" label.
    pub fn new(index: usize, lmp: f64, prices: AsPrices) -> Self {
        Self {
            interval: index,
            time: Self::time_label(index),
            hour: index / INTERVALS_PER_HOUR,
            lmp,
            reg_up_mcpc: prices.reg_up,
            reg_down_mcpc: prices.reg_down,
            rrs_mcpc: prices.rrs,
            ecrs_mcpc: prices.ecrs,
            non_spin_mcpc: prices.non_spin,
        }
    }

    pub fn time_label(index: usize) -> String {
        let hour = index / INTERVALS_PER_HOUR;
        let minute = (index % INTERVALS_PER_HOUR) * 5;
        format!("{:02}:{:02}", hour, minute)
    }

    pub fn mcpc(&self, product: AsProduct) -> f64 {
        match product {
            AsProduct::RegUp => self.reg_up_mcpc,
            AsProduct::RegDown => self.reg_down_mcpc,
            AsProduct::Rrs => self.rrs_mcpc,
            AsProduct::Ecrs => self.ecrs_mcpc,
            AsProduct::NonSpin => self.non_spin_mcpc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchAction {
    Charge,
    Discharge,
    Idle,
}

impl DispatchAction {
    pub fn as_str(self) -> &'static str {
        match self {
            DispatchAction::Charge => "charge",
            DispatchAction::Discharge => "discharge",
            DispatchAction::Idle => "idle",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyDispatch {
    pub hour: usize,
    pub label: String,
    pub price: f64,
    pub action: DispatchAction,
    /// State of charge after this hour, 0-100%.
    pub soc: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyRevenueResult {
    pub hourly_dispatch: Vec<HourlyDispatch>,
    pub gross_revenue: f64,
    pub charging_cost: f64,
    pub efficiency_loss: f64,
    pub vom_cost: f64,
    #[serde(rename = "netPnL")]
    pub net_pnl: f64,
    pub daily_captured_spread: f64,
    pub avg_charge_price: f64,
    pub avg_discharge_price: f64,
    pub cycles_executed: u32,
    pub charge_hours: Vec<usize>,
    pub discharge_hours: Vec<usize>,
}

impl HourlyRevenueResult {
    pub fn empty() -> Self {
        Self {
            hourly_dispatch: vec![],
            gross_revenue: 0.0,
            charging_cost: 0.0,
            efficiency_loss: 0.0,
            vom_cost: 0.0,
            net_pnl: 0.0,
            daily_captured_spread: 0.0,
            avg_charge_price: 0.0,
            avg_discharge_price: 0.0,
            cycles_executed: 0,
            charge_hours: vec![],
            discharge_hours: vec![],
        }
    }
}

/// MW of each AS product committed for one interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsAwards {
    #[serde(rename = "regUpMW")]
    pub reg_up_mw: f64,
    #[serde(rename = "regDownMW")]
    pub reg_down_mw: f64,
    #[serde(rename = "rrsMW")]
    pub rrs_mw: f64,
    #[serde(rename = "ecrsMW")]
    pub ecrs_mw: f64,
    #[serde(rename = "nonSpinMW")]
    pub non_spin_mw: f64,
}

impl AsAwards {
    pub fn get(&self, product: AsProduct) -> f64 {
        match product {
            AsProduct::RegUp => self.reg_up_mw,
            AsProduct::RegDown => self.reg_down_mw,
            AsProduct::Rrs => self.rrs_mw,
            AsProduct::Ecrs => self.ecrs_mw,
            AsProduct::NonSpin => self.non_spin_mw,
        }
    }

    pub fn set(&mut self, product: AsProduct, mw: f64) {
        match product {
            AsProduct::RegUp => self.reg_up_mw = mw,
            AsProduct::RegDown => self.reg_down_mw = mw,
            AsProduct::Rrs => self.rrs_mw = mw,
            AsProduct::Ecrs => self.ecrs_mw = mw,
            AsProduct::NonSpin => self.non_spin_mw = mw,
        }
    }

    pub fn total_mw(&self) -> f64 {
        AsProduct::ALL.iter().map(|p| self.get(*p)).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchInterval {
    #[serde(flatten)]
    pub interval: RtInterval,
    #[serde(rename = "dischargeMW")]
    pub discharge_mw: f64,
    #[serde(rename = "chargeMW")]
    pub charge_mw: f64,
    #[serde(flatten)]
    pub awards: AsAwards,
    /// State of charge after this interval, 0-100%.
    pub soc: f64,
    /// Percent of energy capacity held above the floor for AS obligations.
    pub soc_reserved: f64,
    pub energy_revenue: f64,
    pub as_revenue: f64,
    pub vom_cost: f64,
}

impl DispatchInterval {
    pub fn action(&self) -> DispatchAction {
        if self.discharge_mw > 0.0 {
            DispatchAction::Discharge
        } else if self.charge_mw > 0.0 {
            DispatchAction::Charge
        } else {
            DispatchAction::Idle
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoOptimizedResult {
    pub dispatch: Vec<DispatchInterval>,
    /// Net energy arbitrage: discharge sales minus charging purchases.
    pub energy_revenue: f64,
    pub reg_up_revenue: f64,
    pub reg_down_revenue: f64,
    pub rrs_revenue: f64,
    pub ecrs_revenue: f64,
    pub non_spin_revenue: f64,
    pub discharge_revenue: f64,
    pub as_revenue: f64,
    pub gross_revenue: f64,
    pub charging_cost: f64,
    pub vom_cost: f64,
    pub net_revenue: f64,
    pub energy_charged_mwh: f64,
    pub energy_discharged_mwh: f64,
    pub charge_threshold: f64,
    pub break_even: f64,
}

impl CoOptimizedResult {
    pub fn empty() -> Self {
        Self {
            dispatch: vec![],
            energy_revenue: 0.0,
            reg_up_revenue: 0.0,
            reg_down_revenue: 0.0,
            rrs_revenue: 0.0,
            ecrs_revenue: 0.0,
            non_spin_revenue: 0.0,
            discharge_revenue: 0.0,
            as_revenue: 0.0,
            gross_revenue: 0.0,
            charging_cost: 0.0,
            vom_cost: 0.0,
            net_revenue: 0.0,
            energy_charged_mwh: 0.0,
            energy_discharged_mwh: 0.0,
            charge_threshold: 0.0,
            break_even: 0.0,
        }
    }

    pub fn revenue_for(&self, product: AsProduct) -> f64 {
        match product {
            AsProduct::RegUp => self.reg_up_revenue,
            AsProduct::RegDown => self.reg_down_revenue,
            AsProduct::Rrs => self.rrs_revenue,
            AsProduct::Ecrs => self.ecrs_revenue,
            AsProduct::NonSpin => self.non_spin_revenue,
        }
    }

    /// Share of gross revenue earned from AS capacity payments.
    pub fn as_share(&self) -> f64 {
        if self.gross_revenue > 0.0 {
            self.as_revenue / self.gross_revenue
        } else {
            0.0
        }
    }
}
