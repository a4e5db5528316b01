use crate::backtest::DailyResult;
use chrono::Datelike;
use std::collections::BTreeMap;

/// Revenue waterfall of one scenario over one calendar month.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlySummary {
    pub year: i32,
    pub month: u32,
    pub scenario: String,
    pub days: usize,
    pub gross_revenue: f64,
    pub as_revenue: f64,
    pub charging_cost: f64,
    pub vom_cost: f64,
    pub net_revenue: f64,
}

impl MonthlySummary {
    pub fn label(&self) -> String {
        format!("{}-{:02}", self.year, self.month)
    }

    pub fn as_share(&self) -> f64 {
        if self.gross_revenue > 0.0 {
            self.as_revenue / self.gross_revenue
        } else {
            0.0
        }
    }
}

/// Group daily rows by month and scenario, ordered by month then scenario name.
pub fn summarize_monthly(results: &[DailyResult]) -> Vec<MonthlySummary> {
    let mut months: BTreeMap<(i32, u32, String), MonthlySummary> = BTreeMap::new();

    for row in results {
        let key = (row.date.year(), row.date.month(), row.scenario.clone());
        let summary = months.entry(key).or_insert_with(|| MonthlySummary {
            year: row.date.year(),
            month: row.date.month(),
            scenario: row.scenario.clone(),
            days: 0,
            gross_revenue: 0.0,
            as_revenue: 0.0,
            charging_cost: 0.0,
            vom_cost: 0.0,
            net_revenue: 0.0,
        });
        summary.days += 1;
        summary.gross_revenue += row.gross_revenue;
        summary.as_revenue += row.as_revenue;
        summary.charging_cost += row.charging_cost;
        summary.vom_cost += row.vom_cost;
        summary.net_revenue += row.net_revenue;
    }

    months.into_values().collect()
}

pub fn print_monthly_summary(summaries: &[MonthlySummary]) {
    println!("\n📊 Monthly Revenue Summary:");
    println!("Month   | Scenario     | Days | Gross Rev   | Charge Cost | VOM       | Net Rev     | AS %");
    println!("{}", "-".repeat(95));

    for s in summaries {
        println!(
            "{} | {:<12} | {:>4} | ${:>10.2} | ${:>10.2} | ${:>8.2} | ${:>10.2} | {:>5.1}%",
            s.label(),
            s.scenario,
            s.days,
            s.gross_revenue,
            s.charging_cost,
            s.vom_cost,
            s.net_revenue,
            s.as_share() * 100.0
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(
        date: (i32, u32, u32),
        scenario: &str,
        gross: f64,
        as_revenue: f64,
        cost: f64,
    ) -> DailyResult {
        DailyResult {
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            scenario: scenario.to_string(),
            mode: "co_optimized",
            cycles: 1.0,
            energy_revenue: gross - as_revenue - cost,
            discharge_revenue: gross - as_revenue,
            reg_up_revenue: as_revenue,
            reg_down_revenue: 0.0,
            rrs_revenue: 0.0,
            ecrs_revenue: 0.0,
            non_spin_revenue: 0.0,
            as_revenue,
            gross_revenue: gross,
            charging_cost: cost,
            efficiency_loss: 0.0,
            vom_cost: 5.0,
            net_revenue: gross - cost - 5.0,
        }
    }

    #[test]
    fn test_monthly_grouping_and_totals() {
        let results = vec![
            row((2024, 2, 1), "TB2", 200.0, 50.0, 40.0),
            row((2024, 1, 31), "TB2", 100.0, 25.0, 20.0),
            row((2024, 1, 30), "TB1", 80.0, 0.0, 10.0),
            row((2024, 1, 1), "TB2", 300.0, 75.0, 60.0),
        ];
        let summaries = summarize_monthly(&results);

        let keys: Vec<_> = summaries.iter().map(|s| (s.label(), s.scenario.as_str())).collect();
        assert_eq!(
            keys,
            vec![
                ("2024-01".to_string(), "TB1"),
                ("2024-01".to_string(), "TB2"),
                ("2024-02".to_string(), "TB2"),
            ]
        );

        let jan_tb2 = &summaries[1];
        assert_eq!(jan_tb2.days, 2);
        assert!((jan_tb2.gross_revenue - 400.0).abs() < 1e-9);
        assert!((jan_tb2.charging_cost - 80.0).abs() < 1e-9);
        assert!((jan_tb2.vom_cost - 10.0).abs() < 1e-9);
        assert!((jan_tb2.net_revenue - 310.0).abs() < 1e-9);
        assert!((jan_tb2.as_share() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_as_share_without_revenue() {
        let summaries = summarize_monthly(&[row((2024, 3, 1), "TB4", 0.0, 0.0, 0.0)]);
        assert_eq!(summaries[0].as_share(), 0.0);
        assert!(summarize_monthly(&[]).is_empty());
    }
}
