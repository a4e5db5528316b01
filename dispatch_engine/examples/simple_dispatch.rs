use dispatch_engine::models::{AsPrices, RtInterval, INTERVALS_PER_DAY};
use dispatch_engine::{simulate_co_optimized, simulate_hourly, BatteryConfig, HourlyBatteryConfig};

fn main() -> anyhow::Result<()> {
    // A 100 MW / 200 MWh battery against a day with a cheap night and an evening peak.
    let config = HourlyBatteryConfig::tb2(100.0)?;
    let prices: Vec<f64> = (0..24)
        .map(|hour| match hour {
            0..=5 | 21..=23 => 20.0,
            18..=20 => 100.0,
            _ => 50.0,
        })
        .collect();

    let result = simulate_hourly(&prices, &config)?;

    println!("Hourly Dispatch");
    println!("===============");
    println!(
        "Configuration: {} MW / {} MWh",
        config.power_mw(),
        config.energy_capacity_mwh()
    );
    println!("Charge hours: {:?}", result.charge_hours);
    println!("Discharge hours: {:?}", result.discharge_hours);
    println!("Gross revenue: ${:.2}", result.gross_revenue);
    println!("Charging cost: ${:.2}", result.charging_cost);
    println!("Net P&L: ${:.2}", result.net_pnl);
    println!("Captured spread: ${:.2}/MWh", result.daily_captured_spread);
    println!();

    // The same battery on five-minute prices with ancillary services.
    let battery = BatteryConfig::from_duration(100.0, 2.0)?;
    let intervals: Vec<RtInterval> = (0..INTERVALS_PER_DAY)
        .map(|i| {
            let hour = i / 12;
            let reserve = if (17..=20).contains(&hour) { 2.0 } else { 1.0 };
            RtInterval::new(
                i,
                prices[hour],
                AsPrices {
                    reg_up: 8.0 * reserve,
                    reg_down: 5.0,
                    rrs: 10.0 * reserve,
                    ecrs: 18.0 * reserve,
                    non_spin: 3.0,
                },
            )
        })
        .collect();

    let co = simulate_co_optimized(&intervals, &battery)?;

    println!("Co-Optimized Dispatch");
    println!("=====================");
    println!("Discharge revenue: ${:.2}", co.discharge_revenue);
    println!("AS revenue: ${:.2} ({:.1}% of gross)", co.as_revenue, co.as_share() * 100.0);
    println!("Charging cost: ${:.2}", co.charging_cost);
    println!("Net revenue: ${:.2}", co.net_revenue);

    Ok(())
}
