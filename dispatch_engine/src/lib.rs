pub mod error;
pub mod models;
pub mod stats;
pub mod hourly_optimizer;
pub mod commitment;
pub mod co_optimizer;
pub mod data_loader;
pub mod scenario;

pub use error::DispatchError;
pub use models::{BatteryConfig, CycleSelection, HourlyBatteryConfig, RtInterval};
pub use hourly_optimizer::{simulate_hourly, HourlyOptimizer};
pub use co_optimizer::{simulate_co_optimized, CoOptimizer};
pub use commitment::CommitmentPlan;
pub use data_loader::DataLoader;
pub use scenario::{Scenario, ScenarioSet};
