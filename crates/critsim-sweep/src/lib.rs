//! Search and sweep engines for critsim.
//!
//! - [`CriticalValueSearch`]: bisection for the smallest upsetting value of
//!   one parameter
//! - [`NdSweep`]: one search (or Monte Carlo aggregation) per point of the
//!   cartesian grid of sweepable parameters
//! - [`MonteCarlo`]: seeded repetitions at one point, reduced to statistics
//! - [`merge_files`]: column-wise statistics across result files
//!
//! All engines dispatch through a [`BoundedScheduler`] and are generic over
//! [`critsim_core::JobRunner`].

pub mod error;
pub mod grid;
pub mod merge;
pub mod mode;
pub mod monte_carlo;
pub mod orchestrator;
pub mod planes;
pub mod rng;
pub mod scheduler;
pub mod search;
pub mod statistics;

pub use error::{Result, SweepError};
pub use grid::{Axis, Grid, Odometer};
pub use merge::{MergeConfig, merge_contents, merge_files, merge_to_file};
pub use mode::{ModeOutcome, SimulationMode, execute};
pub use monte_carlo::{
    IterationOutcome, IterationRecord, MONTE_CARLO_FILE, MonteCarlo, MonteCarloAggregate,
    MonteCarloConfig, SignalStatistics,
};
pub use orchestrator::{NdSweep, PointOutcome, PointResult, SUMMARY_FILE, SweepConfig, SweepOutcome};
pub use planes::write_planes;
pub use rng::iteration_seed;
pub use scheduler::BoundedScheduler;
pub use search::{CriticalValueSearch, SearchConfig, converged};
pub use statistics::{Percentiles, StatisticsAccumulator, ValueSummary};
