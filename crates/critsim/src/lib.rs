//! # critsim
//!
//! Finds the smallest perturbation at which a simulated circuit diverges
//! from its golden run, and repeats the search across parameter grids and
//! Monte Carlo repetitions.
//!
//! critsim provides:
//! - Parameters with linear and logarithmic sweep steps
//! - PSF-ASCII waveform reading and policy-driven waveform comparison
//! - Bisection search for the critical parameter value
//! - N-dimensional sweeps and Monte Carlo aggregation over a bounded
//!   worker pool
//! - Column-wise statistics across result files
//!
//! ## Quick Start
//!
//! ```rust
//! use critsim::prelude::*;
//!
//! let golden = Signal::from_samples("q", &[(0.0, 0.0), (1e-9, 1.2)]);
//! let candidate = Signal::from_samples("q", &[(0.0, 0.0), (1e-9, 0.2)]);
//!
//! let record = compare_signal(&golden, &candidate, &ErrorPolicy::uniform(0.1, 0.0)).unwrap();
//! assert!(record.has_divergence());
//! ```
//!
//! ## Searching a Critical Value
//!
//! ```rust,ignore
//! use critsim::prelude::*;
//!
//! let runner = ExternalJobRunner::new(simulator, template, tracked, golden)?;
//! let search = CriticalValueSearch::new(runner, SearchConfig::new("charge"));
//! let job = SimulationJob::new("search", "runs/search", params);
//! let result = search.run(&job, &RunContext::detached("search"))?;
//! println!("{:e} ({})", result.value, result.classification);
//! ```

pub use critsim_core as core;
pub use critsim_sweep as sweep;
pub use critsim_validate as validate;

// ============================================================================
// Convenient re-exports from critsim_core
// ============================================================================

pub use critsim_core::{
    ChangeMode,
    Classification,
    ComparisonMode,
    CriticalValueResult,
    // Errors
    Error,
    ErrorKind,
    ErrorLog,
    ErrorPolicy,
    ErrorRecord,
    ExitStatus,
    // Jobs
    FnRunner,
    JobResult,
    JobRunner,
    // Parameters
    Parameter,
    ParameterConfig,
    ParameterSet,
    Regime,
    RunContext,
    Signal,
    SimulationJob,
    Tolerance,
    TrackedSignal,
    Verdict,
};

// ============================================================================
// Convenient re-exports from critsim_validate
// ============================================================================

pub use critsim_validate::{
    CircuitTemplate,
    ComparisonReport,
    DataFormat,
    ExternalJobRunner,
    GoldenReference,
    PsfLayout,
    SimulatorConfig,
    Waveform,
    // Comparison
    compare_report,
    compare_signal,
    compare_signals,
    interpolate,
    // Golden files
    load_golden_file,
    // PSF
    read_psf,
    save_golden_file,
};

// ============================================================================
// Convenient re-exports from critsim_sweep
// ============================================================================

pub use critsim_sweep::{
    BoundedScheduler,
    CriticalValueSearch,
    MergeConfig,
    ModeOutcome,
    MonteCarlo,
    MonteCarloAggregate,
    MonteCarloConfig,
    NdSweep,
    SearchConfig,
    SimulationMode,
    SweepConfig,
    SweepError,
    SweepOutcome,
    execute,
    merge_files,
    merge_to_file,
};

/// Prelude module containing commonly used types and traits.
///
/// ```rust
/// use critsim::prelude::*;
/// ```
pub mod prelude {
    // Data model
    pub use crate::{
        Classification, ErrorPolicy, ErrorRecord, JobResult, Parameter, ParameterSet, Signal,
        TrackedSignal, Verdict,
    };

    // Running jobs
    pub use crate::{JobRunner, RunContext, SimulationJob};

    // Simulator and comparison
    pub use crate::{
        CircuitTemplate, ExternalJobRunner, GoldenReference, SimulatorConfig, compare_signal,
    };

    // Engines
    pub use crate::{
        CriticalValueSearch, MonteCarloConfig, NdSweep, SearchConfig, SimulationMode, SweepConfig,
        execute,
    };
}
