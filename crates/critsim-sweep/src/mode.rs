//! Simulation modes.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use critsim_core::{
    CriticalValueResult, JobResult, JobRunner, ParameterSet, RunContext, SimulationJob,
};

use crate::error::Result;
use crate::monte_carlo::{MonteCarlo, MonteCarloAggregate, MonteCarloConfig};
use crate::orchestrator::{NdSweep, SweepConfig, SweepOutcome};
use crate::search::{CriticalValueSearch, SearchConfig};

/// What a run does with the parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SimulationMode {
    /// One simulation at the configured values.
    Standard,
    CriticalValue {
        search: SearchConfig,
    },
    NdSweep {
        sweep: SweepConfig,
    },
    /// Monte Carlo at the configured values; a search per iteration when
    /// `search` is set.
    MonteCarlo {
        monte_carlo: MonteCarloConfig,
        #[serde(default)]
        search: Option<SearchConfig>,
    },
}

#[derive(Debug, Clone)]
pub enum ModeOutcome {
    Standard(JobResult),
    CriticalValue(CriticalValueResult),
    NdSweep(SweepOutcome),
    MonteCarlo(MonteCarloAggregate),
}

impl fmt::Display for ModeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeOutcome::Standard(result) => {
                write!(f, "simulator {}, verdict {}", result.exit_status, result.verdict)
            }
            ModeOutcome::CriticalValue(result) => {
                write!(
                    f,
                    "critical value {:e} ({}) after {} probes",
                    result.value,
                    result.classification,
                    result.probes.len()
                )?;
                if result.reverted {
                    write!(f, ", reverted after a failed probe")?;
                }
                Ok(())
            }
            ModeOutcome::NdSweep(outcome) => write!(
                f,
                "{} grid points, {} failed, summary in {}",
                outcome.points.len(),
                outcome.failed(),
                outcome.summary_path.display()
            ),
            ModeOutcome::MonteCarlo(agg) => {
                write!(
                    f,
                    "{} iterations: {} upsets, {} excluded",
                    agg.total(),
                    agg.upsets,
                    agg.excluded
                )?;
                if let Some(c) = &agg.critical {
                    write!(f, ", critical value mean {:e}", c.mean)?;
                }
                Ok(())
            }
        }
    }
}

/// Run `mode` over `params` with `root` as the working directory.
pub fn execute<R: JobRunner>(
    mode: &SimulationMode,
    runner: R,
    params: &ParameterSet,
    root: &Path,
    ctx: &RunContext,
) -> Result<ModeOutcome> {
    std::fs::create_dir_all(root)?;
    let base = SimulationJob::new(ctx.label(), root, params.clone());

    match mode {
        SimulationMode::Standard => {
            let result = runner.run(&base, ctx)?;
            if !result.simulator_ok() {
                ctx.error(format_args!("simulator failed ({})", result.exit_status));
            }
            Ok(ModeOutcome::Standard(result))
        }
        SimulationMode::CriticalValue { search } => CriticalValueSearch::new(runner, search.clone())
            .run(&base, ctx)
            .map(ModeOutcome::CriticalValue),
        SimulationMode::NdSweep { sweep } => NdSweep::new(runner, sweep.clone())
            .run(params, root, ctx)
            .map(ModeOutcome::NdSweep),
        SimulationMode::MonteCarlo {
            monte_carlo,
            search,
        } => MonteCarlo::new(&runner, monte_carlo)
            .with_search(search.as_ref())
            .run(&base, 0, ctx)
            .map(ModeOutcome::MonteCarlo),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use critsim_core::{Classification, FnRunner, Parameter, Verdict};

    fn params() -> ParameterSet {
        ParameterSet::new(vec![
            Parameter::bounded("charge", 1e-15, 1e-12).with_value(1e-14),
            Parameter::sweepable("vdd", 1.0, 1.2, 2),
        ])
        .unwrap()
    }

    fn runner() -> impl JobRunner {
        FnRunner(|job: &SimulationJob| -> critsim_core::Result<JobResult> {
            let charge = job.parameters.require("charge")?.value;
            let mut result = JobResult::completed(vec![]);
            result.verdict = if charge >= 2e-13 {
                Verdict::Sensitive
            } else {
                Verdict::NotSensitive
            };
            Ok(result)
        })
    }

    #[test]
    fn test_mode_json() {
        let modes = [
            (r#"{"mode": "standard"}"#, SimulationMode::Standard),
            (
                r#"{"mode": "critical_value", "search": {"parameter": "charge"}}"#,
                SimulationMode::CriticalValue {
                    search: SearchConfig::new("charge"),
                },
            ),
            (
                r#"{"mode": "nd_sweep", "sweep": {"jobs": 2, "search": {"parameter": "charge"}}}"#,
                SimulationMode::NdSweep {
                    sweep: SweepConfig::search(SearchConfig::new("charge")).with_jobs(2),
                },
            ),
            (
                r#"{"mode": "monte_carlo", "monte_carlo": {"iterations": 5}}"#,
                SimulationMode::MonteCarlo {
                    monte_carlo: MonteCarloConfig::new(5),
                    search: None,
                },
            ),
        ];
        for (json, expected) in modes {
            let mode: SimulationMode = serde_json::from_str(json).unwrap();
            assert_eq!(mode, expected);
            let back: SimulationMode =
                serde_json::from_str(&serde_json::to_string(&mode).unwrap()).unwrap();
            assert_eq!(back, mode);
        }
    }

    #[test]
    fn test_execute_each_mode() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::detached("run");

        let outcome = execute(&SimulationMode::Standard, runner(), &params(), dir.path(), &ctx).unwrap();
        assert!(matches!(&outcome, ModeOutcome::Standard(r) if r.verdict == Verdict::NotSensitive));

        let mode = SimulationMode::CriticalValue {
            search: SearchConfig::new("charge"),
        };
        let outcome = execute(&mode, runner(), &params(), &dir.path().join("cv"), &ctx).unwrap();
        let ModeOutcome::CriticalValue(result) = &outcome else {
            panic!("unexpected outcome {outcome}");
        };
        assert_eq!(result.classification, Classification::FoundByBisection);
        assert!(outcome.to_string().starts_with("critical value"));

        let mode = SimulationMode::NdSweep {
            sweep: SweepConfig::search(SearchConfig::new("charge")),
        };
        let outcome = execute(&mode, runner(), &params(), &dir.path().join("nd"), &ctx).unwrap();
        assert!(matches!(&outcome, ModeOutcome::NdSweep(o) if o.points.len() == 2));

        let mode = SimulationMode::MonteCarlo {
            monte_carlo: MonteCarloConfig::new(4).with_jobs(2),
            search: None,
        };
        let outcome = execute(&mode, runner(), &params(), &dir.path().join("mc"), &ctx).unwrap();
        assert!(matches!(&outcome, ModeOutcome::MonteCarlo(a) if a.successful == 4 && a.upsets == 0));
    }
}
