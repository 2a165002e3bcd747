//! Monte Carlo aggregation at a fixed grid point.
//!
//! Each iteration runs in `<point>/mc_<i>` with its own seed, either as a
//! full critical value search or as a single simulator run. Iterations are
//! dispatched through a scheduler owned by the aggregator and reduced after
//! the final barrier.

use std::fmt::Write as _;
use std::path::Path;

use serde::{Deserialize, Serialize};

use critsim_core::{
    Classification, CriticalValueResult, ErrorRecord, JobResult, JobRunner, NOT_FOUND,
    RunContext, SimulationJob, Verdict,
};

use crate::error::Result;
use crate::rng::iteration_seed;
use crate::scheduler::BoundedScheduler;
use crate::search::{CriticalValueSearch, SearchConfig};
use crate::statistics::{Percentiles, StatisticsAccumulator, ValueSummary};

pub const MONTE_CARLO_FILE: &str = "monte_carlo.txt";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    pub iterations: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Iterations in flight at once.
    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

fn default_seed() -> u64 {
    1
}

fn default_jobs() -> usize {
    1
}

impl MonteCarloConfig {
    pub fn new(iterations: usize) -> Self {
        Self {
            iterations,
            seed: default_seed(),
            jobs: default_jobs(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }
}

/// What one iteration produced.
#[derive(Debug, Clone)]
pub enum IterationOutcome {
    Run(JobResult),
    Search(CriticalValueResult),
    /// Failed simulator run or error; excluded from the statistics.
    Excluded(String),
}

impl IterationOutcome {
    pub fn is_excluded(&self) -> bool {
        matches!(self, IterationOutcome::Excluded(_))
    }

    /// Single run: verdict Sensitive. Search: anything but bounded by max.
    pub fn is_upset(&self) -> bool {
        match self {
            IterationOutcome::Run(result) => result.verdict == Verdict::Sensitive,
            IterationOutcome::Search(result) => {
                result.classification != Classification::BoundedByMax
            }
            IterationOutcome::Excluded(_) => false,
        }
    }

    pub fn critical_value(&self) -> Option<f64> {
        match self {
            IterationOutcome::Search(result) => Some(result.value),
            _ => None,
        }
    }

    /// Error records the statistics are taken from. For a search these are
    /// the records of the probe at the reported value.
    pub fn records(&self) -> &[ErrorRecord] {
        match self {
            IterationOutcome::Run(result) => &result.errors,
            IterationOutcome::Search(result) => {
                result.final_probe().map_or(&[], |p| p.errors.as_slice())
            }
            IterationOutcome::Excluded(_) => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub struct IterationRecord {
    pub index: usize,
    pub seed: u64,
    pub outcome: IterationOutcome,
}

/// Per-signal statistics over the successful iterations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalStatistics {
    pub name: String,
    pub metric: Percentiles,
    pub global: ValueSummary,
}

#[derive(Debug, Clone, Default)]
pub struct MonteCarloAggregate {
    pub iterations: Vec<IterationRecord>,
    pub successful: usize,
    pub upsets: usize,
    pub excluded: usize,
    /// Critical value statistics, search variant only.
    pub critical: Option<ValueSummary>,
    pub signals: Vec<SignalStatistics>,
}

impl MonteCarloAggregate {
    /// Reduce iteration outcomes. Excluded iterations are counted but do not
    /// contribute to any statistic.
    pub fn from_iterations(iterations: Vec<IterationRecord>) -> Self {
        let mut critical = StatisticsAccumulator::new();
        let mut names: Vec<String> = Vec::new();
        let mut metric: Vec<Vec<f64>> = Vec::new();
        let mut global: Vec<StatisticsAccumulator> = Vec::new();
        let (mut successful, mut upsets, mut excluded) = (0, 0, 0);

        for record in &iterations {
            let outcome = &record.outcome;
            if outcome.is_excluded() {
                excluded += 1;
                continue;
            }
            successful += 1;
            if outcome.is_upset() {
                upsets += 1;
            }
            if let Some(value) = outcome.critical_value() {
                critical.add(value);
            }
            for error in outcome.records() {
                let slot = match names.iter().position(|n| *n == error.signal) {
                    Some(slot) => slot,
                    None => {
                        names.push(error.signal.clone());
                        metric.push(Vec::new());
                        global.push(StatisticsAccumulator::new());
                        names.len() - 1
                    }
                };
                metric[slot].push(error.metric_error);
                global[slot].add(error.global_error);
            }
        }

        let signals = names
            .into_iter()
            .zip(metric)
            .zip(global)
            .filter_map(|((name, metric), global)| {
                Some(SignalStatistics {
                    name,
                    metric: Percentiles::from_values(metric)?,
                    global: global.finalize()?,
                })
            })
            .collect();

        Self {
            iterations,
            successful,
            upsets,
            excluded,
            critical: critical.finalize(),
            signals,
        }
    }

    pub fn total(&self) -> usize {
        self.successful + self.excluded
    }

    pub fn signal(&self, name: &str) -> Option<&SignalStatistics> {
        self.signals.iter().find(|s| s.name == name)
    }

    pub fn to_text(&self, label: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Monte Carlo summary: {label}");
        let _ = writeln!(
            out,
            "# iterations {} successful {} excluded {} upsets {}",
            self.total(),
            self.successful,
            self.excluded,
            self.upsets
        );

        if let Some(c) = &self.critical {
            let _ = writeln!(out, "# critical\tmean\tmin\tmax");
            let _ = writeln!(out, "critical\t{:.6e}\t{:.6e}\t{:.6e}", c.mean, c.min, c.max);
        }

        if !self.signals.is_empty() {
            let _ = writeln!(
                out,
                "# signal\tmetric_mean\tmetric_min\tmetric_p25\tmetric_median\tmetric_p75\tmetric_max\tglobal_mean\tglobal_min\tglobal_max"
            );
            for s in &self.signals {
                let (m, g) = (&s.metric, &s.global);
                let _ = writeln!(
                    out,
                    "{}\t{:.6e}\t{:.6e}\t{:.6e}\t{:.6e}\t{:.6e}\t{:.6e}\t{:.6e}\t{:.6e}\t{:.6e}",
                    s.name, m.mean, m.min, m.p25, m.median, m.p75, m.max, g.mean, g.min, g.max
                );
            }
        }

        let _ = writeln!(out, "# iteration\tseed\tstatus\tcritical");
        for record in &self.iterations {
            let status = match &record.outcome {
                IterationOutcome::Excluded(_) => "excluded",
                o if o.is_upset() => "upset",
                _ => "ok",
            };
            let critical = record
                .outcome
                .critical_value()
                .map_or_else(|| NOT_FOUND.to_string(), |v| format!("{v:.6e}"));
            let _ = writeln!(
                out,
                "{}\t{}\t{status}\t{critical}",
                record.index, record.seed
            );
        }
        out
    }

    pub fn write(&self, path: &Path, label: &str) -> Result<()> {
        std::fs::write(path, self.to_text(label))?;
        Ok(())
    }
}

/// Runs the iterations of one grid point.
pub struct MonteCarlo<'a, R> {
    runner: &'a R,
    config: &'a MonteCarloConfig,
    search: Option<&'a SearchConfig>,
}

impl<'a, R: JobRunner> MonteCarlo<'a, R> {
    pub fn new(runner: &'a R, config: &'a MonteCarloConfig) -> Self {
        Self {
            runner,
            config,
            search: None,
        }
    }

    /// Run a full critical value search per iteration instead of a single
    /// simulation.
    pub fn with_search(mut self, search: Option<&'a SearchConfig>) -> Self {
        self.search = search;
        self
    }

    /// Run every iteration of `base` and write `monte_carlo.txt` into its
    /// working directory. `point` is the grid index, used for seeding.
    pub fn run(
        &self,
        base: &SimulationJob,
        point: usize,
        ctx: &RunContext,
    ) -> Result<MonteCarloAggregate> {
        if self.config.iterations == 0 {
            return Err(critsim_core::Error::setup("Monte Carlo needs at least one iteration").into());
        }
        std::fs::create_dir_all(&base.workdir)?;

        let scheduler = BoundedScheduler::named(self.config.jobs, "mc")?;
        let search = self
            .search
            .map(|config| CriticalValueSearch::new(self.runner, config.clone()));

        let jobs: Vec<SimulationJob> = (0..self.config.iterations)
            .map(|i| {
                let name = format!("mc_{i}");
                SimulationJob::new(
                    format!("{}/{name}", base.label),
                    base.workdir.join(&name),
                    base.parameters.clone(),
                )
                .with_seed(iteration_seed(self.config.seed, point, i))
            })
            .collect();
        let seeds: Vec<u64> = jobs.iter().map(|j| j.seed.unwrap_or(0)).collect();

        ctx.info(format_args!(
            "{} Monte Carlo iterations, {} in flight",
            jobs.len(),
            scheduler.max_in_flight()
        ));

        let outcomes = scheduler.run(jobs, |i, job| -> Result<IterationOutcome> {
            let ctx = ctx.child(format!("mc_{i}"));
            match &search {
                Some(search) => search.run(&job, &ctx).map(IterationOutcome::Search),
                None => {
                    std::fs::create_dir_all(&job.workdir)?;
                    let result = self.runner.run(&job, &ctx)?;
                    if result.simulator_ok() {
                        Ok(IterationOutcome::Run(result))
                    } else {
                        Ok(IterationOutcome::Excluded(format!(
                            "simulator exit {}",
                            result.exit_status
                        )))
                    }
                }
            }
        });

        let iterations: Vec<IterationRecord> = outcomes
            .into_iter()
            .zip(seeds)
            .enumerate()
            .map(|(index, (outcome, seed))| {
                let outcome = match outcome.and_then(|r| r) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        ctx.error(format_args!("iteration {index} failed: {e}"));
                        IterationOutcome::Excluded(e.to_string())
                    }
                };
                IterationRecord {
                    index,
                    seed,
                    outcome,
                }
            })
            .collect();

        let aggregate = MonteCarloAggregate::from_iterations(iterations);
        if aggregate.excluded > 0 {
            ctx.warn(format_args!(
                "{} of {} iterations excluded from the statistics",
                aggregate.excluded,
                aggregate.total()
            ));
        }
        aggregate.write(&base.workdir.join(MONTE_CARLO_FILE), &base.label)?;
        Ok(aggregate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use critsim_core::{Error, ExitStatus, FnRunner, Parameter, ParameterSet};
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn params() -> ParameterSet {
        ParameterSet::new(vec![
            Parameter::bounded("charge", 1e-15, 1e-12).with_value(1e-13),
            Parameter::fixed("vdd", 1.2),
        ])
        .unwrap()
    }

    fn record(signal: &str, metric: f64, global: f64) -> ErrorRecord {
        let mut r = ErrorRecord::new(signal);
        r.metric_error = metric;
        r.global_error = global;
        r
    }

    #[test]
    fn test_aggregate_excludes_failed_iterations() {
        let run = |metric: f64, sensitive: bool| {
            let mut result = JobResult::completed(vec![record("q", metric, metric * 2.0)]);
            result.verdict = if sensitive {
                Verdict::Sensitive
            } else {
                Verdict::NotSensitive
            };
            IterationOutcome::Run(result)
        };
        let outcomes = vec![
            run(1.0, false),
            IterationOutcome::Excluded("simulator exit 1".into()),
            run(3.0, true),
            run(2.0, false),
        ];
        let iterations = outcomes
            .into_iter()
            .enumerate()
            .map(|(index, outcome)| IterationRecord {
                index,
                seed: 0,
                outcome,
            })
            .collect();

        let agg = MonteCarloAggregate::from_iterations(iterations);
        assert_eq!(agg.successful, 3);
        assert_eq!(agg.excluded, 1);
        assert_eq!(agg.upsets, 1);
        assert!(agg.critical.is_none());

        let q = agg.signal("q").unwrap();
        assert_eq!(q.metric.count, 3);
        assert_eq!(q.metric.min, 1.0);
        assert_eq!(q.metric.median, 2.0);
        assert_eq!(q.metric.max, 3.0);
        assert_eq!(q.global.max, 6.0);
        assert_eq!(q.global.mean, 4.0);
    }

    #[test]
    fn test_single_run_variant_seeds_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let seeds = Mutex::new(Vec::new());
        let runner = FnRunner(|job: &SimulationJob| -> critsim_core::Result<JobResult> {
            let seed = job.seed.unwrap();
            seeds.lock().unwrap().push(seed);
            if seed % 5 == 0 {
                return Ok(JobResult::failed(ExitStatus::Code(1)));
            }
            Ok(JobResult::completed(vec![record("q", (seed % 7) as f64, 1.0)]))
        });
        let config = MonteCarloConfig::new(20).with_seed(7).with_jobs(4);
        let base = SimulationJob::new("point_0", dir.path().join("point_0"), params());

        let agg = MonteCarlo::new(&runner, &config)
            .run(&base, 0, &RunContext::detached("mc"))
            .unwrap();

        let seeds = seeds.into_inner().unwrap();
        let unique: HashSet<u64> = seeds.iter().copied().collect();
        assert_eq!(unique.len(), 20);
        let failing = seeds.iter().filter(|s| *s % 5 == 0).count();
        assert_eq!(agg.excluded, failing);
        assert_eq!(agg.successful, 20 - failing);
        for (i, record) in agg.iterations.iter().enumerate() {
            assert_eq!(record.seed, iteration_seed(7, 0, i));
        }

        let text = std::fs::read_to_string(dir.path().join("point_0").join(MONTE_CARLO_FILE)).unwrap();
        assert!(text.starts_with("# Monte Carlo summary: point_0"));
        assert!(dir.path().join("point_0/mc_19").is_dir());
    }

    #[test]
    fn test_search_variant_collects_critical_values() {
        let dir = tempfile::tempdir().unwrap();
        // Threshold varies with the seed, so each iteration finds its own value.
        let runner = FnRunner(|job: &SimulationJob| -> critsim_core::Result<JobResult> {
            let threshold = 1e-14 * (1 + job.seed.unwrap() % 50) as f64;
            let charge = job.parameters.require("charge")?.value;
            let mut result = JobResult::completed(vec![record("q", charge, charge)]);
            result.verdict = if charge >= threshold {
                Verdict::Sensitive
            } else {
                Verdict::NotSensitive
            };
            Ok(result)
        });
        let config = MonteCarloConfig::new(6).with_jobs(3);
        let search = SearchConfig::new("charge");
        let base = SimulationJob::new("p", dir.path().join("p"), params());

        let agg = MonteCarlo::new(&runner, &config)
            .with_search(Some(&search))
            .run(&base, 3, &RunContext::detached("mc"))
            .unwrap();

        assert_eq!(agg.successful, 6);
        assert_eq!(agg.upsets, 6);
        let critical = agg.critical.unwrap();
        assert_eq!(critical.count, 6);
        assert!(critical.min >= 1e-15 && critical.max <= 1e-12);
        assert!(agg.signal("q").is_some());
    }

    #[test]
    fn test_runner_errors_are_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FnRunner(|job: &SimulationJob| -> critsim_core::Result<JobResult> {
            if job.label.ends_with("mc_1") {
                return Err(Error::parse(&job.workdir, "truncated waveform"));
            }
            Ok(JobResult::completed(vec![]))
        });
        let config = MonteCarloConfig::new(3);
        let base = SimulationJob::new("p", dir.path().join("p"), params());
        let ctx = RunContext::detached("mc");

        let agg = MonteCarlo::new(&runner, &config).run(&base, 0, &ctx).unwrap();
        assert_eq!(agg.excluded, 1);
        assert_eq!(agg.successful, 2);
        assert!(matches!(agg.iterations[1].outcome, IterationOutcome::Excluded(_)));
        assert!(ctx.error_log().entries().iter().any(|e| e.contains("iteration 1")));
    }

    #[test]
    fn test_zero_iterations_is_setup_error() {
        let runner = FnRunner(|_: &SimulationJob| -> critsim_core::Result<JobResult> {
            Ok(JobResult::completed(vec![]))
        });
        let config = MonteCarloConfig::new(0);
        let base = SimulationJob::new("p", "/nonexistent", params());
        let err = MonteCarlo::new(&runner, &config)
            .run(&base, 0, &RunContext::detached("mc"))
            .unwrap_err();
        assert_eq!(err.kind(), critsim_core::ErrorKind::Setup);
    }

    #[test]
    fn test_config_defaults() {
        let config: MonteCarloConfig = serde_json::from_str(r#"{"iterations": 10}"#).unwrap();
        assert_eq!(config, MonteCarloConfig::new(10));
        assert_eq!(config.seed, 1);
        assert_eq!(config.jobs, 1);
    }
}
