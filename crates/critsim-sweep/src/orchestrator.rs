//! N-dimensional sweep orchestrator.
//!
//! Enumerates the cartesian grid of the sweepable parameters (the searched
//! parameter excluded), runs one critical value search or Monte Carlo
//! aggregation per point through a bounded scheduler, and writes the sweep
//! summary and the pairwise plane files.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use critsim_core::{
    Classification, CriticalValueResult, Error, JobRunner, NOT_FOUND, ParameterSet, RunContext,
    SimulationJob,
};

use crate::error::Result;
use crate::grid::Grid;
use crate::monte_carlo::{MonteCarlo, MonteCarloAggregate, MonteCarloConfig};
use crate::planes::write_planes;
use crate::scheduler::BoundedScheduler;
use crate::search::{CriticalValueSearch, SearchConfig};

pub const SUMMARY_FILE: &str = "sweep_summary.txt";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Grid points in flight at once.
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    #[serde(default)]
    pub search: Option<SearchConfig>,
    #[serde(default)]
    pub monte_carlo: Option<MonteCarloConfig>,
}

fn default_jobs() -> usize {
    1
}

impl SweepConfig {
    pub fn search(search: SearchConfig) -> Self {
        Self {
            jobs: default_jobs(),
            search: Some(search),
            monte_carlo: None,
        }
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_monte_carlo(mut self, monte_carlo: MonteCarloConfig) -> Self {
        self.monte_carlo = Some(monte_carlo);
        self
    }
}

#[derive(Debug, Clone)]
pub enum PointOutcome {
    Search(CriticalValueResult),
    MonteCarlo(MonteCarloAggregate),
    Failed(String),
}

impl PointOutcome {
    /// The search result, or the mean critical value of a Monte Carlo point.
    pub fn critical_value(&self) -> Option<f64> {
        match self {
            PointOutcome::Search(result) => Some(result.value),
            PointOutcome::MonteCarlo(agg) => agg.critical.map(|c| c.mean),
            PointOutcome::Failed(_) => None,
        }
    }

    pub fn classification(&self) -> Option<Classification> {
        match self {
            PointOutcome::Search(result) => Some(result.classification),
            _ => None,
        }
    }

    /// Metric and global error of `signal`: those of the final probe for a
    /// search, the means over iterations for Monte Carlo.
    pub fn signal_errors(&self, signal: &str) -> Option<(f64, f64)> {
        match self {
            PointOutcome::Search(result) => result
                .final_probe()?
                .error_for(signal)
                .map(|e| (e.metric_error, e.global_error)),
            PointOutcome::MonteCarlo(agg) => agg
                .signal(signal)
                .map(|s| (s.metric.mean, s.global.mean)),
            PointOutcome::Failed(_) => None,
        }
    }

    fn signal_names(&self) -> Vec<String> {
        match self {
            PointOutcome::Search(result) => result
                .final_probe()
                .map(|p| p.errors.iter().map(|e| e.signal.clone()).collect())
                .unwrap_or_default(),
            PointOutcome::MonteCarlo(agg) => agg.signals.iter().map(|s| s.name.clone()).collect(),
            PointOutcome::Failed(_) => Vec::new(),
        }
    }

    fn status(&self) -> String {
        match self {
            PointOutcome::Search(result) => result.classification.to_string(),
            PointOutcome::MonteCarlo(agg) => format!("upsets={}/{}", agg.upsets, agg.successful),
            PointOutcome::Failed(_) => NOT_FOUND.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PointResult {
    pub index: usize,
    pub indices: Vec<usize>,
    pub values: Vec<f64>,
    pub workdir: PathBuf,
    pub outcome: PointOutcome,
}

#[derive(Debug, Clone)]
pub struct SweepOutcome {
    pub grid: Grid,
    pub points: Vec<PointResult>,
    pub summary_path: PathBuf,
    pub plane_paths: Vec<PathBuf>,
}

impl SweepOutcome {
    pub fn failed(&self) -> usize {
        self.points
            .iter()
            .filter(|p| matches!(p.outcome, PointOutcome::Failed(_)))
            .count()
    }
}

pub struct NdSweep<R> {
    runner: R,
    config: SweepConfig,
}

impl<R: JobRunner> NdSweep<R> {
    pub fn new(runner: R, config: SweepConfig) -> Self {
        Self { runner, config }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Run the sweep over `params` below `root`. Point `k` runs in
    /// `<root>/point_<k>`.
    pub fn run(&self, params: &ParameterSet, root: &Path, ctx: &RunContext) -> Result<SweepOutcome> {
        if self.config.search.is_none() && self.config.monte_carlo.is_none() {
            return Err(Error::setup("sweep needs a search or a Monte Carlo configuration").into());
        }
        if let Some(search) = &self.config.search {
            params.require(&search.parameter)?;
        }
        std::fs::create_dir_all(root)?;

        let skip = self.config.search.as_ref().map(|s| s.parameter.as_str());
        let grid = Grid::from_parameters(params, skip);
        let scheduler = BoundedScheduler::named(self.config.jobs, "sweep")?;
        ctx.info(format_args!(
            "sweeping {} points over [{}], {} in flight",
            grid.len(),
            grid.axes()
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            scheduler.max_in_flight()
        ));

        let mut jobs = Vec::with_capacity(grid.len());
        for (k, indices) in grid.iter().enumerate() {
            let mut point_params = params.clone();
            for (axis, value) in grid.axes().iter().zip(grid.values(&indices)) {
                point_params.set_value(&axis.name, value)?;
            }
            let name = format!("point_{k}");
            jobs.push(SimulationJob::new(name.clone(), root.join(&name), point_params));
        }

        let search = self
            .config
            .search
            .as_ref()
            .map(|config| CriticalValueSearch::new(&self.runner, config.clone()));

        let outcomes = scheduler.run(jobs, |k, job| {
            let ctx = ctx.child(&job.label);
            let outcome = self.run_point(search.as_ref(), &job, k, &ctx);
            (job.workdir, outcome)
        });

        let mut points = Vec::with_capacity(outcomes.len());
        for (k, slot) in outcomes.into_iter().enumerate() {
            let indices = grid.indices(k);
            let (workdir, outcome) = match slot {
                Ok((workdir, Ok(outcome))) => (workdir, outcome),
                Ok((workdir, Err(e))) => {
                    ctx.error(format_args!("point_{k} failed: {e}"));
                    (workdir, PointOutcome::Failed(e.to_string()))
                }
                Err(e) => {
                    ctx.error(format_args!("point_{k} failed: {e}"));
                    (root.join(format!("point_{k}")), PointOutcome::Failed(e.to_string()))
                }
            };
            points.push(PointResult {
                index: k,
                values: grid.values(&indices),
                indices,
                workdir,
                outcome,
            });
        }

        let summary_path = root.join(SUMMARY_FILE);
        std::fs::write(&summary_path, summary_text(&grid, &points))?;

        let critical: Vec<Option<f64>> = points.iter().map(|p| p.outcome.critical_value()).collect();
        let plane_paths = write_planes(&grid, &critical, root)?;

        let outcome = SweepOutcome {
            grid,
            points,
            summary_path,
            plane_paths,
        };
        if outcome.failed() > 0 {
            ctx.warn(format_args!(
                "{} of {} points failed",
                outcome.failed(),
                outcome.points.len()
            ));
        }
        Ok(outcome)
    }

    fn run_point(
        &self,
        search: Option<&CriticalValueSearch<&R>>,
        job: &SimulationJob,
        k: usize,
        ctx: &RunContext,
    ) -> Result<PointOutcome> {
        std::fs::create_dir_all(&job.workdir)?;
        match (&self.config.monte_carlo, search) {
            (Some(mc), search) => MonteCarlo::new(&self.runner, mc)
                .with_search(search.map(|s| s.config()))
                .run(job, k, ctx)
                .map(PointOutcome::MonteCarlo),
            (None, Some(search)) => search.run(job, ctx).map(PointOutcome::Search),
            (None, None) => Err(Error::setup("nothing to run at a grid point").into()),
        }
    }
}

/// Summary table: one row per grid point in enumeration order.
fn summary_text(grid: &Grid, points: &[PointResult]) -> String {
    let mut signals: Vec<String> = Vec::new();
    for point in points {
        for name in point.outcome.signal_names() {
            if !signals.contains(&name) {
                signals.push(name);
            }
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "# sweep summary: {} points", points.len());
    let mut header = vec!["index".to_string()];
    header.extend(grid.axes().iter().map(|a| a.name.clone()));
    header.push("critical".into());
    header.push("classification".into());
    for name in &signals {
        header.push(format!("{name}:metric"));
        header.push(format!("{name}:global"));
    }
    let _ = writeln!(out, "# {}", header.join("\t"));

    for point in points {
        let mut row = vec![point.index.to_string()];
        row.extend(point.values.iter().map(|v| format!("{v:.6e}")));
        row.push(
            point
                .outcome
                .critical_value()
                .map_or_else(|| NOT_FOUND.to_string(), |v| format!("{v:.6e}")),
        );
        row.push(point.outcome.status());
        for name in &signals {
            match point.outcome.signal_errors(name) {
                Some((metric, global)) => {
                    row.push(format!("{metric:.6e}"));
                    row.push(format!("{global:.6e}"));
                }
                None => {
                    row.push(NOT_FOUND.into());
                    row.push(NOT_FOUND.into());
                }
            }
        }
        let _ = writeln!(out, "{}", row.join("\t"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use critsim_core::{ErrorRecord, FnRunner, JobResult, Parameter, Verdict};

    fn params() -> ParameterSet {
        ParameterSet::new(vec![
            Parameter::bounded("charge", 1e-15, 1e-12),
            Parameter::sweepable("vdd", 1.0, 2.0, 2),
            Parameter::sweepable("temp", 0.0, 100.0, 3),
        ])
        .unwrap()
    }

    /// Threshold charge grows with vdd; one (vdd, temp) corner always fails.
    fn runner() -> impl JobRunner {
        FnRunner(|job: &SimulationJob| -> critsim_core::Result<JobResult> {
            let p = &job.parameters;
            let (charge, vdd, temp) = (
                p.require("charge")?.value,
                p.require("vdd")?.value,
                p.require("temp")?.value,
            );
            if vdd == 2.0 && temp == 100.0 {
                return Err(Error::parse(&job.workdir, "no waveform"));
            }
            let mut record = ErrorRecord::new("q");
            record.metric_error = charge * 1e12;
            record.global_error = charge * 2e12;
            let mut result = JobResult::completed(vec![record]);
            result.verdict = if charge >= vdd * 1e-13 {
                Verdict::Sensitive
            } else {
                Verdict::NotSensitive
            };
            Ok(result)
        })
    }

    #[test]
    fn test_requires_search_or_monte_carlo() {
        let config = SweepConfig {
            jobs: 1,
            search: None,
            monte_carlo: None,
        };
        let dir = tempfile::tempdir().unwrap();
        let err = NdSweep::new(runner(), config)
            .run(&params(), dir.path(), &RunContext::detached("sweep"))
            .unwrap_err();
        assert_eq!(err.kind(), critsim_core::ErrorKind::Setup);
    }

    #[test]
    fn test_sweep_with_failed_point() {
        let dir = tempfile::tempdir().unwrap();
        let config = SweepConfig::search(SearchConfig::new("charge")).with_jobs(3);
        let ctx = RunContext::detached("sweep");

        let outcome = NdSweep::new(runner(), config)
            .run(&params(), dir.path(), &ctx)
            .unwrap();

        assert_eq!(outcome.points.len(), 6);
        assert_eq!(outcome.failed(), 1);
        let failed = &outcome.points[5];
        assert_eq!(failed.values, vec![2.0, 100.0]);
        assert!(matches!(failed.outcome, PointOutcome::Failed(_)));

        for point in &outcome.points[..5] {
            let value = point.outcome.critical_value().unwrap();
            let threshold = point.values[0] * 1e-13;
            assert!((value - threshold).abs() / threshold < 0.05, "{value} vs {threshold}");
            assert_eq!(
                point.outcome.classification(),
                Some(Classification::FoundByBisection)
            );
            assert!(point.workdir.is_dir());
        }

        let summary = std::fs::read_to_string(&outcome.summary_path).unwrap();
        let rows: Vec<&str> = summary.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(rows.len(), 6);
        assert!(summary.contains("q:metric\tq:global"));
        assert!(rows[5].starts_with("5\t2.000000e0\t1.000000e2\tnotFound\tnotFound"));

        assert!(dir.path().join("pair_vdd_temp.txt").exists());
        assert!(dir.path().join("plane_vdd_temp_0.txt").exists());
        assert!(ctx.error_log().entries().iter().any(|e| e.contains("point_5")));
    }

    #[test]
    fn test_monte_carlo_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let config = SweepConfig {
            jobs: 2,
            search: None,
            monte_carlo: Some(MonteCarloConfig::new(3).with_jobs(2)),
        };
        let params = ParameterSet::new(vec![
            Parameter::fixed("charge", 1.5e-13),
            Parameter::sweepable("vdd", 1.0, 2.0, 2),
            Parameter::fixed("temp", 27.0),
        ])
        .unwrap();

        let outcome = NdSweep::new(runner(), config)
            .run(&params, dir.path(), &RunContext::detached("sweep"))
            .unwrap();

        assert_eq!(outcome.points.len(), 2);
        assert!(outcome.plane_paths.is_empty());
        let upsets: Vec<usize> = outcome
            .points
            .iter()
            .map(|p| match &p.outcome {
                PointOutcome::MonteCarlo(agg) => agg.upsets,
                other => panic!("unexpected outcome {other:?}"),
            })
            .collect();
        // 1.5e-13 upsets at vdd = 1 but not at vdd = 2.
        assert_eq!(upsets, vec![3, 0]);
        assert!(dir.path().join("point_1/monte_carlo.txt").exists());
    }

    #[test]
    fn test_config_json() {
        let config: SweepConfig = serde_json::from_str(
            r#"{"jobs": 4, "search": {"parameter": "charge", "validate_nominal": true}}"#,
        )
        .unwrap();
        assert_eq!(config.jobs, 4);
        assert!(config.search.as_ref().unwrap().validate_nominal);
        assert!(config.monte_carlo.is_none());
    }
}
