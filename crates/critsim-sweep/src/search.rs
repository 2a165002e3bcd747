//! Critical value search.
//!
//! Bisection over one bounded parameter, probing the simulator at each
//! candidate until the interval between the largest value known to be
//! harmless and the smallest value known to upset the circuit is narrower
//! than the parameter's stop margin.
//!
//! ```text
//! ProbeNominal? -> ProbeMax -> ProbeMin -> Bisect -> Done
//! ```

use serde::{Deserialize, Serialize};

use critsim_core::{
    Classification, CriticalValueResult, Error, ErrorKind, JobResult, JobRunner, Parameter,
    RunContext, SimulationJob, Verdict,
};

use crate::error::Result;

/// Configuration of one critical value search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// The parameter being bisected.
    pub parameter: String,
    /// Probe the parameter's current value first to validate the setup.
    #[serde(default)]
    pub validate_nominal: bool,
    /// Keep the waveform files of every probe.
    #[serde(default)]
    pub keep_intermediate: bool,
    #[serde(default = "default_max_probes")]
    pub max_probes: usize,
}

fn default_max_probes() -> usize {
    64
}

impl SearchConfig {
    pub fn new(parameter: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            validate_nominal: false,
            keep_intermediate: false,
            max_probes: default_max_probes(),
        }
    }

    pub fn with_nominal_validation(mut self, enabled: bool) -> Self {
        self.validate_nominal = enabled;
        self
    }

    pub fn with_keep_intermediate(mut self, keep: bool) -> Self {
        self.keep_intermediate = keep;
        self
    }

    pub fn with_max_probes(mut self, max: usize) -> Self {
        self.max_probes = max;
        self
    }
}

/// Whether `[working_max, not_working_min]` is narrow enough.
pub fn converged(working_max: f64, not_working_min: f64, stop_margin_percent: f64) -> bool {
    let margin = stop_margin_percent / 100.0;
    if working_max > 0.0 {
        not_working_min / working_max < 1.0 + margin
    } else {
        let scale = working_max.abs().max(not_working_min.abs());
        scale == 0.0 || (not_working_min - working_max) / scale < margin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Sensitive,
    NotSensitive,
    /// The simulator failed; no evidence either way.
    Failed,
}

/// Runs critical value searches with a job runner.
#[derive(Debug, Clone)]
pub struct CriticalValueSearch<R> {
    runner: R,
    config: SearchConfig,
}

impl<R: JobRunner> CriticalValueSearch<R> {
    pub fn new(runner: R, config: SearchConfig) -> Self {
        Self { runner, config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Search the critical value for `base`. Probes run in
    /// `<base.workdir>/probe_<n>`.
    pub fn run(&self, base: &SimulationJob, ctx: &RunContext) -> Result<CriticalValueResult> {
        let param = base.parameters.require(&self.config.parameter)?.clone();
        if !(param.min() < param.max()) {
            return Err(Error::InvalidParameter {
                name: param.name.clone(),
                reason: format!("search needs min < max, got [{}, {}]", param.min(), param.max()),
            }
            .into());
        }

        let mut state = SearchState::new(self, base, ctx, &param);

        if self.config.validate_nominal && state.probe(param.value)? == Outcome::Failed {
            return Err(state.failure("nominal validation run failed").into());
        }

        match state.probe(param.max())? {
            Outcome::NotSensitive => return Ok(state.finish(param.max(), Classification::BoundedByMax)),
            Outcome::Failed if state.probes.len() == 1 => {
                return Err(state.failure("first probe failed").into());
            }
            Outcome::Failed => ctx.warn(format_args!(
                "probe at max {} failed, continuing without it",
                param.max()
            )),
            Outcome::Sensitive => {}
        }

        match state.probe(param.min())? {
            Outcome::Sensitive => return Ok(state.finish(param.min(), Classification::BoundedByMin)),
            Outcome::Failed => return Err(state.failure("probe at min failed").into()),
            Outcome::NotSensitive => {}
        }

        let mut working_max = param.min();
        let mut not_working_min = param.max();
        let mut last = param.min();

        while !converged(working_max, not_working_min, param.stop_margin_percent) {
            if state.probes.len() >= self.config.max_probes {
                ctx.warn(format_args!(
                    "stopping after {} probes without converging: [{working_max:e}, {not_working_min:e}]",
                    state.probes.len()
                ));
                break;
            }
            let candidate = param.midpoint(working_max, not_working_min);
            if candidate <= working_max || candidate >= not_working_min {
                ctx.debug("interval below floating point resolution");
                break;
            }

            match state.probe(candidate)? {
                Outcome::Sensitive => not_working_min = candidate,
                Outcome::NotSensitive => working_max = candidate,
                Outcome::Failed => {
                    ctx.warn(format_args!(
                        "probe at {candidate:e} failed, reporting previous value {last:e}"
                    ));
                    let mut result = state.finish(last, Classification::FoundByBisection);
                    result.reverted = true;
                    return Ok(result);
                }
            }
            last = candidate;
        }

        Ok(state.finish(last, Classification::FoundByBisection))
    }
}

/// Evolution trace and file bookkeeping of one search.
struct SearchState<'a, R> {
    search: &'a CriticalValueSearch<R>,
    base: &'a SimulationJob,
    ctx: &'a RunContext,
    parameter: &'a Parameter,
    evolution: Vec<f64>,
    probes: Vec<JobResult>,
    /// Probes whose waveform files are still on disk.
    retained: Vec<usize>,
}

impl<'a, R: JobRunner> SearchState<'a, R> {
    fn new(
        search: &'a CriticalValueSearch<R>,
        base: &'a SimulationJob,
        ctx: &'a RunContext,
        parameter: &'a Parameter,
    ) -> Self {
        Self {
            search,
            base,
            ctx,
            parameter,
            evolution: Vec::new(),
            probes: Vec::new(),
            retained: Vec::new(),
        }
    }

    fn probe(&mut self, value: f64) -> Result<Outcome> {
        let n = self.probes.len();
        let name = format!("probe_{n}");
        let ctx = self.ctx.child(&name);
        let job = self.base.probe(
            format!("{}/{name}", self.base.label),
            &self.base.workdir.join(&name),
            &self.parameter.name,
            value,
        )?;
        ctx.debug(format_args!("{} = {value:e}", self.parameter.name));

        let (outcome, result) = match self.search.runner.run(&job, &ctx) {
            Ok(result) if !result.simulator_ok() => (Outcome::Failed, result),
            Ok(result) => {
                let outcome = match result.verdict {
                    Verdict::Sensitive => Outcome::Sensitive,
                    Verdict::NotSensitive => Outcome::NotSensitive,
                    Verdict::NotEvaluated => Outcome::Failed,
                };
                (outcome, result)
            }
            Err(e) if e.kind() == ErrorKind::Simulator => {
                ctx.record(&e);
                (Outcome::Failed, JobResult::failed(critsim_core::ExitStatus::Killed))
            }
            Err(e) => {
                ctx.record(&e);
                return Err(e.into());
            }
        };

        self.evolution.push(value);
        self.probes.push(result);
        self.retained.push(n);
        if outcome != Outcome::Failed {
            self.discard_retained_except(n);
        }
        Ok(outcome)
    }

    /// Streaming cleanup: a successful probe supersedes the files of every
    /// earlier probe.
    fn discard_retained_except(&mut self, keep: usize) {
        if self.search.config.keep_intermediate {
            return;
        }
        for index in std::mem::take(&mut self.retained) {
            if index == keep {
                self.retained.push(index);
                continue;
            }
            if let Err(e) = self.probes[index].discard_files() {
                self.ctx.warn(format_args!("cannot discard files of probe_{index}: {e}"));
            }
        }
    }

    fn failure(&self, reason: &str) -> Error {
        let error = Error::Simulator {
            job: self.base.label.clone(),
            workdir: self.base.workdir.clone(),
            reason: reason.to_string(),
        };
        self.ctx.record(&error);
        error
    }

    fn finish(self, value: f64, classification: Classification) -> CriticalValueResult {
        self.ctx.info(format_args!(
            "{} critical value {value:e} ({classification}) after {} probes",
            self.parameter.name,
            self.probes.len()
        ));
        CriticalValueResult {
            value,
            classification,
            evolution: self.evolution,
            probes: self.probes,
            reverted: false,
        }
    }
}
