//! Job runner that drives the external simulator.

use std::path::Path;
use std::sync::Arc;

use critsim_core::{
    Error, ExitStatus, JobResult, JobRunner, Result, RunContext, SimulationJob, TrackedSignal,
};

use crate::compare::compare_signals;
use crate::export::{DataFormat, write_processed};
use crate::golden::GoldenReference;
use crate::simulator::{PsfLayout, SimulatorConfig, Waveform, read_psf, run_simulator};

/// Circuit description with `{{name}}` placeholders.
///
/// Placeholders name a parameter of the job, or one of `{{seed}}` and
/// `{{workdir}}`. A job without a seed renders `{{seed}}` as 0.
#[derive(Debug, Clone)]
pub struct CircuitTemplate {
    text: String,
}

impl CircuitTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::setup(format!("cannot read circuit template {}: {e}", path.display()))
        })?;
        Ok(Self::new(text))
    }

    pub fn render(&self, job: &SimulationJob) -> Result<String> {
        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();

        while let Some(open) = rest.find("{{") {
            out.push_str(&rest[..open]);
            let after = &rest[open + 2..];
            let close = after
                .find("}}")
                .ok_or_else(|| Error::setup("unterminated {{ in circuit template"))?;
            let token = after[..close].trim();
            match token {
                "seed" => out.push_str(&job.seed.unwrap_or(0).to_string()),
                "workdir" => out.push_str(&job.workdir.display().to_string()),
                name => {
                    let value = job.parameters.get(name).map(|p| p.value).ok_or_else(|| {
                        Error::setup(format!("circuit template references unknown parameter {name}"))
                    })?;
                    out.push_str(&format!("{value:e}"));
                }
            }
            rest = &after[close + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// Runs jobs through the external simulator and compares them against the
/// golden reference.
#[derive(Debug, Clone)]
pub struct ExternalJobRunner {
    simulator: SimulatorConfig,
    template: CircuitTemplate,
    tracked: Vec<TrackedSignal>,
    golden: Arc<GoldenReference>,
    layout: PsfLayout,
    format: DataFormat,
}

impl ExternalJobRunner {
    pub fn new(
        simulator: SimulatorConfig,
        template: CircuitTemplate,
        tracked: Vec<TrackedSignal>,
        golden: Arc<GoldenReference>,
    ) -> Result<Self> {
        if golden.is_empty() {
            return Err(Error::setup("golden reference not configured"));
        }
        golden.validate(&tracked)?;
        Ok(Self {
            simulator,
            template,
            tracked,
            golden,
            layout: PsfLayout::default(),
            format: DataFormat::default(),
        })
    }

    pub fn with_layout(mut self, layout: PsfLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_format(mut self, format: DataFormat) -> Self {
        self.format = format;
        self
    }

    pub fn tracked(&self) -> &[TrackedSignal] {
        &self.tracked
    }

    /// Run the unperturbed circuit and read its waveform as the reference.
    pub fn run_golden(
        simulator: &SimulatorConfig,
        template: &CircuitTemplate,
        tracked: &[TrackedSignal],
        layout: PsfLayout,
        job: &SimulationJob,
        ctx: &RunContext,
    ) -> Result<GoldenReference> {
        let (status, _) = simulate(simulator, template, job, ctx)?;
        if !status.is_success() {
            return Err(Error::setup(format!(
                "golden run failed ({status}) in {}",
                job.workdir.display()
            )));
        }
        let golden =
            GoldenReference::from_psf(&simulator.waveform_path(&job.workdir), tracked, layout)?;
        golden.validate(tracked)?;
        Ok(golden)
    }
}

/// Write the circuit and run the simulator.
fn simulate(
    simulator: &SimulatorConfig,
    template: &CircuitTemplate,
    job: &SimulationJob,
    ctx: &RunContext,
) -> Result<(ExitStatus, std::path::PathBuf)> {
    std::fs::create_dir_all(&job.workdir)?;
    std::fs::write(simulator.input_path(&job.workdir), template.render(job)?)?;

    let status = run_simulator(simulator, &job.workdir, ctx.label())?;
    Ok((status, simulator.waveform_path(&job.workdir)))
}

impl JobRunner for ExternalJobRunner {
    fn run(&self, job: &SimulationJob, ctx: &RunContext) -> Result<JobResult> {
        let (status, raw_path) = simulate(&self.simulator, &self.template, job, ctx)?;
        if !status.is_success() {
            ctx.error(format_args!(
                "simulator failed ({status}) in {}",
                job.workdir.display()
            ));
            return Ok(JobResult::failed(status));
        }

        let waveform: Waveform = read_psf(&raw_path, &self.tracked, self.layout)?;
        let records = match compare_signals(&self.golden, &waveform.signals(), &self.tracked) {
            Ok(records) => records,
            Err(e @ Error::TimeBaseMismatch { .. }) => {
                ctx.record(&e);
                let mut result = JobResult::failed(ExitStatus::Truncated);
                result.raw_path = Some(raw_path);
                return Ok(result);
            }
            Err(e) => return Err(e),
        };

        let processed_path = job
            .workdir
            .join(format!("processed.{}", self.format.extension()));
        write_processed(&processed_path, &waveform, &self.tracked, self.format)?;

        let mut result = JobResult::completed(records);
        result.raw_path = Some(raw_path);
        result.processed_path = Some(processed_path);
        ctx.debug(format_args!("verdict {}", result.verdict));
        Ok(result)
    }
}
