//! Simulator process runner.
//!
//! This module handles invoking the external simulator as a subprocess in a
//! job's working directory.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use critsim_core::{Error, ExitStatus, Result};

/// Configuration for the simulator runner.
///
/// The command line is
/// `{binary} {log_flag} {log_file} {output_flag} {output_dir} {input} {post_args...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Path to the simulator executable.
    pub binary: String,
    pub log_flag: String,
    pub output_flag: String,
    pub post_args: Vec<String>,
    /// Environment for the child process. `{{workdir}}` in a value is
    /// replaced by the job's working directory.
    pub env: Vec<(String, String)>,
    /// Kill the simulator after this many seconds.
    pub timeout_secs: Option<u64>,
    /// File names, relative to the working directory.
    pub input_file: String,
    pub log_file: String,
    pub stdout_file: String,
    pub output_dir: String,
    /// Waveform file inside `output_dir`.
    pub waveform_file: String,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            binary: "spectre".to_string(),
            log_flag: "-log".to_string(),
            output_flag: "-raw".to_string(),
            post_args: vec!["-format".to_string(), "psfascii".to_string()],
            env: Vec::new(),
            timeout_secs: None,
            input_file: "input.scs".to_string(),
            log_file: "simulator.log".to_string(),
            stdout_file: "simulator.out".to_string(),
            output_dir: "psf".to_string(),
            waveform_file: "tran.tran".to_string(),
        }
    }
}

impl SimulatorConfig {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            ..Default::default()
        }
    }

    pub fn with_flags(mut self, log_flag: impl Into<String>, output_flag: impl Into<String>) -> Self {
        self.log_flag = log_flag.into();
        self.output_flag = output_flag.into();
        self
    }

    pub fn with_post_args(mut self, args: Vec<String>) -> Self {
        self.post_args = args;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_waveform(mut self, output_dir: impl Into<String>, file: impl Into<String>) -> Self {
        self.output_dir = output_dir.into();
        self.waveform_file = file.into();
        self
    }

    pub fn input_path(&self, workdir: &Path) -> PathBuf {
        workdir.join(&self.input_file)
    }

    pub fn waveform_path(&self, workdir: &Path) -> PathBuf {
        workdir.join(&self.output_dir).join(&self.waveform_file)
    }

    /// Arguments after the binary, in invocation order.
    pub fn arguments(&self, workdir: &Path) -> Vec<String> {
        let mut args = Vec::with_capacity(5 + self.post_args.len());
        if !self.log_flag.is_empty() {
            args.push(self.log_flag.clone());
        }
        args.push(workdir.join(&self.log_file).display().to_string());
        if !self.output_flag.is_empty() {
            args.push(self.output_flag.clone());
        }
        args.push(workdir.join(&self.output_dir).display().to_string());
        args.push(self.input_path(workdir).display().to_string());
        args.extend(self.post_args.iter().cloned());
        args
    }

    /// Environment with `{{workdir}}` substituted.
    pub fn environment(&self, workdir: &Path) -> Vec<(String, String)> {
        let dir = workdir.display().to_string();
        self.env
            .iter()
            .map(|(k, v)| (k.clone(), v.replace("{{workdir}}", &dir)))
            .collect()
    }
}

/// Check if the simulator binary can be spawned.
pub fn is_simulator_available(config: &SimulatorConfig) -> bool {
    Command::new(&config.binary)
        .arg("-V")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

/// Run the simulator on the input file already written to `workdir`.
///
/// Stdout goes to `stdout_file` in the working directory. A spawn failure is
/// an error; a failing simulator is reported through the returned status.
pub fn run_simulator(config: &SimulatorConfig, workdir: &Path, label: &str) -> Result<ExitStatus> {
    let simulator_error = |reason: String| Error::Simulator {
        job: label.to_string(),
        workdir: workdir.to_path_buf(),
        reason,
    };

    std::fs::create_dir_all(workdir.join(&config.output_dir))?;
    let stdout = File::create(workdir.join(&config.stdout_file))?;

    let mut cmd = Command::new(&config.binary);
    cmd.args(config.arguments(workdir))
        .current_dir(workdir)
        .envs(config.environment(workdir))
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(Stdio::null());

    log::debug!("[{label}] {} {}", config.binary, config.arguments(workdir).join(" "));

    let child = cmd
        .spawn()
        .map_err(|e| simulator_error(format!("cannot start {}: {e}", config.binary)))?;

    let timeout = config.timeout_secs.map(Duration::from_secs);
    let status = wait_with_timeout(child, timeout)
        .map_err(|e| simulator_error(format!("wait failed: {e}")))?;

    match status {
        Some(status) => Ok(ExitStatus::from_code(status.code())),
        None => {
            log::warn!(
                "[{label}] simulator killed after {}s in {}",
                config.timeout_secs.unwrap_or_default(),
                workdir.display()
            );
            Ok(ExitStatus::Killed)
        }
    }
}

/// Wait for a child process, killing it once the timeout elapses.
///
/// Returns `None` when the process was killed.
fn wait_with_timeout(
    mut child: Child,
    timeout: Option<Duration>,
) -> std::io::Result<Option<std::process::ExitStatus>> {
    let Some(timeout) = timeout else {
        return child.wait().map(Some);
    };

    let start = Instant::now();
    let poll_interval = Duration::from_millis(100);

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() > timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        std::thread::sleep(poll_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimulatorConfig::default();
        assert_eq!(config.binary, "spectre");
        assert_eq!(config.timeout_secs, None);
    }

    #[test]
    fn test_arguments_order() {
        let config = SimulatorConfig::new("sim")
            .with_flags("-l", "-o")
            .with_post_args(vec!["+aps".into()]);
        let args = config.arguments(Path::new("/w"));
        assert_eq!(
            args,
            vec!["-l", "/w/simulator.log", "-o", "/w/psf", "/w/input.scs", "+aps"]
        );
    }

    #[test]
    fn test_environment_substitution() {
        let config = SimulatorConfig::default()
            .with_env("AHDL_LIB", "{{workdir}}/ahdl")
            .with_env("LANG", "C");
        let env = config.environment(Path::new("/runs/point_1"));
        assert_eq!(env[0], ("AHDL_LIB".to_string(), "/runs/point_1/ahdl".to_string()));
        assert_eq!(env[1].1, "C");
    }

    #[test]
    fn test_missing_binary_is_simulator_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = SimulatorConfig::new("/nonexistent/critsim-simulator");
        let err = run_simulator(&config, dir.path(), "probe_0").unwrap_err();
        assert_eq!(err.kind(), critsim_core::ErrorKind::Simulator);
        assert!(!is_simulator_available(&config));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_codes() {
        let dir = tempfile::tempdir().unwrap();
        let ok = SimulatorConfig::new("true").with_flags("", "").with_post_args(vec![]);
        assert_eq!(run_simulator(&ok, dir.path(), "ok").unwrap(), ExitStatus::Success);
        let bad = SimulatorConfig::new("false").with_flags("", "").with_post_args(vec![]);
        assert_eq!(run_simulator(&bad, dir.path(), "bad").unwrap(), ExitStatus::Code(1));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("slow.sh"), "sleep 5\n").unwrap();
        // Runs `sh <workdir>/slow.sh <workdir>/psf <workdir>/input.scs`.
        let config = SimulatorConfig {
            binary: "sh".into(),
            log_flag: String::new(),
            log_file: "slow.sh".into(),
            output_flag: String::new(),
            post_args: vec![],
            ..Default::default()
        }
        .with_timeout(1);
        let status = run_simulator(&config, dir.path(), "slow").unwrap();
        assert_eq!(status, ExitStatus::Killed);
    }
}
