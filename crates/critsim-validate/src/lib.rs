//! Simulator integration and waveform validation for critsim.
//!
//! This crate provides:
//! - Running the external simulator in a job's working directory
//! - Parsing its PSF-ASCII waveform output
//! - Comparing candidate waveforms against the golden run under per-signal
//!   error policies
//! - Writing processed data files
//! - [`ExternalJobRunner`], the production [`JobRunner`](critsim_core::JobRunner)

pub mod compare;
pub mod export;
pub mod golden;
pub mod job;
pub mod simulator;

pub use compare::{ComparisonReport, compare_report, compare_signal, compare_signals, interpolate};
pub use export::{DataFormat, write_processed};
pub use golden::{GoldenReference, load_golden_file, save_golden_file};
pub use job::{CircuitTemplate, ExternalJobRunner};
pub use simulator::{PsfLayout, SimulatorConfig, Waveform, parse_psf, read_psf, run_simulator};
