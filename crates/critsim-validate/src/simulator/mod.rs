//! External simulator integration.
//!
//! This module runs the simulator as a subprocess and parses the PSF-ASCII
//! waveform it writes.

pub mod psf;
pub mod runner;
pub mod types;

pub use psf::{parse_psf, read_psf};
pub use runner::{SimulatorConfig, is_simulator_available, run_simulator};
pub use types::{PsfHeader, PsfLayout, Waveform};
