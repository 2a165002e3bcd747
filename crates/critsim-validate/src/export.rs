//! Processed data files.
//!
//! One row per time sample, one column per tracked signal in tracked order,
//! `notFound` where a signal is absent from the waveform.

use std::fmt::Write as _;
use std::path::Path;

use serde::{Deserialize, Serialize};

use critsim_core::{NOT_FOUND, Result, TrackedSignal};

use crate::simulator::Waveform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFormat {
    /// Tab separated, `#` comments.
    #[default]
    Tabular,
    /// Space separated, `%` comments, loadable by Octave.
    Octave,
    /// `;` separated, `#` comments.
    Csv,
}

impl DataFormat {
    pub fn delimiter(self) -> &'static str {
        match self {
            DataFormat::Tabular => "\t",
            DataFormat::Octave => " ",
            DataFormat::Csv => ";",
        }
    }

    pub fn comment(self) -> &'static str {
        match self {
            DataFormat::Tabular | DataFormat::Csv => "#",
            DataFormat::Octave => "%",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            DataFormat::Tabular => "dat",
            DataFormat::Octave => "mat",
            DataFormat::Csv => "csv",
        }
    }
}

/// Render a waveform in the given format.
pub fn render_processed(waveform: &Waveform, tracked: &[TrackedSignal], format: DataFormat) -> String {
    let delim = format.delimiter();
    let comment = format.comment();
    let columns: Vec<Option<&[f64]>> = tracked.iter().map(|t| waveform.values(&t.name)).collect();

    let mut out = String::new();
    if format == DataFormat::Octave {
        let _ = writeln!(out, "{comment} name: data");
        let _ = writeln!(out, "{comment} type: matrix");
        let _ = writeln!(out, "{comment} rows: {}", waveform.num_points());
        let _ = writeln!(out, "{comment} columns: {}", tracked.len() + 1);
    }
    let names: Vec<&str> = tracked.iter().map(|t| t.name.as_str()).collect();
    let _ = writeln!(out, "{comment} time{delim}{}", names.join(delim));

    for (row, time) in waveform.times.iter().enumerate() {
        let _ = write!(out, "{time:.6e}");
        for column in &columns {
            out.push_str(delim);
            match column.and_then(|c| c.get(row)) {
                Some(v) => {
                    let _ = write!(out, "{v:.6e}");
                }
                None => out.push_str(NOT_FOUND),
            }
        }
        out.push('\n');
    }
    out
}

pub fn write_processed(
    path: &Path,
    waveform: &Waveform,
    tracked: &[TrackedSignal],
    format: DataFormat,
) -> Result<()> {
    std::fs::write(path, render_processed(waveform, tracked, format))?;
    Ok(())
}
