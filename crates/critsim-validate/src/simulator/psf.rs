//! Parser for PSF-ASCII waveform files.
//!
//! The file is a header section, a line reading exactly `VALUE`, sample rows,
//! and a line reading exactly `END`. Each sample row holds one value, usually
//! preceded by the quoted name of the signal it belongs to:
//!
//! ```text
//! "time" 0.000000e+00
//! "q_out" 1.200000e+00
//! "time" 1.000000e-12
//! "q_out" 1.199000e+00
//! ```
//!
//! One timepoint is a cycle of rows starting with the sweep variable (time).

use std::path::Path;

use critsim_core::{Error, Result, TrackedSignal};

use crate::simulator::types::{PsfHeader, PsfLayout, Waveform};

/// Read and parse a PSF-ASCII file.
pub fn read_psf(path: &Path, tracked: &[TrackedSignal], layout: PsfLayout) -> Result<Waveform> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::parse(path, format!("cannot read waveform file: {e}")))?;
    parse_psf(&content, tracked, layout).map_err(|e| match e {
        Error::Parse { reason, .. } => Error::parse(path, reason),
        other => other,
    })
}

/// Parse PSF-ASCII content.
///
/// Analyzable signals missing from an unordered file are an error; passive
/// signals are simply left out of the returned waveform.
pub fn parse_psf(content: &str, tracked: &[TrackedSignal], layout: PsfLayout) -> Result<Waveform> {
    let mut lines = content.lines();

    let mut header = PsfHeader::default();
    let mut found_value = false;
    for line in lines.by_ref() {
        let line = line.trim_end();
        if line == "VALUE" {
            found_value = true;
            break;
        }
        if let Some(entry) = parse_header_entry(line) {
            header.entries.push(entry);
        }
    }
    if !found_value {
        return Err(psf_error("VALUE marker not found"));
    }

    let mut rows: Vec<(Option<&str>, f64)> = Vec::new();
    let mut found_end = false;
    for (n, line) in lines.enumerate() {
        let line = line.trim();
        if line == "END" {
            found_end = true;
            break;
        }
        if line.is_empty() {
            continue;
        }
        rows.push(parse_row(line).ok_or_else(|| {
            psf_error(format!("unparsable sample row {}: {line:?}", n + 1))
        })?);
    }
    if !found_end {
        return Err(psf_error("END marker not found"));
    }

    let (cycle, offsets) = match layout {
        PsfLayout::Ordered => ordered_offsets(tracked),
        PsfLayout::Unordered => unordered_offsets(&rows, tracked)?,
    };
    if cycle == 0 || rows.is_empty() {
        return Err(psf_error("no samples"));
    }
    if rows.len() % cycle != 0 {
        return Err(psf_error(format!(
            "truncated sample: {} rows is not a multiple of {cycle}",
            rows.len()
        )));
    }

    let points = rows.len() / cycle;
    let times: Vec<f64> = (0..points).map(|p| rows[p * cycle].1).collect();
    let columns = offsets
        .into_iter()
        .map(|(name, offset)| {
            let values = (0..points).map(|p| rows[p * cycle + offset].1).collect();
            (name, values)
        })
        .collect();

    Ok(Waveform {
        header,
        times,
        columns,
    })
}

fn ordered_offsets(tracked: &[TrackedSignal]) -> (usize, Vec<(String, usize)>) {
    let offsets = tracked
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.clone(), i + 1))
        .collect();
    (tracked.len() + 1, offsets)
}

/// Discover each tracked signal's row offset within the first cycle.
fn unordered_offsets(
    rows: &[(Option<&str>, f64)],
    tracked: &[TrackedSignal],
) -> Result<(usize, Vec<(String, usize)>)> {
    let Some(sweep_name) = rows.first().and_then(|(name, _)| *name) else {
        return Err(psf_error("first sample row carries no signal name"));
    };
    let cycle = rows
        .iter()
        .skip(1)
        .position(|(name, _)| *name == Some(sweep_name))
        .map_or(rows.len(), |p| p + 1);

    let mut offsets = Vec::with_capacity(tracked.len());
    for signal in tracked {
        match rows[..cycle]
            .iter()
            .position(|(name, _)| *name == Some(signal.name.as_str()))
        {
            Some(offset) => offsets.push((signal.name.clone(), offset)),
            None if signal.analyzable => {
                return Err(Error::SignalNotFound(signal.name.clone()));
            }
            None => log::debug!("passive signal {} not present in waveform", signal.name),
        }
    }
    Ok((cycle, offsets))
}

/// Split a row into an optional quoted name and its value (last token).
fn parse_row(line: &str) -> Option<(Option<&str>, f64)> {
    let mut tokens = line.split_whitespace();
    let first = tokens.next()?;
    let name = first
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'));
    let value_token = match name {
        Some(_) => tokens.last()?,
        None => tokens.last().unwrap_or(first),
    };
    let value = value_token.parse::<f64>().ok()?;
    Some((name, value))
}

fn parse_header_entry(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    let rest = line.strip_prefix('"')?;
    let (key, value) = rest.split_once('"')?;
    let value = value.trim().trim_matches('"');
    Some((key.to_string(), value.to_string()))
}

fn psf_error(reason: impl Into<String>) -> Error {
    Error::parse("<psf>", reason)
}
