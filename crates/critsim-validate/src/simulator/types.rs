//! Types for simulator waveform output.

use critsim_core::Signal;

/// Token layout of PSF-ASCII sample rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PsfLayout {
    /// Values appear in tracked-signal order, time first, one per row.
    #[default]
    Ordered,
    /// Rows carry `"name" value`; positions are discovered from the names.
    Unordered,
}

/// Parsed PSF-ASCII header.
#[derive(Debug, Clone, Default)]
pub struct PsfHeader {
    /// `"key" value` entries in file order, quotes stripped.
    pub entries: Vec<(String, String)>,
}

impl PsfHeader {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Waveform data of one simulator run: tracked signals on a shared time axis.
#[derive(Debug, Clone, Default)]
pub struct Waveform {
    pub header: PsfHeader,
    pub times: Vec<f64>,
    /// `(name, values)` per tracked signal found in the file.
    pub columns: Vec<(String, Vec<f64>)>,
}

impl Waveform {
    pub fn values(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn signal(&self, name: &str) -> Option<Signal> {
        self.values(name).map(|values| Signal {
            name: name.to_string(),
            times: self.times.clone(),
            values: values.to_vec(),
        })
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.columns
            .iter()
            .map(|(name, values)| Signal {
                name: name.clone(),
                times: self.times.clone(),
                values: values.clone(),
            })
            .collect()
    }

    pub fn num_points(&self) -> usize {
        self.times.len()
    }
}
