//! Two-parameter interaction files.
//!
//! For every unordered pair of sweep axes `(a, b)`, a plane is the set of
//! grid points sharing the values of all other axes. Each plane is written
//! as `plane_<a>_<b>_<p>.txt`, and `pair_<a>_<b>.txt` holds the critical
//! value averaged over all planes as an `Na x Nb` table.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use critsim_core::NOT_FOUND;

use crate::error::Result;
use crate::grid::{Grid, Odometer};
use crate::statistics::StatisticsAccumulator;

/// Write the pair and plane files for `grid` into `root`.
///
/// `critical[k]` is the critical value of grid point `k`, `None` for failed
/// points. Returns the written paths; nothing is written for fewer than two
/// axes.
pub fn write_planes(grid: &Grid, critical: &[Option<f64>], root: &Path) -> Result<Vec<PathBuf>> {
    let axes = grid.axes();
    let mut written = Vec::new();
    if axes.len() < 2 {
        return Ok(written);
    }

    for a in 0..axes.len() {
        for b in a + 1..axes.len() {
            let others: Vec<usize> = (0..axes.len()).filter(|&i| i != a && i != b).collect();
            let (na, nb) = (axes[a].values.len(), axes[b].values.len());
            let mut averages = vec![StatisticsAccumulator::new(); na * nb];

            let plane_sizes = others.iter().map(|&i| axes[i].values.len()).collect();
            for (p, fixed) in Odometer::new(plane_sizes).enumerate() {
                let mut indices = vec![0; axes.len()];
                for (&axis, &i) in others.iter().zip(&fixed) {
                    indices[axis] = i;
                }

                let mut out = String::new();
                let _ = writeln!(out, "# plane {p} of {} x {}", axes[a].name, axes[b].name);
                for (&axis, &i) in others.iter().zip(&fixed) {
                    let _ = writeln!(out, "# {} = {:.6e}", axes[axis].name, axes[axis].values[i]);
                }
                let _ = writeln!(out, "# {}\t{}\tcritical", axes[a].name, axes[b].name);

                for j in 0..nb {
                    for i in 0..na {
                        indices[a] = i;
                        indices[b] = j;
                        let value = critical.get(grid.position(&indices)).copied().flatten();
                        if let Some(v) = value {
                            averages[i * nb + j].add(v);
                        }
                        let _ = writeln!(
                            out,
                            "{:.6e}\t{:.6e}\t{}",
                            axes[a].values[i],
                            axes[b].values[j],
                            format_cell(value)
                        );
                    }
                }

                let path = root.join(format!("plane_{}_{}_{p}.txt", axes[a].name, axes[b].name));
                std::fs::write(&path, out)?;
                written.push(path);
            }

            let mut out = String::new();
            let _ = writeln!(
                out,
                "# mean critical value, rows {} columns {}",
                axes[a].name, axes[b].name
            );
            let header: Vec<String> = axes[b].values.iter().map(|v| format!("{v:.6e}")).collect();
            let _ = writeln!(out, "# {}\\{}\t{}", axes[a].name, axes[b].name, header.join("\t"));
            for i in 0..na {
                let cells: Vec<String> = (0..nb)
                    .map(|j| format_cell(averages[i * nb + j].finalize().map(|s| s.mean)))
                    .collect();
                let _ = writeln!(out, "{:.6e}\t{}", axes[a].values[i], cells.join("\t"));
            }

            let path = root.join(format!("pair_{}_{}.txt", axes[a].name, axes[b].name));
            std::fs::write(&path, out)?;
            written.push(path);
        }
    }

    log::debug!("wrote {} plane files", written.len());
    Ok(written)
}

fn format_cell(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_FOUND.to_string(), |v| format!("{v:.6e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Axis;

    fn axis(name: &str, values: &[f64]) -> Axis {
        Axis {
            name: name.into(),
            values: values.to_vec(),
        }
    }

    fn data_rows(path: &Path) -> Vec<Vec<String>> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .filter(|l| !l.starts_with('#'))
            .map(|l| l.split('\t').map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_single_axis_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let grid = Grid::new(vec![axis("vdd", &[1.0, 2.0])]);
        let written = write_planes(&grid, &[Some(1.0), Some(2.0)], dir.path()).unwrap();
        assert!(written.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_two_axes_one_plane() {
        let dir = tempfile::tempdir().unwrap();
        let grid = Grid::new(vec![axis("a", &[1.0, 2.0]), axis("b", &[10.0, 20.0, 30.0])]);
        let critical: Vec<Option<f64>> = (0..6).map(|k| Some(k as f64)).collect();

        let written = write_planes(&grid, &critical, dir.path()).unwrap();
        assert_eq!(written.len(), 2);

        let plane = data_rows(&dir.path().join("plane_a_b_0.txt"));
        assert_eq!(plane.len(), 6);
        assert_eq!(plane[3], vec!["2.000000e0", "2.000000e1", "3.000000e0"]);

        let pair = data_rows(&dir.path().join("pair_a_b.txt"));
        assert_eq!(pair.len(), 2);
        // Point (i, j) has linear index i + 2j.
        assert_eq!(pair[1], vec!["2.000000e0", "1.000000e0", "3.000000e0", "5.000000e0"]);
    }

    #[test]
    fn test_three_axes_averages_over_planes() {
        let dir = tempfile::tempdir().unwrap();
        let grid = Grid::new(vec![
            axis("a", &[1.0, 2.0]),
            axis("b", &[1.0, 2.0]),
            axis("c", &[1.0, 2.0, 3.0]),
        ]);
        // Critical value is the c index, except one failed point.
        let mut critical: Vec<Option<f64>> = grid
            .iter()
            .map(|idx| Some(idx[2] as f64))
            .collect();
        critical[grid.position(&[0, 0, 2])] = None;

        let written = write_planes(&grid, &critical, dir.path()).unwrap();
        // (a,b): 3 planes + pair, (a,c): 2 + pair, (b,c): 2 + pair
        assert_eq!(written.len(), 10);

        let pair = data_rows(&dir.path().join("pair_a_b.txt"));
        assert_eq!(pair[0][1], "5.000000e-1");
        assert_eq!(pair[0][2], "1.000000e0");

        let plane = data_rows(&dir.path().join("plane_a_b_2.txt"));
        assert_eq!(plane[0][2], NOT_FOUND);
    }
}
