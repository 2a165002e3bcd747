//! Cartesian grid enumeration.
//!
//! Points are enumerated like an odometer: the first axis turns fastest and
//! wraps at its own step count, carrying into the next axis.

use critsim_core::ParameterSet;

/// One sweep axis: a parameter name and its step values.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    pub name: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Grid {
    axes: Vec<Axis>,
}

impl Grid {
    pub fn new(axes: Vec<Axis>) -> Self {
        Self { axes }
    }

    /// Axes for every sweepable parameter except `skip`.
    pub fn from_parameters(params: &ParameterSet, skip: Option<&str>) -> Self {
        let axes = params
            .sweep_axes(skip)
            .into_iter()
            .map(|p| Axis {
                name: p.name.clone(),
                values: p.values(),
            })
            .collect();
        Self { axes }
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Number of points. A grid without axes has exactly one point.
    pub fn len(&self) -> usize {
        self.axes.iter().map(|a| a.values.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.axes.iter().map(|a| a.values.len()).collect()
    }

    /// Index vectors in enumeration order.
    pub fn iter(&self) -> Odometer {
        Odometer::new(self.sizes())
    }

    /// Index vector of the `k`-th point.
    pub fn indices(&self, mut k: usize) -> Vec<usize> {
        self.axes
            .iter()
            .map(|a| {
                let n = a.values.len();
                let i = k % n;
                k /= n;
                i
            })
            .collect()
    }

    /// Linear index of an index vector.
    pub fn position(&self, indices: &[usize]) -> usize {
        let mut k = 0;
        let mut stride = 1;
        for (axis, &i) in self.axes.iter().zip(indices) {
            k += i * stride;
            stride *= axis.values.len();
        }
        k
    }

    pub fn values(&self, indices: &[usize]) -> Vec<f64> {
        self.axes
            .iter()
            .zip(indices)
            .map(|(a, &i)| a.values[i])
            .collect()
    }
}

/// Iterator over index vectors, least significant axis first.
#[derive(Debug, Clone)]
pub struct Odometer {
    sizes: Vec<usize>,
    counters: Vec<usize>,
    done: bool,
}

impl Odometer {
    pub fn new(sizes: Vec<usize>) -> Self {
        let done = sizes.contains(&0);
        let counters = vec![0; sizes.len()];
        Self {
            sizes,
            counters,
            done,
        }
    }
}

impl Iterator for Odometer {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let current = self.counters.clone();

        self.done = true;
        for (counter, &size) in self.counters.iter_mut().zip(&self.sizes) {
            *counter += 1;
            if *counter < size {
                self.done = false;
                break;
            }
            *counter = 0;
        }
        Some(current)
    }
}
