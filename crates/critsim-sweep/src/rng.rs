//! Deterministic per-iteration seeds for Monte Carlo runs.
//!
//! Each iteration's seed is a pure function of (base seed, grid point,
//! iteration), so a run can be reproduced, or a single iteration re-run,
//! without replaying the others.

/// SplitMix64 hash function.
#[inline]
pub fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e3779b97f4a7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d049bb133111eb);
    x ^ (x >> 31)
}

/// Mix the indices into different bit ranges to avoid collisions.
#[inline]
pub fn combine_indices(seed: u64, point: u64, iteration: u64) -> u64 {
    seed ^ point.wrapping_mul(0x517cc1b727220a95) ^ iteration.wrapping_mul(0x5851f42d4c957f2d)
}

/// Seed handed to the circuit generator for one Monte Carlo iteration.
#[inline]
pub fn iteration_seed(seed: u64, point: usize, iteration: usize) -> u64 {
    splitmix64(combine_indices(seed, point as u64, iteration as u64))
}
