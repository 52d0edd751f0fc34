//! # Interpolation along one dimension
//!
//! Semi-Lagrangian sweeps evaluate each lane at the feet of the
//! characteristics. Feet are given in units of grid points relative to the
//! start of the lane, so the foot of point `i` after a displacement of
//! `s` cells is `i - s`. A zero displacement reproduces the lane exactly.
use ndarray::prelude::*;

/// Treatment of feet outside of the lane
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Boundary {
    /// Wrap around, the point after the last one is the first one
    Periodic,
    /// Constant continuation of the boundary values
    Clamped,
}

impl Boundary {
    fn fold(self, foot: f64, n: usize) -> f64 {
        match self {
            Self::Periodic => foot.rem_euclid(n as f64),
            Self::Clamped => foot.clamp(0., (n - 1) as f64),
        }
    }

    fn index(self, i: isize, n: usize) -> usize {
        let n = n as isize;
        match self {
            Self::Periodic => i.rem_euclid(n) as usize,
            Self::Clamped => i.clamp(0, n - 1) as usize,
        }
    }
}

/// Evaluate a lane at arbitrary positions
#[enum_dispatch]
pub trait Interpolate {
    /// Replace every value of `lane` by the interpolant evaluated at the
    /// corresponding entry of `feet`.
    fn interpolate(&self, lane: ArrayViewMut1<'_, f64>, feet: &[f64]);

    /// Displace the lane by `shift` grid points.
    fn shift(&self, lane: ArrayViewMut1<'_, f64>, shift: f64) {
        let feet: Vec<f64> = (0..lane.len()).map(|i| i as f64 - shift).collect();
        self.interpolate(lane, &feet);
    }
}

/// Available interpolators
#[enum_dispatch(Interpolate)]
#[derive(Clone, Debug)]
pub enum InterpolatorKind {
    /// Cubic Lagrange
    Lagrange(LagrangeInterpolator),
    /// Linear
    Linear(LinearInterpolator),
}

impl InterpolatorKind {
    /// Parse `lagrange` or `linear`
    pub fn from_name(name: &str, boundary: Boundary) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "lagrange" => Some(LagrangeInterpolator::new(boundary).into()),
            "linear" => Some(LinearInterpolator::new(boundary).into()),
            _ => None,
        }
    }

    /// Same interpolator with a different boundary treatment
    pub fn with_boundary(&self, boundary: Boundary) -> Self {
        match self {
            Self::Lagrange(_) => LagrangeInterpolator::new(boundary).into(),
            Self::Linear(_) => LinearInterpolator::new(boundary).into(),
        }
    }
}

/// Cubic Lagrange interpolation on the four points around the foot
#[derive(Clone, Debug)]
pub struct LagrangeInterpolator {
    boundary: Boundary,
}

impl LagrangeInterpolator {
    /// New interpolator
    pub fn new(boundary: Boundary) -> Self {
        Self { boundary }
    }

    /// Weights of the points `-1, 0, 1, 2` at offset `s` in `[0, 1)`
    fn weights(s: f64) -> [f64; 4] {
        [
            -s * (s - 1.) * (s - 2.) / 6.,
            (s + 1.) * (s - 1.) * (s - 2.) / 2.,
            -(s + 1.) * s * (s - 2.) / 2.,
            (s + 1.) * s * (s - 1.) / 6.,
        ]
    }
}

impl Interpolate for LagrangeInterpolator {
    fn interpolate(&self, mut lane: ArrayViewMut1<'_, f64>, feet: &[f64]) {
        let n = lane.len();
        if n == 0 {
            return;
        }
        let src = lane.to_vec();
        for (out, foot) in lane.iter_mut().zip(feet.iter()) {
            let foot = self.boundary.fold(*foot, n);
            let base = foot.floor();
            let w = Self::weights(foot - base);
            let i = base as isize;
            *out = w
                .iter()
                .enumerate()
                .map(|(k, wk)| wk * src[self.boundary.index(i - 1 + k as isize, n)])
                .sum();
        }
    }
}

/// Linear interpolation between the two neighbours of the foot
#[derive(Clone, Debug)]
pub struct LinearInterpolator {
    boundary: Boundary,
}

impl LinearInterpolator {
    /// New interpolator
    pub fn new(boundary: Boundary) -> Self {
        Self { boundary }
    }
}

impl Interpolate for LinearInterpolator {
    fn interpolate(&self, mut lane: ArrayViewMut1<'_, f64>, feet: &[f64]) {
        let n = lane.len();
        if n == 0 {
            return;
        }
        let src = lane.to_vec();
        for (out, foot) in lane.iter_mut().zip(feet.iter()) {
            let foot = self.boundary.fold(*foot, n);
            let base = foot.floor();
            let s = foot - base;
            let i = base as isize;
            *out = (1. - s) * src[self.boundary.index(i, n)] + s * src[self.boundary.index(i + 1, n)];
        }
    }
}
