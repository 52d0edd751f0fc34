//! # Quadrature coefficients
//!
//! Weights are computed once from the grid geometry. Integrals over
//! several dimensions use the tensor product of the 1D weights.
use crate::error::{Error, Result};
use crate::geometry::UniformGrid;
use ndarray::prelude::*;

/// Weights of a quadrature rule on a grid
#[enum_dispatch]
pub trait QuadratureCoefficients {
    /// One weight per grid point
    fn coefficients(&self, grid: &UniformGrid) -> Array1<f64>;
}

/// Trapezoidal rule (spectrally accurate on periodic grids)
#[derive(Clone, Copy, Debug, Default)]
pub struct Trapezoid;

impl QuadratureCoefficients for Trapezoid {
    fn coefficients(&self, grid: &UniformGrid) -> Array1<f64> {
        let dx = grid.dx();
        let mut w = Array1::from_elem(grid.npoints(), dx);
        if !grid.periodic {
            let n = w.len();
            w[0] = dx / 2.;
            w[n - 1] = dx / 2.;
        }
        w
    }
}

/// Simpson's rule, falls back to the trapezoidal rule on periodic grids
/// and on an odd number of cells.
#[derive(Clone, Copy, Debug, Default)]
pub struct Simpson;

impl QuadratureCoefficients for Simpson {
    fn coefficients(&self, grid: &UniformGrid) -> Array1<f64> {
        if grid.periodic || grid.ncells % 2 == 1 {
            return Trapezoid.coefficients(grid);
        }
        let dx = grid.dx();
        let n = grid.npoints();
        Array1::from_shape_fn(n, |i| {
            if i == 0 || i == n - 1 {
                dx / 3.
            } else if i % 2 == 1 {
                4. * dx / 3.
            } else {
                2. * dx / 3.
            }
        })
    }
}

/// Available quadrature rules
#[enum_dispatch(QuadratureCoefficients)]
#[derive(Clone, Copy, Debug)]
pub enum QuadratureKind {
    /// Trapezoidal rule
    Trapezoid(Trapezoid),
    /// Simpson's rule
    Simpson(Simpson),
}

impl QuadratureKind {
    /// Parse `trapezoid` or `simpson`
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "trapezoid" => Some(Self::Trapezoid(Trapezoid)),
            "simpson" => Some(Self::Simpson(Simpson)),
            _ => None,
        }
    }
}

/// Tensor product of the 1D weights of `rule` on `grids`.
///
/// # Errors
/// No grid given
pub fn tensor_coefficients<Q>(rule: &Q, grids: &[&UniformGrid]) -> Result<ArrayD<f64>>
where
    Q: QuadratureCoefficients + ?Sized,
{
    if grids.is_empty() {
        return Err(Error::Config("quadrature needs at least one grid".to_owned()));
    }
    let weights: Vec<Array1<f64>> = grids.iter().map(|g| rule.coefficients(g)).collect();
    let shape: Vec<usize> = weights.iter().map(Array1::len).collect();
    Ok(ArrayD::from_shape_fn(IxDyn(&shape), |idx: IxDyn| {
        weights
            .iter()
            .zip(idx.slice())
            .map(|(w, i)| w[*i])
            .product()
    }))
}
