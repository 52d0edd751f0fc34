//! Periodic Poisson solver in one spatial dimension
//!
//! Solves `-d^2 phi / dx^2 = rho` and `E = -d phi / dx` in Fourier
//! space. The mean of `rho` (the neutralizing background) is dropped,
//! the potential has zero mean.
use super::ElectricField;
use crate::error::{Error, Result};
use crate::field::check_shape;
use crate::geometry::UniformGrid;
use crate::idx_range::{Dim, IdxRange, Tag};
use funspace::{fourier_r2c, BaseR2c, BaseSpace, Space1};
use ndarray::prelude::*;
use ndarray::{Data, Zip};
use num_complex::Complex;
use std::f64::consts::PI;

/// Poisson solver on a periodic grid, transforms by `funspace`
#[derive(Clone)]
pub struct FftPoissonSolver {
    dim: Dim,
    idx_range: IdxRange,
    space: Space1<BaseR2c<f64>>,
    wavenumbers: Array1<f64>,
}

impl FftPoissonSolver {
    /// Solver over the 1D spatial index range `idx_range` with grid `grid`
    ///
    /// # Errors
    /// `idx_range` is not one dimensional, or the grid is not periodic
    /// or does not match the range.
    pub fn new(idx_range: IdxRange, grid: &UniformGrid) -> Result<Self> {
        let dim = match idx_range.tags().as_slice() {
            [Tag::Grid(d)] if d.is_spatial() => *d,
            _ => {
                return Err(Error::Config(format!(
                    "periodic Poisson solver needs one spatial dimension, got {}",
                    idx_range
                )))
            }
        };
        let n = grid.npoints();
        if !grid.periodic || idx_range.extent(dim) != Some(n) {
            return Err(Error::Config(format!(
                "periodic Poisson solver needs a periodic grid of {} points along {}",
                idx_range.size(),
                dim
            )));
        }
        let space = Space1::new(&fourier_r2c::<f64>(n));
        let wavenumbers = Array1::from_shape_fn(n / 2 + 1, |j| 2. * PI * j as f64 / grid.length());
        Ok(Self {
            dim,
            idx_range,
            space,
            wavenumbers,
        })
    }

    /// Spatial index range of density, potential and field
    pub fn idx_range(&self) -> &IdxRange {
        &self.idx_range
    }

    /// Potential and field from the charge density `rho`.
    ///
    /// Nothing is written unless all arguments are defined on the
    /// solver's index range.
    ///
    /// # Errors
    /// Shapes do not match the solver's index range, or the field has no
    /// component along the solver's dimension.
    pub fn solve(&self, rho: &ArrayD<f64>, potential: &mut ArrayD<f64>, efield: &mut ElectricField) -> Result<()> {
        check_shape(&self.idx_range, rho.shape())?;
        check_shape(&self.idx_range, potential.shape())?;
        if efield.idx_range() != &self.idx_range {
            return Err(Error::IdxRangeMismatch {
                expected: self.idx_range.clone(),
                found: efield.idx_range().clone(),
            });
        }
        if efield.component(self.dim).is_none() {
            return Err(Error::MissingTag {
                tag: Tag::Grid(self.dim),
                context: "electric field components".to_owned(),
            });
        }
        let rho = rho.view().into_dimensionality::<Ix1>()?;
        let rho_hat = forward(&self.space, &rho);

        let n = rho.len();
        let mut phi_hat = Array1::<Complex<f64>>::zeros(rho_hat.raw_dim());
        let mut e_hat = Array1::<Complex<f64>>::zeros(rho_hat.raw_dim());
        Zip::from(&mut phi_hat)
            .and(&mut e_hat)
            .and(&rho_hat)
            .and(&self.wavenumbers)
            .for_each(|p, e, r, k| {
                if *k > 0. {
                    *p = *r / (k * k);
                    *e = Complex::new(0., -*k) * *p;
                }
            });
        // Derivative of the Nyquist mode is not representable
        if n % 2 == 0 {
            e_hat[n / 2] = Complex::new(0., 0.);
        }

        potential.assign(&backward(&self.space, &phi_hat));

        let e = efield.component_mut(self.dim).ok_or_else(|| Error::MissingTag {
            tag: Tag::Grid(self.dim),
            context: "electric field components".to_owned(),
        })?;
        e.assign(&backward(&self.space, &e_hat));
        Ok(())
    }
}

fn forward<S, S1>(space: &S, v: &ArrayBase<S1, Ix1>) -> Array1<Complex<f64>>
where
    S: BaseSpace<f64, 1, Physical = f64, Spectral = Complex<f64>>,
    S1: Data<Elem = f64>,
{
    let mut vhat = space.ndarray_spectral();
    space.forward_inplace_par(v, &mut vhat);
    vhat
}

fn backward<S, S1>(space: &S, vhat: &ArrayBase<S1, Ix1>) -> Array1<f64>
where
    S: BaseSpace<f64, 1, Physical = f64, Spectral = Complex<f64>>,
    S1: Data<Elem = Complex<f64>>,
{
    let mut v = space.ndarray_physical();
    space.backward_inplace_par(vhat, &mut v);
    v
}
