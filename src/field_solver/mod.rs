//! # Field equation
//!
//! Electrostatic potential and electric field from the distribution
//! function. The charge density is a velocity moment of the distribution,
//! computed on every process from its local block and summed over the
//! communicator, so the solvers accept the distribution in any layout.
//! Potential and field live on the global spatial index range and are
//! replicated on every process.
pub mod charge;
pub mod poisson;
pub use charge::ChargeDensityCalculator;
pub use poisson::FftPoissonSolver;

use crate::error::{Error, Result};
use crate::field::FieldMem;
use crate::idx_range::{Dim, IdxRange};
use crate::mpi::Communicator;
use ndarray::prelude::*;

/// Electric field components over the (global) spatial index range
#[derive(Clone, Debug)]
pub struct ElectricField {
    idx_range: IdxRange,
    components: Vec<(Dim, ArrayD<f64>)>,
}

impl ElectricField {
    /// Zero field with one component per spatial dimension of `idx_range`
    pub fn zeros(idx_range: IdxRange) -> Self {
        let dims = idx_range.tags().grid_dims();
        Self::with_components(idx_range, &dims)
    }

    /// Zero field with the components `dims` only
    pub fn with_components(idx_range: IdxRange, dims: &[Dim]) -> Self {
        let components = dims
            .iter()
            .map(|d| (*d, ArrayD::zeros(IxDyn(idx_range.extents()))))
            .collect();
        Self {
            idx_range,
            components,
        }
    }

    /// Spatial index range the components are defined on
    pub fn idx_range(&self) -> &IdxRange {
        &self.idx_range
    }

    /// Component along `dim`
    pub fn component(&self, dim: Dim) -> Option<&ArrayD<f64>> {
        self.components.iter().find(|(d, _)| *d == dim).map(|(_, c)| c)
    }

    /// Component along `dim` (mutable)
    pub fn component_mut(&mut self, dim: Dim) -> Option<&mut ArrayD<f64>> {
        self.components
            .iter_mut()
            .find(|(d, _)| *d == dim)
            .map(|(_, c)| c)
    }

    /// Largest absolute value over all components
    pub fn max_abs(&self) -> f64 {
        self.components
            .iter()
            .flat_map(|(_, c)| c.iter())
            .fold(0., |acc: f64, v| acc.max(v.abs()))
    }
}

/// Solve the field equation for a given distribution function
pub trait FieldSolver {
    /// Write potential and electric field for the distribution `f`.
    ///
    /// # Errors
    /// The distribution does not hold the required dimensions, or the
    /// solve produced non-finite values.
    fn solve(&self, potential: &mut ArrayD<f64>, efield: &mut ElectricField, f: &FieldMem<f64>) -> Result<()>;
}

/// Quasi-neutrality solver: charge density followed by a Poisson solve
pub struct QnSolver<C: Communicator> {
    charge: ChargeDensityCalculator<C>,
    poisson: FftPoissonSolver,
}

impl<C: Communicator> QnSolver<C> {
    /// Compose both steps
    ///
    /// # Errors
    /// The density and the Poisson solver live on different index ranges
    pub fn new(charge: ChargeDensityCalculator<C>, poisson: FftPoissonSolver) -> Result<Self> {
        if charge.idx_range() != poisson.idx_range() {
            return Err(Error::IdxRangeMismatch {
                expected: poisson.idx_range().clone(),
                found: charge.idx_range().clone(),
            });
        }
        Ok(Self { charge, poisson })
    }
}

impl<C: Communicator> FieldSolver for QnSolver<C> {
    fn solve(&self, potential: &mut ArrayD<f64>, efield: &mut ElectricField, f: &FieldMem<f64>) -> Result<()> {
        let rho = self.charge.compute(f)?;
        self.poisson.solve(&rho, potential, efield)?;
        if potential.iter().any(|v| !v.is_finite()) {
            return Err(Error::Numerical("non-finite electrostatic potential".to_owned()));
        }
        Ok(())
    }
}
