//! # One dimensional advection operators
//!
//! Each operator updates the distribution function in place along exactly
//! one dimension with a backward semi-Lagrangian step: every lane along
//! that dimension is evaluated at the feet of the characteristics. The
//! dimension must be held completely by the process, operators never
//! communicate.
//!
//! - [`BslAdvectionSpatial`]: `df/dt + v df/dx = 0`
//! - [`BslAdvectionVelocity`]: `df/dt + q/m E df/dv = 0`
pub mod spatial;
pub mod velocity;
pub use spatial::BslAdvectionSpatial;
pub use velocity::BslAdvectionVelocity;

use crate::error::{Error, Result};
use crate::exec::ExecSpace;
use crate::field::FieldMem;
use crate::field_solver::ElectricField;
use crate::geometry::UniformGrid;
use crate::idx_range::{Dim, Tag};

/// In-place advection along one dimension
pub trait Advection1D {
    /// Dimension the operator advects along
    fn dim(&self) -> Dim;

    /// Advance `f` by `dt`.
    ///
    /// # Errors
    /// `f` does not hold [`Advection1D::dim`] completely or lacks a
    /// dimension the operator depends on.
    fn advect(&self, exec: ExecSpace, f: &mut FieldMem<f64>, efield: &ElectricField, dt: f64) -> Result<()>;
}

/// Axis of `dim` in `f`, checking that the process holds the whole grid
/// along it.
pub(crate) fn local_axis(f: &FieldMem<f64>, dim: Dim, grid: &UniformGrid) -> Result<usize> {
    let tag = Tag::Grid(dim);
    let axis = f.tags().rank_of(tag).ok_or_else(|| Error::MissingTag {
        tag,
        context: f.idx_range().to_string(),
    })?;
    if f.idx_range().fronts()[axis] != 0 || f.idx_range().extents()[axis] != grid.npoints() {
        return Err(Error::NotLocal {
            dim: dim.to_string(),
            idx_range: f.idx_range().clone(),
        });
    }
    Ok(axis)
}

/// Axis and global start index of `dim` in `f`
pub(crate) fn axis_and_front(f: &FieldMem<f64>, dim: Dim) -> Result<(usize, usize)> {
    let tag = Tag::Grid(dim);
    let axis = f.tags().rank_of(tag).ok_or_else(|| Error::MissingTag {
        tag,
        context: f.idx_range().to_string(),
    })?;
    Ok((axis, f.idx_range().fronts()[axis]))
}
