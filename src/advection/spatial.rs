//! Free streaming along a spatial dimension
use super::{axis_and_front, local_axis, Advection1D};
use crate::error::{Error, Result};
use crate::exec::ExecSpace;
use crate::field::FieldMem;
use crate::field_solver::ElectricField;
use crate::geometry::UniformGrid;
use crate::idx_range::Dim;
use crate::interpolation::{Boundary, Interpolate, InterpolatorKind};

/// Backward semi-Lagrangian advection `df/dt + v df/dx = 0` on a
/// periodic spatial grid.
#[derive(Clone, Debug)]
pub struct BslAdvectionSpatial {
    dim: Dim,
    grid: UniformGrid,
    velocity_dim: Dim,
    velocity_grid: UniformGrid,
    interpolator: InterpolatorKind,
}

impl BslAdvectionSpatial {
    /// Advection along `dim` with the velocity of its conjugate
    /// velocity dimension.
    ///
    /// # Errors
    /// `dim` is not a spatial dimension
    pub fn new(
        dim: Dim,
        grid: UniformGrid,
        velocity_grid: UniformGrid,
        interpolator: &InterpolatorKind,
    ) -> Result<Self> {
        let velocity_dim = match dim.conjugate() {
            Some(v) if dim.is_spatial() => v,
            _ => return Err(Error::Config(format!("{} is not a spatial dimension", dim))),
        };
        let boundary = if grid.periodic {
            Boundary::Periodic
        } else {
            Boundary::Clamped
        };
        Ok(Self {
            dim,
            grid,
            velocity_dim,
            velocity_grid,
            interpolator: interpolator.with_boundary(boundary),
        })
    }
}

impl Advection1D for BslAdvectionSpatial {
    fn dim(&self) -> Dim {
        self.dim
    }

    fn advect(&self, exec: ExecSpace, f: &mut FieldMem<f64>, _efield: &ElectricField, dt: f64) -> Result<()> {
        let axis = local_axis(f, self.dim, &self.grid)?;
        let (vaxis, vfront) = axis_and_front(f, self.velocity_dim)?;
        let dx = self.grid.dx();
        let vgrid = &self.velocity_grid;
        let interpolator = &self.interpolator;
        exec.for_each_lane(f.data_mut().view_mut(), axis, |idx, lane| {
            let v = vgrid.coord(vfront + idx[vaxis]);
            interpolator.shift(lane, v * dt / dx);
        });
        Ok(())
    }
}
