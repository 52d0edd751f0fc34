//! Acceleration by the electric field along a velocity dimension
use super::{axis_and_front, local_axis, Advection1D};
use crate::error::{Error, Result};
use crate::exec::ExecSpace;
use crate::field::FieldMem;
use crate::field_solver::ElectricField;
use crate::geometry::{SpeciesInfo, UniformGrid};
use crate::idx_range::{Dim, Tag};
use crate::interpolation::{Boundary, Interpolate, InterpolatorKind};

/// Backward semi-Lagrangian advection `df/dt + q/m E df/dv = 0`.
///
/// The field component is the one along the conjugate spatial dimension
/// of the velocity dimension. Values leaving the velocity grid are
/// clamped to the boundary values.
#[derive(Clone, Debug)]
pub struct BslAdvectionVelocity {
    dim: Dim,
    spatial_dim: Dim,
    grid: UniformGrid,
    /// Charge over mass per species
    qm: Vec<f64>,
    interpolator: InterpolatorKind,
}

impl BslAdvectionVelocity {
    /// Advection along the velocity dimension `dim`
    ///
    /// # Errors
    /// `dim` is not a velocity dimension, no species is given or a species
    /// has a non-positive mass.
    pub fn new(dim: Dim, grid: UniformGrid, species: &[SpeciesInfo], interpolator: &InterpolatorKind) -> Result<Self> {
        let spatial_dim = match dim.conjugate() {
            Some(x) if dim.is_velocity() => x,
            _ => return Err(Error::Config(format!("{} is not a velocity dimension", dim))),
        };
        if species.is_empty() {
            return Err(Error::Config("velocity advection needs at least one species".to_owned()));
        }
        let mut qm = Vec::with_capacity(species.len());
        for s in species {
            if s.mass <= 0. {
                return Err(Error::Config(format!("species mass must be positive, got {}", s.mass)));
            }
            qm.push(s.charge / s.mass);
        }
        Ok(Self {
            dim,
            spatial_dim,
            grid,
            qm,
            interpolator: interpolator.with_boundary(Boundary::Clamped),
        })
    }
}

impl Advection1D for BslAdvectionVelocity {
    fn dim(&self) -> Dim {
        self.dim
    }

    fn advect(&self, exec: ExecSpace, f: &mut FieldMem<f64>, efield: &ElectricField, dt: f64) -> Result<()> {
        let axis = local_axis(f, self.dim, &self.grid)?;
        // No force along this direction
        let e = match efield.component(self.spatial_dim) {
            Some(e) => e,
            None => return Ok(()),
        };
        let e = e
            .as_slice()
            .ok_or_else(|| Error::NonContiguous(efield.idx_range().clone()))?;

        // (axis in f, front in f minus front of the field, stride in e)
        let e_range = efield.idx_range();
        let e_strides = e_range.strides();
        let mut e_axes = Vec::with_capacity(e_range.ndim());
        for ((tag, front, extent), stride) in e_range.entries().zip(&e_strides) {
            let (f_axis, f_front) = axis_and_front(f, tag.dim())?;
            let f_extent = f.idx_range().extents()[f_axis];
            if f_front < front || f_front + f_extent > front + extent {
                return Err(Error::IdxRangeMismatch {
                    expected: e_range.clone(),
                    found: f.idx_range().clone(),
                });
            }
            e_axes.push((f_axis, f_front - front, *stride));
        }
        let species = f
            .tags()
            .rank_of(Tag::Grid(Dim::Species))
            .map(|a| (a, f.idx_range().fronts()[a]));

        let dv = self.grid.dx();
        let qm = &self.qm;
        let interpolator = &self.interpolator;
        exec.for_each_lane(f.data_mut().view_mut(), axis, |idx, lane| {
            let ie: usize = e_axes.iter().map(|(a, off, s)| (off + idx[*a]) * s).sum();
            let isp = species.map_or(0, |(a, front)| front + idx[a]);
            let qm = qm.get(isp).copied().unwrap_or(0.);
            interpolator.shift(lane, qm * e[ie] * dt / dv);
        });
        Ok(())
    }
}
