//! # Moment diagnostics
//!
//! Phase space integrals of the distribution function. Mass and momentum
//! are conserved by the collisionless dynamics, kinetic energy is
//! exchanged with the electric field.
//!
//! Every process integrates its local block with the tensor product
//! quadrature weights of the mesh, the partial integrals are summed over
//! the communicator. The result does not depend on the layout of `f`.
use crate::error::{Error, Result};
use crate::exec::ExecSpace;
use crate::field::FieldMem;
use crate::field_solver::ElectricField;
use crate::geometry::Mesh;
use crate::idx_range::{Dim, IdxRange, Tag};
use crate::mpi::Communicator;
use crate::quadrature::QuadratureCoefficients;
use ndarray::prelude::*;

/// Phase space integrals, summed over species
#[derive(Clone, Debug, PartialEq)]
pub struct Moments {
    /// `sum_s m_s int f_s dx dv`
    pub mass: f64,
    /// `sum_s m_s int v_d f_s dx dv` along every velocity dimension
    pub momentum: Vec<(Dim, f64)>,
    /// `sum_s m_s / 2 int |v|^2 f_s dx dv`
    pub kinetic_energy: f64,
}

/// Event key of the momentum along `dim`
pub fn momentum_key(dim: Dim) -> &'static str {
    match dim {
        Dim::Vx => "momentum_vx",
        Dim::Vy => "momentum_vy",
        Dim::Vz => "momentum_vz",
        _ => "momentum",
    }
}

/// Integrals evaluated by the time integrator at every diagnostics event
pub trait PhaseSpaceMoments {
    /// Moments of the distribution function.
    ///
    /// Collective: every process of the communicator must call it.
    ///
    /// # Errors
    /// `f` does not lie on the mesh, or the reduction failed.
    fn moments(&self, f: &FieldMem<f64>) -> Result<Moments>;

    /// Field energy `1/2 int |E|^2 dx` of the (replicated) electric field
    ///
    /// # Errors
    /// The field does not lie on the spatial mesh
    fn electric_energy(&self, efield: &ElectricField) -> Result<f64>;
}

/// Weights and coordinates along one mesh dimension
#[derive(Clone, Debug)]
struct MeshAxis {
    dim: Dim,
    weights: Vec<f64>,
    coords: Vec<f64>,
}

/// Quadrature of moments on a mesh
pub struct MomentCalculator<C: Communicator> {
    comm: C,
    axes: Vec<MeshAxis>,
    masses: Vec<f64>,
    exec: ExecSpace,
}

impl<C: Communicator> MomentCalculator<C> {
    /// Integrate with the 1D weights of `rule` on every grid of `mesh`
    pub fn new<Q>(comm: C, mesh: &Mesh, rule: &Q, exec: ExecSpace) -> Self
    where
        Q: QuadratureCoefficients + ?Sized,
    {
        let axes = mesh
            .spatial_dims()
            .into_iter()
            .chain(mesh.velocity_dims())
            .filter_map(|dim| {
                mesh.grid(dim).map(|grid| MeshAxis {
                    dim,
                    weights: rule.coefficients(grid).to_vec(),
                    coords: grid.coords(),
                })
            })
            .collect();
        Self {
            comm,
            axes,
            masses: mesh.species().iter().map(|s| s.mass).collect(),
            exec,
        }
    }

    fn axis(&self, dim: Dim) -> Option<&MeshAxis> {
        self.axes.iter().find(|a| a.dim == dim)
    }

    /// 1D factors of the integrand weight on the block `idx_range`
    fn factors(&self, idx_range: &IdxRange, with_species: bool) -> Result<Vec<&[f64]>> {
        let mut factors = Vec::with_capacity(idx_range.ndim());
        for (tag, front, extent) in idx_range.entries() {
            let full: &[f64] = match tag {
                Tag::Grid(Dim::Species) if with_species => self.masses.as_slice(),
                Tag::Grid(dim) => self.axis(dim).map(|a| a.weights.as_slice()).ok_or_else(|| Error::MissingTag {
                    tag,
                    context: "mesh dimensions".to_owned(),
                })?,
                _ => {
                    return Err(Error::MissingTag {
                        tag,
                        context: "mesh dimensions".to_owned(),
                    })
                }
            };
            let block = full.get(front..front + extent).ok_or_else(|| {
                Error::Config(format!("{} exceeds the mesh along {}", idx_range, tag))
            })?;
            factors.push(block);
        }
        Ok(factors)
    }

    /// Product of the 1D factors times `data`
    fn weighted<S>(factors: &[&[f64]], data: &ArrayBase<S, IxDyn>) -> ArrayD<f64>
    where
        S: ndarray::Data<Elem = f64>,
    {
        let mut weighted = data.to_owned();
        for (ax, w) in factors.iter().enumerate() {
            for (mut sub, wi) in weighted.axis_iter_mut(Axis(ax)).zip(w.iter()) {
                sub.mapv_inplace(|v| v * wi);
            }
        }
        weighted
    }
}

impl<C: Communicator> PhaseSpaceMoments for MomentCalculator<C> {
    fn moments(&self, f: &FieldMem<f64>) -> Result<Moments> {
        for axis in &self.axes {
            if !f.tags().contains(Tag::Grid(axis.dim)) {
                return Err(Error::MissingTag {
                    tag: Tag::Grid(axis.dim),
                    context: f.idx_range().to_string(),
                });
            }
        }
        let factors = self.factors(f.idx_range(), true)?;
        let weighted = Self::weighted(&factors, f.data());

        // mass, momentum per velocity dimension, kinetic energy
        let mut local = vec![self.exec.sum(weighted.view())];
        let mut kinetic = 0.;
        let velocity: Vec<&MeshAxis> = self.axes.iter().filter(|a| a.dim.is_velocity()).collect();
        for axis in &velocity {
            let tag = Tag::Grid(axis.dim);
            let (ax, front) = match (f.tags().rank_of(tag), f.idx_range().front(tag)) {
                (Some(ax), Some(front)) => (ax, front),
                _ => {
                    return Err(Error::MissingTag {
                        tag,
                        context: f.idx_range().to_string(),
                    })
                }
            };
            let (p, e) = weighted
                .axis_iter(Axis(ax))
                .zip(axis.coords[front..].iter())
                .fold((0., 0.), |(p, e), (sub, v)| {
                    let s = self.exec.sum(sub);
                    (p + v * s, e + v * v * s)
                });
            local.push(p);
            kinetic += e / 2.;
        }
        local.push(kinetic);
        self.comm.all_reduce_sum(&mut local)?;

        Ok(Moments {
            mass: local[0],
            momentum: velocity.iter().zip(&local[1..]).map(|(a, p)| (a.dim, *p)).collect(),
            kinetic_energy: local[local.len() - 1],
        })
    }

    fn electric_energy(&self, efield: &ElectricField) -> Result<f64> {
        let factors = self.factors(efield.idx_range(), false)?;
        let mut energy = 0.;
        for dim in efield.idx_range().tags().grid_dims() {
            if let Some(e) = efield.component(dim) {
                let squared = e.mapv(|v| v * v);
                energy += self.exec.sum(Self::weighted(&factors, &squared).view()) / 2.;
            }
        }
        Ok(energy)
    }
}
