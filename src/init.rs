//! # Initial conditions
//!
//! Maxwellian equilibrium per species
//!
//! `f_eq(v) = n / (2 pi T)^(d/2) exp(-|v - u|^2 / (2 T))`
//!
//! with `d` velocity dimensions and the mean velocity `u` directed along
//! the first velocity dimension, and the perturbed state
//!
//! `f(x, v) = f_eq(v) (1 + eps prod_i cos(k x_i))`, `k = 2 pi m / L_i`.
//!
//! All functions evaluate on an arbitrary (local) index range, so every
//! process initializes its own block directly.
use crate::error::{Error, Result};
use crate::field::FieldMem;
use crate::geometry::{Mesh, SpeciesInfo, UniformGrid};
use crate::idx_range::{Dim, IdxRange, Tag};
use ndarray::prelude::*;
use std::f64::consts::PI;

/// What an axis of the index range stands for
enum Role<'a> {
    Species,
    Spatial(&'a UniformGrid),
    /// Grid and whether the mean velocity points along it
    Velocity(&'a UniformGrid, bool),
}

fn axes<'a>(mesh: &'a Mesh, idx_range: &IdxRange) -> Result<Vec<Role<'a>>> {
    let first_v = mesh.velocity_dims().first().copied();
    let mut axes = Vec::with_capacity(idx_range.ndim());
    for tag in idx_range.tags().iter() {
        let dim = match tag {
            Tag::Grid(dim) => dim,
            Tag::Mpi(_) => {
                return Err(Error::Config(format!("cannot initialize over {}", idx_range)));
            }
        };
        if dim == Dim::Species {
            if idx_range.front(tag).unwrap_or(0) + idx_range.extent(tag).unwrap_or(0) > mesh.species().len() {
                return Err(Error::IdxRangeMismatch {
                    expected: mesh.global_idx_range(&[Dim::Species])?,
                    found: idx_range.clone(),
                });
            }
            axes.push(Role::Species);
            continue;
        }
        let grid = mesh
            .grid(dim)
            .ok_or_else(|| Error::Config(format!("mesh has no grid along {}", dim)))?;
        if dim.is_velocity() {
            axes.push(Role::Velocity(grid, Some(dim) == first_v));
        } else {
            axes.push(Role::Spatial(grid));
        }
    }
    Ok(axes)
}

fn value(axes: &[Role<'_>], species: &[SpeciesInfo], idx: &[usize], perturbed: bool) -> f64 {
    let isp = axes
        .iter()
        .zip(idx)
        .find_map(|(a, i)| matches!(a, Role::Species).then(|| *i))
        .unwrap_or(0);
    let s = &species[isp.min(species.len() - 1)];
    let mut v2 = 0.;
    let mut nv = 0_i32;
    let mut modulation = 1.;
    let mut nx = 0;
    for (axis, i) in axes.iter().zip(idx) {
        match axis {
            Role::Species => (),
            Role::Velocity(grid, drift) => {
                let u = if *drift { s.mean_velocity } else { 0. };
                v2 += (grid.coord(*i) - u).powi(2);
                nv += 1;
            }
            Role::Spatial(grid) => {
                let k = 2. * PI * s.perturb_mode as f64 / grid.length();
                modulation *= (k * grid.coord(*i)).cos();
                nx += 1;
            }
        }
    }
    let norm = (2. * PI * s.temperature).powf(-f64::from(nv) / 2.);
    let feq = s.density * norm * (-v2 / (2. * s.temperature)).exp();
    if perturbed && nx > 0 {
        feq * (1. + s.perturb_amplitude * modulation)
    } else {
        feq
    }
}

/// Equilibrium distribution over `idx_range` (constant along the spatial
/// dimensions).
///
/// # Errors
/// `idx_range` holds a dimension without grid, or species outside of the
/// mesh.
pub fn maxwellian_equilibrium(mesh: &Mesh, idx_range: &IdxRange) -> Result<FieldMem<f64>> {
    let axes = axes(mesh, idx_range)?;
    Ok(FieldMem::from_fn(idx_range.clone(), |idx| {
        value(&axes, mesh.species(), idx, false)
    }))
}

/// Equilibrium modulated by a single mode density perturbation
///
/// # Errors
/// See [`maxwellian_equilibrium`]
pub fn perturbed_maxwellian(mesh: &Mesh, idx_range: &IdxRange) -> Result<FieldMem<f64>> {
    let axes = axes(mesh, idx_range)?;
    Ok(FieldMem::from_fn(idx_range.clone(), |idx| {
        value(&axes, mesh.species(), idx, true)
    }))
}

/// Multiply `f` by `1 + r` with `r` uniformly random in `[-amp, amp]`
pub fn apply_random_disturbance(f: &mut FieldMem<f64>, amp: f64) {
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    if amp <= 0. {
        return;
    }
    let rand = ArrayD::<f64>::random(f.data().raw_dim(), Uniform::new(-amp, amp));
    f.data_mut().zip_mut_with(&rand, |v, r| *v *= 1. + r);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quadrature::{tensor_coefficients, QuadratureCoefficients, Trapezoid};

    fn approx_eq(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "Large difference of values, got {} expected {}.", a, b);
    }

    fn mesh(nv: usize) -> Mesh {
        let x = UniformGrid::new(0., 4. * PI, 16, true).unwrap();
        let v = UniformGrid::new(-10., 10., 80, false).unwrap();
        let mut grids = vec![(Dim::X, x)];
        for d in [Dim::Vx, Dim::Vy, Dim::Vz].iter().take(nv) {
            grids.push((*d, v.clone()));
        }
        let species = vec![
            SpeciesInfo {
                density: 2.,
                mean_velocity: 1.,
                ..SpeciesInfo::default()
            },
            SpeciesInfo {
                charge: 1.,
                mass: 100.,
                temperature: 0.5,
                perturb_amplitude: 0.,
                ..SpeciesInfo::default()
            },
        ];
        Mesh::new(grids, species).unwrap()
    }

    #[test]
    fn test_equilibrium_moments() {
        let mesh = mesh(1);
        let range = mesh.global_idx_range(&[Dim::Species, Dim::Vx]).unwrap();
        let f = maxwellian_equilibrium(&mesh, &range).unwrap();
        let vgrid = mesh.grid(Dim::Vx).unwrap();
        let w = Trapezoid.coefficients(vgrid);
        let f = f.data().view().into_dimensionality::<Ix2>().unwrap();
        approx_eq(f.row(0).dot(&w), 2., 1e-8);
        approx_eq(f.row(1).dot(&w), 1., 1e-8);
        let v = Array1::from(vgrid.coords());
        approx_eq((&f.row(0) * &v).dot(&w) / 2., 1., 1e-8);
    }

    #[test]
    fn test_normalization_in_three_dimensions() {
        let mesh = mesh(3);
        let range = mesh.global_idx_range(&[Dim::Vx, Dim::Vy, Dim::Vz]).unwrap();
        let f = maxwellian_equilibrium(&mesh, &range).unwrap();
        let g = mesh.grid(Dim::Vx).unwrap();
        let w = tensor_coefficients(&Trapezoid, &[g, g, g]).unwrap();
        let density: f64 = f.data().iter().zip(w.iter()).map(|(a, b)| a * b).sum();
        approx_eq(density, 2., 1e-8);
    }

    #[test]
    fn test_perturbation() {
        let mesh = mesh(1);
        let range = mesh.global_idx_range(&[Dim::Species, Dim::X, Dim::Vx]).unwrap();
        let feq = maxwellian_equilibrium(&mesh, &range).unwrap();
        let f = perturbed_maxwellian(&mesh, &range).unwrap();
        let x = mesh.grid(Dim::X).unwrap();
        for ix in 0..16 {
            // mode 1 on a domain of length 4 pi
            let expected = 1. + 0.01 * (0.5 * x.coord(ix)).cos();
            approx_eq(f.get(&[0, ix, 40]).unwrap() / feq.get(&[0, ix, 40]).unwrap(), expected, 1e-12);
            approx_eq(*f.get(&[1, ix, 40]).unwrap(), *feq.get(&[1, ix, 40]).unwrap(), 1e-14);
        }
    }

    #[test]
    fn test_local_block() {
        let mesh = mesh(1);
        let global = mesh.global_idx_range(&[Dim::Species, Dim::X, Dim::Vx]).unwrap();
        let local = IdxRange::from_dims(&[(Dim::Species, 1, 1), (Dim::X, 8, 4), (Dim::Vx, 0, 81)]).unwrap();
        let f = perturbed_maxwellian(&mesh, &global).unwrap();
        let g = perturbed_maxwellian(&mesh, &local).unwrap();
        for (idx, v) in g.data().indexed_iter() {
            let global_idx = [idx[0] + 1, idx[1] + 8, idx[2]];
            assert_eq!(*v, *f.get(&global_idx).unwrap());
        }
        let bad = IdxRange::from_dims(&[(Dim::Species, 0, 3), (Dim::Vx, 0, 81)]).unwrap();
        assert!(maxwellian_equilibrium(&mesh, &bad).is_err());
        let no_grid = IdxRange::from_dims(&[(Dim::Y, 0, 4)]).unwrap();
        assert!(maxwellian_equilibrium(&mesh, &no_grid).is_err());
    }

    #[test]
    fn test_random_disturbance() {
        let mesh = mesh(1);
        let range = mesh.global_idx_range(&[Dim::X, Dim::Vx]).unwrap();
        let f0 = maxwellian_equilibrium(&mesh, &range).unwrap();
        let mut f = f0.clone();
        apply_random_disturbance(&mut f, 0.);
        assert_eq!(f.data(), f0.data());
        apply_random_disturbance(&mut f, 1e-3);
        assert!(f.data() != f0.data());
        for (a, b) in f.data().iter().zip(f0.data().iter()) {
            assert!((a - b).abs() <= 1.0001e-3 * b.abs());
        }
    }
}
