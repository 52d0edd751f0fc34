//! Charge density: `rho(x) = sum_s q_s int f_s(x, v) dv`
use crate::error::{Error, Result};
use crate::exec::ExecSpace;
use crate::field::FieldMem;
use crate::idx_range::{Dim, IdxRange, Tag};
use crate::mpi::Communicator;
use ndarray::parallel::prelude::*;
use ndarray::prelude::*;

/// Role of one axis of the distribution function
#[derive(Clone, Copy, Debug)]
enum AxisRole {
    /// Global species index of the first element
    Species(usize),
    /// Position in the density's index range, offset of the first element
    Spatial(usize, usize),
    /// Position in the weights' index range, offset of the first element
    Velocity(usize, usize),
}

/// Velocity moment of the distribution function, summed over species
/// and over all processes.
pub struct ChargeDensityCalculator<C: Communicator> {
    comm: C,
    spatial: IdxRange,
    velocity: IdxRange,
    weights: ArrayD<f64>,
    charges: Vec<f64>,
    exec: ExecSpace,
}

impl<C: Communicator> ChargeDensityCalculator<C> {
    /// `spatial` and `velocity` are global index ranges, `weights` the
    /// quadrature weights over `velocity`, `charges` one entry per
    /// species.
    ///
    /// # Errors
    /// Weights do not match `velocity` or no species is given
    pub fn new(
        comm: C,
        spatial: IdxRange,
        velocity: IdxRange,
        weights: ArrayD<f64>,
        charges: Vec<f64>,
        exec: ExecSpace,
    ) -> Result<Self> {
        if weights.shape() != velocity.extents() {
            return Err(Error::Config(format!(
                "quadrature weights of shape {:?} do not match {}",
                weights.shape(),
                velocity
            )));
        }
        if charges.is_empty() {
            return Err(Error::Config("no species charges given".to_owned()));
        }
        let weights = weights.as_standard_layout().into_owned();
        Ok(Self {
            comm,
            spatial,
            velocity,
            weights,
            charges,
            exec,
        })
    }

    /// Spatial index range of the density
    pub fn idx_range(&self) -> &IdxRange {
        &self.spatial
    }

    fn axis_roles(&self, f: &FieldMem<f64>) -> Result<Vec<AxisRole>> {
        let mismatch = |expected: &IdxRange| Error::IdxRangeMismatch {
            expected: expected.clone(),
            found: f.idx_range().clone(),
        };
        let offset = |range: &IdxRange, tag: Tag, front: usize, extent: usize| match (range.front(tag), range.extent(tag)) {
            (Some(rf), Some(re)) if front >= rf && front + extent <= rf + re => Ok(front - rf),
            _ => Err(mismatch(range)),
        };
        let mut roles = Vec::with_capacity(f.idx_range().ndim());
        for (tag, front, extent) in f.idx_range().entries() {
            let role = if tag == Tag::Grid(Dim::Species) {
                if front + extent > self.charges.len() {
                    return Err(Error::Config(format!(
                        "{} holds more species than the {} charges given",
                        f.idx_range(),
                        self.charges.len()
                    )));
                }
                AxisRole::Species(front)
            } else if let Some(i) = self.spatial.tags().rank_of(tag) {
                AxisRole::Spatial(i, offset(&self.spatial, tag, front, extent)?)
            } else if let Some(i) = self.velocity.tags().rank_of(tag) {
                AxisRole::Velocity(i, offset(&self.velocity, tag, front, extent)?)
            } else {
                return Err(Error::MissingTag {
                    tag,
                    context: "charge density dimensions".to_owned(),
                });
            };
            roles.push(role);
        }
        for tag in self.spatial.tags().iter().chain(self.velocity.tags().iter()) {
            if !f.tags().contains(tag) {
                return Err(Error::MissingTag {
                    tag,
                    context: f.idx_range().to_string(),
                });
            }
        }
        Ok(roles)
    }

    /// Charge density on the global spatial index range.
    ///
    /// Every process integrates its local block, the partial densities
    /// are summed over the communicator. Collective: every process of the
    /// communicator must call it.
    ///
    /// # Errors
    /// `f` does not hold the spatial and velocity dimensions, its block
    /// lies outside the density or weight ranges, or the reduction failed.
    pub fn compute(&self, f: &FieldMem<f64>) -> Result<ArrayD<f64>> {
        let roles = self.axis_roles(f)?;
        let data = f.data();
        let spatial_axes: Vec<usize> = (0..roles.len())
            .filter(|&ax| matches!(roles[ax], AxisRole::Spatial(..)))
            .collect();
        let local_shape: Vec<usize> = spatial_axes.iter().map(|&ax| data.shape()[ax]).collect();

        // charge times quadrature weight over the remaining axes of f
        let weights = self
            .weights
            .as_slice()
            .ok_or_else(|| Error::NonContiguous(self.velocity.clone()))?;
        let w_strides = self.velocity.strides();
        let rest: Vec<(usize, AxisRole)> = roles
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, role)| !matches!(role, AxisRole::Spatial(..)))
            .collect();
        let rest_shape: Vec<usize> = rest.iter().map(|(ax, _)| data.shape()[*ax]).collect();
        let charge_weights = ArrayD::from_shape_fn(IxDyn(&rest_shape), |idx: IxDyn| {
            let (mut species, mut iw) = (0, 0);
            for ((_, role), i) in rest.iter().zip(idx.slice()) {
                match role {
                    AxisRole::Species(front) => species = front + i,
                    AxisRole::Velocity(rank, offset) => iw += (offset + i) * w_strides[*rank],
                    AxisRole::Spatial(..) => {}
                }
            }
            self.charges.get(species).copied().unwrap_or(0.) * weights.get(iw).copied().unwrap_or(0.)
        });

        // moment at every local spatial point, last spatial axis fastest
        let npoints: usize = local_shape.iter().product();
        let moment = |p: usize| -> f64 {
            let mut sub = data.view();
            let mut rem = p;
            for (&ax, &n) in spatial_axes.iter().zip(local_shape.iter()).rev() {
                sub = sub.index_axis_move(Axis(ax), rem % n);
                rem /= n;
            }
            sub.iter().zip(charge_weights.iter()).map(|(a, b)| a * b).sum()
        };
        let moments: Vec<f64> = match self.exec {
            ExecSpace::Serial => (0..npoints).map(moment).collect(),
            ExecSpace::Parallel => (0..npoints).into_par_iter().map(moment).collect(),
        };

        let mut rho = ArrayD::<f64>::zeros(IxDyn(self.spatial.extents()));
        let rho_strides = self.spatial.strides();
        let rho_flat = rho
            .as_slice_mut()
            .ok_or_else(|| Error::NonContiguous(self.spatial.clone()))?;
        for (p, m) in moments.iter().enumerate() {
            let (mut rem, mut irho) = (p, 0);
            for (&ax, &n) in spatial_axes.iter().zip(local_shape.iter()).rev() {
                if let AxisRole::Spatial(rank, offset) = roles[ax] {
                    irho += (offset + rem % n) * rho_strides[rank];
                }
                rem /= n;
            }
            rho_flat[irho] += m;
        }
        self.comm.all_reduce_sum(rho_flat)?;
        Ok(rho)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpi::{LayoutSide, MpiLayout, MpiTransposeAllToAll, SelfComm, ThreadComm};

    fn ranges() -> (IdxRange, IdxRange, IdxRange) {
        let global = IdxRange::from_dims(&[(Dim::Species, 0, 2), (Dim::X, 0, 4), (Dim::Vx, 0, 4)]).unwrap();
        let spatial = global.select_dims(&[Dim::X]).unwrap();
        let velocity = global.select_dims(&[Dim::Vx]).unwrap();
        (global, spatial, velocity)
    }

    fn f_value(idx: &[usize]) -> f64 {
        // (species, x, vx)
        (idx[1] + 1) as f64 * (idx[2] as f64 + 0.5) * (idx[0] + 1) as f64
    }

    fn expected_rho(x: usize) -> f64 {
        // charges -1 and 2, unit weights: sum_vx (vx + 0.5) = 8
        let moment = (x + 1) as f64 * 8.;
        -moment + 2. * 2. * moment
    }

    #[test]
    fn test_single_process() {
        for exec in [ExecSpace::Serial, ExecSpace::Parallel] {
            let (global, spatial, velocity) = ranges();
            let weights = ArrayD::from_elem(IxDyn(&[4]), 1.);
            let calc = ChargeDensityCalculator::new(SelfComm, spatial, velocity, weights, vec![-1., 2.], exec).unwrap();
            let f = FieldMem::from_fn(global, f_value);
            let rho = calc.compute(&f).unwrap();
            for x in 0..4 {
                assert!((rho[&[x][..]] - expected_rho(x)).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_velocity_before_space() {
        // axis order (vx, species, x), non uniform weights
        let global = IdxRange::from_dims(&[(Dim::Vx, 0, 3), (Dim::Species, 0, 1), (Dim::X, 0, 5)]).unwrap();
        let weights = Array1::from(vec![0.5, 1., 2.]).into_dyn();
        let calc = ChargeDensityCalculator::new(
            SelfComm,
            global.select_dims(&[Dim::X]).unwrap(),
            global.select_dims(&[Dim::Vx]).unwrap(),
            weights,
            vec![3.],
            ExecSpace::Parallel,
        )
        .unwrap();
        let f = FieldMem::from_fn(global, |idx| (idx[0] * 10 + idx[2]) as f64);
        let rho = calc.compute(&f).unwrap();
        for x in 0..5 {
            let expected = 3. * (0.5 * x as f64 + (10 + x) as f64 + 2. * (20 + x) as f64);
            assert!((rho[&[x][..]] - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_nonzero_front() {
        // density over x in [2, 6), f covers all of it
        let spatial = IdxRange::from_dims(&[(Dim::X, 2, 4)]).unwrap();
        let velocity = IdxRange::from_dims(&[(Dim::Vx, 0, 3)]).unwrap();
        let weights = ArrayD::from_elem(IxDyn(&[3]), 1.);
        let calc = ChargeDensityCalculator::new(SelfComm, spatial, velocity, weights, vec![1.], ExecSpace::Serial).unwrap();
        let f = FieldMem::from_fn(IdxRange::from_dims(&[(Dim::X, 2, 4), (Dim::Vx, 0, 3)]).unwrap(), |idx| {
            idx[0] as f64
        });
        let rho = calc.compute(&f).unwrap();
        assert_eq!(rho.shape(), &[4]);
        for i in 0..4 {
            assert_eq!(rho[&[i][..]], 3. * (i + 2) as f64);
        }

        // a block inside the range lands at its offset
        let f = FieldMem::from_fn(IdxRange::from_dims(&[(Dim::X, 4, 2), (Dim::Vx, 1, 2)]).unwrap(), |_| 1.);
        let rho = calc.compute(&f).unwrap();
        assert_eq!(rho.as_slice().unwrap(), &[0., 0., 2., 2.]);
    }

    #[test]
    fn test_block_outside_range() {
        let spatial = IdxRange::from_dims(&[(Dim::X, 2, 4)]).unwrap();
        let velocity = IdxRange::from_dims(&[(Dim::Vx, 0, 3)]).unwrap();
        let weights = ArrayD::from_elem(IxDyn(&[3]), 1.);
        let calc = ChargeDensityCalculator::new(SelfComm, spatial, velocity, weights, vec![1.], ExecSpace::Serial).unwrap();
        for entries in [
            [(Dim::X, 0, 4), (Dim::Vx, 0, 3)],
            [(Dim::X, 4, 4), (Dim::Vx, 0, 3)],
            [(Dim::X, 2, 4), (Dim::Vx, 1, 3)],
        ] {
            let f = FieldMem::<f64>::zeros(IdxRange::from_dims(&entries).unwrap());
            assert!(matches!(calc.compute(&f), Err(Error::IdxRangeMismatch { .. })));
        }
        // more species than charges
        let f = FieldMem::<f64>::zeros(
            IdxRange::from_dims(&[(Dim::Species, 0, 2), (Dim::X, 2, 4), (Dim::Vx, 0, 3)]).unwrap(),
        );
        assert!(calc.compute(&f).is_err());
    }

    #[test]
    fn test_distributed_matches_serial() {
        let (global, spatial, velocity) = ranges();
        let x_split = MpiLayout::new("x_split", &[Dim::Species, Dim::X, Dim::Vx], &[Dim::X]).unwrap();
        let v_split = MpiLayout::new("v_split", &[Dim::Species, Dim::Vx, Dim::X], &[Dim::Vx]).unwrap();
        let weights = Array1::from(vec![0.25, 0.5, 1.5, 0.75]).into_dyn();

        let serial = ChargeDensityCalculator::new(
            SelfComm,
            spatial.clone(),
            velocity.clone(),
            weights.clone(),
            vec![-1., 2.],
            ExecSpace::Serial,
        )
        .unwrap()
        .compute(&FieldMem::from_fn(global.clone(), f_value))
        .unwrap();

        for size in [2, 4] {
            let out = ThreadComm::run(size, |comm| {
                let transpose = MpiTransposeAllToAll::new(&global, x_split.clone(), v_split.clone(), &comm).unwrap();
                let calc = ChargeDensityCalculator::new(
                    &comm,
                    spatial.clone(),
                    velocity.clone(),
                    weights.clone(),
                    vec![-1., 2.],
                    ExecSpace::Parallel,
                )
                .unwrap();
                let f = FieldMem::from_fn(transpose.local_idx_range(LayoutSide::First).clone(), f_value);
                let rho_x = calc.compute(&f).unwrap();
                let g = transpose.transposed(ExecSpace::Serial, &f).unwrap();
                let rho_v = calc.compute(&g).unwrap();
                (rho_x, rho_v)
            });
            for (rho_x, rho_v) in out {
                for (a, b) in serial.iter().zip(rho_x.iter().zip(rho_v.iter())) {
                    assert!((a - b.0).abs() < 1e-12);
                    assert!((a - b.1).abs() < 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_missing_dimension() {
        let (_, spatial, velocity) = ranges();
        let weights = ArrayD::from_elem(IxDyn(&[4]), 1.);
        let calc = ChargeDensityCalculator::new(SelfComm, spatial, velocity, weights, vec![1.], ExecSpace::Serial).unwrap();
        let f = FieldMem::<f64>::zeros(IdxRange::from_dims(&[(Dim::X, 0, 4)]).unwrap());
        assert!(calc.compute(&f).is_err());
        let weights = ArrayD::from_elem(IxDyn(&[3]), 1.);
        let (_, spatial, velocity) = ranges();
        assert!(ChargeDensityCalculator::new(SelfComm, spatial, velocity, weights, vec![1.], ExecSpace::Serial).is_err());
    }
}
