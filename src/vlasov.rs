//! # Split Vlasov solver
//!
//! One time step of the Vlasov equation is composed of 1D advections
//! (Strang splitting):
//!
//! 1. spatial dims `x1 .. xn` for `dt/2`
//! 2. velocity dims in palindromic order: `v1 .. v(m-1)` for `dt/2`,
//!    `vm` for `dt`, then `v(m-1) .. v1` for `dt/2`
//! 3. spatial dims `xn .. x1` for `dt/2`
//!
//! Every sweep needs its dimension to be local. The distribution arrives
//! in one of the two layouts of a [`MpiTransposeAllToAll`] (its *home*
//! layout), is transposed whenever the next sweep runs along a dimension
//! that the current layout distributes, and is returned in its home layout.
use crate::advection::Advection1D;
use crate::error::{Error, Result};
use crate::exec::ExecSpace;
use crate::field::FieldMem;
use crate::field_solver::ElectricField;
use crate::idx_range::{Dim, Tag};
use crate::mpi::{Communicator, LayoutSide, MpiTransposeAllToAll};

/// Advance the distribution function by one time step
pub trait VlasovSolver {
    /// Advance `f` by `dt` in the electric field `efield`. `f` is
    /// returned in the layout it was given in.
    ///
    /// # Errors
    /// `f` is not in a known layout, or a sub-step failed.
    fn solve(&self, f: &mut FieldMem<f64>, efield: &ElectricField, dt: f64) -> Result<()>;
}

/// One sweep of the splitting
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplittingStep {
    /// Dimension of the sweep
    pub dim: Dim,
    /// Time step of the sweep
    pub dt: f64,
}

/// Second order splitting sequence for the given spatial and velocity
/// dimensions.
pub fn strang_splitting(spatial: &[Dim], velocity: &[Dim], dt: f64) -> Vec<SplittingStep> {
    let step = |dim: &Dim, dt: f64| SplittingStep { dim: *dim, dt };
    let mut plan: Vec<SplittingStep> = spatial.iter().map(|d| step(d, dt / 2.)).collect();
    if let Some((last, rest)) = velocity.split_last() {
        plan.extend(rest.iter().map(|d| step(d, dt / 2.)));
        plan.push(step(last, dt));
        plan.extend(rest.iter().rev().map(|d| step(d, dt / 2.)));
    }
    plan.extend(spatial.iter().rev().map(|d| step(d, dt / 2.)));
    plan
}

/// Strang split Vlasov solver over the two layouts of a transpose
pub struct MpiSplitVlasovSolver<'a, C: Communicator> {
    spatial: Vec<&'a dyn Advection1D>,
    velocity: Vec<&'a dyn Advection1D>,
    transpose: &'a MpiTransposeAllToAll<C>,
    exec: ExecSpace,
}

impl<'a, C: Communicator> MpiSplitVlasovSolver<'a, C> {
    /// Compose spatial and velocity advections.
    ///
    /// # Errors
    /// An operator's dimension is unknown to the layouts, is distributed
    /// in both layouts, or appears twice.
    pub fn new(
        spatial: Vec<&'a dyn Advection1D>,
        velocity: Vec<&'a dyn Advection1D>,
        transpose: &'a MpiTransposeAllToAll<C>,
        exec: ExecSpace,
    ) -> Result<Self> {
        let first = transpose.layout(LayoutSide::First);
        let second = transpose.layout(LayoutSide::Second);
        let mut seen: Vec<Dim> = Vec::new();
        for op in spatial.iter().chain(velocity.iter()) {
            let dim = op.dim();
            let tag = Tag::Grid(dim);
            if !first.tags().contains(tag) {
                return Err(Error::MissingTag {
                    tag,
                    context: first.to_string(),
                });
            }
            if first.is_distributed(dim) && second.is_distributed(dim) {
                return Err(Error::IncompatibleLayouts {
                    first: first.to_string(),
                    second: second.to_string(),
                    reason: format!("advection along {} is distributed in both layouts", dim),
                });
            }
            if seen.contains(&dim) {
                return Err(Error::DuplicateTag {
                    tag,
                    context: "advection operators".to_owned(),
                });
            }
            seen.push(dim);
        }
        Ok(Self {
            spatial,
            velocity,
            transpose,
            exec,
        })
    }

    /// Sweeps of one step of length `dt`
    pub fn plan(&self, dt: f64) -> Vec<SplittingStep> {
        let spatial: Vec<Dim> = self.spatial.iter().map(|op| op.dim()).collect();
        let velocity: Vec<Dim> = self.velocity.iter().map(|op| op.dim()).collect();
        strang_splitting(&spatial, &velocity, dt)
    }

    fn operator(&self, dim: Dim) -> Option<&'a dyn Advection1D> {
        self.spatial
            .iter()
            .chain(self.velocity.iter())
            .find(|op| op.dim() == dim)
            .copied()
    }
}

impl<C: Communicator> VlasovSolver for MpiSplitVlasovSolver<'_, C> {
    fn solve(&self, f: &mut FieldMem<f64>, efield: &ElectricField, dt: f64) -> Result<()> {
        let home = self
            .transpose
            .side_of(f.idx_range())
            .ok_or_else(|| Error::IdxRangeMismatch {
                expected: self.transpose.local_idx_range(LayoutSide::First).clone(),
                found: f.idx_range().clone(),
            })?;
        // f in the other layout, allocated on first use
        let mut scratch: Option<FieldMem<f64>> = None;
        let mut current = home;
        for step in self.plan(dt) {
            let op = self.operator(step.dim).ok_or(Error::MissingTag {
                tag: Tag::Grid(step.dim),
                context: "advection operators".to_owned(),
            })?;
            if self.transpose.layout(current).is_distributed(step.dim) {
                let next = current.other();
                if next == home {
                    if let Some(g) = &scratch {
                        self.transpose.transpose(self.exec, f, g)?;
                    }
                } else {
                    let g = scratch
                        .get_or_insert_with(|| FieldMem::zeros(self.transpose.local_idx_range(next).clone()));
                    self.transpose.transpose(self.exec, g, &*f)?;
                }
                current = next;
            }
            match scratch.as_mut() {
                Some(g) if current != home => op.advect(self.exec, g, efield, step.dt)?,
                _ => op.advect(self.exec, f, efield, step.dt)?,
            }
        }
        if current != home {
            if let Some(g) = &scratch {
                self.transpose.transpose(self.exec, f, g)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advection::{BslAdvectionSpatial, BslAdvectionVelocity};
    use crate::geometry::{SpeciesInfo, UniformGrid};
    use crate::idx_range::IdxRange;
    use crate::interpolation::{Boundary, InterpolatorKind, LagrangeInterpolator};
    use crate::mpi::{MpiLayout, SelfComm, ThreadComm};
    use ndarray::Dimension;
    use std::cell::RefCell;
    use std::f64::consts::PI;

    const V: [Dim; 3] = [Dim::Vx, Dim::Vy, Dim::Vz];

    fn layouts() -> (MpiLayout, MpiLayout) {
        let x_split = MpiLayout::new("x_split", &[Dim::Species, Dim::X, Dim::Vx, Dim::Vy, Dim::Vz], &[Dim::X]).unwrap();
        let v_split = MpiLayout::new("v_split", &[Dim::Species, Dim::Vx, Dim::Vy, Dim::Vz, Dim::X], &V).unwrap();
        (x_split, v_split)
    }

    fn global() -> IdxRange {
        IdxRange::from_dims(&[(Dim::Species, 0, 1), (Dim::Vx, 0, 4), (Dim::Vy, 0, 4), (Dim::Vz, 0, 4), (Dim::X, 0, 8)])
            .unwrap()
    }

    fn x_grid() -> UniformGrid {
        UniformGrid::new(0., 8., 8, true).unwrap()
    }

    fn v_grid() -> UniformGrid {
        UniformGrid::new(-1.5, 1.5, 3, false).unwrap()
    }

    /// Initial value in v_split ordering (sp, vx, vy, vz, x)
    fn initial(idx: &[usize]) -> f64 {
        let v = v_grid();
        let x = x_grid().coord(idx[4]);
        let v2: f64 = idx[1..4].iter().map(|i| v.coord(*i).powi(2)).sum();
        (1. + 0.1 * (2. * PI * x / 8.).cos()) * (-v2 / 2.).exp() + 0.01 * idx[1] as f64
    }

    fn efield(amplitude: f64) -> ElectricField {
        let mut e = ElectricField::zeros(IdxRange::from_dims(&[(Dim::X, 0, 8)]).unwrap());
        let x = x_grid();
        e.component_mut(Dim::X)
            .unwrap()
            .indexed_iter_mut()
            .for_each(|(i, v)| *v = amplitude * (2. * PI * x.coord(i[0]) / 8.).sin());
        e
    }

    struct Operators {
        spatial: BslAdvectionSpatial,
        velocity: Vec<BslAdvectionVelocity>,
    }

    fn operators() -> Operators {
        let interp: InterpolatorKind = LagrangeInterpolator::new(Boundary::Periodic).into();
        let species = vec![SpeciesInfo::default()];
        Operators {
            spatial: BslAdvectionSpatial::new(Dim::X, x_grid(), v_grid(), &interp).unwrap(),
            velocity: V
                .iter()
                .map(|d| BslAdvectionVelocity::new(*d, v_grid(), &species, &interp).unwrap())
                .collect(),
        }
    }

    #[test]
    fn test_strang_splitting() {
        let plan = strang_splitting(&[Dim::X], &V, 1.);
        let dims: Vec<Dim> = plan.iter().map(|s| s.dim).collect();
        let dts: Vec<f64> = plan.iter().map(|s| s.dt).collect();
        assert_eq!(dims, vec![Dim::X, Dim::Vx, Dim::Vy, Dim::Vz, Dim::Vy, Dim::Vx, Dim::X]);
        assert_eq!(dts, vec![0.5, 0.5, 0.5, 1., 0.5, 0.5, 0.5]);

        let plan = strang_splitting(&[Dim::X], &[Dim::Vx, Dim::Vy], 2.);
        let dts: Vec<f64> = plan.iter().map(|s| s.dt).collect();
        assert_eq!(dts, vec![1., 1., 2., 1., 1.]);

        let plan = strang_splitting(&[Dim::X], &[Dim::Vx], 2.);
        assert_eq!(plan.len(), 3);
        assert_eq!(plan[1], SplittingStep { dim: Dim::Vx, dt: 2. });
    }

    /// Records every call and whether the field held the dim completely
    struct Recorder {
        dim: Dim,
        extent: usize,
        calls: RefCell<Vec<(Dim, f64, bool)>>,
    }

    impl Advection1D for Recorder {
        fn dim(&self) -> Dim {
            self.dim
        }

        fn advect(&self, _exec: ExecSpace, f: &mut FieldMem<f64>, _e: &ElectricField, dt: f64) -> Result<()> {
            let local = f.idx_range().extent(self.dim) == Some(self.extent);
            self.calls.borrow_mut().push((self.dim, dt, local));
            Ok(())
        }
    }

    #[test]
    fn test_sweeps_run_on_local_dims() {
        let (x_split, v_split) = layouts();
        let global = global();
        ThreadComm::run(2, |comm| {
            let transpose = MpiTransposeAllToAll::new(&global, x_split.clone(), v_split.clone(), &comm).unwrap();
            let rec = |dim, extent| Recorder {
                dim,
                extent,
                calls: RefCell::new(vec![]),
            };
            let x = rec(Dim::X, 8);
            let vs: Vec<Recorder> = V.iter().map(|d| rec(*d, 4)).collect();
            let spatial: Vec<&dyn Advection1D> = vec![&x];
            let velocity: Vec<&dyn Advection1D> = vs.iter().map(|r| r as &dyn Advection1D).collect();
            let solver = MpiSplitVlasovSolver::new(spatial, velocity, &transpose, ExecSpace::Serial).unwrap();
            let local = transpose.local_idx_range(LayoutSide::Second).clone();
            let mut f = FieldMem::from_fn(local.clone(), initial);
            let before = f.clone();
            solver.solve(&mut f, &efield(0.), 0.4).unwrap();

            assert_eq!(f.idx_range(), &local);
            assert_eq!(f.data(), before.data());
            let xc = x.calls.borrow();
            assert_eq!(xc.len(), 2);
            assert!(xc.iter().all(|(_, dt, local)| *local && (*dt - 0.2).abs() < 1e-15));
            for (i, r) in vs.iter().enumerate() {
                let calls = r.calls.borrow();
                let expected = if i == 2 { 1 } else { 2 };
                assert_eq!(calls.len(), expected);
                assert!(calls.iter().all(|(_, _, local)| *local));
            }
        });
    }

    #[test]
    fn test_zero_field_velocity_sweeps_are_identity() {
        let (x_split, v_split) = layouts();
        let global = global();
        ThreadComm::run(4, |comm| {
            let transpose = MpiTransposeAllToAll::new(&global, x_split.clone(), v_split.clone(), &comm).unwrap();
            let ops = operators();
            let velocity: Vec<&dyn Advection1D> = ops.velocity.iter().map(|op| op as &dyn Advection1D).collect();
            let solver = MpiSplitVlasovSolver::new(vec![], velocity, &transpose, ExecSpace::Parallel).unwrap();
            for side in [LayoutSide::First, LayoutSide::Second] {
                let local = transpose.local_idx_range(side).clone();
                let tags = local.tags().clone();
                let mut f = FieldMem::from_fn(local, |idx| {
                    // evaluate in v_split ordering
                    let mut g = [0; 5];
                    for (k, tag) in tags.iter().enumerate() {
                        g[global.tags().rank_of(tag).unwrap()] = idx[k];
                    }
                    initial(&g)
                });
                let before = f.clone();
                solver.solve(&mut f, &efield(0.), 0.3).unwrap();
                assert_eq!(f.data(), before.data());
            }
        });
    }

    #[test]
    fn test_distributed_equals_single_process() {
        let (x_split, v_split) = layouts();
        let global = global();
        let ops = operators();
        let e = efield(0.5);
        let dt = 0.1;
        let spatial: Vec<&dyn Advection1D> = vec![&ops.spatial];
        let velocity: Vec<&dyn Advection1D> = ops.velocity.iter().map(|op| op as &dyn Advection1D).collect();

        let serial_transpose = MpiTransposeAllToAll::new(&global, x_split.clone(), v_split.clone(), SelfComm).unwrap();
        let solver =
            MpiSplitVlasovSolver::new(spatial.clone(), velocity.clone(), &serial_transpose, ExecSpace::Serial).unwrap();
        let mut reference = FieldMem::from_fn(global.clone(), initial);
        solver.solve(&mut reference, &e, dt).unwrap();
        solver.solve(&mut reference, &e, dt).unwrap();

        ThreadComm::run(2, |comm| {
            let interp: InterpolatorKind = LagrangeInterpolator::new(Boundary::Periodic).into();
            let species = vec![SpeciesInfo::default()];
            let sx = BslAdvectionSpatial::new(Dim::X, x_grid(), v_grid(), &interp).unwrap();
            let sv: Vec<BslAdvectionVelocity> = V
                .iter()
                .map(|d| BslAdvectionVelocity::new(*d, v_grid(), &species, &interp).unwrap())
                .collect();
            let velocity: Vec<&dyn Advection1D> = sv.iter().map(|op| op as &dyn Advection1D).collect();
            let spatial: Vec<&dyn Advection1D> = vec![&sx];
            let transpose = MpiTransposeAllToAll::new(&global, x_split.clone(), v_split.clone(), &comm).unwrap();
            let solver = MpiSplitVlasovSolver::new(spatial, velocity, &transpose, ExecSpace::Parallel).unwrap();
            let local = transpose.local_idx_range(LayoutSide::Second).clone();
            let mut f = FieldMem::from_fn(local.clone(), initial);
            solver.solve(&mut f, &e, dt).unwrap();
            solver.solve(&mut f, &e, dt).unwrap();
            for (idx, value) in f.data().indexed_iter() {
                let g: Vec<usize> = idx.slice().iter().zip(local.fronts()).map(|(i, s)| i + s).collect();
                assert_eq!(*value, *reference.get(&g).unwrap());
            }
        });
    }

    #[test]
    fn test_invalid_composition() {
        let (x_split, _) = layouts();
        let v_split_x = MpiLayout::new("v_split", &[Dim::Species, Dim::Vx, Dim::Vy, Dim::Vz, Dim::X], &[Dim::Vx]).unwrap();
        let global = global();
        let transpose = MpiTransposeAllToAll::new(&global, x_split, v_split_x, SelfComm).unwrap();
        let ops = operators();
        // duplicate dimension
        let dup: Vec<&dyn Advection1D> = vec![&ops.velocity[0], &ops.velocity[0]];
        let spatial: Vec<&dyn Advection1D> = vec![&ops.spatial];
        assert!(MpiSplitVlasovSolver::new(spatial, dup, &transpose, ExecSpace::Serial).is_err());

        // field in neither layout
        let spatial: Vec<&dyn Advection1D> = vec![&ops.spatial];
        let solver = MpiSplitVlasovSolver::new(spatial.clone(), vec![], &transpose, ExecSpace::Serial).unwrap();
        let mut f = FieldMem::<f64>::zeros(global.select_dims(&[Dim::X, Dim::Vx]).unwrap());
        assert!(solver.solve(&mut f, &efield(0.), 0.1).is_err());
    }
}
