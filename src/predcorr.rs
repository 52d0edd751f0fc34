//! # Predictor-corrector time integration
//!
//! Every step
//!
//! 1. solves the field equation for the current distribution `f`,
//! 2. emits an `iteration` event, with the moment diagnostics if a
//!    [`PhaseSpaceMoments`] is attached,
//! 3. advances a copy of `f` by `dt/2` (predictor),
//! 4. solves the field equation for the predicted state,
//! 5. advances `f` by `dt` in the midpoint field (corrector).
//!
//! After the last step the field is solved once more and a
//! `last_iteration` event is emitted, also when no step is taken.
use crate::error::Result;
use crate::exec::ExecSpace;
use crate::field::FieldMem;
use crate::field_solver::{ElectricField, FieldSolver};
use crate::idx_range::{Dim, TagSeq};
use crate::io::{DiagnosticSink, Event, Value, ITERATION, LAST_ITERATION};
use crate::moments::{momentum_key, PhaseSpaceMoments};
use crate::vlasov::VlasovSolver;
use ndarray::ArrayD;

/// Second order predictor-corrector scheme
pub struct PredCorr<'a> {
    vlasov: &'a dyn VlasovSolver,
    field_solver: &'a dyn FieldSolver,
    moments: Option<&'a dyn PhaseSpaceMoments>,
    output_tags: Option<TagSeq>,
    exec: ExecSpace,
}

impl<'a> PredCorr<'a> {
    /// Combine a Vlasov and a field solver
    pub fn new(vlasov: &'a dyn VlasovSolver, field_solver: &'a dyn FieldSolver, exec: ExecSpace) -> Self {
        Self {
            vlasov,
            field_solver,
            moments: None,
            output_tags: None,
            exec,
        }
    }

    /// Add `mass`, `momentum_<v>`, `kinetic_energy` and
    /// `electric_energy` to every event
    #[must_use]
    pub fn with_moments(mut self, moments: &'a dyn PhaseSpaceMoments) -> Self {
        self.moments = Some(moments);
        self
    }

    /// Emit `fdistribu` with its axes in the order `tags`. By default
    /// the local block is emitted in the order it is stored in.
    #[must_use]
    pub fn with_output_layout(mut self, tags: TagSeq) -> Self {
        self.output_tags = Some(tags);
        self
    }

    /// Run `steps` steps of length `dt`.
    ///
    /// `potential` and `efield` hold the solution of the field equation for
    /// the final state on return.
    ///
    /// # Errors
    /// A solver or the sink failed. The run stops at the first error.
    pub fn run(
        &self,
        f: &mut FieldMem<f64>,
        efield: &mut ElectricField,
        potential: &mut ArrayD<f64>,
        dt: f64,
        steps: usize,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<()> {
        let mut f_half = FieldMem::<f64>::zeros(f.idx_range().clone());
        for iter in 0..steps {
            self.field_solver.solve(potential, efield, f)?;
            self.emit(sink, ITERATION, iter, dt, f, potential, efield)?;

            f_half.deep_copy_from(self.exec, &*f)?;
            self.vlasov.solve(&mut f_half, efield, dt / 2.)?;
            self.field_solver.solve(potential, efield, &f_half)?;
            self.vlasov.solve(f, efield, dt)?;
        }
        self.field_solver.solve(potential, efield, f)?;
        self.emit(sink, LAST_ITERATION, steps, dt, f, potential, efield)
    }

    #[allow(clippy::too_many_arguments)]
    fn emit(
        &self,
        sink: &mut dyn DiagnosticSink,
        name: &str,
        iter: usize,
        dt: f64,
        f: &FieldMem<f64>,
        potential: &ArrayD<f64>,
        efield: &ElectricField,
    ) -> Result<()> {
        let reordered = match &self.output_tags {
            Some(tags) if tags != f.tags() => Some(f.transposed_to(tags)?),
            _ => None,
        };
        let fdistribu = reordered.as_ref().unwrap_or(f);
        let moments = match self.moments {
            Some(m) => Some((m.moments(f)?, m.electric_energy(efield)?)),
            None => None,
        };

        let mut event = Event::new(name)
            .with("iter", Value::Int(iter as i64))
            .with("time_saved", Value::Float(iter as f64 * dt))
            .with("fdistribu", Value::Array(fdistribu.data().view()))
            .with("electrostatic_potential", Value::Array(potential.view()));
        if let Some(ex) = efield.component(Dim::X) {
            event = event.with("electric_field_x", Value::Array(ex.view()));
        }
        if let Some((m, electric)) = &moments {
            event = event.with("mass", Value::Float(m.mass));
            for (dim, p) in &m.momentum {
                event = event.with(momentum_key(*dim), Value::Float(*p));
            }
            event = event
                .with("kinetic_energy", Value::Float(m.kinetic_energy))
                .with("electric_energy", Value::Float(*electric));
        }
        sink.emit(&event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idx_range::IdxRange;
    use crate::io::{EventLog, Recorded};
    use std::cell::{Cell, RefCell};

    /// E_x = sum of f
    struct SumField {
        calls: Cell<usize>,
    }

    impl FieldSolver for SumField {
        fn solve(&self, potential: &mut ArrayD<f64>, efield: &mut ElectricField, f: &FieldMem<f64>) -> Result<()> {
            self.calls.set(self.calls.get() + 1);
            let total = f.data().sum();
            potential.fill(total);
            if let Some(ex) = efield.component_mut(Dim::X) {
                ex.fill(total);
            }
            Ok(())
        }
    }

    /// f += dt, records (dt, E_x)
    struct Shift {
        calls: RefCell<Vec<(f64, f64)>>,
    }

    impl VlasovSolver for Shift {
        fn solve(&self, f: &mut FieldMem<f64>, efield: &ElectricField, dt: f64) -> Result<()> {
            let ex = efield.component(Dim::X).map_or(0., |e| e[&[0][..]]);
            self.calls.borrow_mut().push((dt, ex));
            f.data_mut().mapv_inplace(|v| v + dt);
            Ok(())
        }
    }

    fn setup() -> (FieldMem<f64>, ElectricField, ArrayD<f64>) {
        let f = FieldMem::from_fn(IdxRange::from_dims(&[(Dim::X, 0, 1)]).unwrap(), |_| 1.);
        let spatial = IdxRange::from_dims(&[(Dim::X, 0, 1)]).unwrap();
        let potential = ArrayD::zeros(ndarray::IxDyn(&[1]));
        (f, ElectricField::zeros(spatial), potential)
    }

    #[test]
    fn test_zero_steps() {
        let (mut f, mut efield, mut potential) = setup();
        let field = SumField { calls: Cell::new(0) };
        let vlasov = Shift {
            calls: RefCell::new(vec![]),
        };
        let mut log = EventLog::new();
        let pc = PredCorr::new(&vlasov, &field, ExecSpace::Serial);
        pc.run(&mut f, &mut efield, &mut potential, 0.1, 0, &mut log).unwrap();
        assert_eq!(field.calls.get(), 1);
        assert!(vlasov.calls.borrow().is_empty());
        assert_eq!(log.count(ITERATION), 0);
        assert_eq!(log.count(LAST_ITERATION), 1);
        assert_eq!(log.events().len(), 1);
        assert_eq!(f.data()[&[0][..]], 1.);
        let last = log.last(LAST_ITERATION).unwrap();
        assert_eq!(last.get("iter"), Some(&Recorded::Int(0)));
        assert_eq!(last.get("time_saved"), Some(&Recorded::Float(0.)));
    }

    #[test]
    fn test_step_protocol() {
        let (mut f, mut efield, mut potential) = setup();
        let field = SumField { calls: Cell::new(0) };
        let vlasov = Shift {
            calls: RefCell::new(vec![]),
        };
        let mut log = EventLog::new();
        let dt = 0.5;
        let pc = PredCorr::new(&vlasov, &field, ExecSpace::Parallel);
        pc.run(&mut f, &mut efield, &mut potential, dt, 3, &mut log).unwrap();

        assert_eq!(field.calls.get(), 7);
        let calls = vlasov.calls.borrow();
        assert_eq!(calls.len(), 6);
        for (step, pair) in calls.chunks(2).enumerate() {
            let f_start = 1. + step as f64 * dt;
            // predictor sees the field of the current state
            assert_eq!(pair[0], (dt / 2., f_start));
            // corrector sees the field of the predicted state
            assert_eq!(pair[1], (dt, f_start + dt / 2.));
        }
        assert_eq!(f.data()[&[0][..]], 1. + 3. * dt);

        assert_eq!(log.count(ITERATION), 3);
        for (i, event) in log.events()[..3].iter().enumerate() {
            assert_eq!(event.get("iter"), Some(&Recorded::Int(i as i64)));
            assert_eq!(event.get("time_saved"), Some(&Recorded::Float(i as f64 * dt)));
            let expected = ArrayD::from_elem(ndarray::IxDyn(&[1]), 1. + i as f64 * dt);
            assert_eq!(event.get("fdistribu"), Some(&Recorded::Array(expected.clone())));
            assert_eq!(event.get("electric_field_x"), Some(&Recorded::Array(expected)));
        }
        let last = log.last(LAST_ITERATION).unwrap();
        assert_eq!(last.get("iter"), Some(&Recorded::Int(3)));
        // final field belongs to the final state
        assert_eq!(potential[&[0][..]], 1. + 3. * dt);
    }

    #[test]
    fn test_landau_damping_conserves_mass() {
        use crate::advection::{Advection1D, BslAdvectionSpatial, BslAdvectionVelocity};
        use crate::field_solver::{ChargeDensityCalculator, FftPoissonSolver, QnSolver};
        use crate::geometry::{Mesh, SpeciesInfo, UniformGrid};
        use crate::init::perturbed_maxwellian;
        use crate::interpolation::{Boundary, InterpolatorKind};
        use crate::moments::MomentCalculator;
        use crate::mpi::{LayoutSide, MpiLayout, MpiTransposeAllToAll, SelfComm};
        use crate::quadrature::{tensor_coefficients, Trapezoid};
        use crate::vlasov::MpiSplitVlasovSolver;

        let x = UniformGrid::new(0., 4. * std::f64::consts::PI, 32, true).unwrap();
        let vx = UniformGrid::new(-6., 6., 63, false).unwrap();
        let species = vec![SpeciesInfo {
            perturb_amplitude: 0.05,
            ..SpeciesInfo::default()
        }];
        let mesh = Mesh::new(vec![(Dim::X, x.clone()), (Dim::Vx, vx.clone())], species).unwrap();
        let global = mesh.global_idx_range(&[Dim::Species, Dim::Vx, Dim::X]).unwrap();
        let x_split = MpiLayout::new("x_split", &[Dim::Species, Dim::X, Dim::Vx], &[Dim::X]).unwrap();
        let v_split = MpiLayout::new("v_split", &[Dim::Species, Dim::Vx, Dim::X], &[Dim::Vx]).unwrap();
        let transpose = MpiTransposeAllToAll::new(&global, x_split, v_split, SelfComm).unwrap();

        let interp = InterpolatorKind::from_name("lagrange", Boundary::Periodic).unwrap();
        let adv_x = BslAdvectionSpatial::new(Dim::X, x.clone(), vx.clone(), &interp).unwrap();
        let adv_v = BslAdvectionVelocity::new(Dim::Vx, vx.clone(), mesh.species(), &interp).unwrap();
        let spatial: Vec<&dyn Advection1D> = vec![&adv_x];
        let velocity: Vec<&dyn Advection1D> = vec![&adv_v];
        let vlasov = MpiSplitVlasovSolver::new(spatial, velocity, &transpose, ExecSpace::Parallel).unwrap();

        let spatial_range = global.select_dims(&[Dim::X]).unwrap();
        let velocity_range = global.select_dims(&[Dim::Vx]).unwrap();
        let weights = tensor_coefficients(&Trapezoid, &[&vx]).unwrap();
        let charge = ChargeDensityCalculator::new(
            SelfComm,
            spatial_range.clone(),
            velocity_range,
            weights,
            vec![-1.],
            ExecSpace::Parallel,
        )
        .unwrap();
        let poisson = FftPoissonSolver::new(spatial_range.clone(), &x).unwrap();
        let qn = QnSolver::new(charge, poisson).unwrap();
        let moments = MomentCalculator::new(SelfComm, &mesh, &Trapezoid, ExecSpace::Parallel);

        let home = transpose.local_idx_range(LayoutSide::Second).clone();
        let mut f = perturbed_maxwellian(&mesh, &home).unwrap();
        let mass0 = f.data().sum();
        let mut efield = ElectricField::zeros(spatial_range.clone());
        let mut potential = ArrayD::zeros(ndarray::IxDyn(spatial_range.extents()));
        let mut log = EventLog::new();
        let output = TagSeq::from_dims(&[Dim::Species, Dim::X, Dim::Vx]).unwrap();
        let pc = PredCorr::new(&vlasov, &qn, ExecSpace::Parallel)
            .with_moments(&moments)
            .with_output_layout(output);
        pc.run(&mut f, &mut efield, &mut potential, 0.1, 10, &mut log).unwrap();

        assert_eq!(f.idx_range(), &home);
        let mass = f.data().sum();
        assert!((mass - mass0).abs() < 1e-6 * mass0, "mass {} != {}", mass, mass0);
        // the initial field is damped
        let e_max = |event: &crate::io::RecordedEvent| match event.get("electric_field_x") {
            Some(Recorded::Array(a)) => a.iter().fold(0., |m: f64, v| m.max(v.abs())),
            _ => f64::NAN,
        };
        let first = e_max(&log.events()[0]);
        let last = e_max(log.last(LAST_ITERATION).unwrap());
        assert!(first > 0.);
        assert!(last < first, "|E| grew from {} to {}", first, last);

        // emitted diagnostics
        let scalar = |event: &crate::io::RecordedEvent, key: &str| match event.get(key) {
            Some(Recorded::Float(x)) => *x,
            _ => f64::NAN,
        };
        let mass_emitted = scalar(&log.events()[0], "mass");
        // density 1 on a domain of length 4 pi
        assert!((mass_emitted - 4. * std::f64::consts::PI).abs() < 1e-6);
        for event in log.events() {
            let m = scalar(event, "mass");
            assert!((m - mass_emitted).abs() < 1e-6 * mass_emitted, "mass {} != {}", m, mass_emitted);
            assert!(scalar(event, "momentum_vx").abs() < 1e-6);
            assert!(scalar(event, "kinetic_energy") > 0.);
            assert!(scalar(event, "electric_energy") >= 0.);
            match event.get("fdistribu") {
                Some(Recorded::Array(a)) => assert_eq!(a.shape(), &[1, 32, 64]),
                _ => panic!("fdistribu missing"),
            }
        }
        // field energy is damped as well
        let e_first = scalar(&log.events()[0], "electric_energy");
        let e_last = scalar(log.last(LAST_ITERATION).unwrap(), "electric_energy");
        assert!(e_last < e_first);
    }
}
