//! Run example:
//!
//! cargo run --release -- params.yaml
//!
//! cargo mpirun --np 4 --bin rustvlasov --release --features mpi -- params.yaml
//!
//! Landau damping of a perturbed Maxwellian, see `rustvlasov::config` for
//! the parameter file. Without an argument the default parameters are used.
use rustvlasov::advection::{Advection1D, BslAdvectionSpatial, BslAdvectionVelocity};
use rustvlasov::config::SimulationParams;
use rustvlasov::error::{Error, Result};
use rustvlasov::field_solver::{ChargeDensityCalculator, ElectricField, FftPoissonSolver, QnSolver};
use rustvlasov::idx_range::{Dim, TagSeq};
use rustvlasov::init::{apply_random_disturbance, maxwellian_equilibrium, perturbed_maxwellian};
use rustvlasov::interpolation::Boundary;
use rustvlasov::io::{DiagnosticSink, Event, LogSink, Value, INITIAL_STATE};
use rustvlasov::moments::MomentCalculator;
use rustvlasov::mpi::{Communicator, LayoutSide, MpiLayout, MpiTransposeAllToAll};
use rustvlasov::predcorr::PredCorr;
use rustvlasov::quadrature::tensor_coefficients;
use rustvlasov::vlasov::MpiSplitVlasovSolver;
use std::time::Instant;

fn simulate<C: Communicator>(params: &SimulationParams, comm: &C) -> Result<()> {
    let mesh = &params.mesh;
    let spatial_dims = mesh.spatial_dims();
    let velocity_dims = mesh.velocity_dims();

    // x_split: (species, x, v..), v_split: (species, v.., x)
    let mut x_order = vec![Dim::Species];
    x_order.extend(&spatial_dims);
    x_order.extend(&velocity_dims);
    let mut v_order = vec![Dim::Species];
    v_order.extend(&velocity_dims);
    v_order.extend(&spatial_dims);
    let x_split = MpiLayout::new("x_split", &x_order, &spatial_dims)?;
    let v_split = MpiLayout::new("v_split", &v_order, &velocity_dims)?;
    let global = mesh.global_idx_range(&v_order)?;
    let transpose = MpiTransposeAllToAll::new(&global, x_split, v_split, comm)?;

    // Advection operators
    let missing = |dim: Dim| Error::Config(format!("no grid for dimension {}", dim));
    let x = mesh.grid(Dim::X).ok_or_else(|| missing(Dim::X))?;
    let vx = mesh.grid(Dim::Vx).ok_or_else(|| missing(Dim::Vx))?;
    let interp = params
        .interpolator(Boundary::Periodic)
        .ok_or_else(|| Error::Config(format!("unknown interpolator '{}'", params.interpolator)))?;
    let adv_x = BslAdvectionSpatial::new(Dim::X, x.clone(), vx.clone(), &interp)?;
    let adv_v = velocity_dims
        .iter()
        .map(|&dim| {
            let grid = mesh.grid(dim).ok_or_else(|| missing(dim))?;
            BslAdvectionVelocity::new(dim, grid.clone(), mesh.species(), &interp)
        })
        .collect::<Result<Vec<_>>>()?;
    let spatial: Vec<&dyn Advection1D> = vec![&adv_x];
    let velocity: Vec<&dyn Advection1D> = adv_v.iter().map(|a| a as &dyn Advection1D).collect();
    let vlasov = MpiSplitVlasovSolver::new(spatial, velocity, &transpose, params.backend)?;

    // Field solver
    let spatial_range = global.select_dims(&spatial_dims)?;
    let velocity_range = global.select_dims(&velocity_dims)?;
    let velocity_grids = velocity_dims
        .iter()
        .map(|&dim| mesh.grid(dim).ok_or_else(|| missing(dim)))
        .collect::<Result<Vec<_>>>()?;
    let quadrature = params
        .quadrature()
        .ok_or_else(|| Error::Config(format!("unknown quadrature '{}'", params.quadrature)))?;
    let weights = tensor_coefficients(&quadrature, &velocity_grids)?;
    let charges = mesh.species().iter().map(|s| s.charge).collect();
    let charge = ChargeDensityCalculator::new(
        comm,
        spatial_range.clone(),
        velocity_range,
        weights,
        charges,
        params.backend,
    )?;
    let poisson = FftPoissonSolver::new(spatial_range.clone(), x)?;
    let qn = QnSolver::new(charge, poisson)?;

    // Diagnostics, fdistribu is written in the x_split tag order
    let moments = MomentCalculator::new(comm, mesh, &quadrature, params.backend);
    let output = TagSeq::from_dims(&x_order)?;
    let mut sinks: Vec<Box<dyn DiagnosticSink>> = vec![Box::new(LogSink::new(comm.rank(), params.time_diag))];
    #[cfg(feature = "hdf5")]
    sinks.push(Box::new(rustvlasov::io::Hdf5Sink::new(
        &params.directory,
        comm.rank(),
        comm.size(),
        params.time_diag,
    )?));

    // Initial state, stored in the v_split layout
    let home = transpose.local_idx_range(LayoutSide::Second).clone();
    let f_eq = maxwellian_equilibrium(mesh, &home)?.transposed_to(&output)?;
    sinks.emit(&Event::new(INITIAL_STATE).with("fdistribu_eq", Value::Array(f_eq.data().view())))?;
    let mut f = perturbed_maxwellian(mesh, &home)?;
    apply_random_disturbance(&mut f, params.noise);
    let mut efield = ElectricField::zeros(spatial_range.clone());
    let mut potential = ndarray::ArrayD::zeros(ndarray::IxDyn(spatial_range.extents()));

    if comm.rank() == 0 {
        println!("Processes: {}", comm.size());
        println!("Phase space: {}", global);
        println!("Local block: {}", home);
    }
    let start = Instant::now();
    let predcorr = PredCorr::new(&vlasov, &qn, params.backend)
        .with_moments(&moments)
        .with_output_layout(output);
    predcorr.run(
        &mut f,
        &mut efield,
        &mut potential,
        params.deltat,
        params.nbiter,
        &mut sinks,
    )?;
    comm.barrier();
    if comm.rank() == 0 {
        println!("Time limit reached: {:?}", params.deltat * params.nbiter as f64);
        println!("Simulation time:    {:?}", start.elapsed());
        println!("Final max |E|:      {:10.5e}", efield.max_abs());
    }
    Ok(())
}

fn main() {
    let params = match std::env::args().nth(1) {
        Some(path) => SimulationParams::from_file(&path),
        None => Ok(SimulationParams::default()),
    };
    let params = match params {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Invalid parameters: {}", e);
            std::process::exit(1);
        }
    };

    #[cfg(feature = "mpi")]
    let result = match rustvlasov::mpi::initialize() {
        Some(universe) => simulate(&params, &universe.world()),
        None => Err(Error::Config("MPI could not be initialized".to_owned())),
    };
    #[cfg(not(feature = "mpi"))]
    let result = simulate(&params, &rustvlasov::mpi::SelfComm);

    if let Err(e) = result {
        eprintln!("Simulation failed: {}", e);
        std::process::exit(1);
    }
}
