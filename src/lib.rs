//! # `rustvlasov`: Split semi-Lagrangian Vlasov-Poisson solver
//!<img align="right" src="https://rustacean.net/assets/cuddlyferris.png" width="80">
//!
//! # Dependencies
//! - cargo >= v1.60
//! - `hdf5` (sudo apt-get install -y libhdf5-dev), only with feature `hdf5`
//! - mpi installation and libclang, only with feature `mpi`
//!
//! # Details
//!
//! The distribution function `f(species, x, v)` lives on a phase space
//! grid that is distributed over MPI processes. A time step is split into
//! one dimensional semi-Lagrangian advections, each of which needs its
//! dimension to be held completely by every process. The phase space is
//! therefore redistributed between two layouts:
//!
//! - `x_split`: the spatial dimension is distributed, velocity advections
//!   are local,
//! - `v_split`: the velocity dimensions are distributed, spatial
//!   advections are local.
//!
//! Moving between both costs a single all-to-all, see
//! [`mpi::MpiTransposeAllToAll`].
//!
//! ## Building blocks
//!
//! - Index ranges over tagged dimensions, see [`idx_range`]
//! - Layouts and the all-to-all transpose, see [`mpi`]
//! - 1D advection operators, see [`advection`]
//! - Strang split Vlasov solver, see [`vlasov::MpiSplitVlasovSolver`]
//! - Charge density and Poisson solver, see [`field_solver`]
//! - Predictor-corrector time loop, see [`predcorr::PredCorr`]
//! - Mass, momentum and energy diagnostics, see [`moments`]
//!
//! # Example
//! Landau damping on a single process
//! ```
//! use rustvlasov::advection::{Advection1D, BslAdvectionSpatial, BslAdvectionVelocity};
//! use rustvlasov::exec::ExecSpace;
//! use rustvlasov::field_solver::{ChargeDensityCalculator, ElectricField, FftPoissonSolver, QnSolver};
//! use rustvlasov::geometry::Mesh;
//! use rustvlasov::idx_range::Dim;
//! use rustvlasov::init::perturbed_maxwellian;
//! use rustvlasov::interpolation::{Boundary, InterpolatorKind};
//! use rustvlasov::io::EventLog;
//! use rustvlasov::mpi::{LayoutSide, MpiLayout, MpiTransposeAllToAll, SelfComm};
//! use rustvlasov::predcorr::PredCorr;
//! use rustvlasov::quadrature::{tensor_coefficients, Trapezoid};
//! use rustvlasov::vlasov::MpiSplitVlasovSolver;
//!
//! fn main() -> rustvlasov::error::Result<()> {
//!     let mesh = Mesh::default();
//!     let (x, vx) = (mesh.grid(Dim::X).unwrap(), mesh.grid(Dim::Vx).unwrap());
//!     let global = mesh.global_idx_range(&[Dim::Species, Dim::Vx, Dim::X])?;
//!     let x_split = MpiLayout::new("x_split", &[Dim::Species, Dim::X, Dim::Vx], &[Dim::X])?;
//!     let v_split = MpiLayout::new("v_split", &[Dim::Species, Dim::Vx, Dim::X], &[Dim::Vx])?;
//!     let transpose = MpiTransposeAllToAll::new(&global, x_split, v_split, SelfComm)?;
//!
//!     let interp = InterpolatorKind::from_name("lagrange", Boundary::Periodic).unwrap();
//!     let adv_x = BslAdvectionSpatial::new(Dim::X, x.clone(), vx.clone(), &interp)?;
//!     let adv_v = BslAdvectionVelocity::new(Dim::Vx, vx.clone(), mesh.species(), &interp)?;
//!     let spatial: Vec<&dyn Advection1D> = vec![&adv_x];
//!     let velocity: Vec<&dyn Advection1D> = vec![&adv_v];
//!     let vlasov = MpiSplitVlasovSolver::new(spatial, velocity, &transpose, ExecSpace::Parallel)?;
//!
//!     let space = global.select_dims(&[Dim::X])?;
//!     let weights = tensor_coefficients(&Trapezoid, &[vx])?;
//!     let charges = mesh.species().iter().map(|s| s.charge).collect();
//!     let velocity = global.select_dims(&[Dim::Vx])?;
//!     let rho = ChargeDensityCalculator::new(SelfComm, space.clone(), velocity, weights, charges, ExecSpace::Parallel)?;
//!     let qn = QnSolver::new(rho, FftPoissonSolver::new(space.clone(), x)?)?;
//!
//!     let mut f = perturbed_maxwellian(&mesh, transpose.local_idx_range(LayoutSide::Second))?;
//!     let mut efield = ElectricField::zeros(space.clone());
//!     let mut potential = ndarray::ArrayD::zeros(ndarray::IxDyn(space.extents()));
//!     let mut log = EventLog::new();
//!     PredCorr::new(&vlasov, &qn, ExecSpace::Parallel).run(&mut f, &mut efield, &mut potential, 0.1, 5, &mut log)?;
//!     assert_eq!(log.events().len(), 6);
//!     Ok(())
//! }
//! ```
//!
//! ## Run the binary
//!
//! `cargo run --release -- params.yaml`
//!
//! or distributed ( `cargo mpirun --np 4 --release --features mpi -- params.yaml` ).
//! See [`config`] for the parameter file.
//!
//! ## Documentation
//!
//! Download and run:
//!
//! `cargo doc --open`
#![warn(missing_docs)]
#![allow(clippy::unnecessary_cast)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#[macro_use]
extern crate enum_dispatch;
pub mod advection;
pub mod config;
pub mod error;
pub mod exec;
pub mod field;
pub mod field_solver;
pub mod geometry;
pub mod idx_range;
pub mod init;
pub mod interpolation;
pub mod io;
pub mod moments;
pub mod mpi;
pub mod predcorr;
pub mod quadrature;
pub mod types;
pub mod vlasov;
