//! MPI Routines
//!
//! Domain decomposition of phase space and redistribution of fields
//! between layouts.
pub mod comm;
pub mod layout;
pub mod transpose;
pub use comm::{Communicator, SelfComm, ThreadComm};
pub use layout::MpiLayout;
pub use transpose::{LayoutSide, MpiTransposeAllToAll};

#[cfg(feature = "mpi")]
pub use ::mpi::initialize;
#[cfg(feature = "mpi")]
pub use ::mpi::topology::SimpleCommunicator;
#[cfg(feature = "mpi")]
pub use ::mpi::Universe;
