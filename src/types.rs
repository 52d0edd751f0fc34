//! Types and traits for the values stored in distributed fields

/// Element of a distributed field
///
/// Anything that can be moved bitwise between processes. With the `mpi`
/// feature this additionally requires an MPI datatype.
#[cfg(feature = "mpi")]
pub trait Element: Copy + Default + Send + Sync + 'static + ::mpi::datatype::Equivalence {}

#[cfg(feature = "mpi")]
impl<T> Element for T where T: Copy + Default + Send + Sync + 'static + ::mpi::datatype::Equivalence {}

/// Element of a distributed field
///
/// Anything that can be moved bitwise between processes.
#[cfg(not(feature = "mpi"))]
pub trait Element: Copy + Default + Send + Sync + 'static {}

#[cfg(not(feature = "mpi"))]
impl<T> Element for T where T: Copy + Default + Send + Sync + 'static {}
