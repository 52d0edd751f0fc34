//! `Hdf5` functions to read and write ndarrays
use crate::error::Result;
use hdf5::H5Type;
use ndarray::{Array, ArrayBase, ArrayD, Dimension};
use std::path::Path;

/// Read scalar from hdf5
///
/// # Errors
/// When file or variable does not exist, or the variable is not a
/// one element array.
pub fn read_scalar_from_hdf5<T, P>(filename: P, name: &str) -> Result<T>
where
    T: H5Type + Copy,
    P: AsRef<Path>,
{
    let scalar: ndarray::Array1<T> = read_from_hdf5(filename, name)?;
    scalar
        .first()
        .copied()
        .ok_or_else(|| crate::error::Error::Config(format!("dataset {} is empty", name)))
}

/// Interface to write scalar to hdf5 file
///
/// # Errors
/// When file can not be opened or created.
pub fn write_scalar_to_hdf5<T, P>(filename: P, name: &str, scalar: T) -> Result<()>
where
    T: H5Type + Copy,
    P: AsRef<Path>,
{
    let x = ndarray::Array1::<T>::from_elem(1, scalar);
    write_to_hdf5(filename, name, &x)
}

/// Read ndarray from hdf5 file
///
/// # Errors
/// Errors when file/variable does not exist and
/// when the dimensionality does not match `D`.
pub fn read_from_hdf5<A, D, P>(filename: P, varname: &str) -> Result<Array<A, D>>
where
    A: H5Type,
    D: Dimension,
    P: AsRef<Path>,
{
    let file = hdf5::File::open(filename)?;
    let data = file.dataset(varname)?;
    let y: ArrayD<A> = data.read_dyn::<A>()?;
    Ok(y.into_dimensionality::<D>()?)
}

/// Write ndarray to hdf5 file
///
/// # Errors
/// When file can not be opened or created, or when file and
/// variable exist, but variable has different
/// shape than input array (assign new value will fail).
pub fn write_to_hdf5<A, S, D, P>(filename: P, varname: &str, array: &ArrayBase<S, D>) -> Result<()>
where
    A: H5Type,
    S: ndarray::Data<Elem = A>,
    D: ndarray::Dimension,
    P: AsRef<Path>,
{
    let filename = filename.as_ref();
    let file = if filename.exists() {
        hdf5::File::append(filename)?
    } else {
        hdf5::File::create(filename)?
    };

    let dset = match file.dataset(varname) {
        // Overwrite
        Ok(dset) => dset,
        Err(..) => file
            .new_dataset::<A>()
            .no_chunk()
            .shape(array.shape())
            .create(varname)?,
    };
    dset.write(&array.as_standard_layout())?;
    Ok(())
}
