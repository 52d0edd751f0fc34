//! Error type shared by all modules
use crate::idx_range::{IdxRange, Tag};
use thiserror::Error;

/// Result alias used throughout this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while setting up or running a simulation.
///
/// Everything but [`Error::Numerical`] and the io variants is a
/// configuration error: it is detected when layouts, transposes
/// or operators are constructed and the run cannot continue.
#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum Error {
    /// A tag sequence holds a tag twice
    #[error("tag {tag} appears more than once in {context}")]
    DuplicateTag { tag: Tag, context: String },

    /// A required tag is absent
    #[error("tag {tag} is missing from {context}")]
    MissingTag { tag: Tag, context: String },

    /// Zero sized dimension
    #[error("extent along {tag} must be positive")]
    EmptyExtent { tag: Tag },

    /// Distributed dimensions of a layout are separated by local ones
    #[error("distributed dimensions {dims} are not adjacent in layout {layout}")]
    NonAdjacent { dims: String, layout: String },

    #[error("layouts {first} and {second} are incompatible: {reason}")]
    IncompatibleLayouts {
        first: String,
        second: String,
        reason: String,
    },

    /// Extent not divisible by the number of processes
    #[error("cannot split {extent} elements evenly over {comm_size} processes ({context})")]
    UnevenDecomposition {
        extent: usize,
        comm_size: usize,
        context: String,
    },

    /// A field does not cover the expected index range
    #[error("index range mismatch: expected {expected}, found {found}")]
    IdxRangeMismatch { expected: IdxRange, found: IdxRange },

    #[error("field buffer over {0} is not contiguous in standard layout")]
    NonContiguous(IdxRange),

    /// An operator needs a dimension that is split over processes
    #[error("dimension {dim} is distributed in {idx_range}, cannot operate along it")]
    NotLocal { dim: String, idx_range: IdxRange },

    /// Non-finite values or a failed transform
    #[error("numerical failure: {0}")]
    Numerical(String),

    /// Invalid parameters
    #[error("configuration error: {0}")]
    Config(String),

    /// Array shape error
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    /// File system error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Hdf5 library error
    #[cfg(feature = "hdf5")]
    #[error(transparent)]
    Hdf5(#[from] hdf5::Error),
}
