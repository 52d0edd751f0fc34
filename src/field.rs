//! # Distributed fields
//! A field couples the index range a process holds with an
//! *n*-dimensional ndarray over exactly that range. The array axes
//! follow the order of the range's tags, the last tag is contiguous.
//!
//! Depending on the data representation a field owns its memory
//! ([`FieldMem`]) or borrows it ([`FieldView`], [`FieldViewMut`]).
//!
//! # Example
//! Field over `(x, vx)` holding `x * 10 + vx`
//!```
//! use rustvlasov::field::FieldMem;
//! use rustvlasov::idx_range::{Dim, IdxRange};
//!
//! let range = IdxRange::from_dims(&[(Dim::X, 0, 8), (Dim::Vx, 0, 4)]).unwrap();
//! let field = FieldMem::from_fn(range, |idx| (idx[0] * 10 + idx[1]) as f64);
//! assert_eq!(field.get(&[3, 2]), Some(&32.));
//!```
use crate::error::{Error, Result};
use crate::idx_range::{IdxRange, TagSeq};
use crate::types::Element;
use ndarray::prelude::*;
use ndarray::{Data, DataMut, Dimension, OwnedRepr, RawData, ViewRepr};

/// Field that owns its buffer
pub type FieldMem<A> = FieldBase<OwnedRepr<A>>;

/// Read-only view on a field
pub type FieldView<'a, A> = FieldBase<ViewRepr<&'a A>>;

/// Mutable view on a field
pub type FieldViewMut<'a, A> = FieldBase<ViewRepr<&'a mut A>>;

/// Index range plus data
///
/// `idx_range` carries global indices: the array element at local
/// position `i` along a tag corresponds to global index `front + i`.
pub struct FieldBase<S: RawData> {
    idx_range: IdxRange,
    data: ArrayBase<S, IxDyn>,
}

impl<A: Clone> Clone for FieldBase<OwnedRepr<A>> {
    fn clone(&self) -> Self {
        Self {
            idx_range: self.idx_range.clone(),
            data: self.data.clone(),
        }
    }
}

impl<A: Clone + Default> FieldBase<OwnedRepr<A>> {
    /// Field over `idx_range` filled with `A::default()`
    pub fn zeros(idx_range: IdxRange) -> Self {
        let data = ArrayD::from_elem(IxDyn(idx_range.extents()), A::default());
        Self { idx_range, data }
    }
}

impl<A> FieldBase<OwnedRepr<A>> {
    /// Initialize every element from its global multi-index (in tag order)
    pub fn from_fn<F>(idx_range: IdxRange, mut f: F) -> Self
    where
        F: FnMut(&[usize]) -> A,
    {
        let front = idx_range.fronts().to_vec();
        let mut global = vec![0; front.len()];
        let data = ArrayD::from_shape_fn(IxDyn(idx_range.extents()), |idx: IxDyn| {
            for ((g, i), s) in global.iter_mut().zip(idx.slice()).zip(front.iter()) {
                *g = i + s;
            }
            f(&global)
        });
        Self { idx_range, data }
    }
}

impl<'a, A> FieldBase<ViewRepr<&'a A>> {
    /// View on a flat row-major buffer
    ///
    /// # Errors
    /// Buffer length does not match the size of `idx_range`
    pub fn from_slice(idx_range: IdxRange, data: &'a [A]) -> Result<Self> {
        let data = ArrayView::from_shape(IxDyn(idx_range.extents()), data)?;
        Ok(Self { idx_range, data })
    }
}

impl<'a, A> FieldBase<ViewRepr<&'a mut A>> {
    /// Mutable view on a flat row-major buffer
    ///
    /// # Errors
    /// Buffer length does not match the size of `idx_range`
    pub fn from_slice_mut(idx_range: IdxRange, data: &'a mut [A]) -> Result<Self> {
        let data = ArrayViewMut::from_shape(IxDyn(idx_range.extents()), data)?;
        Ok(Self { idx_range, data })
    }
}

impl<S: RawData> FieldBase<S> {
    /// Index range held by this field
    pub fn idx_range(&self) -> &IdxRange {
        &self.idx_range
    }

    /// Tags in memory order
    pub fn tags(&self) -> &TagSeq {
        self.idx_range.tags()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.idx_range.size()
    }

    /// True if the field holds no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<A, S> FieldBase<S>
where
    S: Data<Elem = A>,
{
    /// Underlying array
    pub fn data(&self) -> &ArrayBase<S, IxDyn> {
        &self.data
    }

    /// Non-owning view
    pub fn view(&self) -> FieldView<'_, A> {
        FieldBase {
            idx_range: self.idx_range.clone(),
            data: self.data.view(),
        }
    }

    /// Flat buffer in row-major order.
    ///
    /// # Errors
    /// Data is not contiguous in standard layout
    pub fn as_slice(&self) -> Result<&[A]> {
        self.data
            .as_slice()
            .ok_or_else(|| Error::NonContiguous(self.idx_range.clone()))
    }

    /// Element at a global multi-index given in tag order
    pub fn get(&self, global: &[usize]) -> Option<&A> {
        if !self.idx_range.contains_index(global) {
            return None;
        }
        let local: Vec<usize> = global
            .iter()
            .zip(self.idx_range.fronts())
            .map(|(g, s)| g - s)
            .collect();
        self.data.get(local.as_slice())
    }

    /// Copy with the axes reordered to `tags` (local transposition,
    /// no communication).
    ///
    /// # Errors
    /// `tags` is not a reordering of this field's tags
    pub fn transposed_to(&self, tags: &TagSeq) -> Result<FieldMem<A>>
    where
        A: Clone,
    {
        let perm = tags.permutation_from(self.tags())?;
        let idx_range = self.idx_range.select(tags)?;
        let data = self
            .data
            .view()
            .permuted_axes(perm)
            .as_standard_layout()
            .into_owned();
        Ok(FieldBase { idx_range, data })
    }
}

impl<A, S> FieldBase<S>
where
    S: DataMut<Elem = A>,
{
    /// Underlying array (mutable)
    pub fn data_mut(&mut self) -> &mut ArrayBase<S, IxDyn> {
        &mut self.data
    }

    /// Non-owning mutable view
    pub fn view_mut(&mut self) -> FieldViewMut<'_, A> {
        FieldBase {
            idx_range: self.idx_range.clone(),
            data: self.data.view_mut(),
        }
    }

    /// Mutable flat buffer in row-major order.
    ///
    /// # Errors
    /// Data is not contiguous in standard layout
    pub fn as_slice_mut(&mut self) -> Result<&mut [A]> {
        let idx_range = &self.idx_range;
        self.data
            .as_slice_mut()
            .ok_or_else(|| Error::NonContiguous(idx_range.clone()))
    }

    /// Copy all values of `other`, which must cover the same index range.
    ///
    /// # Errors
    /// Index ranges differ
    pub fn assign<S2>(&mut self, other: &FieldBase<S2>) -> Result<()>
    where
        A: Clone,
        S2: Data<Elem = A>,
    {
        if self.idx_range != other.idx_range {
            return Err(Error::IdxRangeMismatch {
                expected: self.idx_range.clone(),
                found: other.idx_range.clone(),
            });
        }
        self.data.assign(&other.data);
        Ok(())
    }
}

impl<A: Element> FieldBase<OwnedRepr<A>> {
    /// Copy all values of `other` using the loops of `exec`
    ///
    /// # Errors
    /// Index ranges differ
    pub fn deep_copy_from<S2>(&mut self, exec: crate::exec::ExecSpace, other: &FieldBase<S2>) -> Result<()>
    where
        S2: Data<Elem = A>,
    {
        if self.idx_range != other.idx_range {
            return Err(Error::IdxRangeMismatch {
                expected: self.idx_range.clone(),
                found: other.idx_range.clone(),
            });
        }
        exec.deep_copy(self.data.view_mut(), other.data.view())
    }
}

pub(crate) fn check_shape(idx_range: &IdxRange, shape: &[usize]) -> Result<()> {
    if idx_range.extents() == shape {
        Ok(())
    } else {
        Err(Error::Numerical(format!(
            "array of shape {:?} cannot hold {}",
            shape, idx_range
        )))
    }
}
