//! # Layout transposition with a single all-to-all
//!
//! [`MpiTransposeAllToAll`] moves a distributed field between two layouts
//! of the same global index range. Going from layout *A* to layout *B*
//!
//! - the dimensions distributed in *A* are gathered (*gather* dims),
//! - the dimensions distributed in *B* are scattered (*scatter* dims),
//! - all other dimensions are untouched (*batch* dims).
//!
//! The send buffer is reinterpreted over an extended index range in which
//! each scatter dim `d` is preceded by the pseudo dimension `MPI<d>`, so
//! `d` of extent `n` becomes `MPI<d> x d` of extents `p x n / p`. A
//! local transposition moves all `MPI<*>` axes to the front, after which
//! the flat buffer consists of one contiguous block per destination rank.
//! After the exchange the receive buffer is ordered
//! `MPI<gather dims> x (A's tags)` and a second local transposition
//! brings it into *B*'s memory order.
//!
//! Both local transpositions are skipped if the buffers are already in
//! the required order.
use super::comm::Communicator;
use super::layout::MpiLayout;
use crate::error::{Error, Result};
use crate::exec::ExecSpace;
use crate::field::{FieldBase, FieldMem};
use crate::idx_range::{IdxRange, TagSeq};
use crate::types::Element;
use ndarray::prelude::*;
use ndarray::{Data, DataMut};
use std::borrow::Cow;

/// One of the two layouts known to a transpose
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutSide {
    /// Layout passed first at construction
    First,
    /// Layout passed second at construction
    Second,
}

impl LayoutSide {
    /// The respective other side
    pub fn other(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }

    fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }
}

/// Buffer shapes for one direction of the transpose
#[derive(Clone, Debug)]
struct TransposePlan {
    /// Send buffer with `MPI<scatter>` inserted before each scatter dim
    send: IdxRange,
    /// Send buffer with `MPI<scatter>` as outermost axes
    send_all_to_all: IdxRange,
    /// Receive buffer as delivered by the all-to-all
    recv_all_to_all: IdxRange,
    /// Receive buffer with `MPI<gather>` inserted before each gather dim
    recv: IdxRange,
}

impl TransposePlan {
    fn new(
        input: &MpiLayout,
        local_in: &IdxRange,
        mpi_in: &IdxRange,
        output: &MpiLayout,
        local_out: &IdxRange,
        mpi_out: &IdxRange,
    ) -> Result<Self> {
        let gather = input.distributed();
        let scatter = output.distributed();
        let batch = input.tags().remove(scatter)?.remove(gather)?;

        let scatter_part = local_out.select(scatter)?;
        let gather_part = local_in.select(gather)?;
        let batch_part = local_in.select(&batch)?;
        let parts_send = [mpi_out, &scatter_part, &gather_part, &batch_part];
        let parts_recv = [mpi_in, &scatter_part, &gather_part, &batch_part];

        let send_tags = input.tags().insert_mpi_tags(&output.distributed_dims())?;
        let send = IdxRange::combine(&send_tags, &parts_send)?;
        let send_all_to_all = send.select(&all_to_all_send_order(input, output)?)?;

        let recv_all_to_all = IdxRange::combine(&mpi_in.tags().merge(input.tags()), &parts_recv)?;
        let recv_tags = output.tags().insert_mpi_tags(&input.distributed_dims())?;
        let recv = IdxRange::combine(&recv_tags, &parts_recv)?;

        debug_assert_eq!(send.size(), local_in.size());
        debug_assert_eq!(recv.size(), local_out.size());
        Ok(Self {
            send,
            send_all_to_all,
            recv_all_to_all,
            recv,
        })
    }
}

/// Redistribute fields between two layouts of the same global index range
///
/// The decomposition is computed once at construction. Every call of
/// [`MpiTransposeAllToAll::transpose`] is a collective: all ranks of the
/// communicator must call it in the same order.
///
/// # Example
/// Four ranks (threads), `x` split in the first, `vx` in the second layout
///```
/// use rustvlasov::exec::ExecSpace;
/// use rustvlasov::field::FieldMem;
/// use rustvlasov::idx_range::{Dim, IdxRange};
/// use rustvlasov::mpi::{Communicator, LayoutSide, MpiLayout, MpiTransposeAllToAll, ThreadComm};
///
/// let global = IdxRange::from_dims(&[(Dim::X, 0, 8), (Dim::Vx, 0, 4)]).unwrap();
/// let x_split = MpiLayout::new("x_split", &[Dim::X, Dim::Vx], &[Dim::X]).unwrap();
/// let v_split = MpiLayout::new("v_split", &[Dim::Vx, Dim::X], &[Dim::Vx]).unwrap();
/// ThreadComm::run(4, |comm| {
///     let transpose = MpiTransposeAllToAll::new(&global, x_split.clone(), v_split.clone(), &comm).unwrap();
///     let local = transpose.local_idx_range(LayoutSide::First).clone();
///     let f = FieldMem::from_fn(local, |idx| (idx[0] * 10 + idx[1]) as f64);
///     let g = transpose.transposed(ExecSpace::Serial, &f).unwrap();
///     assert_eq!(g.idx_range().extent(Dim::Vx), Some(1));
///     assert_eq!(g.get(&[comm.rank(), 5]), Some(&((50 + comm.rank()) as f64)));
/// });
///```
pub struct MpiTransposeAllToAll<C: Communicator> {
    comm: C,
    layouts: [MpiLayout; 2],
    local: [IdxRange; 2],
    mpi_ranges: [IdxRange; 2],
    /// `plans[i]` moves data from layout `i` to the other layout
    plans: [TransposePlan; 2],
}

impl<C: Communicator> MpiTransposeAllToAll<C> {
    /// Set up the transpose between `first` and `second`.
    ///
    /// `global` may be given in the tag order of either layout.
    ///
    /// # Errors
    /// The layouts hold different dimensions, distribute a common
    /// dimension, or cannot be decomposed evenly over the communicator.
    pub fn new(global: &IdxRange, first: MpiLayout, second: MpiLayout, comm: C) -> Result<Self> {
        if !first.tags().is_permutation_of(second.tags()) {
            return Err(Error::IncompatibleLayouts {
                first: first.to_string(),
                second: second.to_string(),
                reason: "layouts hold different dimensions".to_owned(),
            });
        }
        if let Some(t) = first
            .distributed()
            .iter()
            .find(|t| second.distributed().contains(*t))
        {
            return Err(Error::IncompatibleLayouts {
                first: first.to_string(),
                second: second.to_string(),
                reason: format!("both layouts distribute {}", t),
            });
        }
        let (size, rank) = (comm.size(), comm.rank());
        let local = [
            first.distribute_idx_range(global, size, rank)?,
            second.distribute_idx_range(global, size, rank)?,
        ];
        let mpi_ranges = [
            first.mpi_idx_range(global, size)?,
            second.mpi_idx_range(global, size)?,
        ];
        for (layout, range) in [&first, &second].iter().zip(local.iter()) {
            if range.size() * size != global.size() {
                return Err(Error::UnevenDecomposition {
                    extent: global.size(),
                    comm_size: size,
                    context: format!("local block of layout {} is {}", layout.name(), range),
                });
            }
        }
        let plans = [
            TransposePlan::new(
                &first,
                &local[0],
                &mpi_ranges[0],
                &second,
                &local[1],
                &mpi_ranges[1],
            )?,
            TransposePlan::new(
                &second,
                &local[1],
                &mpi_ranges[1],
                &first,
                &local[0],
                &mpi_ranges[0],
            )?,
        ];
        Ok(Self {
            comm,
            layouts: [first, second],
            local,
            mpi_ranges,
            plans,
        })
    }

    /// Communicator
    pub fn comm(&self) -> &C {
        &self.comm
    }

    /// Layout of one side
    pub fn layout(&self, side: LayoutSide) -> &MpiLayout {
        &self.layouts[side.index()]
    }

    /// Index range this rank holds in the layout of `side`
    pub fn local_idx_range(&self, side: LayoutSide) -> &IdxRange {
        &self.local[side.index()]
    }

    /// Process pseudo dimensions of the layout of `side`: which rank
    /// owns which block along each distributed dimension.
    pub fn mpi_idx_range(&self, side: LayoutSide) -> &IdxRange {
        &self.mpi_ranges[side.index()]
    }

    /// Side whose local index range equals `idx_range`
    pub fn side_of(&self, idx_range: &IdxRange) -> Option<LayoutSide> {
        [LayoutSide::First, LayoutSide::Second]
            .into_iter()
            .find(|s| self.local_idx_range(*s) == idx_range)
    }

    /// Move `send` into `recv`. The direction follows from the index
    /// ranges of the two fields.
    ///
    /// # Errors
    /// The fields do not cover the local index ranges of the two layouts,
    /// or their buffers are not contiguous.
    pub fn transpose<T, S1, S2>(
        &self,
        exec: ExecSpace,
        recv: &mut FieldBase<S1>,
        send: &FieldBase<S2>,
    ) -> Result<()>
    where
        T: Element,
        S1: DataMut<Elem = T>,
        S2: Data<Elem = T>,
    {
        let from = self.side_of(send.idx_range()).ok_or_else(|| Error::IdxRangeMismatch {
            expected: self.local[0].clone(),
            found: send.idx_range().clone(),
        })?;
        let to = from.other();
        if recv.idx_range() != self.local_idx_range(to) {
            return Err(Error::IdxRangeMismatch {
                expected: self.local_idx_range(to).clone(),
                found: recv.idx_range().clone(),
            });
        }
        let plan = &self.plans[from.index()];
        self.exchange(exec, plan, recv.as_slice_mut()?, send.as_slice()?)
    }

    /// Move `send` into a freshly allocated field of the other layout.
    ///
    /// # Errors
    /// See [`MpiTransposeAllToAll::transpose`]
    pub fn transposed<T, S>(&self, exec: ExecSpace, send: &FieldBase<S>) -> Result<FieldMem<T>>
    where
        T: Element,
        S: Data<Elem = T>,
    {
        let from = self.side_of(send.idx_range()).ok_or_else(|| Error::IdxRangeMismatch {
            expected: self.local[0].clone(),
            found: send.idx_range().clone(),
        })?;
        let mut recv = FieldMem::zeros(self.local_idx_range(from.other()).clone());
        self.transpose(exec, &mut recv, send)?;
        Ok(recv)
    }

    fn exchange<T: Element>(&self, exec: ExecSpace, plan: &TransposePlan, recv: &mut [T], send: &[T]) -> Result<()> {
        let send_buf: Cow<[T]> = if plan.send.tags() == plan.send_all_to_all.tags() {
            Cow::Borrowed(send)
        } else {
            let mut buf = vec![T::default(); send.len()];
            reorder(exec, send, &plan.send, &mut buf, &plan.send_all_to_all)?;
            Cow::Owned(buf)
        };
        if plan.recv_all_to_all.tags() == plan.recv.tags() {
            self.comm.all_to_all(&send_buf[..], recv)
        } else {
            let mut buf = vec![T::default(); recv.len()];
            self.comm.all_to_all(&send_buf[..], &mut buf)?;
            reorder(exec, &buf, &plan.recv_all_to_all, recv, &plan.recv)
        }
    }
}

/// Local transposition of a row-major buffer over `src_range` into a
/// row-major buffer over `dst_range`; both ranges hold the same tags.
fn reorder<T: Element>(
    exec: ExecSpace,
    src: &[T],
    src_range: &IdxRange,
    dst: &mut [T],
    dst_range: &IdxRange,
) -> Result<()> {
    let perm = dst_range.tags().permutation_from(src_range.tags())?;
    let src = ArrayView::from_shape(IxDyn(src_range.extents()), src)?.permuted_axes(perm);
    let dst = ArrayViewMut::from_shape(IxDyn(dst_range.extents()), dst)?;
    exec.deep_copy(dst, src)
}

/// Tags of the all-to-all send buffer for moving data from `input` to
/// `output`: the `MPI<d>` axes of the scatter dims first, followed by the
/// input memory order.
///
/// # Errors
/// A distributed dimension of `output` is not part of `input`
pub(crate) fn all_to_all_send_order(input: &MpiLayout, output: &MpiLayout) -> Result<TagSeq> {
    let mpi = TagSeq::mpi_tags(&output.distributed_dims())?;
    Ok(mpi.merge(&input.tags().insert_mpi_tags(&output.distributed_dims())?))
}
