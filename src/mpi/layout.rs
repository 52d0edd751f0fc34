//! # Layouts of distributed phase-space fields
//!
//! A layout fixes the memory order of the dimensions and the subset of
//! them which is split over the processes. The distributed dimensions
//! form one contiguous run of the memory order.
//!
//! With several distributed dimensions the processes are arranged in a
//! row-major process grid: the first distributed dimension (in memory
//! order) varies slowest with the rank.
use crate::error::{Error, Result};
use crate::idx_range::{Dim, IdxRange, Tag, TagSeq};
use std::fmt;

/// Memory order plus distributed dimensions
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MpiLayout {
    name: String,
    tags: TagSeq,
    distributed: TagSeq,
}

impl MpiLayout {
    /// Describe a layout over `dims` (memory order) which splits
    /// `distributed` over the processes.
    ///
    /// # Errors
    /// A dimension is repeated, a distributed dimension is not part of
    /// the layout, or the distributed dimensions are not adjacent.
    pub fn new(name: &str, dims: &[Dim], distributed: &[Dim]) -> Result<Self> {
        let tags = TagSeq::from_dims(dims)?;
        let requested = TagSeq::from_dims(distributed)?;
        // Store the distributed run in memory order
        let mut ordered = Vec::with_capacity(requested.len());
        for t in requested.iter() {
            let rank = tags.rank_of(t).ok_or_else(|| Error::MissingTag {
                tag: t,
                context: format!("layout {} {}", name, tags),
            })?;
            ordered.push((rank, t));
        }
        ordered.sort_unstable_by_key(|(rank, _)| *rank);
        let distributed = TagSeq::new(ordered.into_iter().map(|(_, t)| t).collect())?;
        if !tags.are_adjacent(&distributed)? {
            return Err(Error::NonAdjacent {
                dims: distributed.to_string(),
                layout: format!("{} {}", name, tags),
            });
        }
        Ok(Self {
            name: name.to_owned(),
            tags,
            distributed,
        })
    }

    /// Name of the layout
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All tags in memory order
    pub fn tags(&self) -> &TagSeq {
        &self.tags
    }

    /// Distributed tags in memory order
    pub fn distributed(&self) -> &TagSeq {
        &self.distributed
    }

    /// Distributed dimensions in memory order
    pub fn distributed_dims(&self) -> Vec<Dim> {
        self.distributed.grid_dims()
    }

    /// True if `dim` is split over the processes in this layout
    pub fn is_distributed(&self, dim: Dim) -> bool {
        self.distributed.contains(Tag::Grid(dim))
    }

    /// Number of processes along each distributed dimension, in memory
    /// order.
    ///
    /// Along each distributed dimension `gcd(remaining, extent)`
    /// processes are used, the remaining processes carry over to the
    /// next distributed dimension.
    ///
    /// # Errors
    /// `global` does not cover this layout's tags, the processes cannot
    /// be arranged without remainder, or there are more processes than
    /// distributed elements.
    pub fn process_grid(&self, global: &IdxRange, comm_size: usize) -> Result<Vec<(Dim, usize)>> {
        if !global.tags().is_permutation_of(&self.tags) {
            return Err(Error::IncompatibleLayouts {
                first: format!("{} {}", self.name, self.tags),
                second: global.to_string(),
                reason: "index range holds different dimensions".to_owned(),
            });
        }
        let distributed = global.select(&self.distributed)?;
        if comm_size == 0 || comm_size > distributed.size() {
            return Err(Error::UnevenDecomposition {
                extent: distributed.size(),
                comm_size,
                context: format!("layout {} has fewer distributed elements than processes", self.name),
            });
        }
        let mut remaining = comm_size;
        let mut grid = Vec::with_capacity(distributed.ndim());
        for (tag, _, extent) in distributed.entries() {
            let n = gcd(remaining, extent);
            grid.push((tag.dim(), n));
            remaining /= n;
        }
        if remaining != 1 {
            return Err(Error::UnevenDecomposition {
                extent: distributed.size(),
                comm_size,
                context: format!(
                    "layout {} distributes {} with extents {:?}",
                    self.name,
                    self.distributed,
                    distributed.extents()
                ),
            });
        }
        Ok(grid)
    }

    /// Index range over the process pseudo dimensions `MPI<d>`, one per
    /// distributed dimension, with the number of processes as extent.
    ///
    /// # Errors
    /// See [`MpiLayout::process_grid`]
    pub fn mpi_idx_range(&self, global: &IdxRange, comm_size: usize) -> Result<IdxRange> {
        let grid = self.process_grid(global, comm_size)?;
        IdxRange::new(grid.into_iter().map(|(d, n)| (Tag::Mpi(d), 0, n)))
    }

    /// Local block of `global` held by `rank`, in this layout's memory
    /// order. Only distributed dimensions are sliced, into contiguous
    /// blocks of equal size.
    ///
    /// # Errors
    /// See [`MpiLayout::process_grid`]; `rank` out of range.
    pub fn distribute_idx_range(&self, global: &IdxRange, comm_size: usize, rank: usize) -> Result<IdxRange> {
        if rank >= comm_size {
            return Err(Error::Config(format!(
                "rank {} outside of communicator of size {}",
                rank, comm_size
            )));
        }
        let grid = self.process_grid(global, comm_size)?;
        let mut local = global.select(&self.tags)?;
        // Row-major process grid, first distributed dim slowest
        let mut stride = comm_size;
        for (dim, n) in grid {
            stride /= n;
            let coord = (rank / stride) % n;
            let tag = Tag::Grid(dim);
            let (front, extent) = match (local.front(tag), local.extent(tag)) {
                (Some(f), Some(e)) => (f, e),
                _ => {
                    return Err(Error::MissingTag {
                        tag,
                        context: local.to_string(),
                    })
                }
            };
            let block = extent / n;
            local = local.with_entry(tag, front + coord * block, block)?;
        }
        Ok(local)
    }
}

impl fmt::Display for MpiLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} split over {}", self.name, self.tags, self.distributed)
    }
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}
