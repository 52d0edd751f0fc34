//! # Index ranges over tagged phase-space dimensions
//!
//! A [`Dim`] names one axis of phase space (species, spatial or velocity).
//! A [`Tag`] is either such a grid axis or the artificial axis
//! `MPI<dim>` that numbers the processes a dimension is split over.
//!
//! [`TagSeq`] implements the small algebra over ordered tag lists
//! (remove, merge, insertion, adjacency) and [`IdxRange`] attaches a
//! start index and an extent to every tag. Memory is always laid out
//! row-major with respect to the tag order: the last tag varies fastest.
use crate::error::{Error, Result};
use std::fmt;

/// Physical dimension of phase space
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dim {
    /// Kinetic species
    Species,
    /// Spatial dimension x
    X,
    /// Spatial dimension y
    Y,
    /// Spatial dimension z
    Z,
    /// Velocity along x
    Vx,
    /// Velocity along y
    Vy,
    /// Velocity along z
    Vz,
}

impl Dim {
    /// Short name, as used in output files
    pub fn name(self) -> &'static str {
        match self {
            Self::Species => "sp",
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
            Self::Vx => "vx",
            Self::Vy => "vy",
            Self::Vz => "vz",
        }
    }

    /// True for `Vx`, `Vy` and `Vz`
    pub fn is_velocity(self) -> bool {
        matches!(self, Self::Vx | Self::Vy | Self::Vz)
    }

    /// True for `X`, `Y` and `Z`
    pub fn is_spatial(self) -> bool {
        matches!(self, Self::X | Self::Y | Self::Z)
    }

    /// Spatial dimension paired with a velocity dimension and vice versa.
    pub fn conjugate(self) -> Option<Dim> {
        match self {
            Self::X => Some(Self::Vx),
            Self::Y => Some(Self::Vy),
            Self::Z => Some(Self::Vz),
            Self::Vx => Some(Self::X),
            Self::Vy => Some(Self::Y),
            Self::Vz => Some(Self::Z),
            Self::Species => None,
        }
    }

    /// Parse the short name returned by [`Dim::name`]
    pub fn from_name(name: &str) -> Option<Dim> {
        [
            Self::Species,
            Self::X,
            Self::Y,
            Self::Z,
            Self::Vx,
            Self::Vy,
            Self::Vz,
        ]
        .into_iter()
        .find(|d| d.name() == name)
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Tag of one axis of an index range
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    /// A physical grid dimension
    Grid(Dim),
    /// The process index along a distributed dimension.
    ///
    /// Only lives while a transpose builds its buffers.
    Mpi(Dim),
}

impl Tag {
    /// Underlying physical dimension
    pub fn dim(self) -> Dim {
        match self {
            Self::Grid(d) | Self::Mpi(d) => d,
        }
    }

    /// True for the artificial process axes
    pub fn is_mpi(self) -> bool {
        matches!(self, Self::Mpi(_))
    }
}

impl From<Dim> for Tag {
    fn from(dim: Dim) -> Self {
        Self::Grid(dim)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grid(d) => write!(f, "{}", d),
            Self::Mpi(d) => write!(f, "MPI<{}>", d),
        }
    }
}

/// Ordered list of distinct tags
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TagSeq(Vec<Tag>);

impl TagSeq {
    /// Build a sequence, every tag may appear once.
    ///
    /// # Errors
    /// A tag is repeated.
    pub fn new(tags: Vec<Tag>) -> Result<Self> {
        for (i, t) in tags.iter().enumerate() {
            if tags[..i].contains(t) {
                return Err(Error::DuplicateTag {
                    tag: *t,
                    context: format!("{:?}", tags),
                });
            }
        }
        Ok(Self(tags))
    }

    /// Sequence of grid tags
    ///
    /// # Errors
    /// A dimension is repeated.
    pub fn from_dims(dims: &[Dim]) -> Result<Self> {
        Self::new(dims.iter().map(|d| Tag::Grid(*d)).collect())
    }

    /// Sequence of the process tags `MPI<d>` for each of `dims`
    ///
    /// # Errors
    /// A dimension is repeated.
    pub fn mpi_tags(dims: &[Dim]) -> Result<Self> {
        Self::new(dims.iter().map(|d| Tag::Mpi(*d)).collect())
    }

    /// Number of tags
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if there are no tags
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Tags in order
    pub fn as_slice(&self) -> &[Tag] {
        &self.0
    }

    /// Iterate over tags in order
    pub fn iter(&self) -> impl Iterator<Item = Tag> + '_ {
        self.0.iter().copied()
    }

    /// Physical dimensions of all grid tags, in order
    pub fn grid_dims(&self) -> Vec<Dim> {
        self.0
            .iter()
            .filter_map(|t| match t {
                Tag::Grid(d) => Some(*d),
                Tag::Mpi(_) => None,
            })
            .collect()
    }

    /// True if `tag` is part of the sequence
    pub fn contains(&self, tag: Tag) -> bool {
        self.0.contains(&tag)
    }

    /// Position of `tag` in the sequence
    pub fn rank_of(&self, tag: Tag) -> Option<usize> {
        self.0.iter().position(|t| *t == tag)
    }

    /// True if every tag of `other` is part of `self`
    pub fn contains_all(&self, other: &TagSeq) -> bool {
        other.iter().all(|t| self.contains(t))
    }

    /// True if both sequences hold the same tags, in any order
    pub fn is_permutation_of(&self, other: &TagSeq) -> bool {
        self.len() == other.len() && self.contains_all(other)
    }

    /// Remove `subset` from the sequence, keeping the order of the rest.
    ///
    /// # Errors
    /// A tag of `subset` is not part of `self`.
    pub fn remove(&self, subset: &TagSeq) -> Result<TagSeq> {
        if let Some(t) = subset.iter().find(|t| !self.contains(*t)) {
            return Err(Error::MissingTag {
                tag: t,
                context: format!("{}", self),
            });
        }
        Ok(Self(
            self.iter().filter(|t| !subset.contains(*t)).collect(),
        ))
    }

    /// Concatenate two sequences. Tags of `other` already present in
    /// `self` are skipped, so the result never holds a tag twice.
    pub fn merge(&self, other: &TagSeq) -> TagSeq {
        let mut tags = self.0.clone();
        tags.extend(other.iter().filter(|t| !self.contains(*t)));
        Self(tags)
    }

    /// Insert `tag` immediately before `position`.
    ///
    /// # Errors
    /// `position` is not part of the sequence or `tag` already is.
    pub fn insert_before(&self, tag: Tag, position: Tag) -> Result<TagSeq> {
        if self.contains(tag) {
            return Err(Error::DuplicateTag {
                tag,
                context: format!("{}", self),
            });
        }
        let pos = self.rank_of(position).ok_or_else(|| Error::MissingTag {
            tag: position,
            context: format!("{}", self),
        })?;
        let mut tags = self.0.clone();
        tags.insert(pos, tag);
        Ok(Self(tags))
    }

    /// Check whether the tags of `subset` occupy consecutive positions
    /// in `self`, in the order given by `subset`.
    ///
    /// # Errors
    /// A tag of `subset` is not part of `self`.
    pub fn are_adjacent(&self, subset: &TagSeq) -> Result<bool> {
        let mut ranks = Vec::with_capacity(subset.len());
        for t in subset.iter() {
            ranks.push(self.rank_of(t).ok_or_else(|| Error::MissingTag {
                tag: t,
                context: format!("{}", self),
            })?);
        }
        Ok(ranks.windows(2).all(|w| w[1] == w[0] + 1))
    }

    /// Insert `MPI<d>` immediately before `d` for each of `dims`.
    ///
    /// E.g. inserting `MPI<x>` into `(sp, vx, x)` gives `(sp, vx, MPI<x>, x)`.
    ///
    /// # Errors
    /// A dimension of `dims` is not part of the sequence.
    pub fn insert_mpi_tags(&self, dims: &[Dim]) -> Result<TagSeq> {
        dims.iter().try_fold(self.clone(), |seq, d| {
            seq.insert_before(Tag::Mpi(*d), Tag::Grid(*d))
        })
    }

    /// For every tag of `self`, its position in `src`.
    ///
    /// # Errors
    /// The sequences are not permutations of each other.
    pub fn permutation_from(&self, src: &TagSeq) -> Result<Vec<usize>> {
        if !self.is_permutation_of(src) {
            return Err(Error::Config(format!(
                "{} is not a reordering of {}",
                self, src
            )));
        }
        Ok(self.iter().filter_map(|t| src.rank_of(t)).collect())
    }
}

impl fmt::Display for TagSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "({})", names.join(", "))
    }
}

/// Multi-dimensional index range
///
/// Each tag carries the global index of its first element (`front`)
/// and the number of elements (`extent`). Index ranges are plain
/// values, they own no data.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct IdxRange {
    tags: TagSeq,
    front: Vec<usize>,
    extents: Vec<usize>,
}

impl IdxRange {
    /// Construct from `(tag, front, extent)` triples.
    ///
    /// # Errors
    /// Repeated tag or zero extent.
    pub fn new<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Tag, usize, usize)>,
    {
        let mut tags = Vec::new();
        let mut front = Vec::new();
        let mut extents = Vec::new();
        for (tag, start, extent) in entries {
            if extent == 0 {
                return Err(Error::EmptyExtent { tag });
            }
            tags.push(tag);
            front.push(start);
            extents.push(extent);
        }
        Ok(Self {
            tags: TagSeq::new(tags)?,
            front,
            extents,
        })
    }

    /// Construct a grid index range from `(dim, front, extent)` triples.
    ///
    /// # Errors
    /// Repeated dimension or zero extent.
    pub fn from_dims(entries: &[(Dim, usize, usize)]) -> Result<Self> {
        Self::new(entries.iter().map(|&(d, s, n)| (Tag::Grid(d), s, n)))
    }

    /// Tags in memory order
    pub fn tags(&self) -> &TagSeq {
        &self.tags
    }

    /// Number of dimensions
    pub fn ndim(&self) -> usize {
        self.tags.len()
    }

    /// Start index of each tag
    pub fn fronts(&self) -> &[usize] {
        &self.front
    }

    /// Extent of each tag (the array shape)
    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    /// Start index along `tag`
    pub fn front(&self, tag: impl Into<Tag>) -> Option<usize> {
        self.tags.rank_of(tag.into()).map(|i| self.front[i])
    }

    /// Extent along `tag`
    pub fn extent(&self, tag: impl Into<Tag>) -> Option<usize> {
        self.tags.rank_of(tag.into()).map(|i| self.extents[i])
    }

    /// Total number of elements
    pub fn size(&self) -> usize {
        self.extents.iter().product()
    }

    /// Iterate over `(tag, front, extent)`
    pub fn entries(&self) -> impl Iterator<Item = (Tag, usize, usize)> + '_ {
        self.tags
            .iter()
            .zip(self.front.iter().zip(self.extents.iter()))
            .map(|(t, (s, n))| (t, *s, *n))
    }

    /// Sub-range over `tags`, in the order of `tags`.
    ///
    /// # Errors
    /// A tag of `tags` is not part of this range.
    pub fn select(&self, tags: &TagSeq) -> Result<IdxRange> {
        let mut entries = Vec::with_capacity(tags.len());
        for t in tags.iter() {
            let i = self.tags.rank_of(t).ok_or_else(|| Error::MissingTag {
                tag: t,
                context: format!("{}", self),
            })?;
            entries.push((t, self.front[i], self.extents[i]));
        }
        Self::new(entries)
    }

    /// Sub-range over grid dimensions `dims`
    ///
    /// # Errors
    /// A dimension is not part of this range.
    pub fn select_dims(&self, dims: &[Dim]) -> Result<IdxRange> {
        self.select(&TagSeq::from_dims(dims)?)
    }

    /// Assemble a range ordered as `order` from disjoint sub-ranges.
    ///
    /// # Errors
    /// A tag of `order` is found in none or in several of `parts`.
    pub fn combine(order: &TagSeq, parts: &[&IdxRange]) -> Result<IdxRange> {
        let mut entries = Vec::with_capacity(order.len());
        for t in order.iter() {
            let mut found = parts.iter().filter_map(|p| {
                p.tags.rank_of(t).map(|i| (t, p.front[i], p.extents[i]))
            });
            let entry = found.next().ok_or_else(|| Error::MissingTag {
                tag: t,
                context: "sub-ranges to combine".to_owned(),
            })?;
            if found.next().is_some() {
                return Err(Error::DuplicateTag {
                    tag: t,
                    context: "sub-ranges to combine".to_owned(),
                });
            }
            entries.push(entry);
        }
        Self::new(entries)
    }

    /// Same range with the entry of `tag` replaced.
    ///
    /// # Errors
    /// `tag` is not part of this range or `extent` is zero.
    pub fn with_entry(&self, tag: Tag, front: usize, extent: usize) -> Result<IdxRange> {
        let i = self.tags.rank_of(tag).ok_or_else(|| Error::MissingTag {
            tag,
            context: format!("{}", self),
        })?;
        if extent == 0 {
            return Err(Error::EmptyExtent { tag });
        }
        let mut out = self.clone();
        out.front[i] = front;
        out.extents[i] = extent;
        Ok(out)
    }

    /// True if the global multi-index (in this range's tag order) lies
    /// inside the range.
    pub fn contains_index(&self, index: &[usize]) -> bool {
        index.len() == self.ndim()
            && index
                .iter()
                .zip(self.front.iter().zip(self.extents.iter()))
                .all(|(i, (s, n))| *i >= *s && *i < s + n)
    }

    /// Row-major strides
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1; self.ndim()];
        for i in (0..self.ndim().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.extents[i + 1];
        }
        strides
    }

    /// Offset of a global multi-index in a row-major buffer over this range
    pub fn linear_index(&self, index: &[usize]) -> Option<usize> {
        if !self.contains_index(index) {
            return None;
        }
        Some(
            index
                .iter()
                .zip(self.front.iter())
                .zip(self.strides().iter())
                .map(|((i, s), st)| (i - s) * st)
                .sum(),
        )
    }
}

impl fmt::Display for IdxRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .entries()
            .map(|(t, s, n)| format!("{}: {}..{}", t, s, s + n))
            .collect();
        write!(f, "[{}]", parts.join(", "))
    }
}
