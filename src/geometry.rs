//! # Uniform phase-space mesh
use crate::error::{Error, Result};
use crate::idx_range::{Dim, IdxRange};

/// Uniform grid along one dimension
///
/// A periodic grid holds `ncells` points (the point at `max` equals the
/// one at `min`), a non-periodic grid holds `ncells + 1` points.
#[derive(Clone, Debug, PartialEq)]
pub struct UniformGrid {
    /// Lower bound
    pub min: f64,
    /// Upper bound
    pub max: f64,
    /// Number of cells
    pub ncells: usize,
    /// Periodic boundaries
    pub periodic: bool,
}

impl UniformGrid {
    /// New grid
    ///
    /// # Errors
    /// Empty interval or no cells
    pub fn new(min: f64, max: f64, ncells: usize, periodic: bool) -> Result<Self> {
        if max <= min || ncells == 0 {
            return Err(Error::Config(format!(
                "invalid grid [{}, {}] with {} cells",
                min, max, ncells
            )));
        }
        Ok(Self {
            min,
            max,
            ncells,
            periodic,
        })
    }

    /// Number of grid points
    pub fn npoints(&self) -> usize {
        if self.periodic {
            self.ncells
        } else {
            self.ncells + 1
        }
    }

    /// Cell width
    pub fn dx(&self) -> f64 {
        (self.max - self.min) / self.ncells as f64
    }

    /// Length of the interval
    pub fn length(&self) -> f64 {
        self.max - self.min
    }

    /// Coordinate of point `i`
    pub fn coord(&self, i: usize) -> f64 {
        self.min + i as f64 * self.dx()
    }

    /// All point coordinates
    pub fn coords(&self) -> Vec<f64> {
        (0..self.npoints()).map(|i| self.coord(i)).collect()
    }
}

/// Physical properties of one kinetic species
#[derive(Clone, Debug, PartialEq)]
pub struct SpeciesInfo {
    /// Charge (in units of the elementary charge)
    pub charge: f64,
    /// Mass
    pub mass: f64,
    /// Equilibrium density
    pub density: f64,
    /// Equilibrium temperature
    pub temperature: f64,
    /// Mean velocity of the equilibrium
    pub mean_velocity: f64,
    /// Amplitude of the initial density perturbation
    pub perturb_amplitude: f64,
    /// Mode number of the initial density perturbation
    pub perturb_mode: usize,
}

impl Default for SpeciesInfo {
    fn default() -> Self {
        Self {
            charge: -1.,
            mass: 1.,
            density: 1.,
            temperature: 1.,
            mean_velocity: 0.,
            perturb_amplitude: 0.01,
            perturb_mode: 1,
        }
    }
}

/// Grids of all dimensions plus species
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    grids: Vec<(Dim, UniformGrid)>,
    species: Vec<SpeciesInfo>,
}

impl Default for Mesh {
    /// One periodic spatial dimension of length `4 pi` (64 cells), one
    /// velocity dimension over `[-6, 6]` (63 cells), one species
    fn default() -> Self {
        let x = UniformGrid {
            min: 0.,
            max: 4. * std::f64::consts::PI,
            ncells: 64,
            periodic: true,
        };
        let vx = UniformGrid {
            min: -6.,
            max: 6.,
            ncells: 63,
            periodic: false,
        };
        Self {
            grids: vec![(Dim::X, x), (Dim::Vx, vx)],
            species: vec![SpeciesInfo::default()],
        }
    }
}

impl Mesh {
    /// Collect grids, spatial dimensions first
    ///
    /// # Errors
    /// A dimension appears twice, is `Species`, no species is given,
    /// or there is no spatial dimension.
    pub fn new(grids: Vec<(Dim, UniformGrid)>, species: Vec<SpeciesInfo>) -> Result<Self> {
        for (i, (d, _)) in grids.iter().enumerate() {
            if *d == Dim::Species || grids[..i].iter().any(|(e, _)| e == d) {
                return Err(Error::Config(format!("invalid mesh dimension {}", d)));
            }
        }
        if species.is_empty() {
            return Err(Error::Config("at least one species is required".to_owned()));
        }
        let mut grids = grids;
        grids.sort_by_key(|(d, _)| *d);
        let mesh = Self { grids, species };
        if mesh.spatial_dims().is_empty() {
            return Err(Error::Config("at least one spatial dimension is required".to_owned()));
        }
        Ok(mesh)
    }

    /// Grid along `dim`
    pub fn grid(&self, dim: Dim) -> Option<&UniformGrid> {
        self.grids.iter().find(|(d, _)| *d == dim).map(|(_, g)| g)
    }

    /// Species
    pub fn species(&self) -> &[SpeciesInfo] {
        &self.species
    }

    /// Spatial dimensions
    pub fn spatial_dims(&self) -> Vec<Dim> {
        self.grids.iter().map(|(d, _)| *d).filter(|d| d.is_spatial()).collect()
    }

    /// Velocity dimensions
    pub fn velocity_dims(&self) -> Vec<Dim> {
        self.grids.iter().map(|(d, _)| *d).filter(|d| d.is_velocity()).collect()
    }

    /// Global index range over `order`
    ///
    /// # Errors
    /// A dimension of `order` has no grid
    pub fn global_idx_range(&self, order: &[Dim]) -> Result<IdxRange> {
        let mut entries = Vec::with_capacity(order.len());
        for d in order {
            let n = if *d == Dim::Species {
                self.species.len()
            } else {
                self.grid(*d)
                    .ok_or_else(|| Error::Config(format!("mesh has no grid along {}", d)))?
                    .npoints()
            };
            entries.push((*d, 0, n));
        }
        IdxRange::from_dims(&entries)
    }
}
