//! # Simulation parameters
//!
//! Read from a YAML file, every key is optional:
//!
//! ```yaml
//! Mesh:
//!   x:  { min: 0.0, max: 12.566370614359172, ncells: 64 }
//!   vx: { min: -6.0, max: 6.0, ncells: 63 }
//! SpeciesInfo:
//!   - { charge: -1.0, mass: 1.0, density: 1.0, temperature: 1.0,
//!       mean_velocity: 0.0, perturb_amplitude: 0.01, perturb_mode: 1 }
//! Algorithm:
//!   deltat: 0.125
//!   nbiter: 100
//!   interpolator: lagrange
//!   quadrature: trapezoid
//!   backend: parallel
//!   noise: 0.0
//! Output:
//!   time_diag: 1
//!   directory: data
//! ```
//!
//! The spatial grid is periodic, velocity grids are not. Between one and
//! three velocity dimensions (`vx`, `vy`, `vz`) may be given.
use crate::error::{Error, Result};
use crate::exec::ExecSpace;
use crate::geometry::{Mesh, SpeciesInfo, UniformGrid};
use crate::idx_range::Dim;
use crate::interpolation::{Boundary, InterpolatorKind};
use crate::quadrature::QuadratureKind;
use std::path::Path;
use yaml_rust::{yaml::Yaml, YamlLoader};

/// All parameters of a run
#[derive(Clone, Debug)]
pub struct SimulationParams {
    /// Grids and species
    pub mesh: Mesh,
    /// Time step
    pub deltat: f64,
    /// Number of time steps
    pub nbiter: usize,
    /// Interpolation scheme (`lagrange` or `linear`)
    pub interpolator: String,
    /// Velocity and diagnostics quadrature (`trapezoid` or `simpson`)
    pub quadrature: String,
    /// Execution backend
    pub backend: ExecSpace,
    /// Amplitude of the multiplicative random noise on the initial state
    pub noise: f64,
    /// Diagnostics are written every `time_diag` steps
    pub time_diag: usize,
    /// Output directory
    pub directory: String,
}

fn default_grid(dim: Dim) -> UniformGrid {
    let mesh = Mesh::default();
    let reference = if dim.is_spatial() { Dim::X } else { Dim::Vx };
    let mut grid = mesh.grid(reference).cloned().unwrap_or(UniformGrid {
        min: 0.,
        max: 1.,
        ncells: 1,
        periodic: false,
    });
    grid.periodic = dim.is_spatial();
    grid
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            mesh: Mesh::default(),
            deltat: 0.125,
            nbiter: 100,
            interpolator: "lagrange".to_owned(),
            quadrature: "trapezoid".to_owned(),
            backend: ExecSpace::default(),
            noise: 0.,
            time_diag: 1,
            directory: "data".to_owned(),
        }
    }
}

fn read_real(node: &Yaml, field: &str, default: f64) -> Result<f64> {
    match &node[field] {
        Yaml::Real(s) => s
            .parse::<f64>()
            .map_err(|_| Error::Config(format!("unable to parse '{}' = '{}'", field, s))),
        Yaml::Integer(i) => Ok(*i as f64),
        Yaml::BadValue | Yaml::Null => Ok(default),
        other => Err(Error::Config(format!("'{}' must be a number, got {:?}", field, other))),
    }
}

fn read_integer(node: &Yaml, field: &str, default: usize) -> Result<usize> {
    match &node[field] {
        Yaml::Integer(i) if *i >= 0 => Ok(*i as usize),
        Yaml::BadValue | Yaml::Null => Ok(default),
        other => Err(Error::Config(format!(
            "'{}' must be a non-negative integer, got {:?}",
            field, other
        ))),
    }
}

fn read_string(node: &Yaml, field: &str, default: &str) -> Result<String> {
    match &node[field] {
        Yaml::String(s) => Ok(s.clone()),
        Yaml::BadValue | Yaml::Null => Ok(default.to_owned()),
        other => Err(Error::Config(format!("'{}' must be a string, got {:?}", field, other))),
    }
}

fn read_grid(node: &Yaml, dim: Dim) -> Result<UniformGrid> {
    let default = default_grid(dim);
    UniformGrid::new(
        read_real(node, "min", default.min)?,
        read_real(node, "max", default.max)?,
        read_integer(node, "ncells", default.ncells)?,
        dim.is_spatial(),
    )
}

fn read_mesh(doc: &Yaml) -> Result<Vec<(Dim, UniformGrid)>> {
    let section = match &doc["Mesh"] {
        Yaml::Hash(h) => h,
        Yaml::BadValue | Yaml::Null => {
            return Ok(vec![(Dim::X, default_grid(Dim::X)), (Dim::Vx, default_grid(Dim::Vx))]);
        }
        _ => return Err(Error::Config("'Mesh' must be a mapping".to_owned())),
    };
    let mut grids = Vec::new();
    for (key, node) in section {
        let name = key
            .as_str()
            .ok_or_else(|| Error::Config(format!("invalid Mesh key {:?}", key)))?;
        let dim = match Dim::from_name(name) {
            Some(d) if d != Dim::Species => d,
            _ => return Err(Error::Config(format!("unknown dimension '{}' in Mesh", name))),
        };
        if dim.is_spatial() && dim != Dim::X {
            return Err(Error::Config(format!(
                "only the spatial dimension x is supported, got '{}'",
                name
            )));
        }
        grids.push((dim, read_grid(node, dim)?));
    }
    if !grids.iter().any(|(d, _)| *d == Dim::X) {
        grids.push((Dim::X, default_grid(Dim::X)));
    }
    if !grids.iter().any(|(d, _)| d.is_velocity()) {
        grids.push((Dim::Vx, default_grid(Dim::Vx)));
    }
    Ok(grids)
}

fn read_species(doc: &Yaml) -> Result<Vec<SpeciesInfo>> {
    let list = match &doc["SpeciesInfo"] {
        Yaml::Array(a) => a.clone(),
        h @ Yaml::Hash(_) => vec![h.clone()],
        Yaml::BadValue | Yaml::Null => return Ok(vec![SpeciesInfo::default()]),
        _ => return Err(Error::Config("'SpeciesInfo' must be a list".to_owned())),
    };
    let d = SpeciesInfo::default();
    list.iter()
        .map(|s| {
            Ok(SpeciesInfo {
                charge: read_real(s, "charge", d.charge)?,
                mass: read_real(s, "mass", d.mass)?,
                density: read_real(s, "density", d.density)?,
                temperature: read_real(s, "temperature", d.temperature)?,
                mean_velocity: read_real(s, "mean_velocity", d.mean_velocity)?,
                perturb_amplitude: read_real(s, "perturb_amplitude", d.perturb_amplitude)?,
                perturb_mode: read_integer(s, "perturb_mode", d.perturb_mode)?,
            })
        })
        .collect()
}

impl SimulationParams {
    /// Parse a YAML document
    ///
    /// # Errors
    /// Malformed YAML, values of the wrong type or invalid values
    pub fn from_yaml_str(input: &str) -> Result<Self> {
        let docs = YamlLoader::load_from_str(input).map_err(|e| Error::Config(e.to_string()))?;
        let doc = docs.first().cloned().unwrap_or(Yaml::Null);
        let default = Self::default();

        let mesh = Mesh::new(read_mesh(&doc)?, read_species(&doc)?)?;
        for s in mesh.species() {
            if s.mass <= 0. || s.temperature <= 0. {
                return Err(Error::Config("species mass and temperature must be positive".to_owned()));
            }
        }

        let algorithm = &doc["Algorithm"];
        let deltat = read_real(algorithm, "deltat", default.deltat)?;
        if deltat <= 0. || !deltat.is_finite() {
            return Err(Error::Config(format!("'deltat' must be positive, got {}", deltat)));
        }
        let interpolator = read_string(algorithm, "interpolator", &default.interpolator)?;
        if InterpolatorKind::from_name(&interpolator, Boundary::Periodic).is_none() {
            return Err(Error::Config(format!("unknown interpolator '{}'", interpolator)));
        }
        let quadrature = read_string(algorithm, "quadrature", &default.quadrature)?;
        if QuadratureKind::from_name(&quadrature).is_none() {
            return Err(Error::Config(format!("unknown quadrature '{}'", quadrature)));
        }
        let backend = read_string(algorithm, "backend", "parallel")?;
        let backend =
            ExecSpace::from_name(&backend).ok_or_else(|| Error::Config(format!("unknown backend '{}'", backend)))?;

        let noise = read_real(algorithm, "noise", default.noise)?;
        if noise < 0. || !noise.is_finite() {
            return Err(Error::Config(format!("'noise' must be non-negative, got {}", noise)));
        }

        let output = &doc["Output"];
        Ok(Self {
            mesh,
            deltat,
            nbiter: read_integer(algorithm, "nbiter", default.nbiter)?,
            interpolator,
            quadrature,
            backend,
            noise,
            time_diag: read_integer(output, "time_diag", default.time_diag)?.max(1),
            directory: read_string(output, "directory", &default.directory)?,
        })
    }

    /// Read and parse a YAML file
    ///
    /// # Errors
    /// File can not be read, see also [`SimulationParams::from_yaml_str`]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let input = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&input)
    }

    /// Interpolator with the given boundary treatment
    pub fn interpolator(&self, boundary: Boundary) -> Option<InterpolatorKind> {
        InterpolatorKind::from_name(&self.interpolator, boundary)
    }

    /// Quadrature rule
    pub fn quadrature(&self) -> Option<QuadratureKind> {
        QuadratureKind::from_name(&self.quadrature)
    }
}
