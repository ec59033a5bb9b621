use super::{DEFAULT_DAMPING, DEFAULT_NNLS_TOLERANCE, DEFAULT_POISSON, SURFACE_TOLERANCE};
use crate::StrError;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fmt;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// Holds the geometry and discretization of one planar fault segment
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct SegmentConfig {
    /// Cartesian position (east, north, up) of the top centre of the segment
    ///
    /// The up coordinate must be ≤ 0 (the segment is buried or reaches the surface).
    pub position: [f64; 3],

    /// Strike angle in degrees (clockwise from north; the segment dips to the right)
    pub strike: f64,

    /// Dip angle in degrees, in (0, 180)
    pub dip: f64,

    /// Length along strike
    pub length: f64,

    /// Width along dip
    pub width: f64,

    /// Number of sub-patches along strike (Nl)
    pub n_along_strike: usize,

    /// Number of sub-patches along dip (Nw)
    pub n_along_dip: usize,
}

/// Defines the kind of penalty operator added to the forward problem
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum Regularization {
    /// Minimum-norm (Tikhonov) damping: `L = damping · I`
    Damping,

    /// First differences between adjacent patches, per slip direction
    FirstDifference,

    /// Discrete Laplacian over adjacent patches, per slip direction
    Laplacian,
}

/// Holds configuration data of an inversion run
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    /// Fault segments
    pub segments: Vec<SegmentConfig>,

    /// Slip basis directions in the patch frame (along-strike, up-dip, normal)
    ///
    /// The same basis is associated with every patch.
    pub slip_basis: Vec<[f64; 3]>,

    /// Kind of regularization
    pub regularization: Regularization,

    /// Regularization strength (must be > 0)
    pub damping: f64,

    /// Poisson's coefficient of the elastic half-space
    pub poisson: f64,

    /// Divides each data row by its standard deviation
    pub weighted: bool,

    /// Maximum number of NNLS iterations (None means 3 × number of unknowns)
    pub nnls_max_iterations: Option<usize>,

    /// Tolerance on the KKT conditions, relative to max |Aᵀb|
    pub nnls_tolerance: f64,
}

impl Config {
    /// Allocates a new instance with a strike-slip and dip-slip basis and no segments
    pub fn new() -> Self {
        Config {
            segments: Vec::new(),
            slip_basis: vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            regularization: Regularization::Damping,
            damping: DEFAULT_DAMPING,
            poisson: DEFAULT_POISSON,
            weighted: false,
            nnls_max_iterations: None,
            nnls_tolerance: DEFAULT_NNLS_TOLERANCE,
        }
    }

    /// Adds a fault segment
    pub fn add_segment(&mut self, segment: SegmentConfig) -> Result<&mut Self, StrError> {
        check_segment(&segment)?;
        self.segments.push(segment);
        Ok(self)
    }

    /// Sets the slip basis directions (patch frame)
    pub fn set_slip_basis(&mut self, directions: &[[f64; 3]]) -> Result<&mut Self, StrError> {
        check_slip_basis(directions)?;
        self.slip_basis = directions.to_vec();
        Ok(self)
    }

    /// Sets the kind of regularization and its damping coefficient
    pub fn set_regularization(&mut self, kind: Regularization, damping: f64) -> Result<&mut Self, StrError> {
        if !(damping > 0.0) {
            return Err("damping must be > 0.0");
        }
        self.regularization = kind;
        self.damping = damping;
        Ok(self)
    }

    /// Sets the Poisson's coefficient of the half-space
    pub fn set_poisson(&mut self, value: f64) -> Result<&mut Self, StrError> {
        if !(value > -1.0 && value < 0.5) {
            return Err("poisson must be in (-1.0, 0.5)");
        }
        self.poisson = value;
        Ok(self)
    }

    /// Sets whether the data rows are weighted by the inverse of their standard deviation
    pub fn set_weighted(&mut self, flag: bool) -> Result<&mut Self, StrError> {
        self.weighted = flag;
        Ok(self)
    }

    /// Sets the NNLS iteration limit and tolerance
    pub fn set_nnls(&mut self, max_iterations: Option<usize>, tolerance: f64) -> Result<&mut Self, StrError> {
        if max_iterations == Some(0) {
            return Err("nnls_max_iterations must be ≥ 1");
        }
        if !(tolerance > 0.0) {
            return Err("nnls_tolerance must be > 0.0");
        }
        self.nnls_max_iterations = max_iterations;
        self.nnls_tolerance = tolerance;
        Ok(self)
    }

    /// Returns the total number of sub-patches
    pub fn n_patch(&self) -> usize {
        self.segments.iter().map(|s| s.n_along_strike * s.n_along_dip).sum()
    }

    /// Returns the total number of unknowns (patches × basis directions)
    pub fn n_unknown(&self) -> usize {
        self.n_patch() * self.slip_basis.len()
    }

    /// Validates all data
    ///
    /// Returns a message with the inconsistent data, or returns None if everything is all right.
    pub fn validate(&self) -> Option<String> {
        if self.segments.is_empty() {
            return Some("at least one fault segment is required".to_string());
        }
        for (i, segment) in self.segments.iter().enumerate() {
            if let Err(msg) = check_segment(segment) {
                return Some(format!("segment {}: {}", i, msg));
            }
        }
        if let Err(msg) = check_slip_basis(&self.slip_basis) {
            return Some(msg.to_string());
        }
        if !(self.damping > 0.0) {
            return Some(format!("damping = {:?} is incorrect; it must be > 0.0", self.damping));
        }
        if !(self.poisson > -1.0 && self.poisson < 0.5) {
            return Some(format!("poisson = {:?} is incorrect; it must be in (-1.0, 0.5)", self.poisson));
        }
        if self.nnls_max_iterations == Some(0) {
            return Some("nnls_max_iterations must be ≥ 1".to_string());
        }
        if !(self.nnls_tolerance > 0.0) {
            return Some(format!(
                "nnls_tolerance = {:?} is incorrect; it must be > 0.0",
                self.nnls_tolerance
            ));
        }
        None
    }

    /// Reads a JSON file containing the configuration
    ///
    /// # Input
    ///
    /// * `full_path` -- may be a String, &str, or Path
    pub fn read_json<P>(full_path: &P) -> Result<Self, StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        let file = File::open(&path).map_err(|_| "file not found")?;
        let reader = BufReader::new(file);
        let config = serde_json::from_reader(reader).map_err(|_| "deserialize failed")?;
        Ok(config)
    }

    /// Writes a JSON file with the configuration
    ///
    /// # Input
    ///
    /// * `full_path` -- may be a String, &str, or Path
    pub fn write_json<P>(&self, full_path: &P) -> Result<(), StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        if let Some(p) = path.parent() {
            fs::create_dir_all(p).map_err(|_| "cannot create directory")?;
        }
        let mut file = File::create(&path).map_err(|_| "cannot create file")?;
        serde_json::to_writer_pretty(&mut file, &self).map_err(|_| "cannot write file")?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

fn check_segment(segment: &SegmentConfig) -> Result<(), StrError> {
    if !(segment.length > 0.0) {
        return Err("segment length must be > 0.0");
    }
    if !(segment.width > 0.0) {
        return Err("segment width must be > 0.0");
    }
    if !(segment.dip > 0.0 && segment.dip < 180.0) {
        return Err("segment dip must be in (0, 180) degrees");
    }
    if !segment.strike.is_finite() || segment.position.iter().any(|x| !x.is_finite()) {
        return Err("segment position and strike must be finite");
    }
    if segment.position[2] > SURFACE_TOLERANCE {
        return Err("segment top must not be above the free surface");
    }
    if segment.n_along_strike == 0 || segment.n_along_dip == 0 {
        return Err("segment discretization counts must be ≥ 1");
    }
    Ok(())
}

fn check_slip_basis(directions: &[[f64; 3]]) -> Result<(), StrError> {
    if directions.is_empty() {
        return Err("slip basis must have at least one direction");
    }
    for d in directions {
        if d.iter().any(|x| !x.is_finite()) {
            return Err("slip basis directions must be finite");
        }
        if d.iter().all(|x| *x == 0.0) {
            return Err("slip basis directions must be non-zero");
        }
    }
    Ok(())
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration data\n")?;
        write!(f, "==================\n")?;
        write!(f, "regularization = {:?}\n", self.regularization)?;
        write!(f, "damping = {:?}\n", self.damping)?;
        write!(f, "poisson = {:?}\n", self.poisson)?;
        write!(f, "weighted = {:?}\n", self.weighted)?;
        write!(f, "nnls_max_iterations = {:?}\n", self.nnls_max_iterations)?;
        write!(f, "nnls_tolerance = {:?}\n", self.nnls_tolerance)?;

        write!(f, "\nSlip basis\n")?;
        write!(f, "==========\n")?;
        for (i, d) in self.slip_basis.iter().enumerate() {
            write!(f, "{} → {:?}\n", i, d)?;
        }

        write!(f, "\nFault segments\n")?;
        write!(f, "==============\n")?;
        for (i, s) in self.segments.iter().enumerate() {
            write!(f, "{} → {:?}\n", i, s)?;
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
