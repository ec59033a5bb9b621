use crate::base::InversionError;
use crate::geometry::cardinal_basis;
use russell_lab::Vector;

/// Holds the observation points with their displacements and uncertainties
///
/// Positions are Cartesian (east, north, up); displacements and standard
/// deviations are given per component (east, north, up).
#[derive(Clone, Debug, PartialEq)]
pub struct Observations {
    /// Positions of the observation points
    pub positions: Vec<[f64; 3]>,

    /// Observed displacements
    pub displacements: Vec<[f64; 3]>,

    /// Standard deviations of the displacements (≥ 0)
    pub sigmas: Vec<[f64; 3]>,
}

/// Holds the observations flattened into one row per displacement component
///
/// Row `3 * i + k` holds component `k` (east, north, up) of point `i`.
#[derive(Clone, Debug)]
pub struct FlatObservations {
    /// Position of each row (each point repeated three times)
    pub positions: Vec<[f64; 3]>,

    /// Measurement direction of each row (cardinal basis)
    pub directions: Vec<[f64; 3]>,

    /// Observed value of each row
    pub values: Vector,

    /// Standard deviation of each row
    pub sigmas: Vector,
}

impl Observations {
    /// Allocates a new instance
    pub fn new(
        positions: Vec<[f64; 3]>,
        displacements: Vec<[f64; 3]>,
        sigmas: Vec<[f64; 3]>,
    ) -> Result<Self, InversionError> {
        if positions.len() != displacements.len() || positions.len() != sigmas.len() {
            return Err(InversionError::DimensionMismatch(format!(
                "{} positions, {} displacements, and {} sigmas",
                positions.len(),
                displacements.len(),
                sigmas.len()
            )));
        }
        let all_finite = |list: &[[f64; 3]]| list.iter().all(|v| v.iter().all(|x| x.is_finite()));
        if !all_finite(&positions) || !all_finite(&displacements) || !all_finite(&sigmas) {
            return Err(InversionError::InvalidInput("observation values must be finite"));
        }
        if sigmas.iter().any(|s| s.iter().any(|x| *x < 0.0)) {
            return Err(InversionError::InvalidInput("standard deviations must be ≥ 0.0"));
        }
        Ok(Observations {
            positions,
            displacements,
            sigmas,
        })
    }

    /// Allocates observation points with zero displacement and unit standard deviation
    pub fn at_points(positions: Vec<[f64; 3]>) -> Self {
        let n = positions.len();
        Observations {
            positions,
            displacements: vec![[0.0; 3]; n],
            sigmas: vec![[1.0; 3]; n],
        }
    }

    /// Returns the number of observation points
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true if there are no observation points
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Flattens the data into one row per displacement component
    pub fn flatten(&self) -> FlatObservations {
        let n = self.len();
        let cardinal = cardinal_basis();
        let mut positions = Vec::with_capacity(3 * n);
        let mut directions = Vec::with_capacity(3 * n);
        let mut values = Vector::new(3 * n);
        let mut sigmas = Vector::new(3 * n);
        for i in 0..n {
            for k in 0..3 {
                positions.push(self.positions[i]);
                directions.push(cardinal[k]);
                values[3 * i + k] = self.displacements[i][k];
                sigmas[3 * i + k] = self.sigmas[i][k];
            }
        }
        FlatObservations {
            positions,
            directions,
            values,
            sigmas,
        }
    }

    /// Reshapes a flattened vector (one value per row) into one triple per point
    pub fn unflatten(values: &Vector) -> Result<Vec<[f64; 3]>, InversionError> {
        let data = values.as_data();
        if data.len() % 3 != 0 {
            return Err(InversionError::DimensionMismatch(format!(
                "{} values is not a multiple of 3",
                data.len()
            )));
        }
        Ok(data.chunks(3).map(|c| [c[0], c[1], c[2]]).collect())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
