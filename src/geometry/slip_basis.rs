use crate::base::InversionError;

/// Holds an ordered set of slip directions in the patch frame
///
/// Components are (along-strike, up-dip, normal). Positive along-strike slip is
/// left-lateral, positive up-dip slip is thrust, and positive normal slip is opening.
/// The directions need not be orthogonal nor unit length.
#[derive(Clone, Debug, PartialEq)]
pub struct SlipBasis {
    directions: Vec<[f64; 3]>,
}

impl SlipBasis {
    /// Allocates a new instance
    pub fn new(directions: &[[f64; 3]]) -> Result<Self, InversionError> {
        if directions.is_empty() {
            return Err(InversionError::InvalidInput("slip basis must have at least one direction"));
        }
        for d in directions {
            if d.iter().any(|x| !x.is_finite()) {
                return Err(InversionError::InvalidInput("slip basis directions must be finite"));
            }
            if d.iter().all(|x| *x == 0.0) {
                return Err(InversionError::InvalidInput("slip basis directions must be non-zero"));
            }
        }
        Ok(SlipBasis {
            directions: directions.to_vec(),
        })
    }

    /// Returns the strike-slip and dip-slip basis
    pub fn strike_dip() -> Self {
        SlipBasis {
            directions: vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        }
    }

    /// Returns the number of directions
    pub fn len(&self) -> usize {
        self.directions.len()
    }

    /// Returns the directions
    pub fn directions(&self) -> &[[f64; 3]] {
        &self.directions
    }

    /// Returns the direction with index `i`
    pub fn direction(&self, i: usize) -> &[f64; 3] {
        &self.directions[i]
    }
}

/// Returns the Cartesian unit vectors (east, north, up)
///
/// These are the default measurement directions of a three-component observation.
pub fn cardinal_basis() -> [[f64; 3]; 3] {
    [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
}

/// Converts basis coefficients into (along-strike, up-dip, normal) slip components
///
/// # Input
///
/// * `coefficients` -- one value per basis direction
/// * `basis` -- the slip basis the coefficients refer to
pub fn cardinal_components(coefficients: &[f64], basis: &SlipBasis) -> Result<[f64; 3], InversionError> {
    if coefficients.len() != basis.len() {
        return Err(InversionError::DimensionMismatch(format!(
            "{} coefficients but {} basis directions",
            coefficients.len(),
            basis.len()
        )));
    }
    let mut slip = [0.0; 3];
    for (c, d) in coefficients.iter().zip(basis.directions()) {
        for i in 0..3 {
            slip[i] += c * d[i];
        }
    }
    Ok(slip)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
