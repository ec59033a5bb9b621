use crate::StrError;
use russell_lab::math::PI;

/// Below this value of cos(dip) the vertical-fault expressions are used
///
/// The inclined expressions lose accuracy as 1/cos(dip) grows; at cos(dip) < 1e-4
/// the vertical expressions differ from the inclined ones by less than 1e-5 (relative).
pub const COS_DIP_VERTICAL: f64 = 1e-4;

/// Holds the parameters of a rectangular dislocation in Okada's frame
///
/// Okada's frame has `x` along strike, `y` horizontal and perpendicular to strike
/// (pointing to the left of the strike direction), and `z` up. The reference point
/// is the surface projection of the deepest edge start; the fault spans `0 ≤ ξ ≤ length`
/// along strike and `0 ≤ η ≤ width` up dip from the bottom edge at depth `depth`.
///
/// # Reference
///
/// 1. Okada Y (1985) Surface deformation due to shear and tensile faults in a half-space,
///    Bulletin of the Seismological Society of America, 75(4):1135-1154
#[derive(Clone, Copy, Debug)]
pub struct OkadaSource {
    /// Depth of the bottom edge (positive downwards)
    pub depth: f64,

    /// Dip angle in degrees, in (0, 90]
    pub dip: f64,

    /// Length along strike
    pub length: f64,

    /// Width along dip
    pub width: f64,

    /// Ratio μ/(λ+μ) = 1 - 2ν of the half-space
    pub mu_ratio: f64,
}

/// Holds the contributions of a single corner for unit strike, dip, and tensile dislocations
struct CornerTerms {
    strike: [f64; 3],
    dip: [f64; 3],
    tensile: [f64; 3],
}

impl OkadaSource {
    /// Validates the parameters
    pub fn validate(&self) -> Result<(), StrError> {
        if !(self.length > 0.0) || !(self.width > 0.0) {
            return Err("length and width must be > 0.0");
        }
        if !(self.dip > 0.0 && self.dip <= 90.0) {
            return Err("dip must be in (0, 90] degrees in Okada's frame");
        }
        if !(self.mu_ratio > 0.0 && self.mu_ratio < 3.0) {
            return Err("mu_ratio must be in (0, 3)");
        }
        let top = self.depth - self.width * f64::sin(self.dip.to_radians());
        if top < -1e-9 * (self.length + self.width) {
            return Err("the top edge of the source must not be above the free surface");
        }
        Ok(())
    }

    /// Calculates the surface displacement (ux, uy, uz) in Okada's frame
    ///
    /// # Input
    ///
    /// * `x`, `y` -- coordinates of the surface point
    /// * `dislocation` -- (U1, U2, U3): left-lateral strike-slip, thrust dip-slip, and opening
    ///
    /// The result may contain non-finite values only at the corners of a surface-breaking
    /// source; the caller is responsible for stabilizing such points.
    pub fn displacement(&self, x: f64, y: f64, dislocation: &[f64; 3]) -> [f64; 3] {
        let (mut sd, mut cd) = f64::sin_cos(self.dip.to_radians());
        if cd < COS_DIP_VERTICAL {
            sd = 1.0;
            cd = 0.0;
        }
        let tol = 1e-12 * (self.length + self.width);
        let p = y * cd + self.depth * sd;
        let q = y * sd - self.depth * cd;

        // Chinnery's notation: f(x, p) - f(x, p - W) - f(x - L, p) + f(x - L, p - W)
        let corners = [
            (x, p, 1.0),
            (x, p - self.width, -1.0),
            (x - self.length, p, -1.0),
            (x - self.length, p - self.width, 1.0),
        ];
        let mut uu = [0.0; 3];
        for (xi, eta, sign) in corners {
            let t = self.corner(xi, eta, q, sd, cd, tol);
            for i in 0..3 {
                uu[i] += sign
                    * (-dislocation[0] * t.strike[i] - dislocation[1] * t.dip[i] + dislocation[2] * t.tensile[i])
                    / (2.0 * PI);
            }
        }
        uu
    }

    fn corner(&self, xi: f64, eta: f64, q: f64, sd: f64, cd: f64, tol: f64) -> CornerTerms {
        let mr = self.mu_ratio;
        let snap = |v: f64| if f64::abs(v) < tol { 0.0 } else { v };
        let (xi, eta, q) = (snap(xi), snap(eta), snap(q));
        let r = f64::sqrt(xi * xi + eta * eta + q * q);
        let xx = f64::sqrt(xi * xi + q * q);
        let yb = eta * cd + q * sd;
        let db = eta * sd - q * cd;

        // singular cases (R + η = 0, R + ξ = 0, q = 0) as given by Okada (1992)
        let (inv_r_eta, ln_r_eta) = if r + eta < tol {
            (0.0, -f64::ln(r - eta))
        } else {
            (1.0 / (r + eta), f64::ln(r + eta))
        };
        let inv_r_xi = if r + xi < tol { 0.0 } else { 1.0 / (r + xi) };
        let theta = if f64::abs(q) < tol {
            0.0
        } else {
            f64::atan(xi * eta / (q * r))
        };

        let (i1, i2, i3, i4, i5) = if cd > 0.0 {
            let i5 = if f64::abs(xi) < tol {
                0.0
            } else {
                mr * 2.0 / cd * f64::atan((eta * (xx + q * cd) + xx * (r + xx) * sd) / (xi * (r + xx) * cd))
            };
            let i4 = mr / cd * (f64::ln(r + db) - sd * ln_r_eta);
            let i3 = mr * (yb / (cd * (r + db)) - ln_r_eta) + sd / cd * i4;
            let i2 = mr * (-ln_r_eta) - i3;
            let i1 = mr * (-xi / (cd * (r + db))) - sd / cd * i5;
            (i1, i2, i3, i4, i5)
        } else {
            let inv_r_db = 1.0 / (r + db);
            let i1 = -0.5 * mr * xi * q * inv_r_db * inv_r_db;
            let i3 = 0.5 * mr * (eta * inv_r_db + yb * q * inv_r_db * inv_r_db - ln_r_eta);
            let i4 = -mr * q * inv_r_db;
            let i5 = -mr * xi * sd * inv_r_db;
            let i2 = mr * (-ln_r_eta) - i3;
            (i1, i2, i3, i4, i5)
        };

        let q_r_eta = q / r * inv_r_eta; // q / (R (R + η))
        let q_r_xi = q / r * inv_r_xi; // q / (R (R + ξ))
        CornerTerms {
            strike: [
                xi * q_r_eta + theta + i1 * sd,
                yb * q_r_eta + q * cd * inv_r_eta + i2 * sd,
                db * q_r_eta + q * sd * inv_r_eta + i4 * sd,
            ],
            dip: [
                q / r - i3 * sd * cd,
                yb * q_r_xi + cd * theta - i1 * sd * cd,
                db * q_r_xi + sd * theta - i5 * sd * cd,
            ],
            tensile: [
                q * q_r_eta - i3 * sd * sd,
                -db * q_r_xi - sd * (xi * q_r_eta - theta) - i1 * sd * sd,
                yb * q_r_xi + cd * (xi * q_r_eta - theta) - i5 * sd * sd,
            ],
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
