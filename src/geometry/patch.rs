use crate::base::InversionError;
use crate::StrError;

/// Holds a rectangular planar fault patch
///
/// The patch carries a rigid local frame with origin at its top centre:
///
/// * local 0 -- along strike (horizontal, clockwise from north by `strike`)
/// * local 1 -- up dip (inclined by `dip` from the horizontal, pointing toward the surface)
/// * local 2 -- normal (`along_strike × up_dip`), pointing into the hanging wall
///
/// The patch occupies `-length/2 ≤ s ≤ length/2` and `-width ≤ d ≤ 0` in local coordinates.
/// Global coordinates are Cartesian (east, north, up) with the free surface at `up = 0`.
///
/// ```text
///        strike →
///   (-L/2, 0) ●━━━━━━━━━●━━━━━━━━━● (L/2, 0)    ● top centre = position
///             ┃                   ┃
///             ┃   down dip ↓      ┃
///             ┃                   ┃
///  (-L/2, -W) ●━━━━━━━━━━━━━━━━━━━● (L/2, -W)
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Patch {
    position: [f64; 3],
    length: f64,
    width: f64,
    strike: f64,
    dip: f64,
    axes: [[f64; 3]; 3],
}

impl Patch {
    /// Allocates a new instance
    ///
    /// # Input
    ///
    /// * `position` -- global coordinates of the top centre
    /// * `length` -- length along strike (> 0)
    /// * `width` -- width along dip (> 0)
    /// * `strike` -- strike angle in degrees
    /// * `dip` -- dip angle in degrees, in (0, 180)
    pub fn new(position: [f64; 3], length: f64, width: f64, strike: f64, dip: f64) -> Result<Self, InversionError> {
        check_geometry(&position, length, width, strike, dip).map_err(InversionError::Geometry)?;
        let (ss, cs) = f64::sin_cos(strike.to_radians());
        let (sd, cd) = f64::sin_cos(dip.to_radians());
        let along_strike = [ss, cs, 0.0];
        let up_dip = [-cd * cs, cd * ss, sd];
        let normal = cross(&along_strike, &up_dip);
        Ok(Patch {
            position,
            length,
            width,
            strike,
            dip,
            axes: [along_strike, up_dip, normal],
        })
    }

    /// Returns the global coordinates of the top centre
    pub fn position(&self) -> [f64; 3] {
        self.position
    }

    /// Returns the length along strike
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Returns the width along dip
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Returns the strike angle in degrees
    pub fn strike(&self) -> f64 {
        self.strike
    }

    /// Returns the dip angle in degrees
    pub fn dip(&self) -> f64 {
        self.dip
    }

    /// Returns the area
    pub fn area(&self) -> f64 {
        self.length * self.width
    }

    /// Returns the unit vectors of the local frame in global coordinates
    ///
    /// The order is: along strike, up dip, normal.
    pub fn axes(&self) -> &[[f64; 3]; 3] {
        &self.axes
    }

    /// Maps local (patch) coordinates to global (user) coordinates
    pub fn patch_to_user(&self, local: &[f64; 3]) -> [f64; 3] {
        let mut global = self.position;
        for i in 0..3 {
            for a in 0..3 {
                global[i] += local[a] * self.axes[a][i];
            }
        }
        global
    }

    /// Maps global (user) coordinates to local (patch) coordinates
    pub fn user_to_patch(&self, global: &[f64; 3]) -> [f64; 3] {
        let rel = [
            global[0] - self.position[0],
            global[1] - self.position[1],
            global[2] - self.position[2],
        ];
        [dot(&self.axes[0], &rel), dot(&self.axes[1], &rel), dot(&self.axes[2], &rel)]
    }

    /// Returns the global coordinates of the centroid
    pub fn centroid(&self) -> [f64; 3] {
        self.patch_to_user(&[0.0, -0.5 * self.width, 0.0])
    }

    /// Returns the global coordinates of the four corners
    ///
    /// The order is: top-start, top-end, bottom-end, bottom-start (start/end along strike).
    pub fn corners(&self) -> [[f64; 3]; 4] {
        let hl = 0.5 * self.length;
        let w = self.width;
        [
            self.patch_to_user(&[-hl, 0.0, 0.0]),
            self.patch_to_user(&[hl, 0.0, 0.0]),
            self.patch_to_user(&[hl, -w, 0.0]),
            self.patch_to_user(&[-hl, -w, 0.0]),
        ]
    }

    /// Partitions the patch into `nl × nw` sub-patches of equal area
    ///
    /// Strike and dip are inherited; each sub-patch has `length / nl` and `width / nw`.
    /// The sub-patch with along-strike index `i` and down-dip index `j` is stored at
    /// `j * nl + i`, hence the along-strike index varies fastest and `j = 0` is the top row.
    pub fn discretize(&self, nl: usize, nw: usize) -> Result<Vec<Patch>, InversionError> {
        if nl == 0 || nw == 0 {
            return Err(InversionError::Geometry("discretization counts must be ≥ 1"));
        }
        let dl = self.length / (nl as f64);
        let dw = self.width / (nw as f64);
        let mut patches = Vec::with_capacity(nl * nw);
        for j in 0..nw {
            for i in 0..nl {
                let s = -0.5 * self.length + (i as f64 + 0.5) * dl;
                let d = -(j as f64) * dw;
                let top_centre = self.patch_to_user(&[s, d, 0.0]);
                patches.push(Patch::new(top_centre, dl, dw, self.strike, self.dip)?);
            }
        }
        Ok(patches)
    }
}

fn check_geometry(position: &[f64; 3], length: f64, width: f64, strike: f64, dip: f64) -> Result<(), StrError> {
    if !(length > 0.0) || !length.is_finite() {
        return Err("length must be > 0.0");
    }
    if !(width > 0.0) || !width.is_finite() {
        return Err("width must be > 0.0");
    }
    if !(dip > 0.0 && dip < 180.0) {
        return Err("dip must be in (0, 180) degrees");
    }
    if !strike.is_finite() || position.iter().any(|x| !x.is_finite()) {
        return Err("position and strike must be finite");
    }
    Ok(())
}

#[inline]
pub(crate) fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub(crate) fn cross(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
